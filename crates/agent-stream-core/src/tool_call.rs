use serde_json::{Map, Value};
use tracing::{error, info};

use crate::chunk::Chunk;
use crate::config::PipelineConfig;
use crate::decode::decode_tool_output;
use crate::errors::StreamError;

/// Builds the client notification for a finished tool call.
///
/// Returns `Ok(None)` for suppressed tools. A payload whose `input_arguments`
/// or `html_content` has an unexpected shape is a structural failure and is
/// returned as `StreamError::ToolCall`.
pub fn build_tool_call_chunk(
    tool_name: &str,
    tool_output: &str,
    trace_id: &str,
    config: &PipelineConfig,
) -> Result<Option<Chunk>, StreamError> {
    info!(trace_id, tool = tool_name, "handling tool call");
    if config.is_suppressed(tool_name) {
        return Ok(None);
    }

    let record = decode_tool_output(tool_output);
    let result = input_arguments(record.field("input_arguments"))
        .and_then(|arguments| {
            let html_content = if tool_name == config.html_tool {
                html_content(record.field("html_content"))?
            } else {
                None
            };
            Ok(Chunk::tool_call(
                trace_id,
                tool_call_message(tool_name, arguments),
                html_content,
            ))
        })
        .map_err(|message| StreamError::tool_call(tool_name, message));

    match result {
        Ok(chunk) => Ok(Some(chunk)),
        Err(err) => {
            error!(trace_id, tool = tool_name, tool_output, error = %err, "exception handling tool call");
            Err(err)
        }
    }
}

fn input_arguments(value: Option<&Value>) -> Result<Option<&Map<String, Value>>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(other) => Err(format!(
            "input_arguments must be an object, got {}",
            json_type(other)
        )),
    }
}

fn html_content(value: Option<&Value>) -> Result<Option<String>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(html)) => Ok(Some(html.clone())),
        Some(other) => Err(format!(
            "html_content must be a string, got {}",
            json_type(other)
        )),
    }
}

fn tool_call_message(tool_name: &str, arguments: Option<&Map<String, Value>>) -> String {
    let mut message = format!("Calling {tool_name}");
    let Some(arguments) = arguments.filter(|args| !args.is_empty()) else {
        return message;
    };
    message.push_str(" with arguments:\n");
    for (key, value) in arguments {
        message.push_str(&format!("   {key}: {}\n", display_value(value)));
    }
    message
}

// Non-string values render as compact JSON, the notation of the payload they
// were decoded from.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
