//! Decoder for the debug rendering of a tool call result.
//!
//! Tool results reach the pipeline as strings such as
//!
//! ```text
//! meta=None content=[TextContent(type='text', text='{"input_arguments": {"a": 1}}', annotations=None, meta=None)] isError=False
//! ```
//!
//! where the inner `text` is an escaped JSON document. Decoding never fails
//! past this module: malformed input yields an error-flagged record.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

static META_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\bmeta=(None|'[^']*'|"[^"]*"|[^\s,)\]]+)"#).expect("valid meta regex")
});

static IS_ERROR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bisError=(True|False)\b").expect("valid isError regex"));

static CONTENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?s)content=\[TextContent\(type='text', text=(?:'(.*?)'|"(.*?)"), annotations="#,
    )
    .expect("valid content regex")
});

/// Text payload of a decoded tool result.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TextPayload {
    /// Always `"text"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// The parsed JSON object carried by the tool result.
    pub text: Map<String, Value>,
}

impl TextPayload {
    /// Wraps a parsed object as a `"text"` payload.
    pub fn new(text: Map<String, Value>) -> Self {
        Self {
            kind: "text".to_string(),
            text,
        }
    }
}

/// Typed view of a tool result.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ToolOutputRecord {
    pub meta: Option<String>,
    pub content: TextPayload,
    pub is_error: bool,
}

impl ToolOutputRecord {
    /// Error-flagged record carrying `{"error": message}`.
    pub fn failure(message: impl Into<String>) -> Self {
        let mut text = Map::new();
        text.insert("error".to_string(), Value::String(message.into()));
        Self {
            meta: None,
            content: TextPayload::new(text),
            is_error: true,
        }
    }

    /// Returns a field of the decoded payload.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.content.text.get(key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
enum DecodeError {
    #[error("no TextContent block found")]
    MissingContent,
    #[error("no isError flag found")]
    MissingErrorFlag,
    #[error("invalid escape sequence: {0}")]
    InvalidEscape(String),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(String),
    #[error("JSON payload is not an object")]
    NotAnObject,
}

/// Decodes a tool result rendering into a `ToolOutputRecord`.
///
/// Any failure is logged and folded into an error-flagged record.
pub fn decode_tool_output(raw: &str) -> ToolOutputRecord {
    match try_decode(raw) {
        Ok(record) => record,
        Err(err) => {
            warn!(error = %err, "failed to decode tool output");
            ToolOutputRecord::failure(format!("Error parsing tool output: {err}"))
        }
    }
}

fn try_decode(raw: &str) -> Result<ToolOutputRecord, DecodeError> {
    let meta = META_RE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .and_then(|m| parse_meta(m.as_str()));

    let content = CONTENT_RE
        .captures(raw)
        .ok_or(DecodeError::MissingContent)?;
    let captured = content
        .get(1)
        .or_else(|| content.get(2))
        .map(|m| m.as_str())
        .ok_or(DecodeError::MissingContent)?;
    let tail = content.get(0).map_or(raw, |m| &raw[m.end()..]);

    // The outer flag is the last field of the rendering; anything earlier may
    // be tool text.
    let is_error = IS_ERROR_RE
        .captures_iter(tail)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str() == "True")
        .ok_or(DecodeError::MissingErrorFlag)?;

    let text = parse_text(captured)?;
    Ok(ToolOutputRecord {
        meta,
        content: TextPayload::new(text),
        is_error,
    })
}

fn parse_meta(token: &str) -> Option<String> {
    if token == "None" {
        return None;
    }
    let unquoted = token
        .strip_prefix('\'')
        .and_then(|t| t.strip_suffix('\''))
        .or_else(|| token.strip_prefix('"').and_then(|t| t.strip_suffix('"')))
        .unwrap_or(token);
    Some(unquoted.to_string())
}

// Unescaped parse first; the raw capture is tried when the content was never
// escaped in the first place.
fn parse_text(captured: &str) -> Result<Map<String, Value>, DecodeError> {
    let primary = unescape_literal(captured).and_then(|text| parse_object(&text));
    match primary {
        Ok(map) => Ok(map),
        Err(primary_err) => parse_object(captured).map_err(|_| primary_err),
    }
}

fn parse_object(text: &str) -> Result<Map<String, Value>, DecodeError> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(DecodeError::NotAnObject),
        Err(e) => Err(DecodeError::InvalidJson(e.to_string())),
    }
}

fn unescape_literal(raw: &str) -> Result<String, DecodeError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(next) = chars.next() else {
            return Err(DecodeError::InvalidEscape("trailing backslash".into()));
        };
        match next {
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0c}'),
            'v' => out.push('\u{0b}'),
            '0' => out.push('\0'),
            'x' => out.push(read_code_point(&mut chars, 'x', 2)?),
            'u' => out.push(read_code_point(&mut chars, 'u', 4)?),
            'U' => out.push(read_code_point(&mut chars, 'U', 8)?),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    Ok(out)
}

fn read_code_point(
    chars: &mut std::str::Chars<'_>,
    escape: char,
    digits: usize,
) -> Result<char, DecodeError> {
    let hex: String = chars.by_ref().take(digits).collect();
    if hex.chars().count() != digits {
        return Err(DecodeError::InvalidEscape(format!(
            "truncated \\{escape}{hex}"
        )));
    }
    u32::from_str_radix(&hex, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| DecodeError::InvalidEscape(format!("bad code point {hex}")))
}
