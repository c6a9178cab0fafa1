use std::time::Duration;

/// Tools whose calls are internal bookkeeping and never shown to the client.
pub const DEFAULT_SUPPRESSED_TOOLS: [&str; 2] = ["create_temp_dir", "delete_temp_dir"];

/// Tool whose payload carries rendered HTML for the client.
pub const DEFAULT_HTML_TOOL: &str = "build_map";

/// Upper bound on the trace report made before the agent starts.
pub const DEFAULT_TRACE_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the chunk pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Tool names that never produce a tool-call chunk.
    pub suppressed_tools: Vec<String>,
    /// Tool name whose `html_content` payload is forwarded on its chunk.
    pub html_tool: String,
    /// How long a trace report may delay the agent run before it is abandoned.
    pub trace_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            suppressed_tools: DEFAULT_SUPPRESSED_TOOLS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            html_tool: DEFAULT_HTML_TOOL.to_string(),
            trace_timeout: DEFAULT_TRACE_TIMEOUT,
        }
    }
}

impl PipelineConfig {
    /// Builds a config from the defaults overridden by environment variables.
    ///
    /// - `AGENT_STREAM_SUPPRESSED_TOOLS`: comma-separated tool names.
    /// - `AGENT_STREAM_HTML_TOOL`: tool name carrying HTML content.
    /// - `AGENT_STREAM_TRACE_TIMEOUT_MS`: trace report timeout in milliseconds.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var("AGENT_STREAM_SUPPRESSED_TOOLS") {
            config.suppressed_tools = parse_tool_list(&raw);
        }
        if let Ok(raw) = std::env::var("AGENT_STREAM_HTML_TOOL")
            && !raw.trim().is_empty()
        {
            config.html_tool = raw.trim().to_string();
        }
        if let Ok(raw) = std::env::var("AGENT_STREAM_TRACE_TIMEOUT_MS")
            && let Ok(ms) = raw.trim().parse::<u64>()
        {
            config.trace_timeout = Duration::from_millis(ms);
        }
        config
    }

    /// Replaces the suppressed tool list.
    pub fn suppressed_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suppressed_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Overrides the HTML-carrying tool name.
    pub fn html_tool(mut self, tool: impl Into<String>) -> Self {
        self.html_tool = tool.into();
        self
    }

    /// Sets the trace report timeout.
    pub fn trace_timeout(mut self, timeout: Duration) -> Self {
        self.trace_timeout = timeout;
        self
    }

    /// Whether calls to `tool_name` are hidden from the client.
    pub fn is_suppressed(&self, tool_name: &str) -> bool {
        self.suppressed_tools.iter().any(|t| t == tool_name)
    }
}

fn parse_tool_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_suppress_scratch_directory_tools() {
        let config = PipelineConfig::default();
        assert!(config.is_suppressed("create_temp_dir"));
        assert!(config.is_suppressed("delete_temp_dir"));
        assert!(!config.is_suppressed("build_map"));
        assert_eq!(config.html_tool, "build_map");
        assert_eq!(config.trace_timeout, DEFAULT_TRACE_TIMEOUT);
    }

    #[test]
    fn tool_list_ignores_blanks_and_whitespace() {
        assert_eq!(
            parse_tool_list(" a, ,b ,,c"),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
        assert!(parse_tool_list("").is_empty());
    }

    #[test]
    fn builder_setters_override_defaults() {
        let config = PipelineConfig::default()
            .suppressed_tools(["scratch"])
            .html_tool("render_chart")
            .trace_timeout(Duration::from_millis(250));
        assert!(config.is_suppressed("scratch"));
        assert!(!config.is_suppressed("delete_temp_dir"));
        assert_eq!(config.html_tool, "render_chart");
        assert_eq!(config.trace_timeout, Duration::from_millis(250));
    }
}
