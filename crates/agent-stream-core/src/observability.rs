use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

const LOG_CRATES: [&str; 2] = ["agent_stream_core", "agent_stream_replay"];
const DEFAULT_LOG_FILE: &str = "agent-stream.logs.jsonl";

#[derive(Debug, Clone, PartialEq, Eq)]
enum LogSink {
    /// Compact lines on stderr; stdout carries the chunk protocol.
    Console,
    JsonFile { dir: PathBuf, file_name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LogSettings {
    enabled: bool,
    directives: String,
    sink: LogSink,
}

impl LogSettings {
    fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = [
            "AGENT_STREAM_OBSERVABILITY_ENABLED",
            "AGENT_STREAM_OBSERVABILITY",
        ]
        .into_iter()
        .find_map(|key| lookup(key))
        .map(|value| parse_bool_env(&value).unwrap_or(true))
        .unwrap_or(true);

        let directives = lookup("AGENT_STREAM_LOG_LEVEL")
            .map(|level| scoped_directives(&level))
            .or_else(|| lookup("RUST_LOG").filter(|v| !v.trim().is_empty()))
            .unwrap_or_else(|| scoped_directives("info"));

        let json_path = lookup("AGENT_STREAM_JSON_LOG_PATH").filter(|v| !v.trim().is_empty());
        let sink = match json_path {
            Some(raw) => {
                let path = PathBuf::from(raw);
                let dir = path
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .unwrap_or_else(|| Path::new("."))
                    .to_path_buf();
                let file_name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or(DEFAULT_LOG_FILE)
                    .to_string();
                LogSink::JsonFile { dir, file_name }
            }
            None => LogSink::Console,
        };

        Self {
            enabled,
            directives,
            sink,
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.directives)
            .unwrap_or_else(|_| EnvFilter::new(scoped_directives("info")))
    }
}

fn parse_bool_env(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

/// A bare level applies to this workspace's crates only; dependencies stay at
/// `warn`. Anything else is taken as a full filter directive.
fn scoped_directives(level: &str) -> String {
    let level = level.trim();
    if level.parse::<LevelFilter>().is_err() {
        return level.to_string();
    }
    let mut directives = String::from("warn");
    for krate in LOG_CRATES {
        directives.push_str(&format!(",{krate}={level}"));
    }
    directives
}

/// Initialize logging once per process.
///
/// Environment variables:
/// - `AGENT_STREAM_OBSERVABILITY_ENABLED` / `AGENT_STREAM_OBSERVABILITY`: optional enable/disable flag (default enabled).
/// - `AGENT_STREAM_LOG_LEVEL`: a level (`info`, `debug`, ...) for the pipeline crates, or a full filter directive.
/// - `RUST_LOG`: filter used when no level is set.
/// - `AGENT_STREAM_JSON_LOG_PATH`: optional log file path. If set, logs are JSONL in that file; otherwise compact lines go to stderr.
pub fn init_observability() {
    INIT.get_or_init(|| install(&LogSettings::from_env()));
}

fn install(settings: &LogSettings) {
    if !settings.enabled {
        return;
    }
    let env_filter = settings.env_filter();
    match &settings.sink {
        LogSink::JsonFile { dir, file_name } => {
            let dir_result = std::fs::create_dir_all(dir);
            let writer = tracing_appender::rolling::never(dir, file_name);
            let json_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_target(false)
                .with_writer(writer);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(json_layer)
                .try_init();
            if let Err(err) = dir_result {
                warn!(dir = %dir.display(), error = %err, "failed to create log directory");
            }
        }
        LogSink::Console => {
            let console_layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .try_init();
        }
    }
}
