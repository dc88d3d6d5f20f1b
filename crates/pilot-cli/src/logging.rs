//! Log output for the bridge binary.
//!
//! Logs go to stderr.  `RUST_LOG` overrides the filter; without it the
//! bridge crates log at `info` and dependencies only at `warn`, which keeps
//! TLS and WebSocket handshake chatter out of the default output.
//! `PILOT_LOG_FORMAT=json` switches to newline-delimited JSON for log
//! collectors.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or unparsable.
const DEFAULT_FILTER: &str = "warn,pilot_bridge=info,pilot_desk=info,pilot_middleware=info";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    /// Read the format from a `PILOT_LOG_FORMAT` value.  Anything other than
    /// `json` gives compact text.
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }
}

fn env_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber.  Call once, first thing in `main`.
pub fn init() {
    let format = LogFormat::from_env_value(std::env::var("PILOT_LOG_FORMAT").ok().as_deref());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_defaults_to_compact() {
        assert_eq!(LogFormat::from_env_value(None), LogFormat::Compact);
        assert_eq!(LogFormat::from_env_value(Some("pretty")), LogFormat::Compact);
        assert_eq!(LogFormat::from_env_value(Some("")), LogFormat::Compact);
    }

    #[test]
    fn json_format_is_case_insensitive() {
        assert_eq!(LogFormat::from_env_value(Some("json")), LogFormat::Json);
        assert_eq!(LogFormat::from_env_value(Some(" JSON ")), LogFormat::Json);
    }

    #[test]
    fn default_filter_keeps_bridge_crates_at_info() {
        let filter = env_filter(None).to_string();
        assert!(filter.contains("pilot_desk=info"));
        assert!(filter.contains("pilot_middleware=info"));
        assert!(filter.contains("pilot_bridge=info"));
    }

    #[test]
    fn rust_log_replaces_default_filter() {
        assert_eq!(env_filter(Some("debug")).to_string(), "debug");
    }
}
