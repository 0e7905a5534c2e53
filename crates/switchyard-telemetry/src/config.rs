//! Settings for the multiplexer's event log.

use std::fmt;

/// How registration and dispatch events are written to stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event, for log collectors.
    #[default]
    Json,
    /// Multi-line colored output for reading routing decisions locally.
    Pretty,
}

impl LogFormat {
    /// Looks up a format by name, ignoring ASCII case.
    pub fn parse(name: &str) -> Option<Self> {
        [Self::Json, Self::Pretty]
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(name))
    }

    /// The name accepted by [`LogFormat::parse`].
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event log settings, built by the server from its command line.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// `EnvFilter` directives, e.g. `switchyard=debug` to see every
    /// registration. `RUST_LOG` overrides it.
    pub log_level: String,

    pub log_format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
        }
    }
}

impl TelemetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log_level(mut self, directives: impl Into<String>) -> Self {
        self.log_level = directives.into();
        self
    }

    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_names() {
        assert_eq!(LogFormat::parse("json"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("PRETTY"), Some(LogFormat::Pretty));
        assert_eq!(LogFormat::parse("xml"), None);
        assert_eq!(LogFormat::parse(""), None);

        for format in [LogFormat::Json, LogFormat::Pretty] {
            assert_eq!(LogFormat::parse(&format.to_string()), Some(format));
        }
    }
}
