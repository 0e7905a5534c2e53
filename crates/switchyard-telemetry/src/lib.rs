//! Observability infrastructure for the switchyard request multiplexer.
//!
//! This crate provides:
//! - Structured JSON (or pretty) logging through `tracing-subscriber`
//! - Standard event names and `log_*!` macros used by the multiplexer
//!
//! # Usage
//!
//! ```ignore
//! use switchyard_telemetry::{init_logging, LogFormat, TelemetryConfig};
//!
//! let config = TelemetryConfig::new()
//!     .with_log_level("debug")
//!     .with_log_format(LogFormat::Pretty);
//!
//! init_logging(&config)?;
//! ```

pub mod config;
pub mod logging;

pub use config::{LogFormat, TelemetryConfig};
pub use logging::{events, init_logging};

use thiserror::Error;

/// Telemetry errors.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to initialize logging.
    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_config_builder() {
        let config = TelemetryConfig::new()
            .with_log_level("debug")
            .with_log_format(LogFormat::Pretty);

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, LogFormat::Pretty);
    }
}
