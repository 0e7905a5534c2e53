//! Structured logging with JSON or pretty output.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::{LogFormat, TelemetryConfig, TelemetryError};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Fails if a global
/// subscriber is already set or the level is not a valid filter.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| {
            TelemetryError::LoggingInit(format!("invalid log level {:?}: {e}", config.log_level))
        })?;

    tracing_subscriber::registry()
        .with(format_layer(config.log_format).with_filter(filter))
        .try_init()
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}

fn format_layer(format: LogFormat) -> BoxedLayer {
    match format {
        // One flat object per event, routing fields at the top level.
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_span_list(false)
            .flatten_event(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_file(true)
            .with_line_number(true)
            .boxed(),
    }
}

/// Standard log event names.
pub mod events {
    /// A pattern was added to the routing table.
    pub const PATTERN_REGISTERED: &str = "pattern_registered";

    /// A pattern was refused (syntax error, conflict or missing handler).
    pub const PATTERN_REJECTED: &str = "pattern_rejected";

    /// A bare-path redirect was added for a slash-terminated pattern.
    pub const TRAILING_SLASH_SYNTHESIZED: &str = "trailing_slash_synthesized";

    /// A request was redirected to its canonical path.
    pub const REQUEST_REDIRECTED: &str = "request_redirected";

    /// No pattern matched the request.
    pub const ROUTE_NOT_FOUND: &str = "route_not_found";

    /// A pattern matched the path but not the method.
    pub const METHOD_NOT_ALLOWED: &str = "method_not_allowed";
}

/// Routing table changes log at debug, rejections at warn.
#[macro_export]
macro_rules! log_pattern_registered {
    ($($field:tt)*) => {
        tracing::debug!(
            event = $crate::logging::events::PATTERN_REGISTERED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_pattern_rejected {
    ($($field:tt)*) => {
        tracing::warn!(
            event = $crate::logging::events::PATTERN_REJECTED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_trailing_slash_synthesized {
    ($($field:tt)*) => {
        tracing::debug!(
            event = $crate::logging::events::TRAILING_SLASH_SYNTHESIZED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_request_redirected {
    ($($field:tt)*) => {
        tracing::debug!(
            event = $crate::logging::events::REQUEST_REDIRECTED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_route_not_found {
    ($($field:tt)*) => {
        tracing::trace!(
            event = $crate::logging::events::ROUTE_NOT_FOUND,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_method_not_allowed {
    ($($field:tt)*) => {
        tracing::debug!(
            event = $crate::logging::events::METHOD_NOT_ALLOWED,
            $($field)*
        )
    };
}
