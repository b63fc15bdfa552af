//! Logging setup for binaries built on this crate.

use tracing_subscriber::EnvFilter;

use crate::error::BoxError;

/// Directive used when `RUST_LOG` is not set.
pub const DEFAULT_DIRECTIVE: &str = "error";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Install a global `tracing` subscriber.
///
/// Filtering follows `RUST_LOG`, falling back to [`DEFAULT_DIRECTIVE`]. Events
/// from the pipeline are emitted under the `castor` target, so
/// `RUST_LOG=castor=debug` shows worker lifecycle logs without the SDK noise.
pub fn init_logging(format: LogFormat) -> Result<(), BoxError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_line_number(true)
        .with_target(true);

    match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
}
