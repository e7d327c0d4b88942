//! Tracing subscriber setup.
//!
//! Reads `RUST_LOG`; defaults to `info` when unset or unparsable.

use tracing::Subscriber;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Compact,
    /// One JSON object per event, for log shippers.
    Json,
}

/// Builds a subscriber filtered by `filter` that writes in `format`.
#[must_use]
pub fn build_subscriber(format: LogFormat, filter: EnvFilter) -> Box<dyn Subscriber + Send + Sync> {
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Compact => Box::new(registry.with(fmt::layer().compact())),
        LogFormat::Json => Box::new(registry.with(fmt::layer().json())),
    }
}

/// Installs the global tracing subscriber.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    build_subscriber(format, filter).try_init()?;
    Ok(())
}
