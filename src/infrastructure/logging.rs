//! Tracing setup for embedding hosts
//!
//! The cache is a library; the embedding application may already have a
//! global subscriber installed, in which case initialization here is a
//! no-op rather than a panic.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::{LogFormat, LoggingConfig};

/// Installs a global tracing subscriber from the logging configuration
///
/// Returns whether this call installed the subscriber; `false` means the
/// host already set one up and the configuration here was ignored.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let installed = match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_span_events(FmtSpan::CLOSE))
            .try_init()
            .is_ok(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .is_ok(),
    };

    if installed {
        tracing::info!("Logging initialized with level: {}", config.level);
    }

    installed
}
