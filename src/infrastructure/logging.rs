//! Tracing subscriber setup

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::{LogFormat, LoggingConfig};

/// Install the global tracing subscriber.
///
/// The environment (`RUST_LOG`) wins over the configured level. Returns
/// false when a subscriber was already installed, so embedding applications
/// and test harnesses can call this unconditionally.
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let config = LoggingConfig::default();

        // Whichever call wins the race to install, the second never panics.
        init_logging(&config);
        assert!(!init_logging(&config));
    }
}
