//! Tracing subscriber bootstrap driven by [`LoggingConfig`].

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("invalid log filter {filter:?}: {message}")]
    InvalidFilter { filter: String, message: String },
    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
}

/// Build the filter: `RUST_LOG` wins, otherwise the configured level.
pub fn build_filter(cfg: &LoggingConfig) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let level = cfg.level.trim().to_lowercase();
    EnvFilter::try_new(&level).map_err(|err| LoggingError::InvalidFilter {
        filter: level,
        message: err.to_string(),
    })
}

/// Install the global subscriber (console or JSON lines).
pub fn init_logging(cfg: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = build_filter(cfg)?;
    let result = if cfg.format.trim().eq_ignore_ascii_case("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
    };
    result.map_err(|_| LoggingError::AlreadyInitialized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_reports_already_initialized() {
        let cfg = LoggingConfig::default();
        let _ = init_logging(&cfg);
        assert!(matches!(
            init_logging(&cfg),
            Err(LoggingError::AlreadyInitialized)
        ));
    }
}
