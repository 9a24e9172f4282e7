//! Logging setup.
//!
//! Everything in castkit logs through `tracing`. Output goes to stderr through
//! a `fmt` layer filtered by `RUST_LOG`, or by the configured filter when
//! `RUST_LOG` is not set.

use once_cell::sync::OnceCell;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{CastkitError, CastkitResult};

static INSTALLED: OnceCell<()> = OnceCell::new();

/// Install the global subscriber. Later calls are no-ops.
pub fn init(config: &LoggingConfig) -> CastkitResult<()> {
    INSTALLED
        .get_or_try_init(|| {
            let filter = match EnvFilter::try_from_default_env() {
                Ok(filter) => filter,
                Err(_) => EnvFilter::try_new(&config.filter)
                    .map_err(|e| CastkitError::Logging(format!("invalid filter '{}': {e}", config.filter)))?,
            };

            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_target(true).with_writer(std::io::stderr))
                .try_init()
                .map_err(|e| CastkitError::Logging(e.to_string()))
        })
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let config = LoggingConfig::default();
        assert!(init(&config).is_ok());
        assert!(init(&config).is_ok());
    }
}
