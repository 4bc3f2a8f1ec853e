//! Logging setup
//!
//! The toolkit itself only emits records through the `log` facade. Hosts
//! that do not bring their own logger can install `env_logger` here; the
//! configured level is the default filter and `RUST_LOG` still overrides it.

use anyhow::{Context, Result};
use log::debug;

use crate::config::LoggingConfig;

/// Install `env_logger` using the configured default filter
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.level.as_str()))
        .format_timestamp_millis()
        .try_init()
        .context("Failed to install env_logger")?;

    debug!("📊 Logging initialized (default filter: {})", config.level);
    Ok(())
}

/// Like [`init_logging`], but a logger that is already installed is not an error
pub fn try_init_logging(config: &LoggingConfig) -> bool {
    init_logging(config).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_initialisation_is_tolerated() {
        let config = LoggingConfig::default();
        let _ = try_init_logging(&config);

        // A second install always fails, but must not panic.
        assert!(!try_init_logging(&config));
        assert!(init_logging(&config).is_err());
    }
}
