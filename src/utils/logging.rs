//! # Logging Setup
//!
//! Installs a `tracing-subscriber` formatter driven by [`LoggingConfig`].
//! `RUST_LOG` takes precedence over the configured level when set.

use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install the global subscriber.
///
/// Returns `false` if another subscriber was already installed; that is not an
/// error, the existing one stays in charge.
pub fn init(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_directive(config.log_level)));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = if config.json_format {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };

    if installed {
        debug!(app = %config.app_name, "Logging initialized");
    }
    installed
}

fn level_directive(level: Level) -> String {
    level.as_str().to_ascii_lowercase()
}
