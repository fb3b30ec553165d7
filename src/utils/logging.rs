//! Structured logging setup.
//!
//! Installs a `tracing-subscriber` fmt subscriber from a [`LoggingConfig`].
//! `RUST_LOG` takes precedence over the configured level when it is set.

use std::fs::OpenOptions;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{constants, ProtocolError, Result};

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Install the global subscriber. Later calls are no-ops.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str().to_lowercase()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = match (config.log_to_file, config.log_file_path.as_deref()) {
        (true, Some(path)) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    INITIALIZED.store(false, Ordering::SeqCst);
                    ProtocolError::ConfigError(format!("Failed to open log file: {e}"))
                })?;
            let builder = builder.with_ansi(false).with_writer(Mutex::new(file));
            if config.json_format {
                builder.json().try_init()
            } else {
                builder.try_init()
            }
        }
        _ if config.json_format => builder.json().try_init(),
        _ => builder.try_init(),
    };

    installed.map_err(|e| {
        INITIALIZED.store(false, Ordering::SeqCst);
        ProtocolError::Custom(format!("{}: {e}", constants::ERR_LOGGING_INIT))
    })?;

    tracing::info!(app = %config.app_name, level = %config.log_level, "Logging initialized");
    Ok(())
}
