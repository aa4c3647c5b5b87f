// swimmer_sim/src/logging.rs

use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;
use tracing_subscriber::{
    filter::ParseError, fmt, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError,
    EnvFilter,
};

use crate::config::LoggingConfig;

pub const LOG_FILE: &str = "swimmer.log";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter '{directive}': {source}")]
    Filter {
        directive: String,
        source: ParseError,
    },

    #[error("cannot create log file: {0}")]
    File(#[from] io::Error),

    #[error("a global logger is already installed: {0}")]
    AlreadyInstalled(#[from] TryInitError),
}

/// Installs the global subscriber: human-readable output on stderr and, when
/// `log_dir` is given, a plain-text copy in `<log_dir>/swimmer.log`.
///
/// `RUST_LOG` overrides `config.level`.
pub fn init(config: &LoggingConfig, log_dir: Option<&Path>) -> Result<(), LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|source| LoggingError::Filter {
            directive: config.level.clone(),
            source,
        })?,
    };

    let file_layer = match log_dir {
        Some(dir) => {
            let file = File::create(dir.join(LOG_FILE))?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(true),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .try_init()?;
    Ok(())
}
