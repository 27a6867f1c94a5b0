use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub const LOG_DIR_ENV: &str = "GRIDAPP_LOG_DIR";
const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Error)]
pub enum TracingError {
    #[error("Failed to create log directory {path}: {source}")]
    LogDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to install tracing subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Initialize tracing with the filter from `RUST_LOG` (default `info`).
///
/// Logs go to `gridapp.log` inside `GRIDAPP_LOG_DIR` when it is set, and to
/// stderr otherwise so stdout stays free for the display.
pub fn init_tracing() -> Result<(), TracingError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    match std::env::var_os(LOG_DIR_ENV).map(PathBuf::from) {
        Some(log_dir) => {
            std::fs::create_dir_all(&log_dir).map_err(|source| TracingError::LogDir {
                path: log_dir.clone(),
                source,
            })?;
            let file_appender = tracing_appender::rolling::never(&log_dir, "gridapp.log");

            tracing_subscriber::registry()
                .with(
                    fmt::Layer::new()
                        .with_writer(file_appender)
                        .with_ansi(false)
                        .with_file(true)
                        .with_line_number(true),
                )
                .with(filter)
                .try_init()?;

            tracing::debug!(
                target: "gridapp::utils::tracing",
                path = %log_dir.join("gridapp.log").display(),
                "Tracing initialized with file output"
            );
        }
        None => {
            tracing_subscriber::registry()
                .with(
                    fmt::Layer::new()
                        .with_writer(io::stderr)
                        .with_target(true),
                )
                .with(filter)
                .try_init()?;

            tracing::debug!(
                target: "gridapp::utils::tracing",
                "Tracing initialized with stderr output"
            );
        }
    }

    Ok(())
}
