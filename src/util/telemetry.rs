//! Telemetry helpers for structured logging and tracing.

use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Initialize tracing from a [`LoggingConfig`].
///
/// `RUST_LOG` wins when set; otherwise the level is `debug` or `info`
/// depending on `logging.debug`. With `log_file` set, output is written to
/// that file through a non-blocking appender instead of stderr.
///
/// # Errors
///
/// Returns an error string if the filter is malformed or the log directory
/// cannot be created.
pub fn init_tracing_with(logging: &LoggingConfig) -> Result<(), String> {
    if tracing::dispatcher::has_been_set() {
        return Ok(());
    }

    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::try_new(default_level(logging)).map_err(|e| e.to_string())?,
    };

    let file_writer = match logging.log_file.as_deref() {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map_or_else(|| std::path::PathBuf::from("."), std::path::Path::to_path_buf);
            let file_name = path
                .file_name()
                .ok_or_else(|| format!("log file `{}` has no file name", path.display()))?;
            std::fs::create_dir_all(&dir).map_err(|e| format!("create log dir failed: {e}"))?;
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let _ = LOG_GUARD.set(guard);
            Some(non_blocking)
        }
        None => None,
    };

    let console_layer = file_writer
        .is_none()
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
    let file_layer = file_writer.map(|w| {
        tracing_subscriber::fmt::layer()
            .with_writer(w)
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| e.to_string())
}

const fn default_level(logging: &LoggingConfig) -> &'static str {
    if logging.debug {
        "debug"
    } else {
        "info"
    }
}
