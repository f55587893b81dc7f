//! Scheduler and logging configuration structures.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default cap on concurrently running tasks.
pub const DEFAULT_MAX_CONCURRENT_TASKS: usize = 2;
/// Default sleep between polling cycles, in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 20;

/// Pass-through logging options; they do not affect scheduling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Name recorded on the scheduler's root span.
    pub log_name: Option<String>,
    /// Write logs to this file instead of stderr.
    pub log_file: Option<PathBuf>,
    /// Log at `debug` instead of `info` when `RUST_LOG` is unset.
    pub debug: bool,
}

/// Root scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum number of tasks in `Running` at once.
    pub max_concurrent_tasks: usize,
    /// Seconds to sleep between polling cycles.
    pub poll_interval_secs: u64,
    /// Logging options.
    pub logging: LoggingConfig,
    /// Optional PID file written at startup.
    pub pid_file: Option<PathBuf>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: DEFAULT_MAX_CONCURRENT_TASKS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            logging: LoggingConfig::default(),
            pid_file: None,
        }
    }
}

impl SchedulerConfig {
    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_tasks == 0 {
            return Err("max_concurrent_tasks must be greater than 0".into());
        }
        if self.poll_interval_secs == 0 {
            return Err("poll_interval_secs must be greater than 0".into());
        }
        Ok(())
    }

    /// Poll interval as a [`std::time::Duration`].
    #[must_use]
    pub const fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_secs)
    }

    /// Parse scheduler configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns an error string on malformed JSON or invalid values.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from the process environment, loading a `.env`
    /// file first if one exists.
    ///
    /// Recognized variables: `MAX_PROCESSES`, `PROCESS_WAIT_TIME`,
    /// `LOG_NAME`, `LOG_FILENAME`, `PROCESS_PID_FILE`, `PROCESS_DEBUG`.
    ///
    /// # Errors
    ///
    /// Returns an error string if a numeric variable does not parse or the
    /// resulting configuration is invalid.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup, over the defaults.
    ///
    /// # Errors
    ///
    /// Same as [`SchedulerConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(v) = lookup("MAX_PROCESSES") {
            cfg.max_concurrent_tasks = parse_number("MAX_PROCESSES", &v)?;
        }
        if let Some(v) = lookup("PROCESS_WAIT_TIME") {
            cfg.poll_interval_secs = parse_number("PROCESS_WAIT_TIME", &v)?;
        }
        if let Some(v) = lookup("LOG_NAME") {
            cfg.logging.log_name = Some(v);
        }
        if let Some(v) = lookup("LOG_FILENAME") {
            cfg.logging.log_file = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("PROCESS_PID_FILE") {
            cfg.pid_file = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("PROCESS_DEBUG") {
            cfg.logging.debug = matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("{key} must be a non-negative integer, got `{value}`"))
}
