//! Configuration models for the scheduler loop and its logging.

pub mod scheduler;

pub use scheduler::{
    LoggingConfig, SchedulerConfig, DEFAULT_MAX_CONCURRENT_TASKS, DEFAULT_POLL_INTERVAL_SECS,
};
