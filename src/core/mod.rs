//! Task lifecycle, admission loop, and the contracts they depend on.

pub mod completion;
pub mod error;
pub mod executor;
pub mod process;
pub mod record;
pub mod scheduler;
pub mod store;

pub use completion::{
    BroadcastCompletionSink, CompletionEvent, CompletionNotifier, CompletionSink,
    InMemoryCompletionSink, Outcome,
};
pub use error::{AppResult, SchedulerError, TaskError};
pub use executor::{TaskRunner, UNEXPECTED_ERROR_MESSAGE};
pub use process::{Process, ProcessFactory, ProcessRegistry};
pub use record::{TaskId, TaskKind, TaskRecord, TaskStatus};
pub use scheduler::{CycleReport, Scheduler, Spawn};
pub use store::{ClaimOutcome, TaskStore};
