//! Runtime adapters and the operational API surface.

pub mod api;
pub mod tokio_spawner;

pub use api::{
    health, list_tasks, requeue_running, reset_task, status_counts, submit_task, Health,
    StatusCounts, TaskSubmission,
};
pub use tokio_spawner::TokioSpawner;
