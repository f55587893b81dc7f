//! Infrastructure adapters: store backends and built-in process kinds.

pub mod process;
pub mod store;

pub use process::ShellProcess;
pub use store::{InMemoryTaskStore, JsonlTaskStore};
