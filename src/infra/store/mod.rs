//! Task store backends.

pub mod file;
pub mod memory;
pub mod table;

pub use file::JsonlTaskStore;
pub use memory::InMemoryTaskStore;
pub use table::TaskTable;
