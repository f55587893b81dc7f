//! Built-in process kinds.

pub mod shell;

pub use shell::{ShellPayload, ShellProcess, SHELL_KIND};
