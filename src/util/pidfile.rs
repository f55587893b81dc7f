//! PID file support for supervised deployments.

use std::fs;
use std::io;
use std::path::Path;

/// Write the current process id followed by a newline to `path`.
///
/// # Errors
///
/// Propagates any I/O error from creating or writing the file.
pub fn write_pid_file(path: &Path) -> io::Result<()> {
    fs::write(path, format!("{}\n", std::process::id()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_current_pid() {
        let path = std::env::temp_dir().join(format!("pid-{}.pid", uuid::Uuid::new_v4()));
        write_pid_file(&path).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, format!("{}\n", std::process::id()));
        fs::remove_file(&path).unwrap();
    }
}
