//! Location of Runly's per-user state.

use std::path::PathBuf;

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `RUNLY_DATA_DIR` environment variable
/// 2. `~/.runly`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("RUNLY_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".runly");
    }

    // Last resort: current directory
    PathBuf::from(".runly")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_data_dir_from_env() {
        // SAFETY: This test is single-threaded and restores the env var immediately.
        unsafe {
            std::env::set_var("RUNLY_DATA_DIR", "/tmp/test-runly");
        }
        let dir = resolve_data_dir();
        assert_eq!(dir, PathBuf::from("/tmp/test-runly"));
        unsafe {
            std::env::remove_var("RUNLY_DATA_DIR");
        }
    }
}
