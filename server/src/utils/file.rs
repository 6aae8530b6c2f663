//! File utility functions

use std::path::PathBuf;

/// Expand a user-supplied path to an absolute path.
///
/// `~` and `~/rest` resolve against the home directory. Relative paths,
/// including bare names, resolve against the working directory. The result
/// is not canonicalized.
pub fn expand_path(path: &str) -> PathBuf {
    let path = path.trim();
    let cwd = || std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    if path.is_empty() {
        return cwd();
    }

    let expanded = match path.strip_prefix('~') {
        Some("") => dirs::home_dir(),
        Some(rest) => rest
            .strip_prefix('/')
            .and_then(|rest| dirs::home_dir().map(|home| home.join(rest))),
        None => None,
    }
    .unwrap_or_else(|| PathBuf::from(path));

    if expanded.is_relative() {
        cwd().join(expanded)
    } else {
        expanded
    }
}
