//! Utility functions and helpers

use std::path::PathBuf;

/// Expand a leading `~/` to the home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Shorten a session title for list display.
///
/// Keeps the first `max_chars` characters and always appends `...`.
pub fn display_title(title: &str, max_chars: usize) -> String {
    let head: String = title.chars().take(max_chars).collect();
    format!("{}...", head)
}
