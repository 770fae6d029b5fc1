//! User-facing output utilities for clean, colored terminal messages
//!
//! CLI handlers report to the user through these functions rather than the
//! logger, so messages appear without timestamps or log levels.

use owo_colors::OwoColorize;

/// Display a warning message to the user in yellow with padding
///
/// # Example
/// ```ignore
/// output::warn("Search timed out; showing at most 10 results.");
/// ```
pub fn warn(message: &str) {
    eprintln!("\n{}\n", message.yellow());
}

/// Display an error message to the user in red with padding
///
/// # Example
/// ```ignore
/// output::error("Database not found. Run 'digs init' first.");
/// ```
pub fn error(message: &str) {
    eprintln!("\n{}\n", message.red());
}
