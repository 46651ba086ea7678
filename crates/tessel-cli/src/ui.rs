//! Status lines on stderr.
//!
//! Command output proper (paths, rendered HTML, handles) goes to stdout so
//! it can be piped; everything here goes to stderr.

use owo_colors::OwoColorize;
use std::sync::atomic::{AtomicBool, Ordering};

static COLOR: AtomicBool = AtomicBool::new(true);

fn emit(colored: String, plain: String) {
    if COLOR.load(Ordering::Relaxed) {
        eprintln!("{colored}");
    } else {
        eprintln!("{plain}");
    }
}

pub fn success(message: &str) {
    emit(format!("{} {}", "✓".green().bold(), message), format!("✓ {message}"));
}

pub fn info(message: &str) {
    emit(format!("{} {}", "ℹ".blue().bold(), message), format!("ℹ {message}"));
}

pub fn warning(message: &str) {
    emit(
        format!("{} {}", "⚠".yellow().bold(), message.yellow()),
        format!("⚠ {message}"),
    );
}

pub fn error(message: &str) {
    emit(
        format!("{} {}", "✗".red().bold(), message.red()),
        format!("✗ {message}"),
    );
}

/// Whether stderr should be colored.
///
/// `NO_COLOR` disables colors, `FORCE_COLOR` forces them, otherwise they
/// follow whether a user is attached to stderr.
pub fn should_use_color() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    console::user_attended_stderr()
}

/// Decide once whether status lines are colored. `--no-color` always wins.
pub fn init_colors(no_color: bool) {
    COLOR.store(!no_color && should_use_color(), Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_color_flag_wins() {
        init_colors(true);
        assert!(!COLOR.load(Ordering::Relaxed));
    }
}
