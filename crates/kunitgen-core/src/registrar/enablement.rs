//! Flat enablement file (`CONFIG_X=y`) handling.

use super::ToggleKey;

pub fn enable_line(key: &ToggleKey) -> String {
    format!("{}=y", key.config_symbol())
}

pub fn has_line(text: &str, line: &str) -> bool {
    text.lines().any(|l| l.trim() == line)
}

/// Text to append so that `line` ends up on its own line.
pub fn append_text(existing: &str, line: &str) -> String {
    if existing.is_empty() || existing.ends_with('\n') {
        format!("{line}\n")
    } else {
        format!("\n{line}\n")
    }
}
