//! Module build list (`obj-$(CONFIG_X) += x.o`) patching.

use std::sync::OnceLock;

use regex::Regex;

use super::ToggleKey;

/// Suffix appended to lines this tool comments out.
pub const DISABLED_MARKER: &str = "# disabled by kunitgen";

fn entry_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*obj-\$\(\s*CONFIG_([A-Za-z0-9_]+)\s*\)\s*\+=\s*(.*?)\s*$")
            .expect("module list regex is valid")
    })
}

/// Result of patching one module list text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleListPatch {
    pub content: String,
    /// Active lines that were commented out.
    pub disabled: Vec<String>,
    /// Whether the desired entry had to be appended.
    pub appended: bool,
}

impl ModuleListPatch {
    pub fn changed(&self) -> bool {
        self.appended || !self.disabled.is_empty()
    }
}

/// The single entry the list should carry for `artifact`.
pub fn entry_line(key: &ToggleKey, artifact: &str) -> String {
    format!("obj-$({}) += {}.o", key.config_symbol(), artifact)
}

/// Comment out a line in place.
pub fn disable_line(line: &str) -> String {
    format!("# {}  {}", line, DISABLED_MARKER)
}

/// Disable conflicting entries and append the desired one if missing.
///
/// An active line conflicts when it uses the same key with a different
/// object list, or carries nothing but the artifact object under another
/// key. A line under another key that also builds other objects is left
/// alone. The first active line that already matches the desired entry is
/// kept; any later copy of it is disabled so the list holds exactly one.
///
/// Untouched lines keep their own line endings.
pub fn patch(text: &str, key: &ToggleKey, artifact: &str) -> ModuleListPatch {
    let object = format!("{artifact}.o");
    let mut disabled = Vec::new();
    let mut have_entry = false;
    let mut content = String::with_capacity(text.len() + object.len() * 2 + 32);
    let mut newline = "\n";

    for piece in text.split_inclusive('\n') {
        let (line, ending) = split_ending(piece);
        if !ending.is_empty() {
            newline = ending;
        }

        let Some(caps) = entry_pattern().captures(line) else {
            content.push_str(piece);
            continue;
        };
        let objects: Vec<&str> = caps[2].split_whitespace().collect();
        let only_object = objects == [object.as_str()];
        let same_key = &caps[1] == key.as_str();

        let conflicts = match (same_key, only_object) {
            (true, true) => have_entry,
            (true, false) => true,
            (false, only) => only,
        };

        if conflicts {
            disabled.push(line.to_string());
            content.push_str(&disable_line(line));
        } else {
            if same_key {
                have_entry = true;
            }
            content.push_str(line);
        }
        content.push_str(ending);
    }

    let appended = !have_entry;
    if appended {
        if !content.is_empty() && !content.ends_with('\n') {
            content.push_str(newline);
        }
        content.push_str(&entry_line(key, artifact));
        content.push_str(newline);
    }

    ModuleListPatch {
        content,
        disabled,
        appended,
    }
}

/// Split a line from `split_inclusive` into its text and its terminator.
fn split_ending(piece: &str) -> (&str, &str) {
    if let Some(line) = piece.strip_suffix("\r\n") {
        (line, "\r\n")
    } else if let Some(line) = piece.strip_suffix('\n') {
        (line, "\n")
    } else {
        (piece, "")
    }
}
