//! Feature-toggle declaration (Kconfig) patching.

use super::ToggleKey;

/// True when some line declares `config <KEY>` (or `menuconfig <KEY>`).
pub fn has_entry(text: &str, key: &ToggleKey) -> bool {
    text.lines().any(|line| {
        let mut tokens = line.split_whitespace();
        matches!(tokens.next(), Some("config") | Some("menuconfig"))
            && tokens.next() == Some(key.as_str())
    })
}

/// Declaration block for `artifact`, terminated by a blank line.
pub fn entry_block(key: &ToggleKey, artifact: &str, depends_on: &str) -> String {
    format!(
        "config {}\n\tbool \"KUnit test for {}\"\n\tdepends on {}\n\tdefault n\n\n",
        key.as_str(),
        artifact,
        depends_on
    )
}

/// Insert `block` before the first line whose trimmed text starts with one
/// of `anchors`. `None` when no anchor is present.
pub fn insert_before_anchor(text: &str, block: &str, anchors: &[String]) -> Option<String> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if anchors
            .iter()
            .any(|a| !a.is_empty() && trimmed.starts_with(a.as_str()))
        {
            let mut patched = String::with_capacity(text.len() + block.len());
            patched.push_str(&text[..offset]);
            patched.push_str(block);
            patched.push_str(&text[offset..]);
            return Some(patched);
        }
        offset += line.len();
    }
    None
}
