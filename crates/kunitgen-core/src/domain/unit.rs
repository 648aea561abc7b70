//! Source text and extracted definition units.

use std::ops::Range;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Header grammar used to find definitions in a source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grammar {
    /// Return type, identifier, parameter list, optional `static`.
    C,
    /// Templates, qualifiers, scope-qualified and destructor names.
    Cpp,
}

impl Grammar {
    /// File extension (without dot) used for files in this grammar.
    pub fn extension(&self) -> &'static str {
        match self {
            Grammar::C => "c",
            Grammar::Cpp => "cpp",
        }
    }

    /// Guess the grammar from a file path. Unknown extensions are `None`.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "c" | "h" => Some(Grammar::C),
            "cpp" | "cc" | "cxx" | "hpp" | "hh" => Some(Grammar::Cpp),
            _ => None,
        }
    }
}

impl std::str::FromStr for Grammar {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "c" => Ok(Grammar::C),
            "cpp" | "c++" | "cxx" => Ok(Grammar::Cpp),
            other => Err(format!("unknown grammar: {other}")),
        }
    }
}

/// Immutable source content tagged with the grammar that applies to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText {
    content: String,
    grammar: Grammar,
    origin: Option<String>,
}

impl SourceText {
    pub fn new(content: impl Into<String>, grammar: Grammar) -> Self {
        Self {
            content: content.into(),
            grammar,
            origin: None,
        }
    }

    /// Record where the text came from (path or URL), for log output.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn grammar(&self) -> Grammar {
        self.grammar
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// One definition carved out of a source text.
///
/// `body` runs from the first non-whitespace character of the header to the
/// matching closing brace, inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedUnit {
    pub name: String,
    pub body: String,
    /// Byte span of `body` in the source text.
    pub span: Range<usize>,
}

impl ExtractedUnit {
    /// File-system safe variant of the name (`\W+` collapsed to `_`).
    pub fn safe_name(&self) -> String {
        sanitize_name(&self.name)
    }
}

/// Collapse every run of non-word characters to a single `_`.
pub fn sanitize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_run = false;
    for c in name.chars() {
        if c.is_alphanumeric() || c == '_' {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_grammar_from_path() {
        assert_eq!(Grammar::from_path(&PathBuf::from("a/gpio.c")), Some(Grammar::C));
        assert_eq!(Grammar::from_path(&PathBuf::from("x.CPP")), Some(Grammar::Cpp));
        assert_eq!(Grammar::from_path(&PathBuf::from("x.cc")), Some(Grammar::Cpp));
        assert_eq!(Grammar::from_path(&PathBuf::from("README.md")), None);
        assert_eq!(Grammar::from_path(&PathBuf::from("Makefile")), None);
    }

    #[test]
    fn test_grammar_from_str() {
        assert_eq!("c".parse::<Grammar>().unwrap(), Grammar::C);
        assert_eq!("C++".parse::<Grammar>().unwrap(), Grammar::Cpp);
        assert!("rust".parse::<Grammar>().is_err());
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("amd_gpio_probe"), "amd_gpio_probe");
        assert_eq!(sanitize_name("Widget::~Widget"), "Widget_Widget");
        assert_eq!(sanitize_name("ns::Foo::bar"), "ns_Foo_bar");
    }

    #[test]
    fn test_source_text_is_empty() {
        assert!(SourceText::new("  \n\t", Grammar::C).is_empty());
        assert!(!SourceText::new("int x;", Grammar::C).is_empty());
    }
}
