//! Reference snippet library ranked by identifier overlap.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::collab::ContextProvider;
use crate::domain::{Grammar, Result};
use crate::extract::DefinitionExtractor;

fn identifier() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("identifier regex is valid"))
}

fn tokens(text: &str) -> HashSet<String> {
    identifier()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Jaccard similarity of two identifier sets.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

#[derive(Debug, Clone)]
struct Snippet {
    origin: PathBuf,
    text: String,
    tokens: HashSet<String>,
}

/// In-memory index of reference test snippets.
#[derive(Debug, Clone, Default)]
pub struct ReferenceLibrary {
    snippets: Vec<Snippet>,
}

impl ReferenceLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every function of every source file directly under `dir`.
    ///
    /// A file without any recognisable function is indexed whole. Unreadable
    /// files are skipped with a warning.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && Grammar::from_path(p).is_some())
            .collect();
        paths.sort();

        let mut library = Self::new();
        for path in paths {
            let Some(grammar) = Grammar::from_path(&path) else {
                continue;
            };
            match fs::read_to_string(&path) {
                Ok(text) => library.add_source(&path, &text, grammar),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping reference file"),
            }
        }

        info!(dir = %dir.display(), snippets = library.len(), "Indexed reference tests");
        Ok(library)
    }

    /// Index the functions of one source text.
    pub fn add_source(&mut self, origin: &Path, text: &str, grammar: Grammar) {
        let units = DefinitionExtractor::new(grammar).extract(text);
        if units.is_empty() {
            self.add_snippet(origin, text.trim().to_string());
            return;
        }
        for unit in units {
            self.add_snippet(origin, unit.body);
        }
    }

    fn add_snippet(&mut self, origin: &Path, text: String) {
        if text.is_empty() {
            return;
        }
        let tokens = tokens(&text);
        self.snippets.push(Snippet {
            origin: origin.to_path_buf(),
            text,
            tokens,
        });
    }

    pub fn len(&self) -> usize {
        self.snippets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }
}

impl ContextProvider for ReferenceLibrary {
    fn retrieve(&self, query: &str, k: usize) -> Vec<String> {
        let query_tokens = tokens(query);
        let mut scored: Vec<(f64, &Snippet)> = self
            .snippets
            .iter()
            .map(|s| (jaccard(&query_tokens, &s.tokens), s))
            .collect();
        // Stable sort keeps indexing order among equal scores.
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        scored
            .into_iter()
            .take(k)
            .map(|(score, s)| {
                debug!(origin = %s.origin.display(), score, "Selected reference snippet");
                s.text.clone()
            })
            .collect()
    }
}
