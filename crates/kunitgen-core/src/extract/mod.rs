//! Definition extraction by header matching and brace scanning.
//!
//! Headers are found with a per-grammar regex; the body is whatever the
//! brace scanner says closes the first block after the header. A candidate
//! whose braces do not balance is skipped with a warning.

pub mod boundary;
mod grammar;

use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::domain::{ExtractedUnit, Grammar, Result, SourceText};

pub use boundary::find_block_end;

/// Extracts definition units for one grammar.
#[derive(Debug, Clone, Copy)]
pub struct DefinitionExtractor {
    grammar: Grammar,
}

impl DefinitionExtractor {
    pub fn new(grammar: Grammar) -> Self {
        Self { grammar }
    }

    pub fn grammar(&self) -> Grammar {
        self.grammar
    }

    /// Units in left-to-right header order. Same-named units are all kept.
    ///
    /// Headers that start inside an already extracted body (macro loops such
    /// as `list_for_each_entry(...) {`) are not definitions.
    pub fn extract(&self, text: &str) -> Vec<ExtractedUnit> {
        let mut units: Vec<ExtractedUnit> = Vec::new();
        let mut covered_until = 0;

        for caps in grammar::header_pattern(self.grammar).captures_iter(text) {
            let Some(prototype) = caps.name("prototype") else {
                continue;
            };
            let raw = prototype.as_str();
            let start = prototype.start() + (raw.len() - raw.trim_start().len());
            if start < covered_until {
                continue;
            }
            let name = grammar::derive_name(self.grammar, raw.trim(), start);

            if grammar::is_control_keyword(&name) {
                debug!(name = %name, offset = start, "Ignoring control-flow header");
                continue;
            }

            match find_block_end(text, start) {
                Ok(end) => {
                    covered_until = end;
                    units.push(ExtractedUnit {
                        name,
                        body: text[start..end].to_string(),
                        span: start..end,
                    });
                }
                Err(e) => {
                    warn!(name = %name, offset = start, error = %e, "Skipping definition");
                }
            }
        }

        debug!(grammar = ?self.grammar, count = units.len(), "Extraction finished");
        units
    }
}

/// Extract every unit from a source text using its own grammar.
pub fn extract(source: &SourceText) -> Vec<ExtractedUnit> {
    let units = DefinitionExtractor::new(source.grammar()).extract(source.content());
    info!(
        origin = source.origin().unwrap_or("<inline>"),
        count = units.len(),
        "Extracted definitions"
    );
    units
}

/// Write each unit to `<dir>/<safe_name>.<extension>`.
///
/// A unit that cannot be written is logged and skipped. Returns the number of
/// files written.
pub fn save_units(units: &[ExtractedUnit], dir: &Path, extension: &str) -> Result<usize> {
    fs::create_dir_all(dir)?;

    let mut written = 0;
    for unit in units {
        let path = dir.join(format!("{}.{}", unit.safe_name(), extension));
        match fs::write(&path, &unit.body) {
            Ok(()) => written += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to write unit"),
        }
    }

    info!(dir = %dir.display(), written, "Saved extracted units");
    Ok(written)
}
