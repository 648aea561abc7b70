//! Compiler log reduction.
//!
//! Turns a raw build log into unique [`DiagnosticBlock`]s: the message from
//! the first `error` segment onward plus the indented source line that
//! compilers print under it.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{info, warn};

use crate::domain::{DiagnosticBlock, DiagnosticReport};

/// File name of the reduced summary written next to the raw log.
pub const SUMMARY_FILE_NAME: &str = "clean_compile_errors.txt";

fn error_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(error:|fatal error:)").expect("marker regex is valid"))
}

fn code_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s+\S").expect("code line regex is valid"))
}

/// Strip the `path:line:col:` prefix up to the first segment mentioning `error`.
fn clean_message(line: &str) -> String {
    let parts: Vec<&str> = line.split(':').collect();
    parts
        .iter()
        .position(|p| p.to_lowercase().contains("error"))
        .map(|j| parts[j..].join(":").trim().to_string())
        .unwrap_or_else(|| line.trim().to_string())
}

/// Reduce a raw log to unique diagnostic blocks in first-seen order.
pub fn reduce_log(raw_log: &str) -> DiagnosticReport {
    let lines: Vec<&str> = raw_log.lines().collect();
    let mut blocks: Vec<DiagnosticBlock> = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        if !error_marker().is_match(line) {
            continue;
        }

        let message = clean_message(line);
        if blocks.iter().any(|b| b.message == message) {
            continue;
        }

        let mut block = DiagnosticBlock::new(message);
        if let Some(next) = lines.get(i + 1) {
            if code_line().is_match(next) {
                block = block.with_code_line(next.trim_end());
            }
        }
        blocks.push(block);
    }

    DiagnosticReport::from_blocks(blocks)
}

/// Reducer that also keeps a human-readable summary on disk.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticReducer {
    summary_path: Option<PathBuf>,
}

impl DiagnosticReducer {
    /// Reducer without a summary artifact.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the rendered summary to `path` after every reduction.
    pub fn with_summary_path(path: impl Into<PathBuf>) -> Self {
        Self {
            summary_path: Some(path.into()),
        }
    }

    /// Summary at `clean_compile_errors.txt` beside `log_path`.
    pub fn beside_log(log_path: &Path) -> Self {
        let dir = log_path.parent().unwrap_or_else(|| Path::new("."));
        Self::with_summary_path(dir.join(SUMMARY_FILE_NAME))
    }

    pub fn summary_path(&self) -> Option<&Path> {
        self.summary_path.as_deref()
    }

    /// Reduce `raw_log`. A failed summary write is logged and does not affect
    /// the returned report.
    pub fn reduce(&self, raw_log: &str) -> DiagnosticReport {
        let report = reduce_log(raw_log);

        if let Some(path) = &self.summary_path {
            if let Err(e) = std::fs::write(path, report.render()) {
                warn!(path = %path.display(), error = %e, "Failed to write diagnostic summary");
            }
        }

        if report.had_any_error {
            info!(errors = report.len(), "Compilation failed");
        } else {
            info!("No errors found in log");
        }
        report
    }
}
