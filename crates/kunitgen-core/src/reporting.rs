//! Batch report persistence.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::domain::BatchReport;

/// File name of the per-run report under the work directory.
pub const REPORT_FILE_NAME: &str = "generation_report.json";

/// Write `<work_dir>/generation_report.json` in pretty JSON format.
pub fn write_batch_report(work_dir: &Path, report: &BatchReport) -> Result<PathBuf> {
    std::fs::create_dir_all(work_dir).with_context(|| format!("create {:?}", work_dir))?;
    let path = work_dir.join(REPORT_FILE_NAME);
    let content = serde_json::to_string_pretty(report).context("serialize batch report")?;
    std::fs::write(&path, content).with_context(|| format!("write {:?}", path))?;
    Ok(path)
}

/// Read a report written by [`write_batch_report`].
pub fn read_batch_report(path: &Path) -> Result<BatchReport> {
    let content = std::fs::read_to_string(path).with_context(|| format!("read {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("parse {:?}", path))
}

/// One line per unit, for terminal output.
pub fn render_summary(report: &BatchReport) -> String {
    let mut out = String::new();
    for unit in &report.units {
        out.push_str(&format!(
            "{:<10} {} ({} attempt{})\n",
            if unit.succeeded() { "ok" } else { "exhausted" },
            unit.artifact_name,
            unit.attempts_used(),
            if unit.attempts_used() == 1 { "" } else { "s" }
        ));
    }
    out.push_str(&format!(
        "\n{} succeeded, {} exhausted\n",
        report.succeeded_count(),
        report.exhausted_count()
    ));
    out
}
