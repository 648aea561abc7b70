//! Reduced compiler diagnostics.

use serde::{Deserialize, Serialize};

/// Text written in place of a summary when a log had no error lines.
pub const NO_ERRORS_TEXT: &str = "No explicit error lines found.";

/// One deduplicated error message plus the offending source line, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticBlock {
    /// Message from the first `error` segment onward.
    pub message: String,

    /// Indented log line that followed the message.
    pub code_line: Option<String>,
}

impl DiagnosticBlock {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code_line: None,
        }
    }

    pub fn with_code_line(mut self, code_line: impl Into<String>) -> Self {
        self.code_line = Some(code_line.into());
        self
    }

    /// Message, followed by the code line on its own line when present.
    pub fn render(&self) -> String {
        match &self.code_line {
            Some(code) => format!("{}\n{}", self.message, code),
            None => self.message.clone(),
        }
    }
}

/// Output of one reduction pass over a raw build log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticReport {
    /// Unique blocks in first-seen order.
    pub blocks: Vec<DiagnosticBlock>,

    /// True iff at least one block was recorded.
    pub had_any_error: bool,
}

impl DiagnosticReport {
    pub fn from_blocks(blocks: Vec<DiagnosticBlock>) -> Self {
        let had_any_error = !blocks.is_empty();
        Self {
            blocks,
            had_any_error,
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Blocks separated by blank lines, or [`NO_ERRORS_TEXT`].
    pub fn render(&self) -> String {
        render_blocks(&self.blocks)
    }
}

/// Render blocks the way they are fed back to the generator.
pub fn render_blocks(blocks: &[DiagnosticBlock]) -> String {
    if blocks.is_empty() {
        return NO_ERRORS_TEXT.to_string();
    }
    blocks
        .iter()
        .map(DiagnosticBlock::render)
        .collect::<Vec<_>>()
        .join("\n\n")
}
