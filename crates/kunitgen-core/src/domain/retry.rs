//! Retry bookkeeping and per-unit outcome records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::diagnostic::DiagnosticBlock;

/// States of the per-unit generation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    Idle,
    Generating,
    Registering,
    Verifying,
    Succeeded,
    Exhausted,
}

impl ControllerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ControllerState::Succeeded | ControllerState::Exhausted)
    }
}

/// Attempt counter and the feedback carried into the next attempt.
///
/// `max_attempts` includes the first attempt: a budget of 3 allows exactly
/// three generator calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryState {
    pub attempt: u32,
    pub max_attempts: u32,
    pub last_diagnostics: Vec<DiagnosticBlock>,
}

impl RetryState {
    /// Start at attempt 1. A zero budget is treated as 1.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 1,
            max_attempts: max_attempts.max(1),
            last_diagnostics: Vec::new(),
        }
    }

    pub fn has_budget_left(&self) -> bool {
        self.attempt < self.max_attempts
    }

    /// Move to the next attempt. Returns `false` once the budget is spent.
    pub fn advance(&mut self) -> bool {
        if !self.has_budget_left() {
            return false;
        }
        self.attempt += 1;
        true
    }
}

/// How a single attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Verifier log contained no errors.
    Passed,
    /// Verifier log contained `count` unique errors.
    Diagnostics { count: usize },
    /// Generator failed or answered with a placeholder.
    CollaboratorFailed { reason: String },
    /// Writing the artifact or a descriptor failed.
    IoFailed { reason: String },
    /// The verifier left no log behind.
    VerificationUnavailable { reason: String },
    /// The verifier could not be run to completion.
    VerifierFailed { reason: String },
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Passed)
    }
}

/// One auditable attempt in a unit's timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    /// sha256 of the generated artifact, when one was written.
    pub artifact_digest: Option<String>,
}

/// Final result for one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitOutcome {
    pub unit_name: String,
    pub artifact_name: String,
    pub final_state: ControllerState,
    pub attempts: Vec<AttemptRecord>,
}

impl UnitOutcome {
    pub fn succeeded(&self) -> bool {
        self.final_state == ControllerState::Succeeded
    }

    pub fn attempts_used(&self) -> usize {
        self.attempts.len()
    }
}

/// Summary of one batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub units: Vec<UnitOutcome>,
}

impl BatchReport {
    pub fn succeeded_count(&self) -> usize {
        self.units.iter().filter(|u| u.succeeded()).count()
    }

    pub fn exhausted_count(&self) -> usize {
        self.units.iter().filter(|u| !u.succeeded()).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.exhausted_count() == 0
    }
}
