//! Domain models for kunitgen.
//!
//! - `SourceText` / `ExtractedUnit`: input text and the definitions cut from it
//! - `DiagnosticBlock` / `DiagnosticReport`: reduced compiler output
//! - `RetryState` / `UnitOutcome` / `BatchReport`: generate-verify bookkeeping

pub mod diagnostic;
pub mod error;
pub mod retry;
pub mod unit;

pub use diagnostic::{render_blocks, DiagnosticBlock, DiagnosticReport, NO_ERRORS_TEXT};
pub use error::{CollaboratorError, KunitgenError, Result, StructureError, VerifyError};
pub use retry::{
    AttemptOutcome, AttemptRecord, BatchReport, ControllerState, RetryState, UnitOutcome,
};
pub use unit::{sanitize_name, ExtractedUnit, Grammar, SourceText};
