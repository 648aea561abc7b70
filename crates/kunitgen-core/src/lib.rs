//! kunitgen core library
//!
//! Extraction of function definitions from C/C++ sources, compiler log
//! reduction, idempotent build descriptor registration and the bounded
//! generate-verify loop that ties them together.

pub mod collab;
pub mod config;
pub mod context;
pub mod controller;
pub mod diagnostics;
pub mod domain;
pub mod extract;
pub mod fakes;
pub mod prompt;
pub mod registrar;
pub mod reporting;
pub mod telemetry;

pub use collab::{ContextProvider, GeneratedArtifact, GenerationRequest, NoContext, TestGenerator, Verifier};
pub use config::{GenerationConfig, KunitgenConfig, PathsConfig, VerifierSettings};
pub use context::ReferenceLibrary;
pub use controller::{write_artifact, ControllerSettings, GenerationController};
pub use diagnostics::{reduce_log, DiagnosticReducer};
pub use domain::{
    AttemptOutcome, AttemptRecord, BatchReport, CollaboratorError, ControllerState,
    DiagnosticBlock, DiagnosticReport, ExtractedUnit, Grammar, KunitgenError, Result, RetryState,
    SourceText, StructureError, UnitOutcome, VerifyError,
};
pub use extract::{extract, find_block_end, save_units, DefinitionExtractor};
pub use registrar::{
    BuildRegistrar, DescriptorChange, DescriptorStore, FsDescriptorStore, RegistrarConfig,
    RegistrationReport, ToggleKey,
};
pub use reporting::write_batch_report;
pub use telemetry::init_tracing;
