//! Collaborator boundaries injected into the generation controller.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{CollaboratorError, VerifyError};

/// Everything the generator needs for one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub unit_name: String,
    pub unit_body: String,
    /// Reference snippets, most relevant first (0 to 3 in practice).
    pub exemplars: Vec<String>,
    /// Rendered diagnostics from the previous attempt, if any.
    pub feedback: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A generated test file on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    pub unit_name: String,
    /// Sanitised unit name plus suffix, without extension.
    pub name: String,
    pub path: PathBuf,
}

/// Text-generation model boundary.
#[async_trait]
pub trait TestGenerator: Send + Sync {
    /// Produce test source for the request. Implementations may return raw
    /// model output; fence stripping happens in the controller.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, CollaboratorError>;

    fn name(&self) -> &str;
}

/// Source of ranked reference snippets.
pub trait ContextProvider: Send + Sync {
    /// Up to `k` snippets ranked by relevance to `query`.
    fn retrieve(&self, query: &str, k: usize) -> Vec<String>;
}

/// External build/test runner.
#[async_trait]
pub trait Verifier: Send + Sync {
    /// Run the build for `artifact` and return the raw log contents.
    ///
    /// `VerifyError::Unavailable` means the run left no log behind.
    async fn verify(&self, artifact: &GeneratedArtifact) -> Result<String, VerifyError>;
}

/// Context provider that never has anything to offer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContext;

impl ContextProvider for NoContext {
    fn retrieve(&self, _query: &str, _k: usize) -> Vec<String> {
        Vec::new()
    }
}
