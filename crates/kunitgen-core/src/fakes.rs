//! In-memory fakes for the collaborator and storage traits (testing only)
//!
//! Provides `MemoryDescriptorStore`, `ScriptedGenerator`, `ScriptedVerifier`
//! and `StaticContext` so the controller and registrar can be exercised
//! without a model, a kernel tree or a filesystem.

use std::collections::{BTreeMap, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::collab::{ContextProvider, GeneratedArtifact, GenerationRequest, TestGenerator, Verifier};
use crate::domain::{CollaboratorError, VerifyError};
use crate::registrar::DescriptorStore;

// ---------------------------------------------------------------------------
// MemoryDescriptorStore
// ---------------------------------------------------------------------------

/// Descriptor store backed by a `BTreeMap<path, contents>`.
#[derive(Debug, Default)]
pub struct MemoryDescriptorStore {
    files: Mutex<BTreeMap<PathBuf, String>>,
    fail_writes: AtomicBool,
}

impl MemoryDescriptorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl AsRef<Path>, content: impl Into<String>) {
        self.files
            .lock()
            .unwrap()
            .insert(path.as_ref().to_path_buf(), content.into());
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files.lock().unwrap().get(path.as_ref()).cloned()
    }

    pub fn snapshot(&self) -> BTreeMap<PathBuf, String> {
        self.files.lock().unwrap().clone()
    }

    /// Make every mutating call fail with `PermissionDenied`.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> io::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "writes disabled"));
        }
        Ok(())
    }
}

impl DescriptorStore for MemoryDescriptorStore {
    fn read(&self, path: &Path) -> io::Result<Option<String>> {
        Ok(self.get(path))
    }

    fn write(&self, path: &Path, content: &str) -> io::Result<()> {
        self.check_writable()?;
        self.insert(path, content);
        Ok(())
    }

    fn append(&self, path: &Path, content: &str) -> io::Result<()> {
        self.check_writable()?;
        let mut files = self.files.lock().unwrap();
        files.entry(path.to_path_buf()).or_default().push_str(content);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.check_writable()?;
        let content = self
            .get(from)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such descriptor"))?;
        self.insert(to, content);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScriptedGenerator
// ---------------------------------------------------------------------------

/// Generator that replays queued responses and records every request.
///
/// Once the queue is drained the last response is repeated.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<String, CollaboratorError>>>,
    last: Mutex<Option<Result<String, CollaboratorError>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generator that always answers with `source`.
    pub fn always(source: impl Into<String>) -> Self {
        let generator = Self::new();
        generator.push_ok(source);
        generator
    }

    pub fn push_ok(&self, source: impl Into<String>) {
        self.responses.lock().unwrap().push_back(Ok(source.into()));
    }

    pub fn push_err(&self, err: CollaboratorError) {
        self.responses.lock().unwrap().push_back(Err(err));
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl TestGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, CollaboratorError> {
        self.requests.lock().unwrap().push(request.clone());

        let next = self.responses.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(response) = next {
            *last = Some(response);
        }
        last.clone().unwrap_or(Err(CollaboratorError::EmptyResponse))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

// ---------------------------------------------------------------------------
// ScriptedVerifier
// ---------------------------------------------------------------------------

/// Scripted verifier result.
#[derive(Debug, Clone)]
pub enum VerifierScript {
    Log(String),
    Unavailable,
    Invocation(String),
}

/// Verifier that replays queued results and records verified artifacts.
///
/// Once the queue is drained the last result is repeated.
#[derive(Debug, Default)]
pub struct ScriptedVerifier {
    script: Mutex<VecDeque<VerifierScript>>,
    last: Mutex<Option<VerifierScript>>,
    seen: Mutex<Vec<GeneratedArtifact>>,
}

impl ScriptedVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Verifier that always returns `log`.
    pub fn always(log: impl Into<String>) -> Self {
        let verifier = Self::new();
        verifier.push_log(log);
        verifier
    }

    pub fn push_log(&self, log: impl Into<String>) {
        self.script
            .lock()
            .unwrap()
            .push_back(VerifierScript::Log(log.into()));
    }

    pub fn push(&self, step: VerifierScript) {
        self.script.lock().unwrap().push_back(step);
    }

    pub fn artifacts(&self) -> Vec<GeneratedArtifact> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Verifier for ScriptedVerifier {
    async fn verify(&self, artifact: &GeneratedArtifact) -> Result<String, VerifyError> {
        self.seen.lock().unwrap().push(artifact.clone());

        let next = self.script.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(step) = next {
            *last = Some(step);
        }
        match last.clone() {
            Some(VerifierScript::Log(log)) => Ok(log),
            Some(VerifierScript::Invocation(msg)) => Err(VerifyError::Invocation(msg)),
            Some(VerifierScript::Unavailable) | None => Err(VerifyError::Unavailable {
                path: PathBuf::from("compile_error.txt"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// StaticContext
// ---------------------------------------------------------------------------

/// Context provider returning a fixed snippet list.
#[derive(Debug, Clone, Default)]
pub struct StaticContext {
    snippets: Vec<String>,
}

impl StaticContext {
    pub fn new(snippets: Vec<String>) -> Self {
        Self { snippets }
    }
}

impl ContextProvider for StaticContext {
    fn retrieve(&self, _query: &str, k: usize) -> Vec<String> {
        self.snippets.iter().take(k).cloned().collect()
    }
}
