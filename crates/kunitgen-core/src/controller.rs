//! Bounded generate → register → verify → feedback loop.
//!
//! Each unit runs through at most `max_attempts` cycles. Every failure inside
//! a cycle (generator, file write, registration, verifier) is recorded as a
//! failed attempt and never aborts the batch.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::collab::{ContextProvider, GeneratedArtifact, GenerationRequest, NoContext, TestGenerator, Verifier};
use crate::config::KunitgenConfig;
use crate::diagnostics::DiagnosticReducer;
use crate::domain::{
    render_blocks, AttemptOutcome, AttemptRecord, BatchReport, CollaboratorError, ControllerState,
    ExtractedUnit, RetryState, UnitOutcome, VerifyError,
};
use crate::prompt::{clean_response, is_placeholder};
use crate::registrar::BuildRegistrar;

/// Knobs for the per-unit loop.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSettings {
    /// Generator calls per unit, first attempt included.
    pub max_attempts: u32,
    pub output_dir: PathBuf,
    pub artifact_suffix: String,
    pub extension: String,
    /// Reference snippets requested per unit.
    pub exemplars: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::from_config(&KunitgenConfig::default())
    }
}

impl ControllerSettings {
    pub fn from_config(config: &KunitgenConfig) -> Self {
        let generation = &config.generation;
        Self {
            max_attempts: generation.max_attempts,
            output_dir: config.paths.output_dir.clone(),
            artifact_suffix: generation.artifact_suffix.clone(),
            extension: generation.extension.clone(),
            exemplars: generation.exemplars,
            temperature: generation.temperature,
            max_tokens: generation.max_tokens,
        }
    }

    /// `<sanitised unit name><suffix>`
    pub fn artifact_name(&self, unit: &ExtractedUnit) -> String {
        format!("{}{}", unit.safe_name(), self.artifact_suffix)
    }

    pub fn artifact_path(&self, artifact_name: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}.{}", artifact_name, self.extension))
    }
}

/// Drives units through the generation loop one at a time.
pub struct GenerationController {
    generator: Arc<dyn TestGenerator>,
    context: Arc<dyn ContextProvider>,
    verifier: Arc<dyn Verifier>,
    registrar: BuildRegistrar,
    reducer: DiagnosticReducer,
    settings: ControllerSettings,
}

impl GenerationController {
    pub fn new(
        generator: Arc<dyn TestGenerator>,
        verifier: Arc<dyn Verifier>,
        registrar: BuildRegistrar,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            generator,
            context: Arc::new(NoContext),
            verifier,
            registrar,
            reducer: DiagnosticReducer::new(),
            settings,
        }
    }

    pub fn with_context(mut self, context: Arc<dyn ContextProvider>) -> Self {
        self.context = context;
        self
    }

    pub fn with_reducer(mut self, reducer: DiagnosticReducer) -> Self {
        self.reducer = reducer;
        self
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Run every unit in order and collect the outcomes.
    pub async fn run_batch(&self, units: &[ExtractedUnit]) -> BatchReport {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        info!(run_id = %run_id, units = units.len(), generator = self.generator.name(), "Starting batch");

        let mut outcomes = Vec::with_capacity(units.len());
        for unit in units {
            outcomes.push(self.run_unit(unit).await);
        }

        let report = BatchReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            units: outcomes,
        };
        info!(
            run_id = %report.run_id,
            succeeded = report.succeeded_count(),
            exhausted = report.exhausted_count(),
            "Batch finished"
        );
        report
    }

    /// Run one unit until it compiles cleanly or the budget is spent.
    pub async fn run_unit(&self, unit: &ExtractedUnit) -> UnitOutcome {
        let artifact = GeneratedArtifact {
            unit_name: unit.name.clone(),
            name: self.settings.artifact_name(unit),
            path: self.settings.artifact_path(&self.settings.artifact_name(unit)),
        };
        let exemplars = self.context.retrieve(&unit.body, self.settings.exemplars);

        let mut state = ControllerState::Idle;
        let mut retry = RetryState::new(self.settings.max_attempts);
        let mut attempts = Vec::new();

        transition(&mut state, ControllerState::Generating, &artifact.name);
        loop {
            info!(
                unit = %unit.name,
                artifact = %artifact.name,
                attempt = retry.attempt,
                max_attempts = retry.max_attempts,
                "Generating test"
            );

            let record = self
                .attempt(unit, &artifact, &exemplars, &mut retry, &mut state)
                .await;
            let passed = record.outcome.is_success();
            attempts.push(record);

            if passed {
                transition(&mut state, ControllerState::Succeeded, &artifact.name);
                info!(unit = %unit.name, attempt = retry.attempt, "Test compiled cleanly");
                break;
            }
            if !retry.advance() {
                transition(&mut state, ControllerState::Exhausted, &artifact.name);
                warn!(
                    unit = %unit.name,
                    attempts = attempts.len(),
                    "Retry budget exhausted"
                );
                break;
            }
            transition(&mut state, ControllerState::Generating, &artifact.name);
        }

        UnitOutcome {
            unit_name: unit.name.clone(),
            artifact_name: artifact.name,
            final_state: state,
            attempts,
        }
    }

    async fn attempt(
        &self,
        unit: &ExtractedUnit,
        artifact: &GeneratedArtifact,
        exemplars: &[String],
        retry: &mut RetryState,
        state: &mut ControllerState,
    ) -> AttemptRecord {
        let number = retry.attempt;
        let record = |outcome: AttemptOutcome, artifact_digest: Option<String>| AttemptRecord {
            attempt: number,
            outcome,
            artifact_digest,
        };

        let request = GenerationRequest {
            unit_name: unit.name.clone(),
            unit_body: unit.body.clone(),
            exemplars: exemplars.to_vec(),
            feedback: (!retry.last_diagnostics.is_empty())
                .then(|| render_blocks(&retry.last_diagnostics)),
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        let source = match self.generate(&request).await {
            Ok(source) => source,
            Err(e) => {
                warn!(unit = %unit.name, attempt = number, error = %e, "Generation failed");
                return record(AttemptOutcome::CollaboratorFailed { reason: e.to_string() }, None);
            }
        };

        let digest = match write_artifact(&artifact.path, &source) {
            Ok(digest) => digest,
            Err(e) => {
                warn!(path = %artifact.path.display(), error = %e, "Failed to write artifact");
                return record(AttemptOutcome::IoFailed { reason: e.to_string() }, None);
            }
        };
        debug!(path = %artifact.path.display(), digest = %digest, "Wrote artifact");

        transition(state, ControllerState::Registering, &artifact.name);
        if let Err(e) = self.registrar.register(&artifact.name) {
            warn!(artifact = %artifact.name, error = %e, "Registration failed");
            return record(AttemptOutcome::IoFailed { reason: e.to_string() }, Some(digest));
        }

        transition(state, ControllerState::Verifying, &artifact.name);
        let log = match self.verifier.verify(artifact).await {
            Ok(log) => log,
            Err(e @ VerifyError::Unavailable { .. }) => {
                warn!(artifact = %artifact.name, error = %e, "Verification unavailable");
                return record(
                    AttemptOutcome::VerificationUnavailable { reason: e.to_string() },
                    Some(digest),
                );
            }
            Err(e) => {
                warn!(artifact = %artifact.name, error = %e, "Verifier failed");
                return record(AttemptOutcome::VerifierFailed { reason: e.to_string() }, Some(digest));
            }
        };

        let report = self.reducer.reduce(&log);
        if !report.had_any_error {
            return record(AttemptOutcome::Passed, Some(digest));
        }

        info!(
            unit = %unit.name,
            attempt = number,
            errors = report.len(),
            "Retrying with compile error feedback"
        );
        let count = report.len();
        retry.last_diagnostics = report.blocks;
        record(AttemptOutcome::Diagnostics { count }, Some(digest))
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, CollaboratorError> {
        let raw = self.generator.generate(request).await?;
        let source = clean_response(&raw);
        if is_placeholder(&source) {
            return Err(CollaboratorError::Placeholder(
                source.lines().next().unwrap_or_default().to_string(),
            ));
        }
        if source.is_empty() {
            return Err(CollaboratorError::EmptyResponse);
        }
        Ok(source)
    }
}

fn transition(state: &mut ControllerState, next: ControllerState, artifact: &str) {
    debug!(artifact, from = ?*state, to = ?next, "State transition");
    *state = next;
}

/// Atomically write `source` to `path` and return its sha256 hex digest.
pub fn write_artifact(path: &Path, source: &str) -> std::io::Result<String> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(source.as_bytes())?;
    tmp.persist(path).map_err(|e| e.error)?;

    Ok(hex::encode(Sha256::digest(source.as_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{MemoryDescriptorStore, ScriptedGenerator, ScriptedVerifier, StaticContext, VerifierScript};
    use crate::registrar::RegistrarConfig;

    const FAILING_LOG: &str = "t.c:3:5: error: implicit declaration of function 'foo'\n    foo();\n";

    fn unit() -> ExtractedUnit {
        ExtractedUnit {
            name: "amd_gpio_get_value".to_string(),
            body: "static int amd_gpio_get_value(void) {\n  return 0;\n}".to_string(),
            span: 0..48,
        }
    }

    fn controller(
        dir: &Path,
        generator: Arc<ScriptedGenerator>,
        verifier: Arc<ScriptedVerifier>,
        max_attempts: u32,
    ) -> GenerationController {
        let registrar = BuildRegistrar::new(
            Arc::new(MemoryDescriptorStore::new()),
            RegistrarConfig::default(),
        );
        let settings = ControllerSettings {
            max_attempts,
            output_dir: dir.to_path_buf(),
            ..ControllerSettings::default()
        };
        GenerationController::new(generator, verifier, registrar, settings)
    }

    #[tokio::test]
    async fn succeeds_on_first_clean_log() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Arc::new(ScriptedGenerator::always("```c\nint t;\n```"));
        let verifier = Arc::new(ScriptedVerifier::always("[PASSED] all tests\n"));
        let ctl = controller(dir.path(), generator.clone(), verifier, 3);

        let outcome = ctl.run_unit(&unit()).await;
        assert!(outcome.succeeded());
        assert_eq!(outcome.attempts_used(), 1);
        assert_eq!(outcome.artifact_name, "amd_gpio_get_value_kunit_test");

        let written = std::fs::read_to_string(dir.path().join("amd_gpio_get_value_kunit_test.c")).unwrap();
        assert_eq!(written, "int t;");
        let expected = hex::encode(Sha256::digest(b"int t;"));
        assert_eq!(outcome.attempts[0].artifact_digest.as_deref(), Some(expected.as_str()));
    }

    #[tokio::test]
    async fn feedback_from_previous_attempt_reaches_generator() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Arc::new(ScriptedGenerator::always("int t;"));
        let verifier = Arc::new(ScriptedVerifier::new());
        verifier.push_log(FAILING_LOG);
        verifier.push_log("ok\n");
        let ctl = controller(dir.path(), generator.clone(), verifier, 3);

        let outcome = ctl.run_unit(&unit()).await;
        assert!(outcome.succeeded());
        assert_eq!(outcome.attempts_used(), 2);

        let requests = generator.requests();
        assert_eq!(requests[0].feedback, None);
        assert_eq!(
            requests[1].feedback.as_deref(),
            Some("error: implicit declaration of function 'foo'\n    foo();")
        );
    }

    #[tokio::test]
    async fn budget_is_inclusive_of_first_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Arc::new(ScriptedGenerator::always("int t;"));
        let verifier = Arc::new(ScriptedVerifier::always(FAILING_LOG));
        let ctl = controller(dir.path(), generator.clone(), verifier, 3);

        let outcome = ctl.run_unit(&unit()).await;
        assert_eq!(outcome.final_state, ControllerState::Exhausted);
        assert_eq!(generator.call_count(), 3);
        assert!(outcome
            .attempts
            .iter()
            .all(|a| a.outcome == AttemptOutcome::Diagnostics { count: 1 }));
    }

    #[tokio::test]
    async fn placeholder_response_counts_as_failed_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Arc::new(ScriptedGenerator::new());
        generator.push_ok("// Error generating response: 503");
        generator.push_ok("int t;");
        let verifier = Arc::new(ScriptedVerifier::always("clean\n"));
        let ctl = controller(dir.path(), generator, verifier.clone(), 3);

        let outcome = ctl.run_unit(&unit()).await;
        assert!(outcome.succeeded());
        assert!(matches!(
            outcome.attempts[0].outcome,
            AttemptOutcome::CollaboratorFailed { .. }
        ));
        assert_eq!(verifier.artifacts().len(), 1);
    }

    #[tokio::test]
    async fn unavailable_log_keeps_previous_feedback() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Arc::new(ScriptedGenerator::always("int t;"));
        let verifier = Arc::new(ScriptedVerifier::new());
        verifier.push_log(FAILING_LOG);
        verifier.push(VerifierScript::Unavailable);
        verifier.push(VerifierScript::Invocation("spawn failed".to_string()));
        let ctl = controller(dir.path(), generator.clone(), verifier, 3);

        let outcome = ctl.run_unit(&unit()).await;
        assert_eq!(outcome.final_state, ControllerState::Exhausted);
        assert!(matches!(
            outcome.attempts[1].outcome,
            AttemptOutcome::VerificationUnavailable { .. }
        ));
        assert!(matches!(
            outcome.attempts[2].outcome,
            AttemptOutcome::VerifierFailed { .. }
        ));

        let requests = generator.requests();
        assert_eq!(requests[1].feedback, requests[2].feedback);
        assert!(requests[2].feedback.is_some());
    }

    #[tokio::test]
    async fn exemplars_come_from_context() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Arc::new(ScriptedGenerator::always("int t;"));
        let verifier = Arc::new(ScriptedVerifier::always(""));
        let context = StaticContext::new(vec!["a".into(), "b".into(), "c".into(), "d".into()]);
        let ctl = controller(dir.path(), generator.clone(), verifier, 1)
            .with_context(Arc::new(context));

        ctl.run_unit(&unit()).await;
        assert_eq!(generator.requests()[0].exemplars, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn batch_continues_after_exhausted_unit() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Arc::new(ScriptedGenerator::always("int t;"));
        let verifier = Arc::new(ScriptedVerifier::new());
        verifier.push_log(FAILING_LOG);
        verifier.push_log("clean\n");
        let ctl = controller(dir.path(), generator, verifier, 1);

        let mut second = unit();
        second.name = "amd_gpio_set_value".to_string();
        let report = ctl.run_batch(&[unit(), second]).await;

        assert_eq!(report.units.len(), 2);
        assert_eq!(report.exhausted_count(), 1);
        assert_eq!(report.succeeded_count(), 1);
        assert!(!report.all_succeeded());
    }

    #[test]
    fn write_artifact_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/x_kunit_test.c");
        let digest = write_artifact(&path, "int x;").unwrap();
        assert_eq!(digest.len(), 64);
        assert_eq!(std::fs::read_to_string(path).unwrap(), "int x;");
    }
}
