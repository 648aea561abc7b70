//! Verifier command execution.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use kunitgen_core::{GeneratedArtifact, Verifier, VerifierSettings, VerifyError};

/// Result of one verifier run.
#[derive(Debug, Clone)]
pub struct VerifyRun {
    /// Exit code (-1 when killed by a signal).
    pub exit_code: i32,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    /// Log contents.
    pub log: String,
}

/// Runs a configured command and reads its diagnostic log.
#[derive(Debug, Clone)]
pub struct CommandVerifier {
    settings: VerifierSettings,
}

impl CommandVerifier {
    pub fn new(settings: VerifierSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &VerifierSettings {
        &self.settings
    }

    /// Log path, resolved against the working directory when relative.
    pub fn log_path(&self) -> PathBuf {
        resolve(&self.settings.working_dir, &self.settings.log_file)
    }

    /// Stage the artifact, run the command, and read the log.
    pub async fn run(&self, artifact: &GeneratedArtifact) -> Result<VerifyRun, VerifyError> {
        let start = Instant::now();

        if self.settings.command.is_empty() {
            return Err(VerifyError::Invocation("verifier command is empty".to_string()));
        }

        if let Some(staging) = &self.settings.staging_dir {
            stage_artifact(&artifact.path, &resolve(&self.settings.working_dir, staging))?;
        }

        let log_path = self.log_path();
        if log_path.exists() {
            fs::remove_file(&log_path)?;
            debug!(log = %log_path.display(), "Removed stale log");
        }

        let mut command = Command::new(&self.settings.command[0]);
        command
            .args(&self.settings.command[1..])
            .current_dir(&self.settings.working_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        if self.settings.capture_output {
            if let Some(parent) = log_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = File::create(&log_path)?;
            let err_file = file.try_clone()?;
            command.stdout(Stdio::from(file)).stderr(Stdio::from(err_file));
        } else {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }

        info!(
            artifact = %artifact.name,
            command = %self.settings.command.join(" "),
            "Running verifier"
        );
        let mut child = command
            .spawn()
            .map_err(|e| VerifyError::Invocation(format!("{}: {e}", self.settings.command[0])))?;

        let status = if self.settings.timeout_secs > 0 {
            match tokio::time::timeout(
                Duration::from_secs(self.settings.timeout_secs),
                child.wait(),
            )
            .await
            {
                Ok(status) => status?,
                Err(_) => {
                    child.kill().await.ok();
                    warn!(
                        artifact = %artifact.name,
                        seconds = self.settings.timeout_secs,
                        "Verifier timed out"
                    );
                    return Err(VerifyError::TimedOut {
                        seconds: self.settings.timeout_secs,
                    });
                }
            }
        } else {
            child.wait().await?
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = status.code().unwrap_or(-1);
        info!(artifact = %artifact.name, exit_code, duration_ms, "Verifier finished");

        let log = match fs::read(&log_path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).to_string(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(VerifyError::Unavailable { path: log_path });
            }
            Err(e) => return Err(e.into()),
        };

        Ok(VerifyRun {
            exit_code,
            duration_ms,
            log,
        })
    }
}

#[async_trait]
impl Verifier for CommandVerifier {
    async fn verify(&self, artifact: &GeneratedArtifact) -> Result<String, VerifyError> {
        self.run(artifact).await.map(|run| run.log)
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Copy `artifact` into `dir`, keeping its file name.
fn stage_artifact(artifact: &Path, dir: &Path) -> Result<PathBuf, VerifyError> {
    let file_name = artifact.file_name().ok_or_else(|| {
        VerifyError::Invocation(format!("artifact path has no file name: {}", artifact.display()))
    })?;
    fs::create_dir_all(dir)?;
    let target = dir.join(file_name);
    fs::copy(artifact, &target)?;
    debug!(from = %artifact.display(), to = %target.display(), "Staged artifact");
    Ok(target)
}
