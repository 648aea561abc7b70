//! TOML configuration for kunitgen runs.
//!
//! ```toml
//! [paths]
//! output_dir = "generated_tests"
//!
//! [generation]
//! max_attempts = 3
//!
//! [descriptors]
//! module_list = "/src/linux/drivers/gpio/Makefile"
//!
//! [verifier]
//! command = ["./tools/testing/kunit/kunit.py", "run", "--kunitconfig=my_kunit.config"]
//! ```
//!
//! Every section and key is optional; missing keys take their defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{KunitgenError, Result};
use crate::registrar::RegistrarConfig;

/// Config file picked up from the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "kunitgen.toml";

/// Working directories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Where the batch report is written.
    pub work_dir: PathBuf,
    /// Where generated tests are written.
    pub output_dir: PathBuf,
    /// Where `extract` saves units by default.
    pub units_dir: PathBuf,
    /// Reference tests used as exemplars.
    pub reference_dir: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            output_dir: PathBuf::from("generated_tests"),
            units_dir: PathBuf::from("test_functions"),
            reference_dir: Some(PathBuf::from("reference_testcases")),
        }
    }
}

/// Model and retry settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub model: String,
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Generator calls per unit, first attempt included.
    pub max_attempts: u32,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Reference snippets per request.
    pub exemplars: usize,
    /// Appended to the sanitised unit name to form the artifact name.
    pub artifact_suffix: String,
    /// Extension of generated test files.
    pub extension: String,
    /// Source file the tests should `#include`, if any.
    pub include_directive: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "deepseek-ai/deepseek-v3.1".to_string(),
            base_url: "https://integrate.api.nvidia.com/v1".to_string(),
            api_key_env: "NVIDIA_API_KEY".to_string(),
            max_attempts: 3,
            temperature: 0.2,
            max_tokens: 8192,
            exemplars: 3,
            artifact_suffix: "_kunit_test".to_string(),
            extension: "c".to_string(),
            include_directive: None,
            request_timeout_secs: 300,
        }
    }
}

/// External build/test runner settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierSettings {
    /// Command to execute (first element is executable).
    pub command: Vec<String>,
    /// Directory the command runs in (the kernel tree).
    pub working_dir: PathBuf,
    /// Raw log the verdict is read from.
    pub log_file: PathBuf,
    /// Copy the artifact here before running.
    pub staging_dir: Option<PathBuf>,
    /// Redirect stdout and stderr into `log_file`.
    pub capture_output: bool,
    /// 0 disables the timeout.
    pub timeout_secs: u64,
}

impl Default for VerifierSettings {
    fn default() -> Self {
        Self {
            command: vec![
                "./tools/testing/kunit/kunit.py".to_string(),
                "run".to_string(),
                "--kunitconfig=my_kunit.config".to_string(),
                "--arch=x86_64".to_string(),
                "--raw_output".to_string(),
            ],
            working_dir: PathBuf::from("."),
            log_file: PathBuf::from("compilation_log/compile_error.txt"),
            staging_dir: None,
            capture_output: true,
            timeout_secs: 1800,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KunitgenConfig {
    pub paths: PathsConfig,
    pub generation: GenerationConfig,
    pub descriptors: RegistrarConfig,
    pub verifier: VerifierSettings,
}

impl KunitgenConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| KunitgenError::Config(e.to_string()))
    }

    /// Read and parse a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load `path` when given, else `./kunitgen.toml` when present, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::load(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let generation = &self.generation;
        if generation.max_attempts == 0 {
            return Err(KunitgenError::Config(
                "generation.max_attempts must be at least 1".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&generation.temperature) {
            return Err(KunitgenError::Config(format!(
                "generation.temperature must be within 0.0..=2.0, got {}",
                generation.temperature
            )));
        }
        if generation.max_tokens == 0 {
            return Err(KunitgenError::Config(
                "generation.max_tokens must be positive".to_string(),
            ));
        }
        if self.verifier.command.first().map_or(true, |c| c.trim().is_empty()) {
            return Err(KunitgenError::Config(
                "verifier.command must name an executable".to_string(),
            ));
        }
        Ok(())
    }
}
