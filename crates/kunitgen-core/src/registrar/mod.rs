//! Idempotent registration of generated artifacts into build descriptors.
//!
//! Three descriptor files are patched per artifact:
//!
//! - the module build list (`obj-$(CONFIG_<KEY>) += <artifact>.o`)
//! - the feature-toggle declarations (`config <KEY>` block)
//! - the flat enablement file (`CONFIG_<KEY>=y`)
//!
//! Every step is append/patch-only. Conflicting module list lines are
//! commented out, never removed, and repeating a registration leaves all
//! three files unchanged.

pub mod enablement;
pub mod kconfig;
pub mod module_list;
pub mod store;

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::Result;

pub use store::{DescriptorStore, FsDescriptorStore};

/// Suffix of the one-time declaration file backup.
pub const BACKUP_SUFFIX: &str = ".kunitgen_backup";

/// Normalised feature-flag identifier derived from an artifact name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToggleKey(String);

impl ToggleKey {
    /// Uppercase, with every run of non-alphanumeric characters collapsed to
    /// `_` and leading/trailing `_` removed.
    pub fn from_artifact(artifact: &str) -> Self {
        let mut key = String::with_capacity(artifact.len());
        let mut in_run = false;
        for c in artifact.chars() {
            if c.is_ascii_alphanumeric() {
                key.push(c.to_ascii_uppercase());
                in_run = false;
            } else if !in_run {
                key.push('_');
                in_run = true;
            }
        }
        Self(key.trim_matches('_').to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `CONFIG_<KEY>`
    pub fn config_symbol(&self) -> String {
        format!("CONFIG_{}", self.0)
    }
}

impl fmt::Display for ToggleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Descriptor file locations and declaration defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrarConfig {
    /// Module build list (Makefile).
    pub module_list: PathBuf,
    /// Feature-toggle declarations (Kconfig).
    pub declarations: PathBuf,
    /// Flat enablement file (`.config` fragment).
    pub enablement: PathBuf,
    /// Toggle every declared entry depends on.
    pub framework_toggle: String,
    /// Declarations are inserted before the first line starting with one of these.
    pub anchors: Vec<String>,
}

impl Default for RegistrarConfig {
    fn default() -> Self {
        Self {
            module_list: PathBuf::from("Makefile"),
            declarations: PathBuf::from("Kconfig"),
            enablement: PathBuf::from("my_kunit.config"),
            framework_toggle: "KUNIT".to_string(),
            anchors: vec!["endif".to_string()],
        }
    }
}

/// What a single registration step did to its descriptor file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum DescriptorChange {
    Created,
    Added,
    AlreadyPresent,
    DisabledAndReplaced { disabled: usize },
    Skipped { reason: String },
}

impl DescriptorChange {
    pub fn modified_file(&self) -> bool {
        matches!(
            self,
            DescriptorChange::Created
                | DescriptorChange::Added
                | DescriptorChange::DisabledAndReplaced { .. }
        )
    }
}

impl fmt::Display for DescriptorChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorChange::Created => f.write_str("created"),
            DescriptorChange::Added => f.write_str("added"),
            DescriptorChange::AlreadyPresent => f.write_str("already present"),
            DescriptorChange::DisabledAndReplaced { disabled } => {
                write!(f, "disabled {disabled} and replaced")
            }
            DescriptorChange::Skipped { reason } => write!(f, "skipped ({reason})"),
        }
    }
}

/// Per-file outcome of one `register` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationReport {
    pub artifact: String,
    pub toggle: ToggleKey,
    pub module_list: DescriptorChange,
    pub declarations: DescriptorChange,
    pub enablement: DescriptorChange,
}

/// Patches the three descriptor files for generated artifacts.
pub struct BuildRegistrar {
    store: Arc<dyn DescriptorStore>,
    config: RegistrarConfig,
}

impl BuildRegistrar {
    pub fn new(store: Arc<dyn DescriptorStore>, config: RegistrarConfig) -> Self {
        Self { store, config }
    }

    /// Registrar backed by the real filesystem.
    pub fn on_disk(config: RegistrarConfig) -> Self {
        Self::new(Arc::new(FsDescriptorStore::new()), config)
    }

    pub fn config(&self) -> &RegistrarConfig {
        &self.config
    }

    /// Register `artifact` in all three descriptor files.
    ///
    /// I/O failures abort the remaining steps; the caller decides whether
    /// that is fatal.
    pub fn register(&self, artifact: &str) -> Result<RegistrationReport> {
        let toggle = ToggleKey::from_artifact(artifact);

        let module_list = self.register_module(&toggle, artifact)?;
        log_change("module_list", &self.config.module_list, artifact, &toggle, &module_list);

        let declarations = self.register_declaration(&toggle, artifact)?;
        log_change("declarations", &self.config.declarations, artifact, &toggle, &declarations);

        let enablement = self.register_enablement(&toggle)?;
        log_change("enablement", &self.config.enablement, artifact, &toggle, &enablement);

        Ok(RegistrationReport {
            artifact: artifact.to_string(),
            toggle,
            module_list,
            declarations,
            enablement,
        })
    }

    fn register_module(&self, toggle: &ToggleKey, artifact: &str) -> Result<DescriptorChange> {
        let path = &self.config.module_list;
        let Some(text) = self.store.read(path)? else {
            return Ok(DescriptorChange::Skipped {
                reason: "module list not found".to_string(),
            });
        };

        let patch = module_list::patch(&text, toggle, artifact);
        if !patch.changed() {
            return Ok(DescriptorChange::AlreadyPresent);
        }
        self.store.write(path, &patch.content)?;

        if patch.disabled.is_empty() {
            Ok(DescriptorChange::Added)
        } else {
            for line in &patch.disabled {
                info!(file = %path.display(), line = %line, "Disabled conflicting module entry");
            }
            Ok(DescriptorChange::DisabledAndReplaced {
                disabled: patch.disabled.len(),
            })
        }
    }

    fn register_declaration(&self, toggle: &ToggleKey, artifact: &str) -> Result<DescriptorChange> {
        let path = &self.config.declarations;
        let block = kconfig::entry_block(toggle, artifact, &self.config.framework_toggle);

        let Some(text) = self.store.read(path)? else {
            self.store.write(path, &block)?;
            return Ok(DescriptorChange::Created);
        };

        if kconfig::has_entry(&text, toggle) {
            return Ok(DescriptorChange::AlreadyPresent);
        }

        let Some(patched) = kconfig::insert_before_anchor(&text, &block, &self.config.anchors)
        else {
            return Ok(DescriptorChange::Skipped {
                reason: format!("no anchor line ({})", self.config.anchors.join(", ")),
            });
        };

        let backup = backup_path(path);
        if !self.store.exists(&backup) {
            self.store.copy(path, &backup)?;
            info!(backup = %backup.display(), "Backed up declaration file");
        }

        self.store.write(path, &patched)?;
        Ok(DescriptorChange::Added)
    }

    fn register_enablement(&self, toggle: &ToggleKey) -> Result<DescriptorChange> {
        let path = &self.config.enablement;
        let line = enablement::enable_line(toggle);

        match self.store.read(path)? {
            None => {
                self.store.append(path, &enablement::append_text("", &line))?;
                Ok(DescriptorChange::Created)
            }
            Some(text) if enablement::has_line(&text, &line) => Ok(DescriptorChange::AlreadyPresent),
            Some(text) => {
                self.store.append(path, &enablement::append_text(&text, &line))?;
                Ok(DescriptorChange::Added)
            }
        }
    }
}

/// `<file>.kunitgen_backup` next to `path`.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

fn log_change(
    descriptor: &str,
    path: &Path,
    artifact: &str,
    toggle: &ToggleKey,
    change: &DescriptorChange,
) {
    match change {
        DescriptorChange::Skipped { reason } => warn!(
            descriptor,
            file = %path.display(),
            artifact,
            toggle = %toggle,
            reason = %reason,
            "Descriptor skipped"
        ),
        _ => info!(
            descriptor,
            file = %path.display(),
            artifact,
            toggle = %toggle,
            change = %change,
            "Descriptor registered"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::MemoryDescriptorStore;

    fn setup(store: &Arc<MemoryDescriptorStore>) -> BuildRegistrar {
        BuildRegistrar::new(store.clone(), RegistrarConfig::default())
    }

    #[test]
    fn toggle_key_normalisation() {
        assert_eq!(ToggleKey::from_artifact("foo_test").as_str(), "FOO_TEST");
        assert_eq!(ToggleKey::from_artifact("gpio-amd.kunit").as_str(), "GPIO_AMD_KUNIT");
        assert_eq!(ToggleKey::from_artifact("__a--b__").as_str(), "A_B");
        assert_eq!(
            ToggleKey::from_artifact("foo_test").config_symbol(),
            "CONFIG_FOO_TEST"
        );
    }

    #[test]
    fn backup_path_appends_suffix() {
        assert_eq!(
            backup_path(Path::new("drivers/gpio/Kconfig")),
            PathBuf::from("drivers/gpio/Kconfig.kunitgen_backup")
        );
    }

    #[test]
    fn first_registration_touches_all_three_files() {
        let store = Arc::new(MemoryDescriptorStore::new());
        store.insert("Makefile", "obj-y += core.o\n");
        store.insert("Kconfig", "menu \"Tests\"\n\nendif\n");
        let registrar = setup(&store);

        let report = registrar.register("foo_test").unwrap();
        assert_eq!(report.toggle.as_str(), "FOO_TEST");
        assert_eq!(report.module_list, DescriptorChange::Added);
        assert_eq!(report.declarations, DescriptorChange::Added);
        assert_eq!(report.enablement, DescriptorChange::Created);

        assert!(store
            .get("Makefile")
            .unwrap()
            .contains("obj-$(CONFIG_FOO_TEST) += foo_test.o"));
        assert!(store.get("Kconfig").unwrap().contains("config FOO_TEST\n"));
        assert_eq!(store.get("Kconfig.kunitgen_backup").unwrap(), "menu \"Tests\"\n\nendif\n");
        assert_eq!(store.get("my_kunit.config").unwrap(), "CONFIG_FOO_TEST=y\n");
    }

    #[test]
    fn second_registration_changes_nothing() {
        let store = Arc::new(MemoryDescriptorStore::new());
        store.insert("Makefile", "");
        store.insert("Kconfig", "endif\n");
        let registrar = setup(&store);

        registrar.register("foo_test").unwrap();
        let before = store.snapshot();

        let report = registrar.register("foo_test").unwrap();
        assert_eq!(report.module_list, DescriptorChange::AlreadyPresent);
        assert_eq!(report.declarations, DescriptorChange::AlreadyPresent);
        assert_eq!(report.enablement, DescriptorChange::AlreadyPresent);
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn missing_module_list_is_skipped() {
        let store = Arc::new(MemoryDescriptorStore::new());
        store.insert("Kconfig", "endif\n");
        let registrar = setup(&store);

        let report = registrar.register("foo_test").unwrap();
        assert!(matches!(report.module_list, DescriptorChange::Skipped { .. }));
        assert!(store.get("Makefile").is_none());
        assert_eq!(report.enablement, DescriptorChange::Created);
    }

    #[test]
    fn missing_declarations_file_is_created_with_block_only() {
        let store = Arc::new(MemoryDescriptorStore::new());
        let registrar = setup(&store);

        let report = registrar.register("foo_test").unwrap();
        assert_eq!(report.declarations, DescriptorChange::Created);
        assert_eq!(
            store.get("Kconfig").unwrap(),
            kconfig::entry_block(&ToggleKey::from_artifact("foo_test"), "foo_test", "KUNIT")
        );
        assert!(store.get("Kconfig.kunitgen_backup").is_none());
    }

    #[test]
    fn no_anchor_leaves_declarations_untouched() {
        let store = Arc::new(MemoryDescriptorStore::new());
        store.insert("Kconfig", "config OTHER\n\tbool\n");
        let registrar = setup(&store);

        let report = registrar.register("foo_test").unwrap();
        assert!(matches!(report.declarations, DescriptorChange::Skipped { .. }));
        assert_eq!(store.get("Kconfig").unwrap(), "config OTHER\n\tbool\n");
        assert!(store.get("Kconfig.kunitgen_backup").is_none());
    }

    #[test]
    fn backup_is_taken_only_once() {
        let store = Arc::new(MemoryDescriptorStore::new());
        store.insert("Kconfig", "endif\n");
        let registrar = setup(&store);

        registrar.register("a_test").unwrap();
        registrar.register("b_test").unwrap();

        assert_eq!(store.get("Kconfig.kunitgen_backup").unwrap(), "endif\n");
        let kconfig = store.get("Kconfig").unwrap();
        assert!(kconfig.contains("config A_TEST\n"));
        assert!(kconfig.contains("config B_TEST\n"));
    }

    #[test]
    fn conflicting_module_entry_reports_disabled() {
        let store = Arc::new(MemoryDescriptorStore::new());
        store.insert("Makefile", "obj-$(CONFIG_FOO_TEST) += stale.o\n");
        let registrar = setup(&store);

        let report = registrar.register("foo_test").unwrap();
        assert_eq!(
            report.module_list,
            DescriptorChange::DisabledAndReplaced { disabled: 1 }
        );
        assert!(report.module_list.modified_file());
    }

    #[test]
    fn store_failure_is_an_io_error() {
        let store = Arc::new(MemoryDescriptorStore::new());
        store.insert("Makefile", "");
        store.fail_writes(true);
        let registrar = setup(&store);

        let err = registrar.register("foo_test").unwrap_err();
        assert!(matches!(err, crate::domain::KunitgenError::Io(_)));
    }
}
