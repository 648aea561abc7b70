use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// Plain-text access to build descriptor files.
pub trait DescriptorStore: Send + Sync {
    /// File contents, or `None` when the file does not exist.
    fn read(&self, path: &Path) -> io::Result<Option<String>>;

    /// Replace the whole file.
    fn write(&self, path: &Path, content: &str) -> io::Result<()>;

    /// Append to the file, creating it if needed.
    fn append(&self, path: &Path, content: &str) -> io::Result<()>;

    fn exists(&self, path: &Path) -> bool;

    fn copy(&self, from: &Path, to: &Path) -> io::Result<()>;
}

/// Filesystem-backed descriptor store.
///
/// Whole-file writes go through a temp file in the same directory and a
/// rename, so an interrupted write never leaves a half-patched descriptor.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsDescriptorStore;

impl FsDescriptorStore {
    pub fn new() -> Self {
        Self
    }
}

impl DescriptorStore for FsDescriptorStore {
    fn read(&self, path: &Path) -> io::Result<Option<String>> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, path: &Path, content: &str) -> io::Result<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    fn append(&self, path: &Path, content: &str) -> io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        file.write_all(content.as_bytes())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::copy(from, to).map(|_| ())
    }
}
