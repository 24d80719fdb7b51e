//! Atomic I/O operations and the [`FileOps`] seam

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::{Error, NormalizedPath, Result};

/// Write content atomically to a file.
///
/// Uses write-to-temp-then-rename so readers never observe a partial file.
/// The temp file lives in the destination directory to stay on the same
/// filesystem.
pub fn write_atomic(path: &NormalizedPath, content: &[u8]) -> Result<()> {
    let native_path = path.to_native();

    let parent = native_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;

    let mut temp = tempfile::Builder::new()
        .prefix(".deploy-")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|e| Error::io(parent, e))?;

    temp.write_all(content)
        .map_err(|e| Error::io(temp.path(), e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| Error::io(temp.path(), e))?;

    temp.persist(&native_path)
        .map_err(|e| Error::io(&native_path, e.error))?;

    Ok(())
}

/// Read raw bytes from a file.
pub fn read_bytes(path: &NormalizedPath) -> Result<Vec<u8>> {
    let native_path = path.to_native();
    fs::read(&native_path).map_err(|e| Error::io(&native_path, e))
}

/// Read text content from a file.
pub fn read_text(path: &NormalizedPath) -> Result<String> {
    let native_path = path.to_native();
    fs::read_to_string(&native_path).map_err(|e| Error::io(&native_path, e))
}

/// Write text content to a file atomically.
pub fn write_text(path: &NormalizedPath, content: &str) -> Result<()> {
    write_atomic(path, content.as_bytes())
}

/// Copy a file with buffered streaming, never holding it fully in memory.
pub fn copy_streaming(from: &Path, to: &Path) -> Result<u64> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    let source = File::open(from).map_err(|e| Error::io(from, e))?;
    let target = File::create(to).map_err(|e| Error::io(to, e))?;
    let mut reader = BufReader::new(source);
    let mut writer = BufWriter::new(target);
    let copied = std::io::copy(&mut reader, &mut writer).map_err(|e| Error::io(to, e))?;
    writer.flush().map_err(|e| Error::io(to, e))?;
    Ok(copied)
}

/// Filesystem operations used by the deployment pipeline.
///
/// Every mutation the deployer performs goes through this trait so that
/// callers can substitute an instrumented implementation.
pub trait FileOps: Send + Sync {
    /// Whether a file or directory exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Read a file fully.
    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Replace the file at `path` with `content` atomically.
    fn write(&self, path: &Path, content: &[u8]) -> Result<()>;

    /// Copy `from` to `to`, creating parent directories. Returns bytes copied.
    fn copy(&self, from: &Path, to: &Path) -> Result<u64>;

    /// Remove a single file.
    fn remove_file(&self, path: &Path) -> Result<()>;

    /// Create a directory and its parents.
    fn create_dir_all(&self, path: &Path) -> Result<()>;
}

/// [`FileOps`] backed by the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl LocalFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileOps for LocalFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).map_err(|e| Error::io(path, e))
    }

    fn write(&self, path: &Path, content: &[u8]) -> Result<()> {
        write_atomic(&NormalizedPath::new(path), content)
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<u64> {
        copy_streaming(from, to)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).map_err(|e| Error::io(path, e))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).map_err(|e| Error::io(path, e))
    }
}
