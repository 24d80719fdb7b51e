//! Instrumented [`FileOps`] implementations for asserting on side effects.

use std::io;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use deploy_fs::{Error, FileOps, LocalFs, Result};

/// Number of calls per mutating operation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OpCounts {
    pub writes: usize,
    pub copies: usize,
    pub removes: usize,
    pub dirs: usize,
}

impl OpCounts {
    pub fn mutations(&self) -> usize {
        self.writes + self.copies + self.removes + self.dirs
    }
}

/// Local filesystem that counts every mutation and remembers copy targets.
#[derive(Debug, Default)]
pub struct CountingFs {
    inner: LocalFs,
    writes: AtomicUsize,
    copies: AtomicUsize,
    removes: AtomicUsize,
    dirs: AtomicUsize,
    copied_to: Mutex<Vec<String>>,
}

impl CountingFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counts(&self) -> OpCounts {
        OpCounts {
            writes: self.writes.load(Ordering::SeqCst),
            copies: self.copies.load(Ordering::SeqCst),
            removes: self.removes.load(Ordering::SeqCst),
            dirs: self.dirs.load(Ordering::SeqCst),
        }
    }

    pub fn copied_to(&self) -> Vec<String> {
        self.copied_to.lock().unwrap().clone()
    }
}

impl FileOps for CountingFs {
    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.inner.read(path)
    }

    fn write(&self, path: &Path, content: &[u8]) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write(path, content)
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<u64> {
        self.copies.fetch_add(1, Ordering::SeqCst);
        self.copied_to
            .lock()
            .unwrap()
            .push(to.to_string_lossy().into_owned());
        self.inner.copy(from, to)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        self.inner.remove_file(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.dirs.fetch_add(1, Ordering::SeqCst);
        self.inner.create_dir_all(path)
    }
}

/// Local filesystem whose writes to matching paths fail.
///
/// A write fails when the target path ends with `suffix`, for the first
/// `failures` matching attempts (or always, when `failures` is `None`).
/// Copies are only intercepted after [`FailingFs::on_copies`].
#[derive(Debug)]
pub struct FailingFs {
    inner: LocalFs,
    suffix: String,
    kind: io::ErrorKind,
    failures: Option<usize>,
    copies: bool,
    attempts: AtomicUsize,
}

impl FailingFs {
    /// Every write to a path ending in `suffix` fails with `kind`.
    pub fn always(suffix: impl Into<String>, kind: io::ErrorKind) -> Self {
        Self {
            inner: LocalFs::new(),
            suffix: suffix.into(),
            kind,
            failures: None,
            copies: false,
            attempts: AtomicUsize::new(0),
        }
    }

    /// The first `failures` writes to a path ending in `suffix` fail.
    pub fn times(suffix: impl Into<String>, kind: io::ErrorKind, failures: usize) -> Self {
        Self {
            failures: Some(failures),
            ..Self::always(suffix, kind)
        }
    }

    /// Also fail copies whose destination ends with the suffix.
    pub fn on_copies(mut self) -> Self {
        self.copies = true;
        self
    }

    /// Matching write attempts seen so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn check(&self, path: &Path) -> Result<()> {
        let normalized = path.to_string_lossy().replace('\\', "/");
        if !normalized.ends_with(&self.suffix) {
            return Ok(());
        }
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failures.is_none_or(|limit| attempt <= limit) {
            return Err(Error::io(path, io::Error::new(self.kind, "injected failure")));
        }
        Ok(())
    }
}

impl FileOps for FailingFs {
    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.inner.read(path)
    }

    fn write(&self, path: &Path, content: &[u8]) -> Result<()> {
        self.check(path)?;
        self.inner.write(path, content)
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<u64> {
        if self.copies {
            self.check(to)?;
        }
        self.inner.copy(from, to)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.inner.remove_file(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.inner.create_dir_all(path)
    }
}
