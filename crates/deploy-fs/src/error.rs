//! Error types for deploy-fs

use std::path::PathBuf;

/// Result type for deploy-fs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in deploy-fs operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {format} config at {path}: {message}")]
    ConfigParse {
        path: PathBuf,
        format: String,
        message: String,
    },

    #[error("Unsupported config format: {extension}")]
    UnsupportedFormat { extension: String },

    #[error("Path {path} escapes root {root}")]
    PathEscapesRoot { path: PathBuf, root: PathBuf },

    #[error("Invalid identifier: {message}")]
    InvalidIdentifier { message: String },

    #[error("Lock acquisition failed for {path}")]
    LockFailed { path: PathBuf },

    #[error("Lease at {path} is held by session {holder}")]
    LeaseHeld { path: PathBuf, holder: String },

    #[error("Corrupt lease record at {path}: {message}")]
    LeaseCorrupt { path: PathBuf, message: String },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The underlying I/O error kind, when this error wraps one.
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            Self::Io { source, .. } => Some(source.kind()),
            _ => None,
        }
    }

    /// The path this error is about, if any.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Io { path, .. }
            | Self::ConfigParse { path, .. }
            | Self::PathEscapesRoot { path, .. }
            | Self::LockFailed { path }
            | Self::LeaseHeld { path, .. }
            | Self::LeaseCorrupt { path, .. } => Some(path),
            Self::UnsupportedFormat { .. } | Self::InvalidIdentifier { .. } => None,
        }
    }
}
