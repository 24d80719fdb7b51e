//! Normalized path handling for cross-platform compatibility

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// A path normalized to use forward slashes internally.
///
/// `.` segments and duplicate separators are dropped and `..` segments are
/// resolved lexically. A `..` that would climb above the start of the path is
/// discarded, so a normalized path never points above its own root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedPath {
    /// Internal representation always uses forward slashes
    inner: String,
}

impl NormalizedPath {
    /// Create a new NormalizedPath from any path-like input.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path_str = path.as_ref().to_string_lossy();
        Self {
            inner: normalize(&path_str),
        }
    }

    /// Get the internal normalized string representation.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Convert to a platform-native PathBuf for I/O operations.
    pub fn to_native(&self) -> PathBuf {
        PathBuf::from(&self.inner)
    }

    /// Join this path with a segment.
    pub fn join(&self, segment: &str) -> Self {
        let joined = if self.inner.is_empty() {
            segment.to_string()
        } else if self.inner.ends_with('/') {
            format!("{}{}", self.inner, segment)
        } else {
            format!("{}/{}", self.inner, segment)
        };
        Self {
            inner: normalize(&joined),
        }
    }

    /// Get the parent directory.
    pub fn parent(&self) -> Option<Self> {
        let trimmed = self.inner.trim_end_matches('/');
        match trimmed.rfind('/') {
            Some(idx) if idx > 0 => Some(Self {
                inner: trimmed[..idx].to_string(),
            }),
            Some(0) => Some(Self {
                inner: "/".to_string(),
            }),
            _ => None,
        }
    }

    /// Get the file name component.
    pub fn file_name(&self) -> Option<&str> {
        let trimmed = self.inner.trim_end_matches('/');
        trimmed.rsplit('/').next().filter(|name| !name.is_empty())
    }

    /// Check if this path exists on the filesystem.
    pub fn exists(&self) -> bool {
        self.to_native().exists()
    }

    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.to_native().is_dir()
    }

    /// Check if this is a file.
    pub fn is_file(&self) -> bool {
        self.to_native().is_file()
    }

    /// Get the extension if present.
    pub fn extension(&self) -> Option<&str> {
        self.file_name().and_then(|name| {
            let idx = name.rfind('.')?;
            if idx == 0 {
                None
            } else {
                Some(&name[idx + 1..])
            }
        })
    }

    /// Whether this path lies at or below `root`.
    pub fn is_within(&self, root: &NormalizedPath) -> bool {
        self.strip_root(root).is_some()
    }

    /// The path relative to `root`, if it lies below it.
    pub fn strip_root(&self, root: &NormalizedPath) -> Option<&str> {
        let root = root.inner.trim_end_matches('/');
        if root.is_empty() {
            return Some(self.inner.as_str());
        }
        let rest = self.inner.strip_prefix(root)?;
        if rest.is_empty() {
            Some("")
        } else {
            rest.strip_prefix('/')
        }
    }

    /// Join a relative path below this root, rejecting escapes.
    ///
    /// Unlike [`NormalizedPath::join`], absolute inputs and any `..` segment
    /// are refused instead of silently sanitized.
    pub fn join_contained(&self, relative: &str) -> Result<Self> {
        let candidate = relative.replace('\\', "/");
        let escapes = candidate.starts_with('/')
            || candidate.split('/').any(|segment| segment == "..")
            || candidate.chars().nth(1) == Some(':');
        if escapes {
            return Err(Error::PathEscapesRoot {
                path: PathBuf::from(relative),
                root: self.to_native(),
            });
        }
        Ok(self.join(&candidate))
    }
}

/// Validate that a value is safe to use as a single directory component.
///
/// Returns a human-readable message naming `label` when the value is empty,
/// contains separators or traversal, or starts with a dot.
pub fn validate_path_identifier(value: &str, label: &str) -> std::result::Result<(), String> {
    if value.is_empty() {
        return Err(format!("{label} must not be empty"));
    }
    if value.contains('/') || value.contains('\\') {
        return Err(format!("{label} '{value}' must not contain path separators"));
    }
    if value.starts_with('.') {
        return Err(format!("{label} '{value}' must not start with '.'"));
    }
    if value.chars().any(|c| c.is_control() || c == ':') {
        return Err(format!("{label} '{value}' contains forbidden characters"));
    }
    Ok(())
}

fn normalize(raw: &str) -> String {
    let unified = raw.replace('\\', "/");
    if unified.contains("://") {
        return unified;
    }

    let (prefix, rest) = if let Some(rest) = unified.strip_prefix("//") {
        ("//", rest)
    } else if let Some(rest) = unified.strip_prefix('/') {
        ("/", rest)
    } else {
        ("", unified.as_str())
    };

    let mut parts: Vec<&str> = Vec::new();
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }

    format!("{prefix}{}", parts.join("/"))
}

impl AsRef<Path> for NormalizedPath {
    fn as_ref(&self) -> &Path {
        Path::new(&self.inner)
    }
}

impl std::fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl From<&str> for NormalizedPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NormalizedPath {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<PathBuf> for NormalizedPath {
    fn from(p: PathBuf) -> Self {
        Self::new(p)
    }
}

impl From<&Path> for NormalizedPath {
    fn from(p: &Path) -> Self {
        Self::new(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_root_returns_relative_part() {
        let root = NormalizedPath::new("/work/project");
        let file = NormalizedPath::new("/work/project/.vscode/settings.json");
        assert_eq!(file.strip_root(&root), Some(".vscode/settings.json"));
    }

    #[test]
    fn strip_root_rejects_sibling_prefix() {
        let root = NormalizedPath::new("/work/project");
        let sibling = NormalizedPath::new("/work/project-two/file");
        assert_eq!(sibling.strip_root(&root), None);
    }

    #[test]
    fn join_contained_rejects_traversal() {
        let root = NormalizedPath::new("/work/project");
        assert!(root.join_contained("../../etc/passwd").is_err());
        assert!(root.join_contained("/etc/passwd").is_err());
        assert!(root.join_contained("C:/Windows").is_err());
        assert_eq!(
            root.join_contained(".claude/settings.json").unwrap().as_str(),
            "/work/project/.claude/settings.json"
        );
    }

    #[test]
    fn identifier_validation() {
        assert!(validate_path_identifier("vscode", "Platform").is_ok());
        assert!(validate_path_identifier("", "Platform").is_err());
        assert!(validate_path_identifier("../x", "Platform").is_err());
        assert!(validate_path_identifier(".hidden", "Platform").is_err());
    }
}
