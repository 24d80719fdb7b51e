//! [`TestWorkspace`]: a temporary deployment root and backup directory.

use std::fs;
use std::path::{Path, PathBuf};

use deploy_meta::{DeploymentOptions, Platform};
use tempfile::TempDir;

/// A target root with a sibling backup directory, both removed on drop.
///
/// # Example
///
/// ```rust,no_run
/// use deploy_meta::Platform;
/// use deploy_test_utils::TestWorkspace;
///
/// let ws = TestWorkspace::new();
/// ws.write(".vscode/settings.json", "{}");
/// let options = ws.options(Platform::VsCode);
/// ws.assert_file_exists(".vscode/settings.json");
/// ```
pub struct TestWorkspace {
    root: TempDir,
    backups: TempDir,
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            root: TempDir::new().unwrap(),
            backups: TempDir::new().unwrap(),
        }
    }

    /// Like [`TestWorkspace::new`], with the root under git.
    pub fn with_git() -> Self {
        let ws = Self::new();
        crate::git::real_git_repo(ws.root());
        ws
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn backup_dir(&self) -> &Path {
        self.backups.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }

    /// Options targeting `platform` with backups in this workspace.
    pub fn options(&self, platform: Platform) -> DeploymentOptions {
        DeploymentOptions::new(platform, self.backup_dir()).with_trusted_path(self.root())
    }

    /// Write `content` to `relative`, creating parent directories.
    pub fn write(&self, relative: &str, content: impl AsRef<[u8]>) {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
    }

    pub fn read(&self, relative: &str) -> String {
        let path = self.path(relative);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("Could not read {}: {e}", path.display()))
    }

    pub fn read_json(&self, relative: &str) -> serde_json::Value {
        serde_json::from_str(&self.read(relative))
            .unwrap_or_else(|e| panic!("{relative} is not JSON: {e}"))
    }

    /// Relative paths of every file under the root, excluding the lease
    /// directory and `.git`.
    pub fn files(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect(self.root(), self.root(), &mut out);
        out.sort();
        out
    }

    pub fn assert_file_exists(&self, relative: &str) {
        let path = self.path(relative);
        assert!(path.exists(), "Expected file to exist: {}", path.display());
    }

    pub fn assert_file_not_exists(&self, relative: &str) {
        let path = self.path(relative);
        assert!(
            !path.exists(),
            "Expected file NOT to exist: {}",
            path.display()
        );
    }

    pub fn assert_file_contains(&self, relative: &str, needle: &str) {
        let content = self.read(relative);
        assert!(
            content.contains(needle),
            "{relative} does not contain expected content.\nExpected: {needle}\nActual: {content}"
        );
    }
}

fn collect(root: &Path, dir: &Path, out: &mut Vec<String>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name();
        if dir == root && (name == ".ai-deploy" || name == ".git") {
            continue;
        }
        if path.is_dir() {
            collect(root, &path, out);
        } else if let Ok(relative) = path.strip_prefix(root) {
            out.push(relative.to_string_lossy().replace('\\', "/"));
        }
    }
}
