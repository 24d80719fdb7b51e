//! VCS markers for target roots.
//!
//! The trust scorer rewards roots under version control; this helper gives
//! a root a real repository.

use std::path::Path;

/// Initialises a real, empty git repository using `git2`.
///
/// # Panics
/// Panics if `git2::Repository::init` fails.
pub fn real_git_repo(path: &Path) -> git2::Repository {
    git2::Repository::init(path).unwrap_or_else(|e| {
        panic!(
            "real_git_repo: failed to init repository at {}: {e}",
            path.display()
        )
    })
}
