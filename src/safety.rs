use std::path::{Path, PathBuf};
use thiserror::Error;

/// Keeps every mutation inside the directory a request was scoped to.
#[derive(Debug, Clone)]
pub struct RootGuard {
    /// Canonical scope directory
    root: PathBuf,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("Path is outside the replace root: {path} (root: {root})")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("Path has no parent directory: {0}")]
    NoParent(PathBuf),

    #[error("Failed to canonicalize path: {0}")]
    Canonicalize(#[from] std::io::Error),
}

impl RootGuard {
    /// Create a guard for `root`, canonicalized to handle symlinks.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        let root = root.as_ref().canonicalize()?;
        Ok(Self { root })
    }

    /// Check that `path` lives inside the root.
    ///
    /// Only the parent directory is canonicalized: the final component may be
    /// a symlink that is itself the subject of a rename, and must not be
    /// resolved to its target.
    pub fn check(&self, path: &Path) -> Result<PathBuf, SafetyError> {
        if path == self.root {
            return Ok(path.to_path_buf());
        }

        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| SafetyError::NoParent(path.to_path_buf()))?;
        let name = path
            .file_name()
            .ok_or_else(|| SafetyError::NoParent(path.to_path_buf()))?;

        let resolved = parent.canonicalize()?.join(name);
        if !resolved.starts_with(&self.root) {
            return Err(SafetyError::OutsideRoot {
                path: resolved,
                root: self.root.clone(),
            });
        }

        Ok(resolved)
    }
}
