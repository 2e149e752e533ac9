use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a whole preview before any plan exists.
///
/// Everything that can go wrong with a single entry (collisions, binary
/// content, stale snapshots, OS failures during apply) is carried per action
/// in the [`Plan`](crate::Plan) or [`Report`](crate::Report) instead.
#[derive(Error, Debug)]
pub enum ReplaceError {
    #[error("search text must not be empty")]
    InvalidPattern,

    #[error("path not found: {path}")]
    PathNotFound { path: PathBuf },

    #[error("root is neither a regular file nor a directory: {path}")]
    UnsupportedRoot { path: PathBuf },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ReplaceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ReplaceError::Io {
            path: path.into(),
            source,
        }
    }
}
