//! Request types handed to the engine by a caller (CLI, GUI, job file).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Extensions that are never read for content matching when
/// [`ScanFilter::skip_binary_extensions`] is set.
pub const BINARY_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".bmp", ".tiff", ".tif", ".webp", ".ico", ".svg", ".mp4",
    ".avi", ".mkv", ".mov", ".wmv", ".flv", ".webm", ".m4v", ".mp3", ".wav", ".flac", ".aac",
    ".ogg", ".wma", ".m4a", ".zip", ".rar", ".7z", ".tar", ".gz", ".bz2", ".exe", ".dll", ".so",
    ".dylib", ".bin", ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".db",
    ".sqlite", ".dat", ".cache",
];

/// Matching and scope switches. Fixed for the lifetime of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchOptions {
    pub case_sensitive: bool,
    pub whole_word: bool,
    /// Descend below the immediate children of the root.
    pub recursive: bool,
    /// Rename files and directories whose name matches.
    pub include_names: bool,
    /// Rewrite matching text inside files.
    pub include_contents: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            whole_word: false,
            recursive: true,
            include_names: true,
            include_contents: true,
        }
    }
}

/// Entries the scan leaves alone entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanFilter {
    /// Case-insensitive substrings. A matching path, name or text content
    /// excludes the entry.
    pub ignored_words: Vec<String>,
    /// Entries equal to or below one of these are skipped with their subtree.
    /// Relative paths are taken relative to the scope directory: the root, or
    /// the root's parent when the root is a single file.
    pub ignored_paths: Vec<PathBuf>,
    /// File extensions to skip entirely, with or without the leading dot.
    pub ignored_extensions: Vec<String>,
    /// Treat [`BINARY_EXTENSIONS`] as non-text without reading the file.
    pub skip_binary_extensions: bool,
}

impl Default for ScanFilter {
    fn default() -> Self {
        Self {
            ignored_words: Vec::new(),
            ignored_paths: Vec::new(),
            ignored_extensions: Vec::new(),
            skip_binary_extensions: true,
        }
    }
}

impl ScanFilter {
    /// Normalize the filter against a canonical scope directory: lowercase
    /// words and extensions, drop blanks, make ignored paths absolute.
    pub fn resolve(&self, scope: &Path) -> ScanFilter {
        let ignored_words = self
            .ignored_words
            .iter()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();

        let ignored_extensions = self
            .ignored_extensions
            .iter()
            .map(|e| normalize_extension(e))
            .filter(|e| e.len() > 1)
            .collect();

        let ignored_paths = self
            .ignored_paths
            .iter()
            .map(|p| {
                let absolute = if p.is_absolute() {
                    p.clone()
                } else {
                    scope.join(p)
                };
                absolute.canonicalize().unwrap_or(absolute)
            })
            .collect();

        ScanFilter {
            ignored_words,
            ignored_paths,
            ignored_extensions,
            skip_binary_extensions: self.skip_binary_extensions,
        }
    }

    /// Expects a filter produced by [`ScanFilter::resolve`].
    pub fn contains_ignored_word(&self, text: &str) -> bool {
        if self.ignored_words.is_empty() {
            return false;
        }
        let lower = text.to_lowercase();
        self.ignored_words.iter().any(|w| lower.contains(w.as_str()))
    }

    pub fn is_ignored_path(&self, path: &Path) -> bool {
        self.ignored_paths.iter().any(|p| path.starts_with(p))
    }

    pub fn is_ignored_extension(&self, path: &Path) -> bool {
        match extension_of(path) {
            Some(ext) => self.ignored_extensions.contains(&ext),
            None => false,
        }
    }

    pub fn is_binary_extension(&self, path: &Path) -> bool {
        if !self.skip_binary_extensions {
            return false;
        }
        match extension_of(path) {
            Some(ext) => BINARY_EXTENSIONS.contains(&ext.as_str()),
            None => false,
        }
    }
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}

/// Lowercased last extension with its leading dot, e.g. `".txt"`.
fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
}

/// One bulk replace job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceRequest {
    /// A single file, or a directory whose entries are scanned.
    pub root: PathBuf,
    /// Literal search text; must be non-empty.
    pub search: String,
    /// Replacement text; may be empty.
    pub replace: String,
    #[serde(default)]
    pub options: MatchOptions,
    #[serde(default)]
    pub filter: ScanFilter,
}

impl ReplaceRequest {
    pub fn new(
        root: impl Into<PathBuf>,
        search: impl Into<String>,
        replace: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            search: search.into(),
            replace: replace.into(),
            options: MatchOptions::default(),
            filter: ScanFilter::default(),
        }
    }

    pub fn with_options(mut self, options: MatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_filter(mut self, filter: ScanFilter) -> Self {
        self.filter = filter;
        self
    }
}
