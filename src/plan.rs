//! The immutable, ordered list of filesystem mutations produced by a preview.

use crate::request::{MatchOptions, ReplaceRequest};
use encoding_rs::WINDOWS_1251;
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};
use xxhash_rust::xxh3::xxh3_64;

/// Snapshot of file bytes taken at plan time, used to detect staleness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Fingerprint {
    pub len: u64,
    pub hash: u64,
}

impl Fingerprint {
    pub fn of(bytes: &[u8]) -> Self {
        Self {
            len: bytes.len() as u64,
            hash: xxh3_64(bytes),
        }
    }

    pub fn matches(&self, bytes: &[u8]) -> bool {
        self.len == bytes.len() as u64 && self.hash == xxh3_64(bytes)
    }
}

/// Encoding a text file was decoded with. Rewrites are written back in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextEncoding {
    Utf8,
    Windows1251,
}

impl TextEncoding {
    /// Decode file bytes as UTF-8, falling back to windows-1251. Content
    /// with a NUL byte is never text.
    pub fn decode(bytes: &[u8]) -> Option<(Cow<'_, str>, TextEncoding)> {
        if bytes.contains(&0) {
            return None;
        }
        if let Ok(text) = std::str::from_utf8(bytes) {
            return Some((Cow::Borrowed(text), TextEncoding::Utf8));
        }
        WINDOWS_1251
            .decode_without_bom_handling_and_without_replacement(bytes)
            .map(|text| (text, TextEncoding::Windows1251))
    }

    /// `None` if `text` has characters this encoding cannot represent.
    pub fn encode<'a>(&self, text: &'a str) -> Option<Cow<'a, [u8]>> {
        match self {
            TextEncoding::Utf8 => Some(Cow::Borrowed(text.as_bytes())),
            TextEncoding::Windows1251 => {
                let (bytes, _, unmappable) = WINDOWS_1251.encode(text);
                (!unmappable).then_some(bytes)
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Windows1251 => "windows-1251",
        }
    }
}

/// One line of a content rewrite, for preview display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinePreview {
    /// 1-based.
    pub line_number: usize,
    pub before: String,
    pub after: String,
}

/// A single reversible mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    RenameFile {
        path: PathBuf,
        new_name: String,
    },
    RenameDir {
        path: PathBuf,
        new_name: String,
    },
    RewriteContent {
        path: PathBuf,
        #[serde(skip)]
        new_content: String,
        #[serde(skip)]
        original_content: String,
        encoding: TextEncoding,
        original: Fingerprint,
        match_count: usize,
        lines: Vec<LinePreview>,
    },
}

impl Action {
    /// The path the action operates on, as it exists before the action runs.
    pub fn path(&self) -> &Path {
        match self {
            Action::RenameFile { path, .. }
            | Action::RenameDir { path, .. }
            | Action::RewriteContent { path, .. } => path,
        }
    }

    /// Destination of a rename; `None` for content rewrites.
    pub fn target(&self) -> Option<PathBuf> {
        match self {
            Action::RenameFile { path, new_name } | Action::RenameDir { path, new_name } => {
                Some(path.with_file_name(new_name))
            }
            Action::RewriteContent { .. } => None,
        }
    }

    pub fn is_rename(&self) -> bool {
        !matches!(self, Action::RewriteContent { .. })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::RenameFile { path, new_name } => {
                write!(f, "rename file {} -> {}", path.display(), new_name)
            }
            Action::RenameDir { path, new_name } => {
                write!(f, "rename dir {} -> {}", path.display(), new_name)
            }
            Action::RewriteContent {
                path, match_count, ..
            } => write!(
                f,
                "rewrite {} ({} match{})",
                path.display(),
                match_count,
                if *match_count == 1 { "" } else { "es" }
            ),
        }
    }
}

/// Why an action (or an entry without an action) was not applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// Content is not text in a supported encoding; content matching was
    /// skipped.
    NotText,
    /// The replacement text cannot be written back in the file's encoding.
    Unencodable { encoding: &'static str },
    /// The rename target is already taken.
    NameCollision { target: PathBuf },
    /// The computed name is not a usable file name.
    InvalidName { name: String },
    /// The entry changed between preview and apply.
    Stale { detail: String },
    /// The entry could not be read while planning.
    Unreadable { message: String },
    Cancelled,
    /// An earlier action failed and the run was aborted.
    NotAttempted,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotText => write!(f, "not a text file"),
            SkipReason::Unencodable { encoding } => {
                write!(f, "replacement cannot be encoded as {encoding}")
            }
            SkipReason::NameCollision { target } => {
                write!(f, "name collision with {}", target.display())
            }
            SkipReason::InvalidName { name } => write!(f, "invalid file name {name:?}"),
            SkipReason::Stale { detail } => write!(f, "stale: {detail}"),
            SkipReason::Unreadable { message } => write!(f, "unreadable: {message}"),
            SkipReason::Cancelled => write!(f, "cancelled"),
            SkipReason::NotAttempted => write!(f, "not attempted after an earlier failure"),
        }
    }
}

/// An action plus the reason it is already known to be skipped, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedAction {
    pub action: Action,
    pub skip: Option<SkipReason>,
}

/// A limitation recorded for an entry that produced no action of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanNote {
    pub path: PathBuf,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenamePreview {
    pub from: PathBuf,
    pub to: PathBuf,
    pub skip: Option<SkipReason>,
}

/// Condensed view of a plan for preview display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub renames: Vec<RenamePreview>,
    pub content_files: usize,
    pub content_matches: usize,
    pub skipped: usize,
}

/// Ordered mutations computed against one snapshot of the tree.
///
/// All content rewrites come first, then renames deepest-first, so no action
/// invalidates the path of an action after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    request: ReplaceRequest,
    scope: PathBuf,
    actions: Vec<PlannedAction>,
    notes: Vec<PlanNote>,
    cancelled: bool,
}

impl Plan {
    pub(crate) fn new(
        request: ReplaceRequest,
        scope: PathBuf,
        actions: Vec<PlannedAction>,
        notes: Vec<PlanNote>,
        cancelled: bool,
    ) -> Self {
        Self {
            request,
            scope,
            actions,
            notes,
            cancelled,
        }
    }

    /// The request this plan was computed for, with its root canonicalized.
    pub fn request(&self) -> &ReplaceRequest {
        &self.request
    }

    pub fn root(&self) -> &Path {
        &self.request.root
    }

    pub fn options(&self) -> &MatchOptions {
        &self.request.options
    }

    /// Directory that every mutated path must stay inside: the root itself,
    /// or its parent when the root is a single file.
    pub fn scope_dir(&self) -> &Path {
        &self.scope
    }

    pub fn actions(&self) -> &[PlannedAction] {
        &self.actions
    }

    pub fn notes(&self) -> &[PlanNote] {
        &self.notes
    }

    /// True if the scan was cancelled and the plan covers only part of the tree.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn summary(&self) -> PlanSummary {
        let mut renames = Vec::new();
        let mut content_files = 0;
        let mut content_matches = 0;
        let mut skipped = self.notes.len();

        for planned in &self.actions {
            if planned.skip.is_some() {
                skipped += 1;
            }
            match &planned.action {
                Action::RewriteContent { match_count, .. } => {
                    if planned.skip.is_none() {
                        content_files += 1;
                        content_matches += match_count;
                    }
                }
                action => {
                    if let Some(to) = action.target() {
                        renames.push(RenamePreview {
                            from: action.path().to_path_buf(),
                            to,
                            skip: planned.skip.clone(),
                        });
                    }
                }
            }
        }

        PlanSummary {
            renames,
            content_files,
            content_matches,
            skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_detects_change() {
        let fp = Fingerprint::of(b"hello world");
        assert!(fp.matches(b"hello world"));
        assert!(!fp.matches(b"hello World"));
        assert!(!fp.matches(b"hello world!"));
    }

    #[test]
    fn test_text_encoding_detection() {
        let (text, encoding) = TextEncoding::decode("plain ✓".as_bytes()).unwrap();
        assert_eq!((&*text, encoding), ("plain ✓", TextEncoding::Utf8));

        let (text, encoding) =
            TextEncoding::decode(&[0xcf, 0xf0, 0xe8, 0xe2, 0xe5, 0xf2]).unwrap();
        assert_eq!((&*text, encoding), ("Привет", TextEncoding::Windows1251));

        assert!(TextEncoding::decode(b"nul\0byte").is_none());
    }

    #[test]
    fn test_windows_1251_round_trip_and_unmappable() {
        let bytes = TextEncoding::Windows1251.encode("Привет").unwrap();
        assert_eq!(&*bytes, &[0xcf, 0xf0, 0xe8, 0xe2, 0xe5, 0xf2]);
        assert!(TextEncoding::Windows1251.encode("✓").is_none());
        assert!(TextEncoding::Utf8.encode("✓").is_some());
    }

    #[test]
    fn test_rename_target_is_sibling() {
        let action = Action::RenameDir {
            path: PathBuf::from("/r/a/foo"),
            new_name: "bar".into(),
        };
        assert_eq!(action.target(), Some(PathBuf::from("/r/a/bar")));
        assert!(action.is_rename());
    }

    #[test]
    fn test_summary_counts() {
        let rewrite = PlannedAction {
            action: Action::RewriteContent {
                path: PathBuf::from("/r/a.txt"),
                new_content: "bar bar".into(),
                original_content: "foo foo".into(),
                encoding: TextEncoding::Utf8,
                original: Fingerprint::of(b"foo foo"),
                match_count: 2,
                lines: Vec::new(),
            },
            skip: None,
        };
        let collision = PlannedAction {
            action: Action::RenameFile {
                path: PathBuf::from("/r/foo.txt"),
                new_name: "bar.txt".into(),
            },
            skip: Some(SkipReason::NameCollision {
                target: PathBuf::from("/r/bar.txt"),
            }),
        };
        let plan = Plan::new(
            ReplaceRequest::new("/r", "foo", "bar"),
            PathBuf::from("/r"),
            vec![rewrite, collision],
            vec![PlanNote {
                path: PathBuf::from("/r/blob"),
                reason: SkipReason::NotText,
            }],
            false,
        );

        let summary = plan.summary();
        assert_eq!(summary.content_files, 1);
        assert_eq!(summary.content_matches, 2);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.renames.len(), 1);
        assert_eq!(summary.renames[0].to, PathBuf::from("/r/bar.txt"));
    }

    #[test]
    fn test_display_action() {
        let action = Action::RenameFile {
            path: PathBuf::from("foo.txt"),
            new_name: "bar.txt".into(),
        };
        assert_eq!(action.to_string(), "rename file foo.txt -> bar.txt");
    }
}
