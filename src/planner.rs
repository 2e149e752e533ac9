//! Read-only traversal that turns a [`ReplaceRequest`] into a [`Plan`].
//!
//! The planner never mutates the tree. It visits entries depth-first in file
//! name order, collects content rewrites and rename candidates, then orders
//! them so that applying the plan front to back never invalidates a path
//! that a later action still refers to:
//!
//! 1. every content rewrite, in visit order;
//! 2. renames grouped by parent directory, deepest directory first;
//! 3. within one directory, a rename whose target is freed by another
//!    planned rename comes after it. Targets that never become free are
//!    collisions.

use crate::cancel::CancelFlag;
use crate::error::ReplaceError;
use crate::matcher::{find_matches, splice};
use crate::plan::{
    Action, Fingerprint, LinePreview, Plan, PlanNote, PlannedAction, SkipReason, TextEncoding,
};
use crate::request::{ReplaceRequest, ScanFilter};
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug)]
struct RenameCandidate {
    path: PathBuf,
    new_name: String,
    is_dir: bool,
}

impl RenameCandidate {
    fn into_planned(self, skip: Option<SkipReason>) -> PlannedAction {
        let action = if self.is_dir {
            Action::RenameDir {
                path: self.path,
                new_name: self.new_name,
            }
        } else {
            Action::RenameFile {
                path: self.path,
                new_name: self.new_name,
            }
        };
        PlannedAction { action, skip }
    }
}

enum ContentScan {
    /// Content contains an ignored word; the entry is left alone entirely.
    Ignored,
    NoMatch,
    Note(SkipReason),
    Rewrite(Action),
}

/// Build a plan for `request` without touching the disk beyond reads.
pub fn build_plan(request: &ReplaceRequest) -> Result<Plan, ReplaceError> {
    build_plan_with_cancel(request, &CancelFlag::new())
}

/// Like [`build_plan`], stopping early if `cancel` is raised. A cancelled
/// scan still returns the plan for the entries visited so far.
pub fn build_plan_with_cancel(
    request: &ReplaceRequest,
    cancel: &CancelFlag,
) -> Result<Plan, ReplaceError> {
    if request.search.is_empty() {
        return Err(ReplaceError::InvalidPattern);
    }

    let root = request.root.as_path();
    let options = request.options;
    let root_is_file = root.is_file();
    let scope = if root_is_file {
        root.parent().unwrap_or(root).to_path_buf()
    } else {
        root.to_path_buf()
    };
    let filter = request.filter.resolve(&scope);
    for ignored in filter.ignored_paths.iter().filter(|p| !p.exists()) {
        warn!(path = %ignored.display(), "ignored path does not exist");
    }

    let (min_depth, max_depth) = match (root_is_file, options.recursive) {
        (true, _) => (0, 0),
        (false, true) => (1, usize::MAX),
        (false, false) => (1, 1),
    };

    let mut rewrites = Vec::new();
    let mut notes = Vec::new();
    let mut groups: Vec<(PathBuf, Vec<RenameCandidate>)> = Vec::new();
    let mut group_index: HashMap<PathBuf, usize> = HashMap::new();
    let mut cancelled = false;

    let walker = WalkDir::new(root)
        .min_depth(min_depth)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !filter.is_ignored_path(e.path()));

    for entry in walker {
        if cancel.is_cancelled() {
            warn!(root = %root.display(), "scan cancelled, plan is partial");
            cancelled = true;
            break;
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err.path().unwrap_or(root).to_path_buf();
                warn!(path = %path.display(), error = %err, "cannot read entry");
                notes.push(PlanNote {
                    path,
                    reason: SkipReason::Unreadable {
                        message: err.to_string(),
                    },
                });
                continue;
            }
        };

        let path = entry.path();
        let relative = path.strip_prefix(&scope).unwrap_or(path);
        if filter.contains_ignored_word(&relative.to_string_lossy()) {
            debug!(path = %path.display(), "ignored by word filter");
            continue;
        }

        let file_type = entry.file_type();
        if !file_type.is_dir() && filter.is_ignored_extension(path) {
            debug!(path = %path.display(), "ignored by extension");
            continue;
        }

        if file_type.is_file() {
            match scan_content(path, request, &filter)? {
                ContentScan::Ignored => {
                    debug!(path = %path.display(), "content contains an ignored word");
                    continue;
                }
                ContentScan::NoMatch => {}
                ContentScan::Note(reason) => {
                    debug!(path = %path.display(), %reason, "content not scanned");
                    notes.push(PlanNote {
                        path: path.to_path_buf(),
                        reason,
                    });
                }
                ContentScan::Rewrite(action) => {
                    debug!(%action, "planned");
                    rewrites.push(PlannedAction { action, skip: None });
                }
            }
        }

        if !options.include_names {
            continue;
        }
        // Names that are not valid UTF-8 cannot be matched as text.
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let spans = find_matches(name, &request.search, &options)?;
        if spans.is_empty() {
            continue;
        }
        let new_name = splice(name, &spans, &request.replace);
        if new_name == name {
            continue;
        }

        let parent = path.parent().unwrap_or(&scope).to_path_buf();
        let index = *group_index.entry(parent.clone()).or_insert_with(|| {
            groups.push((parent, Vec::new()));
            groups.len() - 1
        });
        groups[index].1.push(RenameCandidate {
            path: path.to_path_buf(),
            new_name,
            is_dir: file_type.is_dir(),
        });
    }

    // Stable sort: deepest parents first, visit order within one depth.
    groups.sort_by_key(|(parent, _)| Reverse(parent.components().count()));

    let mut actions = rewrites;
    for (parent, candidates) in groups {
        actions.extend(order_sibling_renames(&parent, candidates));
    }

    let plan = Plan::new(request.clone(), scope, actions, notes, cancelled);
    let summary = plan.summary();
    info!(
        root = %root.display(),
        renames = summary.renames.len(),
        content_files = summary.content_files,
        content_matches = summary.content_matches,
        skipped = summary.skipped,
        "plan built"
    );
    Ok(plan)
}

fn scan_content(
    path: &Path,
    request: &ReplaceRequest,
    filter: &ScanFilter,
) -> Result<ContentScan, ReplaceError> {
    let wants_content = request.options.include_contents;
    if !wants_content && filter.ignored_words.is_empty() {
        return Ok(ContentScan::NoMatch);
    }

    let not_text = if wants_content {
        ContentScan::Note(SkipReason::NotText)
    } else {
        ContentScan::NoMatch
    };

    if filter.is_binary_extension(path) {
        return Ok(not_text);
    }

    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            return Ok(ContentScan::Note(SkipReason::Unreadable {
                message: err.to_string(),
            }))
        }
    };

    let Some((text, encoding)) = TextEncoding::decode(&bytes) else {
        return Ok(not_text);
    };
    let text: &str = &text;

    if filter.contains_ignored_word(text) {
        return Ok(ContentScan::Ignored);
    }
    if !wants_content {
        return Ok(ContentScan::NoMatch);
    }

    let spans = find_matches(text, &request.search, &request.options)?;
    if spans.is_empty() {
        return Ok(ContentScan::NoMatch);
    }
    let new_content = splice(text, &spans, &request.replace);
    if new_content == text {
        return Ok(ContentScan::NoMatch);
    }
    if encoding.encode(&new_content).is_none() {
        return Ok(ContentScan::Note(SkipReason::Unencodable {
            encoding: encoding.name(),
        }));
    }

    Ok(ContentScan::Rewrite(Action::RewriteContent {
        path: path.to_path_buf(),
        new_content,
        original_content: text.to_string(),
        encoding,
        original: Fingerprint::of(&bytes),
        match_count: spans.len(),
        lines: line_previews(text, request)?,
    }))
}

fn line_previews(text: &str, request: &ReplaceRequest) -> Result<Vec<LinePreview>, ReplaceError> {
    let mut previews = Vec::new();
    for (index, line) in text.split('\n').enumerate() {
        let spans = find_matches(line, &request.search, &request.options)?;
        if spans.is_empty() {
            continue;
        }
        previews.push(LinePreview {
            line_number: index + 1,
            before: line.trim().to_string(),
            after: splice(line, &spans, &request.replace).trim().to_string(),
        });
    }
    Ok(previews)
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
}

/// Order the renames of one directory so that each target is free at the
/// moment its rename runs. Whatever cannot be ordered is a collision.
fn order_sibling_renames(parent: &Path, candidates: Vec<RenameCandidate>) -> Vec<PlannedAction> {
    let mut occupied: HashSet<OsString> = match fs::read_dir(parent) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .map(|e| e.file_name())
            .collect(),
        Err(err) => {
            warn!(dir = %parent.display(), error = %err, "cannot list siblings");
            HashSet::new()
        }
    };

    let mut ordered = Vec::with_capacity(candidates.len());
    let mut skipped = Vec::new();
    let mut pending = Vec::new();

    for candidate in candidates {
        if let Some(name) = candidate.path.file_name() {
            occupied.insert(name.to_os_string());
        }
        if is_valid_name(&candidate.new_name) {
            pending.push(candidate);
        } else {
            warn!(path = %candidate.path.display(), new_name = %candidate.new_name, "invalid new name");
            let name = candidate.new_name.clone();
            skipped.push(candidate.into_planned(Some(SkipReason::InvalidName { name })));
        }
    }

    loop {
        let before = pending.len();
        let mut blocked = Vec::new();
        for candidate in pending {
            let target = OsString::from(&candidate.new_name);
            if occupied.contains(&target) {
                blocked.push(candidate);
                continue;
            }
            if let Some(name) = candidate.path.file_name() {
                occupied.remove(name);
            }
            occupied.insert(target);
            ordered.push(candidate.into_planned(None));
        }
        pending = blocked;
        if pending.is_empty() || pending.len() == before {
            break;
        }
    }

    for candidate in pending {
        let target = candidate.path.with_file_name(&candidate.new_name);
        warn!(path = %candidate.path.display(), target = %target.display(), "name collision");
        skipped.push(candidate.into_planned(Some(SkipReason::NameCollision { target })));
    }

    ordered.extend(skipped);
    ordered
}
