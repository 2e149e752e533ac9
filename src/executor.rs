//! Applies a [`Plan`] to disk, one action at a time, with rollback.
//!
//! # Safety
//!
//! - Actions run strictly in plan order
//! - Every action is re-validated against the plan's snapshot right before it
//!   runs; anything that changed is skipped as stale
//! - Renames are single `rename(2)` calls, rewrites go through
//!   tempfile + fsync + rename
//! - The first failure reverts everything this call applied, newest first

use crate::cancel::CancelFlag;
use crate::plan::{Action, Plan, PlannedAction, SkipReason, TextEncoding};
use crate::report::{FailureKind, Outcome, Report, ReportEntry, RollbackFailure};
use crate::safety::{RootGuard, SafetyError};
use std::borrow::Cow;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tracing::{info, warn};

/// The filesystem operations the executor needs.
///
/// [`OsFs`] is the real implementation; tests substitute their own to inject
/// failures.
pub trait Filesystem {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Metadata of the path itself, not following a final symlink.
    fn metadata(&self, path: &Path) -> io::Result<fs::Metadata>;

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Replace the file's content so that readers only ever observe the old
    /// or the new bytes.
    fn write_atomic(&self, path: &Path, content: &[u8]) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OsFs;

impl Filesystem for OsFs {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn metadata(&self, path: &Path) -> io::Result<fs::Metadata> {
        fs::symlink_metadata(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    /// Atomic file write: tempfile in the same directory + fsync + rename.
    /// The original file's permissions are carried over.
    fn write_atomic(&self, path: &Path, content: &[u8]) -> io::Result<()> {
        let parent = match path.parent() {
            Some(p) if p.as_os_str().is_empty() => Path::new("."),
            Some(p) => p,
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "Path has no parent directory",
                ))
            }
        };
        let permissions = fs::metadata(path).ok().map(|m| m.permissions());

        let mut temp = tempfile::NamedTempFile::new_in(parent)?;
        temp.write_all(content)?;
        temp.as_file().sync_all()?;
        if let Some(permissions) = permissions {
            temp.as_file().set_permissions(permissions)?;
        }
        temp.persist(path).map_err(|e| e.error)?;

        Ok(())
    }
}

/// Applies plans through a [`Filesystem`].
#[derive(Debug, Clone, Default)]
pub struct Executor<F = OsFs> {
    fs: F,
}

impl Executor<OsFs> {
    pub fn new() -> Self {
        Self { fs: OsFs }
    }
}

impl<F: Filesystem> Executor<F> {
    pub fn with_filesystem(fs: F) -> Self {
        Self { fs }
    }

    pub fn apply(&self, plan: &Plan) -> Report {
        self.apply_with_cancel(plan, &CancelFlag::new())
    }

    /// Apply `plan`, checking `cancel` between actions.
    ///
    /// A cancelled run leaves the applied prefix in place; the caller decides
    /// whether to [`rollback`](Self::rollback) it.
    pub fn apply_with_cancel(&self, plan: &Plan, cancel: &CancelFlag) -> Report {
        let mut report = Report {
            notes: plan.notes().to_vec(),
            ..Report::default()
        };
        let guard = RootGuard::new(plan.scope_dir());
        let actions = plan.actions();

        for (index, planned) in actions.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(remaining = actions.len() - index, "apply cancelled");
                report.cancelled = true;
                skip_all(&mut report, &actions[index..], SkipReason::Cancelled);
                break;
            }

            let action = &planned.action;
            if let Some(reason) = &planned.skip {
                warn!(%action, %reason, "skipped");
                report.entries.push(ReportEntry {
                    action: action.clone(),
                    outcome: Outcome::Skipped {
                        reason: reason.clone(),
                    },
                });
                continue;
            }

            let outcome = match self.prepare(action, &guard) {
                Ok(None) => match self.perform(action) {
                    Ok(()) => {
                        info!(%action, "applied");
                        Outcome::Applied
                    }
                    Err(err) => failure(action, err),
                },
                Ok(Some(reason)) => {
                    warn!(%action, %reason, "skipped");
                    Outcome::Skipped { reason }
                }
                Err(err) => failure(action, err),
            };

            let failed = matches!(outcome, Outcome::Failed { .. });
            report.entries.push(ReportEntry {
                action: action.clone(),
                outcome,
            });

            if failed {
                self.rollback_entries(&mut report);
                skip_all(&mut report, &actions[index + 1..], SkipReason::NotAttempted);
                break;
            }
        }

        report.committed = !report.cancelled
            && !report.has_failures()
            && !report
                .entries
                .iter()
                .any(|e| e.outcome == Outcome::RolledBack);

        let counts = report.counts();
        info!(
            committed = report.committed,
            applied = counts.applied,
            skipped = counts.skipped,
            failed = counts.failed,
            rolled_back = counts.rolled_back,
            "apply finished"
        );
        report
    }

    /// Revert every applied entry of `report`, newest first. Failures are
    /// recorded in the report and do not stop the remaining reversals.
    pub fn rollback(&self, report: &mut Report) {
        self.rollback_entries(report);
        report.committed = false;
    }

    fn rollback_entries(&self, report: &mut Report) {
        for entry in report.entries.iter_mut().rev() {
            if entry.outcome != Outcome::Applied {
                continue;
            }
            match self.undo(&entry.action) {
                Ok(()) => {
                    info!(action = %entry.action, "rolled back");
                    entry.outcome = Outcome::RolledBack;
                }
                Err(err) => {
                    warn!(action = %entry.action, error = %err, "rollback failed");
                    report.rollback_failures.push(RollbackFailure {
                        path: entry.action.path().to_path_buf(),
                        error: err.to_string(),
                    });
                }
            }
        }
    }

    /// Re-validate `action` against the current disk state.
    ///
    /// `Ok(Some(_))` means the action must be skipped; `Err` is a real failure.
    fn prepare(
        &self,
        action: &Action,
        guard: &Result<RootGuard, SafetyError>,
    ) -> io::Result<Option<SkipReason>> {
        let path = action.path();
        let meta = match self.fs.metadata(path) {
            Ok(meta) => meta,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(Some(stale(format!("{} no longer exists", path.display()))));
            }
            Err(err) => return Err(err),
        };

        match guard {
            Ok(guard) => {
                guard.check(path).map_err(|err| safety_error(&err))?;
            }
            Err(err) => return Err(safety_error(err)),
        }

        match action {
            Action::RenameFile { .. } | Action::RenameDir { .. } => {
                let wants_dir = matches!(action, Action::RenameDir { .. });
                if meta.is_dir() != wants_dir {
                    let expected = if wants_dir { "a directory" } else { "a file" };
                    return Ok(Some(stale(format!(
                        "{} is no longer {expected}",
                        path.display()
                    ))));
                }

                let Some(target) = action.target() else {
                    return Ok(None);
                };
                match self.fs.metadata(&target) {
                    Ok(existing) if is_case_only_rename(path, &meta, &target, &existing) => {}
                    Ok(_) => return Ok(Some(SkipReason::NameCollision { target })),
                    Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                    Err(err) => return Err(err),
                }
            }
            Action::RewriteContent { original, .. } => {
                if !meta.is_file() {
                    return Ok(Some(stale(format!(
                        "{} is no longer a regular file",
                        path.display()
                    ))));
                }
                let current = self.fs.read(path)?;
                if !original.matches(&current) {
                    return Ok(Some(stale(format!(
                        "{} changed since preview",
                        path.display()
                    ))));
                }
            }
        }

        Ok(None)
    }

    fn perform(&self, action: &Action) -> io::Result<()> {
        match action {
            Action::RenameFile { path, .. } | Action::RenameDir { path, .. } => {
                let target = action.target().unwrap_or_else(|| path.clone());
                self.fs.rename(path, &target)
            }
            Action::RewriteContent {
                path,
                new_content,
                encoding,
                ..
            } => self.fs.write_atomic(path, &encoded(new_content, *encoding)?),
        }
    }

    fn undo(&self, action: &Action) -> io::Result<()> {
        match action {
            Action::RenameFile { path, .. } | Action::RenameDir { path, .. } => {
                let target = action.target().unwrap_or_else(|| path.clone());
                self.fs.rename(&target, path)
            }
            Action::RewriteContent {
                path,
                original_content,
                encoding,
                ..
            } => self.fs.write_atomic(path, &encoded(original_content, *encoding)?),
        }
    }
}

fn skip_all(report: &mut Report, rest: &[PlannedAction], reason: SkipReason) {
    report
        .entries
        .extend(rest.iter().map(|planned| ReportEntry {
            action: planned.action.clone(),
            outcome: Outcome::Skipped {
                reason: planned.skip.clone().unwrap_or_else(|| reason.clone()),
            },
        }));
}

fn encoded(text: &str, encoding: TextEncoding) -> io::Result<Cow<'_, [u8]>> {
    encoding.encode(text).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("text cannot be encoded as {}", encoding.name()),
        )
    })
}

fn stale(detail: String) -> SkipReason {
    SkipReason::Stale { detail }
}

fn failure(action: &Action, err: io::Error) -> Outcome {
    warn!(%action, error = %err, "failed");
    Outcome::Failed {
        kind: FailureKind::from(err.kind()),
        error: err.to_string(),
    }
}

fn safety_error(err: &SafetyError) -> io::Error {
    let kind = match err {
        SafetyError::Canonicalize(source) => source.kind(),
        SafetyError::OutsideRoot { .. } | SafetyError::NoParent(_) => {
            io::ErrorKind::PermissionDenied
        }
    };
    io::Error::new(kind, err.to_string())
}

/// A case-only rename on a case-insensitive filesystem sees its own source
/// as the existing target. Any other entry at the target is a collision,
/// including a case variant created by someone else on a case-sensitive
/// filesystem.
fn is_case_only_rename(
    path: &Path,
    source: &fs::Metadata,
    target: &Path,
    existing: &fs::Metadata,
) -> bool {
    same_name_ignoring_case(path, target) && is_same_entry(path, source, target, existing)
}

fn same_name_ignoring_case(path: &Path, target: &Path) -> bool {
    match (path.file_name(), target.file_name()) {
        (Some(a), Some(b)) => {
            a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase()
        }
        _ => false,
    }
}

#[cfg(unix)]
fn is_same_entry(_: &Path, source: &fs::Metadata, _: &Path, existing: &fs::Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;

    source.dev() == existing.dev() && source.ino() == existing.ino()
}

#[cfg(not(unix))]
fn is_same_entry(path: &Path, _: &fs::Metadata, target: &Path, _: &fs::Metadata) -> bool {
    match (fs::canonicalize(path), fs::canonicalize(target)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
