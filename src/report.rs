use crate::plan::{Action, PlanNote, SkipReason};
use serde::Serialize;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Classification of an OS-level failure during apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    PermissionDenied,
    PathNotFound,
    Io,
}

impl From<io::ErrorKind> for FailureKind {
    fn from(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::PermissionDenied => FailureKind::PermissionDenied,
            io::ErrorKind::NotFound => FailureKind::PathNotFound,
            _ => FailureKind::Io,
        }
    }
}

/// What happened to one planned action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Applied,
    Skipped { reason: SkipReason },
    Failed { kind: FailureKind, error: String },
    /// Applied, then reverted after a later failure or on request.
    RolledBack,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Applied => write!(f, "applied"),
            Outcome::Skipped { reason } => write!(f, "skipped ({reason})"),
            Outcome::Failed { error, .. } => write!(f, "failed: {error}"),
            Outcome::RolledBack => write!(f, "rolled back"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    pub action: Action,
    pub outcome: Outcome,
}

/// A reversal that could not be completed during rollback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackFailure {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportCounts {
    pub applied: usize,
    /// Skipped actions plus plan notes.
    pub skipped: usize,
    pub failed: usize,
    pub rolled_back: usize,
}

/// Result of applying a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    /// One entry per planned action, in plan order.
    pub entries: Vec<ReportEntry>,
    /// Limitations carried over from the plan (e.g. binary files).
    pub notes: Vec<PlanNote>,
    pub rollback_failures: Vec<RollbackFailure>,
    /// True only when every non-skipped action was applied and the run
    /// was neither cancelled nor rolled back.
    pub committed: bool,
    pub cancelled: bool,
}

impl Report {
    pub fn counts(&self) -> ReportCounts {
        let mut counts = ReportCounts {
            skipped: self.notes.len(),
            ..ReportCounts::default()
        };
        for entry in &self.entries {
            match entry.outcome {
                Outcome::Applied => counts.applied += 1,
                Outcome::Skipped { .. } => counts.skipped += 1,
                Outcome::Failed { .. } => counts.failed += 1,
                Outcome::RolledBack => counts.rolled_back += 1,
            }
        }
        counts
    }

    pub fn has_failures(&self) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(e.outcome, Outcome::Failed { .. }))
            || !self.rollback_failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rename(name: &str) -> Action {
        Action::RenameFile {
            path: PathBuf::from(name),
            new_name: "x".into(),
        }
    }

    #[test]
    fn test_counts() {
        let report = Report {
            entries: vec![
                ReportEntry {
                    action: rename("a"),
                    outcome: Outcome::Applied,
                },
                ReportEntry {
                    action: rename("b"),
                    outcome: Outcome::Skipped {
                        reason: SkipReason::Cancelled,
                    },
                },
                ReportEntry {
                    action: rename("c"),
                    outcome: Outcome::Failed {
                        kind: FailureKind::Io,
                        error: "disk full".into(),
                    },
                },
            ],
            notes: vec![PlanNote {
                path: PathBuf::from("blob"),
                reason: SkipReason::NotText,
            }],
            ..Report::default()
        };

        let counts = report.counts();
        assert_eq!(counts.applied, 1);
        assert_eq!(counts.skipped, 2);
        assert_eq!(counts.failed, 1);
        assert!(report.has_failures());
    }

    #[test]
    fn test_failure_kind_from_io() {
        assert_eq!(
            FailureKind::from(io::ErrorKind::PermissionDenied),
            FailureKind::PermissionDenied
        );
        assert_eq!(
            FailureKind::from(io::ErrorKind::NotFound),
            FailureKind::PathNotFound
        );
        assert_eq!(FailureKind::from(io::ErrorKind::Other), FailureKind::Io);
    }
}
