//! Entry points for callers: preview a request, then apply the plan.

use crate::cancel::CancelFlag;
use crate::error::ReplaceError;
use crate::executor::{Executor, Filesystem, OsFs};
use crate::plan::Plan;
use crate::planner::build_plan_with_cancel;
use crate::report::Report;
use crate::request::ReplaceRequest;
use std::io;
use tracing::info;

/// Composes the planner and the executor.
///
/// The engine holds no state between calls: every preview produces a fresh
/// [`Plan`], and staleness is checked per action when a plan is applied.
#[derive(Debug, Clone, Default)]
pub struct Engine<F = OsFs> {
    executor: Executor<F>,
}

impl Engine<OsFs> {
    pub fn new() -> Self {
        Self {
            executor: Executor::new(),
        }
    }
}

impl<F: Filesystem> Engine<F> {
    /// Engine that applies plans through a custom [`Filesystem`].
    pub fn with_filesystem(fs: F) -> Self {
        Self {
            executor: Executor::with_filesystem(fs),
        }
    }

    /// Validate `request` and compute its plan. Nothing on disk changes.
    ///
    /// # Errors
    ///
    /// - [`ReplaceError::InvalidPattern`] if the search text is empty
    /// - [`ReplaceError::PathNotFound`] if the root does not exist
    /// - [`ReplaceError::UnsupportedRoot`] if the root is neither a file nor
    ///   a directory
    pub fn preview(&self, request: &ReplaceRequest) -> Result<Plan, ReplaceError> {
        self.preview_with_cancel(request, &CancelFlag::new())
    }

    pub fn preview_with_cancel(
        &self,
        request: &ReplaceRequest,
        cancel: &CancelFlag,
    ) -> Result<Plan, ReplaceError> {
        let request = validate(request)?;
        info!(
            root = %request.root.display(),
            search = %request.search,
            replace = %request.replace,
            "preview"
        );
        build_plan_with_cancel(&request, cancel)
    }

    pub fn apply(&self, plan: &Plan) -> Report {
        self.executor.apply(plan)
    }

    pub fn apply_with_cancel(&self, plan: &Plan, cancel: &CancelFlag) -> Report {
        self.executor.apply_with_cancel(plan, cancel)
    }

    /// Revert what `report` applied, e.g. after a cancelled apply.
    pub fn rollback(&self, report: &mut Report) {
        self.executor.rollback(report)
    }
}

/// Check the request and return a copy with a canonical root.
fn validate(request: &ReplaceRequest) -> Result<ReplaceRequest, ReplaceError> {
    if request.search.is_empty() {
        return Err(ReplaceError::InvalidPattern);
    }

    let root = request.root.canonicalize().map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ReplaceError::PathNotFound {
                path: request.root.clone(),
            }
        } else {
            ReplaceError::io(&request.root, source)
        }
    })?;

    if !root.is_file() && !root.is_dir() {
        return Err(ReplaceError::UnsupportedRoot { path: root });
    }

    let mut validated = request.clone();
    validated.root = root;
    Ok(validated)
}
