//! Bulk Replace: search-and-replace across file names and file contents
//!
//! Walks a directory tree (or a single file), finds a literal search text in
//! entry names and text content, and renames or rewrites what matches. Every
//! change is previewed first as an immutable [`Plan`]; applying it yields a
//! [`Report`].
//!
//! # Architecture
//!
//! - [`matcher`]: pure literal matching with case folding and whole-word
//!   boundaries, spans in characters
//! - [`planner`]: read-only traversal producing an ordered [`Plan`]
//! - [`executor`]: applies a plan with per-action staleness checks and
//!   rollback on failure
//! - [`engine`]: the `preview` / `apply` pair that callers use
//!
//! # Safety
//!
//! - Content rewrites are atomic (tempfile + fsync + rename)
//! - Renames run deepest-first, after all content rewrites
//! - Planned targets that already exist are never overwritten
//! - Anything that changed between preview and apply is skipped as stale
//! - A failed action rolls back everything applied before it
//!
//! # Example
//!
//! ```no_run
//! use bulk_replace::{Engine, ReplaceRequest};
//!
//! let engine = Engine::new();
//! let plan = engine.preview(&ReplaceRequest::new("./docs", "colour", "color"))?;
//! for rename in plan.summary().renames {
//!     println!("{} -> {}", rename.from.display(), rename.to.display());
//! }
//!
//! let report = engine.apply(&plan);
//! assert!(report.committed);
//! # Ok::<(), bulk_replace::ReplaceError>(())
//! ```

pub mod cancel;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod matcher;
pub mod plan;
pub mod planner;
pub mod report;
pub mod request;
pub mod safety;

// Re-exports
pub use cancel::CancelFlag;
pub use config::{load_from_path, load_from_str, ConfigError, JobConfig};
pub use engine::Engine;
pub use error::ReplaceError;
pub use executor::{Executor, Filesystem, OsFs};
pub use matcher::{count_matches, find_matches, replace_all, MatchSpan};
pub use plan::{
    Action, Fingerprint, LinePreview, Plan, PlanNote, PlanSummary, PlannedAction, RenamePreview,
    SkipReason, TextEncoding,
};
pub use planner::{build_plan, build_plan_with_cancel};
pub use report::{FailureKind, Outcome, Report, ReportCounts, ReportEntry, RollbackFailure};
pub use request::{MatchOptions, ReplaceRequest, ScanFilter};
pub use safety::{RootGuard, SafetyError};
