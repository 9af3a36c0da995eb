//! Conflict resolution before enqueue.
//!
//! Checks a candidate job's install root and name against the filesystem and
//! against every in-memory job, and turns problems into decision requests that
//! are answered one at a time, front to back.

mod decision;
mod resolve;

pub use decision::{
    DecisionError, DecisionId, DecisionQueue, PendingDecision, Resolution, ResolutionAction,
    ResolutionStyle, Severity, TITLE_ALREADY_EXISTS, TITLE_INVALID_ROOT,
};
pub use resolve::{check_conflict, mod_exists, rename_until_free, root_is_valid, ConflictCheck};
