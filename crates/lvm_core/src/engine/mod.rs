//! Availability and date-inheritance engine.
//!
//! # Responsibility
//! - Resolve effective due/defer dates over the task/project hierarchy.
//! - Classify availability with blocking reasons and select next actions.
//! - Plan tentative-assignment transitions for inbox items.
//!
//! # Invariants
//! - Pure computation over a caller-supplied snapshot: no I/O, no writes.
//! - `now` is always an explicit argument; the engine never reads a clock.
//! - Identical snapshot and `now` produce identical output.
//!
//! # See also
//! - `service::availability_service` for snapshot loading.

pub mod availability;
pub mod dates;
pub mod error;
pub mod hierarchy;
pub mod inbox;
pub mod next_actions;
pub mod sequential;
pub mod views;

pub use availability::{classify, Availability, BlockingReason};
pub use dates::DEFAULT_DUE_SOON_HOURS;
pub use error::{EngineError, EngineResult, HierarchyKind, OrphanPolicy};
pub use hierarchy::{propagate_project, DateResolver, EffectiveDates, ParentIndex, TaskSnapshot};
pub use next_actions::{first_available_in_project, select_next_actions};
pub use views::{evaluate, Evaluator, InboxStats, TaskView};

/// Per-request evaluation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationOptions {
    /// Look-ahead window for the due-soon view.
    pub due_soon_hours: i64,
    pub orphan_policy: OrphanPolicy,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            due_soon_hours: DEFAULT_DUE_SOON_HOURS,
            orphan_policy: OrphanPolicy::Ignore,
        }
    }
}
