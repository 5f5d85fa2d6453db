//! Availability classification with independent blocking reasons.
//!
//! # Invariants
//! - Every applicable reason is reported, not just the first.
//! - A task that is not `Active` is never available and carries no reasons.
//! - A defer instant equal to `now` does not block.

use crate::engine::dates::is_deferred;
use crate::engine::sequential::is_blocked_by_sequential;
use crate::model::project::{Project, ProjectStatus};
use crate::model::task::Task;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Why a task cannot be acted on right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockingReason {
    /// Effective defer date is after `now`.
    Deferred,
    /// Owning project is not active.
    ProjectOnHold,
    /// Owning project's own defer date is after `now`.
    ProjectDeferred,
    /// A lower-ordered active sibling exists in a sequential project.
    Sequential,
    /// Reserved for blocked-parent propagation; not produced yet.
    ParentBlocked,
}

impl BlockingReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deferred => "deferred",
            Self::ProjectOnHold => "project_on_hold",
            Self::ProjectDeferred => "project_deferred",
            Self::Sequential => "sequential",
            Self::ParentBlocked => "parent_blocked",
        }
    }
}

/// Classification result for one task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub is_available: bool,
    pub blocking_reasons: BTreeSet<BlockingReason>,
}

/// True for every project status except `Active`; `None` (no project) never blocks.
pub fn is_project_blocking(status: Option<ProjectStatus>) -> bool {
    matches!(status, Some(status) if status != ProjectStatus::Active)
}

/// Active and not deferred past `now` by the project's own defer date.
pub fn is_project_available(project: &Project, now: i64) -> bool {
    project.is_active() && !is_deferred(project.defer_date, now)
}

/// Classifies `task` against its effective defer date, project and siblings.
pub fn classify(
    task: &Task,
    effective_defer: Option<i64>,
    project: Option<&Project>,
    siblings: &[&Task],
    now: i64,
) -> Availability {
    if !task.is_active() {
        return Availability::default();
    }

    let mut reasons = BTreeSet::new();
    if is_deferred(effective_defer, now) {
        reasons.insert(BlockingReason::Deferred);
    }
    if let Some(project) = project {
        if is_project_blocking(Some(project.status)) {
            reasons.insert(BlockingReason::ProjectOnHold);
        }
        if is_deferred(project.defer_date, now) {
            reasons.insert(BlockingReason::ProjectDeferred);
        }
    }
    if is_blocked_by_sequential(task, project.map(|project| project.kind), siblings) {
        reasons.insert(BlockingReason::Sequential);
    }

    Availability {
        is_available: reasons.is_empty(),
        blocking_reasons: reasons,
    }
}
