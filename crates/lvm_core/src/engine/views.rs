//! Per-task evaluation outputs and named result views.
//!
//! # Responsibility
//! - Combine resolver and classifier into one per-request evaluator.
//! - Produce the per-task output record consumed by callers.
//! - Derive overdue / due-soon / available / deferred views and inbox stats.
//!
//! # Invariants
//! - Due-date views sort by effective due ascending; defer-date views by
//!   effective defer ascending (no defer first), then canonical order.

use crate::engine::availability::{classify, Availability, BlockingReason};
use crate::engine::dates::{is_deferred, is_due_soon, is_overdue};
use crate::engine::error::EngineResult;
use crate::engine::hierarchy::{DateResolver, EffectiveDates, TaskSnapshot};
use crate::engine::EvaluationOptions;
use crate::model::task::{Task, TaskId, TaskStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Evaluation output for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskView {
    pub task_id: TaskId,
    pub effective_due_date: Option<i64>,
    pub effective_defer_date: Option<i64>,
    /// Whether the task itself carries a due date (as opposed to inheriting one).
    pub has_local_due_date: bool,
    pub has_local_defer_date: bool,
    pub is_available: bool,
    pub blocking_reasons: BTreeSet<BlockingReason>,
}

/// One evaluation request over a fixed snapshot.
pub struct Evaluator<'s, 'a> {
    snapshot: &'s TaskSnapshot<'a>,
    resolver: DateResolver<'s, 'a>,
    now: i64,
}

impl<'s, 'a> Evaluator<'s, 'a> {
    pub fn new(snapshot: &'s TaskSnapshot<'a>, now: i64) -> Self {
        Self {
            snapshot,
            resolver: DateResolver::new(snapshot),
            now,
        }
    }

    pub fn snapshot(&self) -> &'s TaskSnapshot<'a> {
        self.snapshot
    }

    pub fn effective_dates(&mut self, task: &Task) -> EngineResult<EffectiveDates> {
        self.resolver.resolve(task)
    }

    /// Resolves dates, then classifies against the owning project's tasks.
    pub fn availability(&mut self, task: &Task) -> EngineResult<Availability> {
        let dates = self.resolver.resolve(task)?;
        let project = self.snapshot.project_of(task)?;
        let siblings = match task.project_id {
            Some(project_id) => self.snapshot.project_tasks(project_id),
            None => &[],
        };
        Ok(classify(task, dates.defer, project, siblings, self.now))
    }

    pub fn view(&mut self, task: &Task) -> EngineResult<TaskView> {
        let dates = self.resolver.resolve(task)?;
        let availability = self.availability(task)?;
        Ok(TaskView {
            task_id: task.id,
            effective_due_date: dates.due,
            effective_defer_date: dates.defer,
            has_local_due_date: task.due_date.is_some(),
            has_local_defer_date: task.defer_date.is_some(),
            is_available: availability.is_available,
            blocking_reasons: availability.blocking_reasons,
        })
    }
}

/// Evaluates every task in the snapshot, in canonical order.
pub fn evaluate(snapshot: &TaskSnapshot<'_>, now: i64) -> EngineResult<Vec<TaskView>> {
    let mut evaluator = Evaluator::new(snapshot, now);
    snapshot
        .tasks()
        .iter()
        .map(|task| evaluator.view(task))
        .collect()
}

/// Active tasks whose effective due date is before `now`.
pub fn overdue(views: &[TaskView], snapshot: &TaskSnapshot<'_>, now: i64) -> Vec<TaskView> {
    let mut result = active_views(views, snapshot, |view| {
        is_overdue(view.effective_due_date, now)
    });
    sort_by_due(&mut result);
    result
}

/// Active tasks due within `options.due_soon_hours` after `now`.
pub fn due_soon(
    views: &[TaskView],
    snapshot: &TaskSnapshot<'_>,
    now: i64,
    options: &EvaluationOptions,
) -> Vec<TaskView> {
    let mut result = active_views(views, snapshot, |view| {
        is_due_soon(view.effective_due_date, now, options.due_soon_hours)
    });
    sort_by_due(&mut result);
    result
}

pub fn available(views: &[TaskView]) -> Vec<TaskView> {
    let mut result: Vec<TaskView> = views
        .iter()
        .filter(|view| view.is_available)
        .cloned()
        .collect();
    sort_by_defer(&mut result);
    result
}

/// Active tasks whose effective defer date is after `now`.
pub fn deferred(views: &[TaskView], snapshot: &TaskSnapshot<'_>, now: i64) -> Vec<TaskView> {
    let mut result = active_views(views, snapshot, |view| {
        is_deferred(view.effective_defer_date, now)
    });
    sort_by_defer(&mut result);
    result
}

fn active_views(
    views: &[TaskView],
    snapshot: &TaskSnapshot<'_>,
    predicate: impl Fn(&TaskView) -> bool,
) -> Vec<TaskView> {
    views
        .iter()
        .filter(|view| {
            snapshot
                .task(view.task_id)
                .is_some_and(|task| task.status == TaskStatus::Active)
        })
        .filter(|view| predicate(view))
        .cloned()
        .collect()
}

// Stable sorts keep canonical order among equal dates.
fn sort_by_due(views: &mut [TaskView]) {
    views.sort_by_key(|view| view.effective_due_date.unwrap_or(i64::MAX));
}

fn sort_by_defer(views: &mut [TaskView]) {
    views.sort_by_key(|view| view.effective_defer_date.unwrap_or(i64::MIN));
}

/// Inbox counters computed from tasks' own dates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxStats {
    pub total: u32,
    pub active: u32,
    pub available: u32,
    pub deferred: u32,
    pub completed: u32,
    pub flagged: u32,
    pub with_due_date: u32,
    pub overdue: u32,
}

/// Counts inbox items (no project, no parent) in `tasks`.
pub fn inbox_stats<'t>(tasks: impl IntoIterator<Item = &'t Task>, now: i64) -> InboxStats {
    let mut stats = InboxStats::default();
    for task in tasks.into_iter().filter(|task| task.is_inbox()) {
        stats.total += 1;
        match task.status {
            TaskStatus::Completed => stats.completed += 1,
            TaskStatus::Dropped => {}
            TaskStatus::Active => {
                stats.active += 1;
                if is_deferred(task.defer_date, now) {
                    stats.deferred += 1;
                } else {
                    stats.available += 1;
                }
                if task.flagged {
                    stats.flagged += 1;
                }
                if task.due_date.is_some() {
                    stats.with_due_date += 1;
                }
                if is_overdue(task.due_date, now) {
                    stats.overdue += 1;
                }
            }
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::{available, deferred, due_soon, evaluate, inbox_stats, overdue};
    use crate::engine::availability::BlockingReason;
    use crate::engine::error::OrphanPolicy;
    use crate::engine::hierarchy::TaskSnapshot;
    use crate::engine::EvaluationOptions;
    use crate::model::project::{Project, ProjectType};
    use crate::model::task::Task;

    const HOUR: i64 = 60 * 60 * 1000;
    const NOW: i64 = 1_000 * HOUR;

    #[test]
    fn views_report_local_and_inherited_dates() {
        let mut project = Project::new("p", ProjectType::Parallel, 0);
        project.due_date = Some(NOW + 10 * HOUR);
        let mut task = Task::new("t", 0);
        task.project_id = Some(project.id);
        task.defer_date = Some(NOW + HOUR);

        let tasks = vec![task.clone()];
        let projects = vec![project];
        let snapshot = TaskSnapshot::new(&tasks, &projects, OrphanPolicy::Ignore);
        let views = evaluate(&snapshot, NOW).unwrap();

        assert_eq!(views.len(), 1);
        let view = &views[0];
        assert_eq!(view.task_id, task.id);
        assert_eq!(view.effective_due_date, Some(NOW + 10 * HOUR));
        assert!(!view.has_local_due_date);
        assert_eq!(view.effective_defer_date, Some(NOW + HOUR));
        assert!(view.has_local_defer_date);
        assert!(!view.is_available);
        assert!(view.blocking_reasons.contains(&BlockingReason::Deferred));
    }

    #[test]
    fn named_views_filter_and_sort() {
        let mut late = Task::new("late", 0);
        late.due_date = Some(NOW - HOUR);
        let mut later = Task::new("later", 0);
        later.due_date = Some(NOW - 5 * HOUR);
        let mut soon = Task::new("soon", 0);
        soon.due_date = Some(NOW + 48 * HOUR);
        let mut far = Task::new("far", 0);
        far.due_date = Some(NOW + 49 * HOUR);
        let mut waiting = Task::new("waiting", 0);
        waiting.defer_date = Some(NOW + 3 * HOUR);
        let mut done = Task::new("done", 0);
        done.due_date = Some(NOW - HOUR);
        done.complete(NOW);

        let tasks = vec![
            late.clone(),
            later.clone(),
            soon.clone(),
            far.clone(),
            waiting.clone(),
            done,
        ];
        let snapshot = TaskSnapshot::new(&tasks, &[], OrphanPolicy::Ignore);
        let views = evaluate(&snapshot, NOW).unwrap();

        let ids = |views: Vec<super::TaskView>| views.into_iter().map(|v| v.task_id).collect::<Vec<_>>();
        assert_eq!(ids(overdue(&views, &snapshot, NOW)), vec![later.id, late.id]);
        assert_eq!(
            ids(due_soon(&views, &snapshot, NOW, &EvaluationOptions::default())),
            vec![soon.id]
        );
        assert_eq!(ids(deferred(&views, &snapshot, NOW)), vec![waiting.id]);

        let available_ids = ids(available(&views));
        assert_eq!(available_ids.len(), 4);
        assert!(!available_ids.contains(&waiting.id));
        assert!(available_ids.contains(&far.id));
    }

    #[test]
    fn inbox_stats_count_only_inbox_items() {
        let mut flagged = Task::new("flagged", 0);
        flagged.flagged = true;
        flagged.due_date = Some(NOW - HOUR);
        let mut deferred_item = Task::new("deferred", 0);
        deferred_item.defer_date = Some(NOW + HOUR);
        let mut done = Task::new("done", 0);
        done.complete(NOW);
        let mut filed = Task::new("filed", 0);
        filed.project_id = Some(uuid::Uuid::new_v4());

        let stats = inbox_stats(&[flagged, deferred_item, done, filed], NOW);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.active, 2);
        assert_eq!(stats.available, 1);
        assert_eq!(stats.deferred, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.flagged, 1);
        assert_eq!(stats.with_due_date, 1);
        assert_eq!(stats.overdue, 1);
    }
}
