//! Next-action selection.
//!
//! # Responsibility
//! - Reduce available tasks to one per project plus every standalone task.
//!
//! # Invariants
//! - Encounter order is the canonical sibling order of the snapshot, so the
//!   result does not depend on how the caller ordered its input.
//! - Only active tasks are considered.

use crate::engine::error::EngineResult;
use crate::engine::hierarchy::TaskSnapshot;
use crate::engine::views::Evaluator;
use crate::model::project::ProjectId;
use crate::model::task::Task;
use log::debug;
use std::collections::HashSet;

/// Every available standalone task plus the first available task of each project.
pub fn select_next_actions<'a>(
    snapshot: &TaskSnapshot<'a>,
    now: i64,
) -> EngineResult<Vec<&'a Task>> {
    let mut evaluator = Evaluator::new(snapshot, now);
    let mut seen_projects: HashSet<ProjectId> = HashSet::new();
    let mut selected = Vec::new();

    for task in snapshot.tasks().iter().copied() {
        if !task.is_active() {
            continue;
        }
        if let Some(project_id) = task.project_id {
            if seen_projects.contains(&project_id) {
                continue;
            }
        }
        if !evaluator.availability(task)?.is_available {
            continue;
        }
        if let Some(project_id) = task.project_id {
            seen_projects.insert(project_id);
        }
        selected.push(task);
    }

    debug!(
        "event=next_actions module=engine status=ok candidates={} selected={}",
        snapshot.tasks().len(),
        selected.len()
    );
    Ok(selected)
}

/// First active task of `project_id`, in canonical order, that is available.
pub fn first_available_in_project<'a>(
    snapshot: &TaskSnapshot<'a>,
    project_id: ProjectId,
    now: i64,
) -> EngineResult<Option<&'a Task>> {
    let mut evaluator = Evaluator::new(snapshot, now);
    for task in snapshot.project_tasks(project_id).iter().copied() {
        if !task.is_active() {
            continue;
        }
        if evaluator.availability(task)?.is_available {
            return Ok(Some(task));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::{first_available_in_project, select_next_actions};
    use crate::engine::error::OrphanPolicy;
    use crate::engine::hierarchy::TaskSnapshot;
    use crate::model::project::{Project, ProjectStatus, ProjectType};
    use crate::model::task::Task;

    const NOW: i64 = 1_000_000;

    fn task_in(project: &Project, title: &str, order: i64) -> Task {
        let mut task = Task::new(title, 0);
        task.project_id = Some(project.id);
        task.order = order;
        task
    }

    #[test]
    fn project_contributes_only_its_lowest_ordered_available_task() {
        let project = Project::new("parallel", ProjectType::Parallel, 0);
        let second = task_in(&project, "second", 1);
        let first = task_in(&project, "first", 0);
        let standalone_a = Task::new("standalone a", 0);
        let standalone_b = Task::new("standalone b", 0);

        let tasks = vec![second, first.clone(), standalone_a.clone(), standalone_b.clone()];
        let projects = vec![project];
        let snapshot = TaskSnapshot::new(&tasks, &projects, OrphanPolicy::Ignore);

        let ids: Vec<_> = select_next_actions(&snapshot, NOW)
            .unwrap()
            .into_iter()
            .map(|task| task.id)
            .collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.contains(&first.id));
        assert!(ids.contains(&standalone_a.id));
        assert!(ids.contains(&standalone_b.id));
    }

    #[test]
    fn deferred_first_task_yields_next_available_in_parallel_project() {
        let project = Project::new("parallel", ProjectType::Parallel, 0);
        let mut first = task_in(&project, "first", 0);
        first.defer_date = Some(NOW + 1);
        let second = task_in(&project, "second", 1);

        let tasks = vec![first, second.clone()];
        let projects = vec![project.clone()];
        let snapshot = TaskSnapshot::new(&tasks, &projects, OrphanPolicy::Ignore);

        let selected = select_next_actions(&snapshot, NOW).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, second.id);
        assert_eq!(
            first_available_in_project(&snapshot, project.id, NOW)
                .unwrap()
                .map(|task| task.id),
            Some(second.id)
        );
    }

    #[test]
    fn held_project_contributes_nothing_and_deferred_standalone_is_excluded() {
        let mut project = Project::new("held", ProjectType::Parallel, 0);
        project.status = ProjectStatus::OnHold;
        let held_task = task_in(&project, "held", 0);
        let mut later = Task::new("later", 0);
        later.defer_date = Some(NOW + 1);

        let tasks = vec![held_task, later];
        let projects = vec![project];
        let snapshot = TaskSnapshot::new(&tasks, &projects, OrphanPolicy::Ignore);

        assert!(select_next_actions(&snapshot, NOW).unwrap().is_empty());
    }

    #[test]
    fn sequential_project_advances_after_completion() {
        let project = Project::new("sequential", ProjectType::Sequential, 0);
        let mut t1 = task_in(&project, "t1", 0);
        let t2 = task_in(&project, "t2", 1);

        let tasks = vec![t1.clone(), t2.clone()];
        let projects = vec![project.clone()];
        let snapshot = TaskSnapshot::new(&tasks, &projects, OrphanPolicy::Ignore);
        let first = first_available_in_project(&snapshot, project.id, NOW).unwrap();
        assert_eq!(first.map(|task| task.id), Some(t1.id));

        t1.complete(NOW);
        let tasks = vec![t1, t2.clone()];
        let snapshot = TaskSnapshot::new(&tasks, &projects, OrphanPolicy::Ignore);
        let first = first_available_in_project(&snapshot, project.id, NOW).unwrap();
        assert_eq!(first.map(|task| task.id), Some(t2.id));
    }

    #[test]
    fn empty_or_unknown_project_has_no_first_available() {
        let project = Project::new("empty", ProjectType::Parallel, 0);
        let projects = vec![project.clone()];
        let snapshot = TaskSnapshot::new(&[], &projects, OrphanPolicy::Ignore);
        assert!(first_available_in_project(&snapshot, project.id, NOW)
            .unwrap()
            .is_none());
        assert!(first_available_in_project(&snapshot, uuid::Uuid::new_v4(), NOW)
            .unwrap()
            .is_none());
    }

    #[test]
    fn orphaned_project_reference_follows_policy() {
        let missing = Project::new("gone", ProjectType::Sequential, 0);
        let orphan = task_in(&missing, "orphan", 0);
        let tasks = vec![orphan.clone()];

        let lenient = TaskSnapshot::new(&tasks, &[], OrphanPolicy::Ignore);
        let selected = select_next_actions(&lenient, NOW).unwrap();
        assert_eq!(selected.len(), 1);

        let strict = TaskSnapshot::new(&tasks, &[], OrphanPolicy::Reject);
        assert!(select_next_actions(&strict, NOW).is_err());
    }
}
