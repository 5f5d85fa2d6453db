//! Tentative-assignment transitions for inbox items.
//!
//! # Responsibility
//! - Guard `Unassigned -> TentativelyAssigned -> Resolved` transitions.
//! - Plan clean-up resolutions without touching storage.
//!
//! # Invariants
//! - Only inbox items (no project, no parent) can hold or change a tentative target.
//! - Resolving always clears the tentative target.
//! - A parent-task target resolves to that parent's current project, even when it is `None`.
//!
//! # See also
//! - `service::inbox_service` for the persisted versions of these transitions.

use crate::engine::error::{EngineError, EngineResult, HierarchyKind, OrphanPolicy};
use crate::model::project::ProjectId;
use crate::model::task::{Task, TaskId, TentativeTarget};
use log::warn;
use std::collections::HashMap;

/// Real assignment produced for one inbox item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub task_id: TaskId,
    pub project_id: Option<ProjectId>,
    pub parent_task_id: Option<TaskId>,
}

fn ensure_inbox(task: &Task) -> EngineResult<()> {
    if task.is_inbox() {
        Ok(())
    } else {
        Err(EngineError::NotInInbox(task.id))
    }
}

/// Replaces (or clears, with `None`) the tentative target of an inbox item.
///
/// Setting the same target twice is a no-op and leaves `modified_at` alone.
pub fn set_tentative(
    task: &mut Task,
    target: Option<TentativeTarget>,
    now: i64,
) -> EngineResult<()> {
    ensure_inbox(task)?;
    if target == Some(TentativeTarget::ParentTask(task.id)) {
        return Err(EngineError::CyclicHierarchy {
            kind: HierarchyKind::Task,
            node: task.id,
        });
    }
    if task.tentative != target {
        task.tentative = target;
        task.modified_at = now;
    }
    Ok(())
}

/// Plans resolutions for every active inbox item holding a tentative target.
///
/// Items are independent, so the output follows input order. A parent target
/// that is missing from `tasks` is skipped under [`OrphanPolicy::Ignore`].
pub fn plan_reconciliation(tasks: &[Task], policy: OrphanPolicy) -> EngineResult<Vec<Resolution>> {
    let by_id: HashMap<TaskId, &Task> = tasks.iter().map(|task| (task.id, task)).collect();
    let mut plan = Vec::new();

    for task in tasks {
        if !task.is_active() || !task.is_inbox() {
            continue;
        }
        let Some(target) = task.tentative else {
            continue;
        };
        match target {
            TentativeTarget::Project(project_id) => plan.push(Resolution {
                task_id: task.id,
                project_id: Some(project_id),
                parent_task_id: None,
            }),
            TentativeTarget::ParentTask(parent_id) => match by_id.get(&parent_id) {
                Some(parent) => plan.push(Resolution {
                    task_id: task.id,
                    project_id: parent.project_id,
                    parent_task_id: Some(parent_id),
                }),
                None => match policy {
                    OrphanPolicy::Ignore => warn!(
                        "event=inbox_reconcile module=engine status=skipped task_id={} missing_parent={}",
                        task.id, parent_id
                    ),
                    OrphanPolicy::Reject => {
                        return Err(EngineError::OrphanedReference {
                            kind: HierarchyKind::Task,
                            from: task.id,
                            missing: parent_id,
                        })
                    }
                },
            },
        }
    }

    Ok(plan)
}

/// Applies a planned resolution and clears the tentative target.
pub fn apply_resolution(task: &mut Task, resolution: &Resolution, now: i64) {
    task.project_id = resolution.project_id;
    task.parent_task_id = resolution.parent_task_id;
    task.tentative = None;
    task.modified_at = now;
}

/// Files an inbox item into `project_id` immediately.
pub fn process_to_project(
    task: &mut Task,
    project_id: ProjectId,
    position: Option<i64>,
    now: i64,
) -> EngineResult<()> {
    ensure_inbox(task)?;
    let resolution = Resolution {
        task_id: task.id,
        project_id: Some(project_id),
        parent_task_id: None,
    };
    apply_resolution(task, &resolution, now);
    task.order = position.unwrap_or(0);
    Ok(())
}

/// Files an inbox item under `parent`, inheriting the parent's project.
pub fn process_to_task(
    task: &mut Task,
    parent: &Task,
    position: Option<i64>,
    now: i64,
) -> EngineResult<()> {
    ensure_inbox(task)?;
    if parent.id == task.id {
        return Err(EngineError::CyclicHierarchy {
            kind: HierarchyKind::Task,
            node: task.id,
        });
    }
    let resolution = Resolution {
        task_id: task.id,
        project_id: parent.project_id,
        parent_task_id: Some(parent.id),
    };
    apply_resolution(task, &resolution, now);
    task.order = position.unwrap_or(0);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        apply_resolution, plan_reconciliation, process_to_project, process_to_task,
        set_tentative, Resolution,
    };
    use crate::engine::error::{EngineError, OrphanPolicy};
    use crate::model::task::{InboxState, Task, TentativeTarget};
    use uuid::Uuid;

    #[test]
    fn set_tentative_replaces_previous_target_and_is_idempotent() {
        let mut task = Task::new("inbox item", 0);
        let project = Uuid::new_v4();
        let parent = Uuid::new_v4();

        set_tentative(&mut task, Some(TentativeTarget::Project(project)), 1).unwrap();
        set_tentative(&mut task, Some(TentativeTarget::ParentTask(parent)), 2).unwrap();
        assert_eq!(
            task.inbox_state(),
            InboxState::TentativelyAssigned(TentativeTarget::ParentTask(parent))
        );
        assert_eq!(task.modified_at, 2);

        set_tentative(&mut task, Some(TentativeTarget::ParentTask(parent)), 3).unwrap();
        assert_eq!(task.modified_at, 2);
        assert!(task.project_id.is_none());

        set_tentative(&mut task, None, 4).unwrap();
        assert_eq!(task.inbox_state(), InboxState::Unassigned);
    }

    #[test]
    fn set_tentative_rejects_filed_tasks_and_self_targets() {
        let mut filed = Task::new("filed", 0);
        filed.project_id = Some(Uuid::new_v4());
        assert_eq!(
            set_tentative(&mut filed, None, 1),
            Err(EngineError::NotInInbox(filed.id))
        );

        let mut task = Task::new("self", 0);
        let target = Some(TentativeTarget::ParentTask(task.id));
        assert!(set_tentative(&mut task, target, 1).is_err());
        assert!(task.tentative.is_none());
    }

    #[test]
    fn reconciliation_inherits_parent_project_even_when_null() {
        let project = Uuid::new_v4();
        let mut filed_parent = Task::new("filed parent", 0);
        filed_parent.project_id = Some(project);
        let loose_parent = Task::new("loose parent", 0);

        let mut under_filed = Task::new("a", 0);
        under_filed.tentative = Some(TentativeTarget::ParentTask(filed_parent.id));
        let mut under_loose = Task::new("b", 0);
        under_loose.tentative = Some(TentativeTarget::ParentTask(loose_parent.id));
        let mut to_project = Task::new("c", 0);
        to_project.tentative = Some(TentativeTarget::Project(project));
        let untouched = Task::new("d", 0);

        let tasks = vec![
            filed_parent.clone(),
            loose_parent.clone(),
            under_filed.clone(),
            under_loose.clone(),
            to_project.clone(),
            untouched,
        ];
        let plan = plan_reconciliation(&tasks, OrphanPolicy::Ignore).unwrap();

        assert_eq!(
            plan,
            vec![
                Resolution {
                    task_id: under_filed.id,
                    project_id: Some(project),
                    parent_task_id: Some(filed_parent.id),
                },
                Resolution {
                    task_id: under_loose.id,
                    project_id: None,
                    parent_task_id: Some(loose_parent.id),
                },
                Resolution {
                    task_id: to_project.id,
                    project_id: Some(project),
                    parent_task_id: None,
                },
            ]
        );
    }

    #[test]
    fn reconciliation_skips_finished_items() {
        let mut done = Task::new("done", 0);
        done.tentative = Some(TentativeTarget::Project(Uuid::new_v4()));
        done.complete(1);
        assert!(plan_reconciliation(&[done], OrphanPolicy::Ignore)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn missing_tentative_parent_follows_policy() {
        let mut task = Task::new("orphan", 0);
        task.tentative = Some(TentativeTarget::ParentTask(Uuid::new_v4()));
        let tasks = vec![task];

        assert!(plan_reconciliation(&tasks, OrphanPolicy::Ignore)
            .unwrap()
            .is_empty());
        assert!(matches!(
            plan_reconciliation(&tasks, OrphanPolicy::Reject),
            Err(EngineError::OrphanedReference { .. })
        ));
    }

    #[test]
    fn applying_resolution_reaches_resolved_state() {
        let project = Uuid::new_v4();
        let mut task = Task::new("item", 0);
        task.tentative = Some(TentativeTarget::Project(project));
        let resolution = Resolution {
            task_id: task.id,
            project_id: Some(project),
            parent_task_id: None,
        };
        apply_resolution(&mut task, &resolution, 9);

        assert_eq!(task.inbox_state(), InboxState::Resolved);
        assert!(task.tentative.is_none());
        assert_eq!(task.modified_at, 9);
        assert!(task.validate().is_ok());
    }

    #[test]
    fn processing_assigns_immediately_and_clears_target() {
        let project = Uuid::new_v4();
        let mut parent = Task::new("parent", 0);
        parent.project_id = Some(project);

        let mut item = Task::new("item", 0);
        item.tentative = Some(TentativeTarget::Project(Uuid::new_v4()));
        process_to_task(&mut item, &parent, Some(4), 1).unwrap();
        assert_eq!(item.parent_task_id, Some(parent.id));
        assert_eq!(item.project_id, Some(project));
        assert_eq!(item.order, 4);
        assert!(item.tentative.is_none());

        assert_eq!(
            process_to_project(&mut item, project, None, 2),
            Err(EngineError::NotInInbox(item.id))
        );

        let mut other = Task::new("other", 0);
        process_to_project(&mut other, project, None, 2).unwrap();
        assert_eq!(other.project_id, Some(project));
        assert_eq!(other.order, 0);
    }
}
