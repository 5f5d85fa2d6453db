//! Sequential-project ordering gate and canonical sibling ordering.

use crate::model::project::ProjectType;
use crate::model::task::{Task, TaskStatus};
use std::cmp::Ordering;

/// Canonical sibling order: `order` ascending, then newest first, then id.
///
/// Every ordering operation in the crate (engine and SQL) uses this key.
pub fn sibling_order(left: &Task, right: &Task) -> Ordering {
    left.order
        .cmp(&right.order)
        .then_with(|| right.created_at.cmp(&left.created_at))
        .then_with(|| left.id.cmp(&right.id))
}

/// Returns whether sequential ordering blocks `task`.
///
/// Only active siblings in the same project take part, so finishing the
/// first task promotes the next one.
pub fn is_blocked_by_sequential(
    task: &Task,
    project_type: Option<ProjectType>,
    siblings: &[&Task],
) -> bool {
    let Some(project_id) = task.project_id else {
        return false;
    };
    if project_type != Some(ProjectType::Sequential) {
        return false;
    }

    let first = siblings
        .iter()
        .copied()
        .filter(|sibling| {
            sibling.project_id == Some(project_id) && sibling.status == TaskStatus::Active
        })
        .min_by(|left, right| sibling_order(left, right));

    match first {
        Some(first) => first.id != task.id,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::is_blocked_by_sequential;
    use crate::model::project::ProjectType;
    use crate::model::task::{Task, TaskStatus};
    use uuid::Uuid;

    fn task_in(project_id: Uuid, order: i64, status: TaskStatus) -> Task {
        let mut task = Task::new(format!("task {order}"), 0);
        task.project_id = Some(project_id);
        task.order = order;
        task.status = status;
        task
    }

    #[test]
    fn task_without_project_is_never_blocked() {
        let task = Task::new("loose", 0);
        assert!(!is_blocked_by_sequential(&task, Some(ProjectType::Sequential), &[]));
    }

    #[test]
    fn parallel_and_single_action_projects_never_block() {
        let project = Uuid::new_v4();
        let first = task_in(project, 0, TaskStatus::Active);
        let second = task_in(project, 1, TaskStatus::Active);
        let siblings = [&first, &second];
        assert!(!is_blocked_by_sequential(&second, Some(ProjectType::Parallel), &siblings));
        assert!(!is_blocked_by_sequential(
            &second,
            Some(ProjectType::SingleActions),
            &siblings
        ));
    }

    #[test]
    fn only_first_active_sibling_is_unblocked() {
        let project = Uuid::new_v4();
        let t0 = task_in(project, 0, TaskStatus::Active);
        let t1 = task_in(project, 1, TaskStatus::Active);
        let t2 = task_in(project, 2, TaskStatus::Active);
        let siblings = [&t2, &t0, &t1];
        let kind = Some(ProjectType::Sequential);

        assert!(!is_blocked_by_sequential(&t0, kind, &siblings));
        assert!(is_blocked_by_sequential(&t1, kind, &siblings));
        assert!(is_blocked_by_sequential(&t2, kind, &siblings));
    }

    #[test]
    fn completing_first_promotes_second_only() {
        let project = Uuid::new_v4();
        let mut t0 = task_in(project, 0, TaskStatus::Active);
        let t1 = task_in(project, 1, TaskStatus::Active);
        let t2 = task_in(project, 2, TaskStatus::Active);
        t0.complete(1);
        let siblings = [&t0, &t1, &t2];
        let kind = Some(ProjectType::Sequential);

        assert!(!is_blocked_by_sequential(&t1, kind, &siblings));
        assert!(is_blocked_by_sequential(&t2, kind, &siblings));
    }

    #[test]
    fn dropped_and_completed_siblings_never_count_as_first() {
        let project = Uuid::new_v4();
        let dropped = task_in(project, 0, TaskStatus::Dropped);
        let completed = task_in(project, 1, TaskStatus::Completed);
        let active = task_in(project, 5, TaskStatus::Active);
        let siblings = [&dropped, &completed, &active];
        assert!(!is_blocked_by_sequential(
            &active,
            Some(ProjectType::Sequential),
            &siblings
        ));
    }

    #[test]
    fn siblings_from_other_projects_are_ignored() {
        let project = Uuid::new_v4();
        let other = task_in(Uuid::new_v4(), -1, TaskStatus::Active);
        let mine = task_in(project, 3, TaskStatus::Active);
        assert!(!is_blocked_by_sequential(
            &mine,
            Some(ProjectType::Sequential),
            &[&other, &mine]
        ));
    }

    #[test]
    fn equal_order_breaks_tie_by_newest_first() {
        let project = Uuid::new_v4();
        let mut older = task_in(project, 0, TaskStatus::Active);
        older.created_at = 10;
        let mut newer = task_in(project, 0, TaskStatus::Active);
        newer.created_at = 20;
        let siblings = [&older, &newer];
        let kind = Some(ProjectType::Sequential);

        assert!(!is_blocked_by_sequential(&newer, kind, &siblings));
        assert!(is_blocked_by_sequential(&older, kind, &siblings));
    }
}
