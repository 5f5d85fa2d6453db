//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Load snapshots for the engine and persist what it plans.
//!
//! # Invariants
//! - Services own every mutation; the engine never writes.
//! - `now` is a caller-supplied argument, never read from a clock here.
//! - A task that changes project takes its whole subtask tree along.

pub mod availability_service;
pub mod capture_service;
pub mod folder_service;
pub mod inbox_service;
pub mod project_service;
pub mod tag_service;
pub mod task_service;

use crate::engine::{propagate_project, EngineError};
use crate::model::task::{Task, TaskId};
use crate::repo::task_repo::{TaskListQuery, TaskRepository};
use crate::repo::RepoError;
use log::debug;
use std::collections::HashSet;

/// Writes `moved` and every subtask whose project follows from them, in one
/// transaction. Returns the moved tasks as stored.
pub(crate) fn save_moved_tasks<T, E>(tasks: &T, moved: Vec<Task>, now: i64) -> Result<Vec<Task>, E>
where
    T: TaskRepository,
    E: From<RepoError> + From<EngineError>,
{
    if moved.is_empty() {
        return Ok(moved);
    }
    let moved_ids: Vec<TaskId> = moved.iter().map(|task| task.id).collect();
    let mut all_tasks = tasks.list_tasks(&TaskListQuery::default())?;
    for task in moved {
        match all_tasks.iter().position(|stored| stored.id == task.id) {
            Some(position) => all_tasks[position] = task,
            None => all_tasks.push(task),
        }
    }
    let rewritten = propagate_project(&mut all_tasks, &moved_ids, now)?;

    let mut write_ids: HashSet<TaskId> = moved_ids.iter().copied().collect();
    write_ids.extend(rewritten.iter().copied());
    let writes: Vec<Task> = all_tasks
        .iter()
        .filter(|task| write_ids.contains(&task.id))
        .cloned()
        .collect();
    tasks.update_tasks(&writes)?;
    if !rewritten.is_empty() {
        debug!(
            "event=subtree_project module=service status=ok moved={} subtasks={}",
            moved_ids.len(),
            rewritten.len()
        );
    }

    Ok(moved_ids
        .iter()
        .filter_map(|id| writes.iter().find(|task| task.id == *id).cloned())
        .collect())
}
