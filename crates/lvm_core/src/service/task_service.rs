//! Task use-case service.
//!
//! # Responsibility
//! - Validate task references above the repository layer.
//! - Provide create, update, lifecycle, delete and listing operations.
//!
//! # Invariants
//! - Referenced project and parent task must exist before a write.
//! - Re-parenting must not create a parent-task cycle.
//! - A child task created without a project inherits its parent's project.

use crate::engine::{
    EngineError, Evaluator, HierarchyKind, OrphanPolicy, ParentIndex, TaskSnapshot,
};
use crate::model::project::ProjectId;
use crate::model::task::{Task, TaskId};
use crate::repo::project_repo::{ProjectListQuery, ProjectRepository};
use crate::repo::task_repo::{TaskListQuery, TaskRepository};
use crate::repo::{EntityKind, RepoError};
use crate::service::save_moved_tasks;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum TaskServiceError {
    TaskNotFound(TaskId),
    ParentNotFound(TaskId),
    ProjectNotFound(ProjectId),
    Engine(EngineError),
    Repo(RepoError),
}

impl Display for TaskServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::ParentNotFound(id) => write!(f, "parent task not found: {id}"),
            Self::ProjectNotFound(id) => write!(f, "project not found: {id}"),
            Self::Engine(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TaskServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Engine(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for TaskServiceError {
    fn from(value: RepoError) -> Self {
        if let Some(id) = value.missing(EntityKind::Task) {
            return Self::TaskNotFound(id);
        }
        if let Some(id) = value.missing(EntityKind::Project) {
            return Self::ProjectNotFound(id);
        }
        Self::Repo(value)
    }
}

impl From<EngineError> for TaskServiceError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

pub type TaskServiceResult<T> = Result<T, TaskServiceError>;

/// Task service facade.
pub struct TaskService<T: TaskRepository, P: ProjectRepository> {
    tasks: T,
    projects: P,
}

impl<T: TaskRepository, P: ProjectRepository> TaskService<T, P> {
    pub fn new(tasks: T, projects: P) -> Self {
        Self { tasks, projects }
    }

    /// Persists a new task after checking its references.
    pub fn create_task(&self, mut task: Task) -> TaskServiceResult<Task> {
        if let Some(parent_id) = task.parent_task_id {
            let parent = self.require_parent(parent_id)?;
            if task.project_id.is_none() {
                task.project_id = parent.project_id;
            }
        }
        if let Some(project_id) = task.project_id {
            self.require_project(project_id)?;
        }
        self.tasks.create_task(&task)?;
        Ok(task)
    }

    pub fn get_task(&self, id: TaskId) -> TaskServiceResult<Task> {
        self.tasks
            .get_task(id)?
            .ok_or(TaskServiceError::TaskNotFound(id))
    }

    /// Lists tasks matching `query`.
    ///
    /// With `available_at`, only tasks the engine classifies as available at
    /// that instant are kept; missing references are treated as absent.
    pub fn list_tasks(
        &self,
        query: &TaskListQuery,
        available_at: Option<i64>,
    ) -> TaskServiceResult<Vec<Task>> {
        let listed = self.tasks.list_tasks(query)?;
        let Some(now) = available_at else {
            return Ok(listed);
        };

        let all_tasks = self.tasks.list_tasks(&TaskListQuery::default())?;
        let all_projects = self.projects.list_projects(&ProjectListQuery::default())?;
        let snapshot = TaskSnapshot::new(&all_tasks, &all_projects, OrphanPolicy::Ignore);
        let mut evaluator = Evaluator::new(&snapshot, now);

        let mut available = Vec::with_capacity(listed.len());
        for task in listed {
            if evaluator.availability(&task)?.is_available {
                available.push(task);
            }
        }
        Ok(available)
    }

    /// Writes `task` after reference and cycle checks; stamps `modified_at`.
    ///
    /// A subtask always takes its parent's project. When the project changes,
    /// every subtask below `task` is rewritten with it.
    pub fn update_task(&self, mut task: Task, now: i64) -> TaskServiceResult<Task> {
        let stored = self.get_task(task.id)?;
        if let Some(parent_id) = task.parent_task_id {
            let parent = self.require_parent(parent_id)?;
            let index = ParentIndex::new(HierarchyKind::Task, self.tasks.parent_links()?);
            index.ensure_can_reparent(task.id, Some(parent_id))?;
            task.project_id = parent.project_id;
        }
        if let Some(project_id) = task.project_id {
            self.require_project(project_id)?;
        }
        task.modified_at = now;
        if task.project_id == stored.project_id {
            self.tasks.update_task(&task)?;
            return Ok(task);
        }
        let task_id = task.id;
        save_moved_tasks::<_, TaskServiceError>(&self.tasks, vec![task], now)?
            .pop()
            .ok_or(TaskServiceError::TaskNotFound(task_id))
    }

    pub fn complete_task(&self, id: TaskId, now: i64) -> TaskServiceResult<Task> {
        self.transition(id, |task| task.complete(now))
    }

    pub fn drop_task(&self, id: TaskId, now: i64) -> TaskServiceResult<Task> {
        self.transition(id, |task| task.drop_task(now))
    }

    /// Returns a completed or dropped task to active.
    pub fn restore_task(&self, id: TaskId, now: i64) -> TaskServiceResult<Task> {
        self.transition(id, |task| task.restore(now))
    }

    /// Deletes a task; its subtasks are removed with it.
    pub fn delete_task(&self, id: TaskId) -> TaskServiceResult<()> {
        self.tasks.delete_task(id).map_err(Into::into)
    }

    fn transition(&self, id: TaskId, apply: impl FnOnce(&mut Task)) -> TaskServiceResult<Task> {
        let mut task = self.get_task(id)?;
        apply(&mut task);
        self.tasks.update_task(&task)?;
        Ok(task)
    }

    fn require_parent(&self, parent_id: TaskId) -> TaskServiceResult<Task> {
        self.tasks
            .get_task(parent_id)?
            .ok_or(TaskServiceError::ParentNotFound(parent_id))
    }

    fn require_project(&self, project_id: ProjectId) -> TaskServiceResult<()> {
        match self.projects.get_project(project_id)? {
            Some(_) => Ok(()),
            None => Err(TaskServiceError::ProjectNotFound(project_id)),
        }
    }
}
