//! Inbox use-case service.
//!
//! # Responsibility
//! - List and summarize inbox items.
//! - Persist tentative assignments and clean-up resolutions planned by
//!   `engine::inbox`.
//! - Convert an inbox item into a project.
//!
//! # Invariants
//! - Processing and tentative changes only apply to inbox items.
//! - Clean-up writes every resolution in one transaction or none.
//! - Filing an item under a task never creates a parent-task cycle.
//! - A filed item's subtasks move into its project in the same write.

use crate::engine::inbox::{
    apply_resolution, plan_reconciliation, process_to_project, process_to_task, set_tentative,
};
use crate::engine::views::inbox_stats;
use crate::engine::{EngineError, HierarchyKind, InboxStats, OrphanPolicy, ParentIndex};
use crate::model::project::{Project, ProjectDraft, ProjectId, ProjectType};
use crate::model::task::{Task, TaskId, TaskStatus, TentativeTarget};
use crate::repo::project_repo::ProjectRepository;
use crate::repo::task_repo::{TaskListQuery, TaskRepository};
use crate::repo::{EntityKind, RepoError};
use crate::service::save_moved_tasks;
use log::info;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

#[derive(Debug)]
pub enum InboxServiceError {
    TaskNotFound(TaskId),
    ParentNotFound(TaskId),
    ProjectNotFound(ProjectId),
    Engine(EngineError),
    Repo(RepoError),
}

impl Display for InboxServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TaskNotFound(id) => write!(f, "inbox item not found: {id}"),
            Self::ParentNotFound(id) => write!(f, "parent task not found: {id}"),
            Self::ProjectNotFound(id) => write!(f, "project not found: {id}"),
            Self::Engine(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for InboxServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Engine(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for InboxServiceError {
    fn from(value: RepoError) -> Self {
        if let Some(id) = value.missing(EntityKind::Task) {
            return Self::TaskNotFound(id);
        }
        Self::Repo(value)
    }
}

impl From<EngineError> for InboxServiceError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

pub type InboxServiceResult<T> = Result<T, InboxServiceError>;

/// Inbox listing options. Completed and dropped items are hidden by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InboxFilter {
    pub include_completed: bool,
    pub include_dropped: bool,
}

/// Inbox service facade.
pub struct InboxService<T: TaskRepository, P: ProjectRepository> {
    tasks: T,
    projects: P,
}

impl<T: TaskRepository, P: ProjectRepository> InboxService<T, P> {
    pub fn new(tasks: T, projects: P) -> Self {
        Self { tasks, projects }
    }

    pub fn list(&self, filter: InboxFilter) -> InboxServiceResult<Vec<Task>> {
        let mut statuses = vec![TaskStatus::Active];
        if filter.include_completed {
            statuses.push(TaskStatus::Completed);
        }
        if filter.include_dropped {
            statuses.push(TaskStatus::Dropped);
        }
        let query = TaskListQuery {
            statuses,
            inbox_only: true,
            ..TaskListQuery::default()
        };
        self.tasks.list_tasks(&query).map_err(Into::into)
    }

    /// Number of active inbox items.
    pub fn count(&self) -> InboxServiceResult<u32> {
        self.tasks
            .count_inbox(TaskStatus::Active)
            .map_err(Into::into)
    }

    pub fn has_items(&self) -> InboxServiceResult<bool> {
        Ok(self.count()? > 0)
    }

    pub fn stats(&self, now: i64) -> InboxServiceResult<InboxStats> {
        let query = TaskListQuery {
            inbox_only: true,
            ..TaskListQuery::default()
        };
        let items = self.tasks.list_tasks(&query)?;
        Ok(inbox_stats(&items, now))
    }

    /// Files an inbox item into a project.
    pub fn process_to_project(
        &self,
        task_id: TaskId,
        project_id: ProjectId,
        position: Option<i64>,
        now: i64,
    ) -> InboxServiceResult<Task> {
        let mut task = self.require_task(task_id)?;
        self.require_project(project_id)?;
        process_to_project(&mut task, project_id, position, now)?;
        self.save_filed(task, now)
    }

    /// Files an inbox item as a subtask of `parent_id`, inheriting its project.
    pub fn process_to_task(
        &self,
        task_id: TaskId,
        parent_id: TaskId,
        position: Option<i64>,
        now: i64,
    ) -> InboxServiceResult<Task> {
        let mut task = self.require_task(task_id)?;
        let parent = self
            .tasks
            .get_task(parent_id)?
            .ok_or(InboxServiceError::ParentNotFound(parent_id))?;
        self.parent_index()?
            .ensure_can_reparent(task_id, Some(parent_id))?;
        process_to_task(&mut task, &parent, position, now)?;
        self.save_filed(task, now)
    }

    /// Replaces or clears the tentative target of an inbox item.
    pub fn set_tentative(
        &self,
        task_id: TaskId,
        target: Option<TentativeTarget>,
        now: i64,
    ) -> InboxServiceResult<Task> {
        let mut task = self.require_task(task_id)?;
        match target {
            Some(TentativeTarget::Project(project_id)) => self.require_project(project_id)?,
            Some(TentativeTarget::ParentTask(parent_id)) => {
                if parent_id != task_id && self.tasks.get_task(parent_id)?.is_none() {
                    return Err(InboxServiceError::ParentNotFound(parent_id));
                }
            }
            None => {}
        }
        set_tentative(&mut task, target, now)?;
        self.tasks.update_task(&task)?;
        Ok(task)
    }

    /// Resolves every active inbox item holding a tentative target.
    ///
    /// Returns the number of items filed.
    pub fn clean_up(&self, policy: OrphanPolicy, now: i64) -> InboxServiceResult<usize> {
        let started_at = Instant::now();
        let mut all_tasks = self.tasks.list_tasks(&TaskListQuery::default())?;
        let plan = plan_reconciliation(&all_tasks, policy)?;

        let mut index = self.parent_index()?;
        for resolution in &plan {
            index.ensure_can_reparent(resolution.task_id, resolution.parent_task_id)?;
            index.set_parent(resolution.task_id, resolution.parent_task_id);
        }

        let positions: HashMap<TaskId, usize> = all_tasks
            .iter()
            .enumerate()
            .map(|(position, task)| (task.id, position))
            .collect();
        let mut resolved = Vec::with_capacity(plan.len());
        for resolution in &plan {
            if let Some(&position) = positions.get(&resolution.task_id) {
                let task = &mut all_tasks[position];
                apply_resolution(task, resolution, now);
                resolved.push(task.clone());
            }
        }
        let resolved = save_moved_tasks::<_, InboxServiceError>(&self.tasks, resolved, now)?;

        info!(
            "event=inbox_cleanup module=service status=ok processed={} duration_ms={}",
            resolved.len(),
            started_at.elapsed().as_millis()
        );
        Ok(resolved.len())
    }

    /// Creates a project from an inbox item and deletes the item.
    pub fn convert_to_project(
        &self,
        task_id: TaskId,
        kind: Option<ProjectType>,
        now: i64,
    ) -> InboxServiceResult<Project> {
        let task = self.require_task(task_id)?;
        if !task.is_inbox() {
            return Err(EngineError::NotInInbox(task_id).into());
        }
        let project = ProjectDraft::from_inbox_task(&task, kind).into_project(now);
        self.projects.create_project_from_task(&project, task_id)?;
        info!(
            "event=inbox_convert module=service status=ok task_id={} project_id={}",
            task_id, project.id
        );
        Ok(project)
    }

    /// Moves an inbox item to `position` among inbox items.
    pub fn reorder(&self, task_id: TaskId, position: i64, now: i64) -> InboxServiceResult<Task> {
        let mut task = self.require_task(task_id)?;
        if !task.is_inbox() {
            return Err(EngineError::NotInInbox(task_id).into());
        }
        task.order = position;
        task.modified_at = now;
        self.tasks.update_task(&task)?;
        Ok(task)
    }

    /// Stores a freshly filed item together with its subtasks' new project.
    fn save_filed(&self, task: Task, now: i64) -> InboxServiceResult<Task> {
        let task_id = task.id;
        save_moved_tasks::<_, InboxServiceError>(&self.tasks, vec![task], now)?
            .pop()
            .ok_or(InboxServiceError::TaskNotFound(task_id))
    }

    fn require_task(&self, task_id: TaskId) -> InboxServiceResult<Task> {
        self.tasks
            .get_task(task_id)?
            .ok_or(InboxServiceError::TaskNotFound(task_id))
    }

    fn require_project(&self, project_id: ProjectId) -> InboxServiceResult<()> {
        match self.projects.get_project(project_id)? {
            Some(_) => Ok(()),
            None => Err(InboxServiceError::ProjectNotFound(project_id)),
        }
    }

    fn parent_index(&self) -> InboxServiceResult<ParentIndex> {
        Ok(ParentIndex::new(HierarchyKind::Task, self.tasks.parent_links()?))
    }
}
