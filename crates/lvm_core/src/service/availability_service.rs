//! Availability queries over persisted tasks and projects.
//!
//! # Responsibility
//! - Load one snapshot per call and run the engine over it.
//! - Pair engine views with their task records for callers.
//!
//! # Invariants
//! - Every call reads a fresh snapshot; nothing is cached between calls.
//! - Queries never write.
//!
//! # See also
//! - `engine` for the evaluation rules.

use crate::engine::views::{self, Evaluator, TaskView};
use crate::engine::{
    evaluate, first_available_in_project, select_next_actions, EngineError, EvaluationOptions,
    TaskSnapshot,
};
use crate::model::project::{Project, ProjectId};
use crate::model::task::{Task, TaskId};
use crate::repo::project_repo::{ProjectListQuery, ProjectRepository};
use crate::repo::task_repo::{TaskListQuery, TaskRepository};
use crate::repo::RepoError;
use log::info;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

#[derive(Debug)]
pub enum AvailabilityServiceError {
    TaskNotFound(TaskId),
    ProjectNotFound(ProjectId),
    Engine(EngineError),
    Repo(RepoError),
}

impl Display for AvailabilityServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::ProjectNotFound(id) => write!(f, "project not found: {id}"),
            Self::Engine(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AvailabilityServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Engine(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for AvailabilityServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<EngineError> for AvailabilityServiceError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

pub type AvailabilityResult<T> = Result<T, AvailabilityServiceError>;

/// A task together with its evaluation at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluatedTask {
    pub task: Task,
    pub view: TaskView,
}

/// Loaded tasks and projects for one request.
struct Loaded {
    tasks: Vec<Task>,
    projects: Vec<Project>,
}

/// Availability query facade.
pub struct AvailabilityService<T: TaskRepository, P: ProjectRepository> {
    tasks: T,
    projects: P,
    options: EvaluationOptions,
}

impl<T: TaskRepository, P: ProjectRepository> AvailabilityService<T, P> {
    pub fn new(tasks: T, projects: P, options: EvaluationOptions) -> Self {
        Self {
            tasks,
            projects,
            options,
        }
    }

    pub fn options(&self) -> &EvaluationOptions {
        &self.options
    }

    /// Evaluates a single task.
    pub fn task_view(&self, id: TaskId, now: i64) -> AvailabilityResult<EvaluatedTask> {
        let loaded = self.load()?;
        let snapshot = self.snapshot(&loaded);
        let task = snapshot
            .task(id)
            .ok_or(AvailabilityServiceError::TaskNotFound(id))?;
        let view = Evaluator::new(&snapshot, now).view(task)?;
        Ok(EvaluatedTask {
            task: task.clone(),
            view,
        })
    }

    /// Evaluates every task, in canonical order.
    pub fn evaluate_all(&self, now: i64) -> AvailabilityResult<Vec<EvaluatedTask>> {
        self.query("evaluate", now, |snapshot, all| with_tasks(all.to_vec(), snapshot))
    }

    pub fn next_actions(&self, now: i64) -> AvailabilityResult<Vec<EvaluatedTask>> {
        let started_at = Instant::now();
        let loaded = self.load()?;
        let snapshot = self.snapshot(&loaded);
        let selected = select_next_actions(&snapshot, now)?;
        let mut evaluator = Evaluator::new(&snapshot, now);
        let mut result = Vec::with_capacity(selected.len());
        for task in selected {
            result.push(EvaluatedTask {
                task: task.clone(),
                view: evaluator.view(task)?,
            });
        }
        log_query("next_actions", result.len(), started_at);
        Ok(result)
    }

    pub fn overdue(&self, now: i64) -> AvailabilityResult<Vec<EvaluatedTask>> {
        self.query("overdue", now, |snapshot, all| {
            with_tasks(views::overdue(all, snapshot, now), snapshot)
        })
    }

    /// Tasks due within `hours` (default from the service options).
    pub fn due_soon(
        &self,
        now: i64,
        hours: Option<i64>,
    ) -> AvailabilityResult<Vec<EvaluatedTask>> {
        let mut options = self.options;
        if let Some(hours) = hours {
            options.due_soon_hours = hours;
        }
        self.query("due_soon", now, |snapshot, all| {
            with_tasks(views::due_soon(all, snapshot, now, &options), snapshot)
        })
    }

    pub fn available(&self, now: i64) -> AvailabilityResult<Vec<EvaluatedTask>> {
        self.query("available", now, |snapshot, all| {
            with_tasks(views::available(all), snapshot)
        })
    }

    pub fn deferred(&self, now: i64) -> AvailabilityResult<Vec<EvaluatedTask>> {
        self.query("deferred", now, |snapshot, all| {
            with_tasks(views::deferred(all, snapshot, now), snapshot)
        })
    }

    /// First available task of a project, if any.
    pub fn first_available_in_project(
        &self,
        project_id: ProjectId,
        now: i64,
    ) -> AvailabilityResult<Option<Task>> {
        let loaded = self.load()?;
        let snapshot = self.snapshot(&loaded);
        if snapshot.project(project_id).is_none() {
            return Err(AvailabilityServiceError::ProjectNotFound(project_id));
        }
        Ok(first_available_in_project(&snapshot, project_id, now)?.cloned())
    }

    fn query(
        &self,
        name: &'static str,
        now: i64,
        select: impl FnOnce(&TaskSnapshot<'_>, &[TaskView]) -> Vec<EvaluatedTask>,
    ) -> AvailabilityResult<Vec<EvaluatedTask>> {
        let started_at = Instant::now();
        let loaded = self.load()?;
        let snapshot = self.snapshot(&loaded);
        let all = evaluate(&snapshot, now)?;
        let result = select(&snapshot, &all);
        log_query(name, result.len(), started_at);
        Ok(result)
    }

    fn load(&self) -> AvailabilityResult<Loaded> {
        Ok(Loaded {
            tasks: self.tasks.list_tasks(&TaskListQuery::default())?,
            projects: self
                .projects
                .list_projects(&ProjectListQuery::default())?,
        })
    }

    fn snapshot<'a>(&self, loaded: &'a Loaded) -> TaskSnapshot<'a> {
        TaskSnapshot::new(&loaded.tasks, &loaded.projects, self.options.orphan_policy)
    }
}

/// Pairs views with their task records.
fn with_tasks(selected: Vec<TaskView>, snapshot: &TaskSnapshot<'_>) -> Vec<EvaluatedTask> {
    selected
        .into_iter()
        .filter_map(|view| {
            snapshot.task(view.task_id).map(|task| EvaluatedTask {
                task: task.clone(),
                view,
            })
        })
        .collect()
}

fn log_query(name: &str, count: usize, started_at: Instant) {
    info!(
        "event=availability_query module=service status=ok query={} count={} duration_ms={}",
        name,
        count,
        started_at.elapsed().as_millis()
    );
}
