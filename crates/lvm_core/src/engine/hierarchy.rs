//! Flat-table hierarchy views and effective-date resolution.
//!
//! # Responsibility
//! - Index a task/project snapshot by id for explicit parent lookups.
//! - Resolve effective due/defer dates with per-request memoization.
//! - Detect cycles in any self-referential parent table.
//!
//! # Invariants
//! - Traversal is iterative; stack depth does not grow with tree depth.
//! - Every parent walk carries a visited set and fails with
//!   `CyclicHierarchy` instead of looping.
//! - Missing references follow the snapshot's [`OrphanPolicy`].

use crate::engine::dates::{resolve_effective_defer, resolve_effective_due};
use crate::engine::error::{EngineError, EngineResult, HierarchyKind, OrphanPolicy};
use crate::engine::sequential::sibling_order;
use crate::model::project::{Project, ProjectId};
use crate::model::task::{Task, TaskId};
use log::warn;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Effective (inherited) dates of one task or project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EffectiveDates {
    pub due: Option<i64>,
    pub defer: Option<i64>,
}

impl EffectiveDates {
    /// Projects have no ancestors; their effective dates are their own.
    pub fn of_project(project: &Project) -> Self {
        Self {
            due: project.due_date,
            defer: project.defer_date,
        }
    }
}

/// Read-only, id-indexed view over one loaded snapshot.
pub struct TaskSnapshot<'a> {
    tasks: Vec<&'a Task>,
    task_index: HashMap<TaskId, usize>,
    projects: HashMap<ProjectId, &'a Project>,
    by_project: HashMap<ProjectId, Vec<&'a Task>>,
    policy: OrphanPolicy,
}

impl<'a> TaskSnapshot<'a> {
    pub fn new(tasks: &'a [Task], projects: &'a [Project], policy: OrphanPolicy) -> Self {
        let mut ordered: Vec<&'a Task> = tasks.iter().collect();
        ordered.sort_by(|left, right| sibling_order(left, right));

        let task_index = ordered
            .iter()
            .enumerate()
            .map(|(index, task)| (task.id, index))
            .collect();
        let mut by_project: HashMap<ProjectId, Vec<&'a Task>> = HashMap::new();
        for task in &ordered {
            if let Some(project_id) = task.project_id {
                by_project.entry(project_id).or_default().push(*task);
            }
        }

        Self {
            tasks: ordered,
            task_index,
            projects: projects.iter().map(|project| (project.id, project)).collect(),
            by_project,
            policy,
        }
    }

    /// All tasks in canonical order.
    pub fn tasks(&self) -> &[&'a Task] {
        &self.tasks
    }

    pub fn task(&self, id: TaskId) -> Option<&'a Task> {
        self.task_index.get(&id).map(|index| self.tasks[*index])
    }

    pub fn project(&self, id: ProjectId) -> Option<&'a Project> {
        self.projects.get(&id).copied()
    }

    pub fn policy(&self) -> OrphanPolicy {
        self.policy
    }

    /// Tasks whose `project_id` is `project_id`, in canonical order.
    pub fn project_tasks(&self, project_id: ProjectId) -> &[&'a Task] {
        self.by_project
            .get(&project_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Owning project of `task`, honoring the orphan policy.
    pub fn project_of(&self, task: &Task) -> EngineResult<Option<&'a Project>> {
        let Some(project_id) = task.project_id else {
            return Ok(None);
        };
        match self.project(project_id) {
            Some(project) => Ok(Some(project)),
            None => {
                self.orphan(HierarchyKind::Project, task.id, project_id)?;
                Ok(None)
            }
        }
    }

    /// Parent task of `task`, honoring the orphan policy.
    pub fn parent_of(&self, task: &Task) -> EngineResult<Option<&'a Task>> {
        let Some(parent_id) = task.parent_task_id else {
            return Ok(None);
        };
        match self.task(parent_id) {
            Some(parent) => Ok(Some(parent)),
            None => {
                self.orphan(HierarchyKind::Task, task.id, parent_id)?;
                Ok(None)
            }
        }
    }

    fn orphan(&self, kind: HierarchyKind, from: Uuid, missing: Uuid) -> EngineResult<()> {
        match self.policy {
            OrphanPolicy::Ignore => {
                warn!(
                    "event=orphan_reference module=engine status=ignored kind={} from={} missing={}",
                    kind, from, missing
                );
                Ok(())
            }
            OrphanPolicy::Reject => Err(EngineError::OrphanedReference {
                kind,
                from,
                missing,
            }),
        }
    }
}

/// Memoizing effective-date resolver for one evaluation request.
pub struct DateResolver<'s, 'a> {
    snapshot: &'s TaskSnapshot<'a>,
    memo: HashMap<TaskId, EffectiveDates>,
}

impl<'s, 'a> DateResolver<'s, 'a> {
    pub fn new(snapshot: &'s TaskSnapshot<'a>) -> Self {
        Self {
            snapshot,
            memo: HashMap::new(),
        }
    }

    /// Resolves effective dates of `task` and every unresolved ancestor.
    ///
    /// Walks the parent chain up to the first memoized ancestor (or root),
    /// then folds dates back down in post-order.
    pub fn resolve(&mut self, task: &Task) -> EngineResult<EffectiveDates> {
        if let Some(dates) = self.memo.get(&task.id) {
            return Ok(*dates);
        }

        let mut chain: Vec<&Task> = Vec::new();
        let mut on_chain = HashSet::new();
        let mut cursor = Some(task);
        while let Some(current) = cursor {
            if self.memo.contains_key(&current.id) {
                break;
            }
            if !on_chain.insert(current.id) {
                return Err(EngineError::CyclicHierarchy {
                    kind: HierarchyKind::Task,
                    node: current.id,
                });
            }
            chain.push(current);
            cursor = self.snapshot.parent_of(current)?;
        }

        for current in chain.into_iter().rev() {
            let parent = current
                .parent_task_id
                .and_then(|parent_id| self.memo.get(&parent_id))
                .copied()
                .unwrap_or_default();
            let project = self
                .snapshot
                .project_of(current)?
                .map(EffectiveDates::of_project)
                .unwrap_or_default();

            let dates = EffectiveDates {
                due: resolve_effective_due(current.due_date, parent.due, project.due),
                defer: resolve_effective_defer(current.defer_date, parent.defer, project.defer),
            };
            self.memo.insert(current.id, dates);
        }

        Ok(self.memo.get(&task.id).copied().unwrap_or_default())
    }

    /// Resolves by id; unknown ids follow the orphan policy.
    pub fn resolve_id(&mut self, task_id: TaskId) -> EngineResult<Option<EffectiveDates>> {
        match self.snapshot.task(task_id) {
            Some(task) => self.resolve(task).map(Some),
            None => match self.snapshot.policy() {
                OrphanPolicy::Ignore => Ok(None),
                OrphanPolicy::Reject => Err(EngineError::OrphanedReference {
                    kind: HierarchyKind::Task,
                    from: task_id,
                    missing: task_id,
                }),
            },
        }
    }
}

/// Parent table for folders, tags or tasks, used for structural checks.
#[derive(Debug, Clone)]
pub struct ParentIndex {
    kind: HierarchyKind,
    parents: HashMap<Uuid, Option<Uuid>>,
}

impl ParentIndex {
    pub fn new(kind: HierarchyKind, pairs: impl IntoIterator<Item = (Uuid, Option<Uuid>)>) -> Self {
        Self {
            kind,
            parents: pairs.into_iter().collect(),
        }
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.parents.contains_key(&id)
    }

    /// Ancestors of `id`, nearest first. Stops at a root or a missing parent.
    pub fn ancestors(&self, id: Uuid) -> EngineResult<Vec<Uuid>> {
        let mut visited = HashSet::from([id]);
        let mut result = Vec::new();
        let mut cursor = self.parents.get(&id).copied().flatten();
        while let Some(current) = cursor {
            if !visited.insert(current) {
                return Err(EngineError::CyclicHierarchy {
                    kind: self.kind,
                    node: current,
                });
            }
            result.push(current);
            cursor = self.parents.get(&current).copied().flatten();
        }
        Ok(result)
    }

    /// Rejects moving `node` under `new_parent` when that closes a loop.
    pub fn ensure_can_reparent(&self, node: Uuid, new_parent: Option<Uuid>) -> EngineResult<()> {
        let Some(parent) = new_parent else {
            return Ok(());
        };
        if parent == node || self.ancestors(parent)?.contains(&node) {
            return Err(EngineError::CyclicHierarchy {
                kind: self.kind,
                node,
            });
        }
        Ok(())
    }

    /// Records `node` under `parent`, for checking a batch of moves in turn.
    pub fn set_parent(&mut self, node: Uuid, parent: Option<Uuid>) {
        self.parents.insert(node, parent);
    }

    /// Checks every node's chain terminates.
    pub fn ensure_acyclic(&self) -> EngineResult<()> {
        for id in self.parents.keys() {
            self.ancestors(*id)?;
        }
        Ok(())
    }
}

/// Copies the `project_id` of each task in `moved` down its subtask tree.
///
/// Parent links are read from `tasks` as given, so callers apply their moves
/// first. Shallower tasks are handled first; a moved task nested under
/// another moved task ends up with its ancestor's project. Returns the ids of
/// rewritten subtasks in visit order, each stamped with `now`.
pub fn propagate_project(
    tasks: &mut [Task],
    moved: &[TaskId],
    now: i64,
) -> EngineResult<Vec<TaskId>> {
    let positions: HashMap<TaskId, usize> = tasks
        .iter()
        .enumerate()
        .map(|(position, task)| (task.id, position))
        .collect();
    let mut children: HashMap<TaskId, Vec<usize>> = HashMap::new();
    for (position, task) in tasks.iter().enumerate() {
        if let Some(parent) = task.parent_task_id {
            children.entry(parent).or_default().push(position);
        }
    }
    let index = ParentIndex::new(
        HierarchyKind::Task,
        tasks.iter().map(|task| (task.id, task.parent_task_id)),
    );

    let mut roots = Vec::with_capacity(moved.len());
    for id in moved {
        if let Some(&position) = positions.get(id) {
            roots.push((index.ancestors(*id)?.len(), position));
        }
    }
    roots.sort_by_key(|(depth, _)| *depth);

    let mut rewritten = Vec::new();
    let mut seen = HashSet::new();
    for (_, root) in roots {
        let project = tasks[root].project_id;
        let mut visited = HashSet::from([tasks[root].id]);
        let mut stack: Vec<usize> = children.get(&tasks[root].id).cloned().unwrap_or_default();
        while let Some(position) = stack.pop() {
            let task = &mut tasks[position];
            if !visited.insert(task.id) {
                return Err(EngineError::CyclicHierarchy {
                    kind: HierarchyKind::Task,
                    node: task.id,
                });
            }
            if task.project_id != project {
                task.project_id = project;
                task.modified_at = now;
                if seen.insert(task.id) {
                    rewritten.push(task.id);
                }
            }
            if let Some(next) = children.get(&task.id) {
                stack.extend(next.iter().copied());
            }
        }
    }
    Ok(rewritten)
}
