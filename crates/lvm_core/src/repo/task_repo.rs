//! Task repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist task records including tentative inbox targets.
//! - Provide filtered listings in canonical sibling order.
//!
//! # Invariants
//! - `Task::validate()` runs before every insert or update.
//! - A row with both tentative columns set is invalid persisted data.
//! - Batch writes run in one immediate transaction.

use crate::model::project::ProjectId;
use crate::model::tag::TagId;
use crate::model::task::{Task, TaskId, TaskStatus, TentativeTarget};
use crate::repo::{
    bool_to_int, ensure_connection_ready, parse_bool, parse_optional_uuid, parse_uuid, uuid_text,
    EntityKind, RepoError, RepoResult, SIBLING_ORDER_SQL,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};

const TASK_SELECT_SQL: &str = "SELECT
    id,
    title,
    note,
    status,
    flagged,
    estimated_minutes,
    due_date,
    defer_date,
    completed_at,
    dropped_at,
    project_id,
    parent_task_id,
    tentative_project_id,
    tentative_parent_task_id,
    sort_order,
    created_at,
    modified_at
FROM tasks";

/// Filters for listing tasks. Unset fields do not constrain.
#[derive(Debug, Clone, Default)]
pub struct TaskListQuery {
    /// Empty means any status.
    pub statuses: Vec<TaskStatus>,
    pub flagged: Option<bool>,
    pub project_id: Option<ProjectId>,
    pub parent_task_id: Option<TaskId>,
    /// Own due date strictly before this instant.
    pub due_before: Option<i64>,
    /// Own due date strictly after this instant.
    pub due_after: Option<i64>,
    /// Only tasks with neither project nor parent.
    pub inbox_only: bool,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for task persistence.
pub trait TaskRepository {
    fn create_task(&self, task: &Task) -> RepoResult<TaskId>;
    /// Inserts every task with its tags in one transaction, tags in the
    /// given order.
    fn create_tasks_with_tags(&self, batch: &[(Task, Vec<TagId>)], now: i64) -> RepoResult<()>;
    fn update_task(&self, task: &Task) -> RepoResult<()>;
    /// Updates every task atomically; fails as a whole if any id is missing.
    fn update_tasks(&self, tasks: &[Task]) -> RepoResult<()>;
    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>>;
    fn list_tasks(&self, query: &TaskListQuery) -> RepoResult<Vec<Task>>;
    /// Deletes a task; subtasks are removed with it.
    fn delete_task(&self, id: TaskId) -> RepoResult<()>;
    /// Counts inbox tasks with `status`.
    fn count_inbox(&self, status: TaskStatus) -> RepoResult<u32>;
    /// `(id, parent_task_id)` for every task.
    fn parent_links(&self) -> RepoResult<Vec<(TaskId, Option<TaskId>)>>;
}

/// SQLite-backed task repository.
pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["tasks", "projects", "task_tags"])?;
        Ok(Self { conn })
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn create_task(&self, task: &Task) -> RepoResult<TaskId> {
        insert_task(self.conn, task)?;
        Ok(task.id)
    }

    fn create_tasks_with_tags(&self, batch: &[(Task, Vec<TagId>)], now: i64) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        for (task, tag_ids) in batch {
            insert_task(&tx, task)?;
            for (position, tag_id) in tag_ids.iter().enumerate() {
                tx.execute(
                    "INSERT OR IGNORE INTO task_tags (task_id, tag_id, sort_order, created_at)
                     VALUES (?1, ?2, ?3, ?4);",
                    params![task.id.to_string(), tag_id.to_string(), position as i64, now],
                )?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn update_task(&self, task: &Task) -> RepoResult<()> {
        write_task(self.conn, task)
    }

    fn update_tasks(&self, tasks: &[Task]) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        for task in tasks {
            write_task(&tx, task)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TASK_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_task_row(row)?));
        }
        Ok(None)
    }

    fn list_tasks(&self, query: &TaskListQuery) -> RepoResult<Vec<Task>> {
        let mut sql = format!("{TASK_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if !query.statuses.is_empty() {
            let placeholders = vec!["?"; query.statuses.len()].join(", ");
            sql.push_str(&format!(" AND status IN ({placeholders})"));
            for status in &query.statuses {
                bind_values.push(Value::Text(task_status_to_db(*status).to_string()));
            }
        }
        if let Some(flagged) = query.flagged {
            sql.push_str(" AND flagged = ?");
            bind_values.push(Value::Integer(bool_to_int(flagged)));
        }
        if let Some(project_id) = query.project_id {
            sql.push_str(" AND project_id = ?");
            bind_values.push(Value::Text(project_id.to_string()));
        }
        if let Some(parent_task_id) = query.parent_task_id {
            sql.push_str(" AND parent_task_id = ?");
            bind_values.push(Value::Text(parent_task_id.to_string()));
        }
        if let Some(due_before) = query.due_before {
            sql.push_str(" AND due_date < ?");
            bind_values.push(Value::Integer(due_before));
        }
        if let Some(due_after) = query.due_after {
            sql.push_str(" AND due_date > ?");
            bind_values.push(Value::Integer(due_after));
        }
        if query.inbox_only {
            sql.push_str(" AND project_id IS NULL AND parent_task_id IS NULL");
        }

        sql.push(' ');
        sql.push_str(SIBLING_ORDER_SQL);

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }
        Ok(tasks)
    }

    fn delete_task(&self, id: TaskId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM tasks WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Task, id));
        }
        Ok(())
    }

    fn count_inbox(&self, status: TaskStatus) -> RepoResult<u32> {
        let count: u32 = self.conn.query_row(
            "SELECT COUNT(*)
             FROM tasks
             WHERE project_id IS NULL
               AND parent_task_id IS NULL
               AND status = ?1;",
            [task_status_to_db(status)],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn parent_links(&self) -> RepoResult<Vec<(TaskId, Option<TaskId>)>> {
        let mut stmt = self.conn.prepare("SELECT id, parent_task_id FROM tasks;")?;
        let mut rows = stmt.query([])?;
        let mut links = Vec::new();
        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            links.push((
                parse_uuid(&id, "tasks.id")?,
                parse_optional_uuid(row.get(1)?, "tasks.parent_task_id")?,
            ));
        }
        Ok(links)
    }
}

fn insert_task(conn: &Connection, task: &Task) -> RepoResult<()> {
    task.validate()?;
    let (tentative_project, tentative_parent) = split_tentative(task.tentative);

    conn.execute(
        "INSERT INTO tasks (
            id,
            title,
            note,
            status,
            flagged,
            estimated_minutes,
            due_date,
            defer_date,
            completed_at,
            dropped_at,
            project_id,
            parent_task_id,
            tentative_project_id,
            tentative_parent_task_id,
            sort_order,
            created_at,
            modified_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17);",
        params![
            task.id.to_string(),
            task.title.as_str(),
            task.note.as_deref(),
            task_status_to_db(task.status),
            bool_to_int(task.flagged),
            task.estimated_minutes,
            task.due_date,
            task.defer_date,
            task.completed_at,
            task.dropped_at,
            uuid_text(task.project_id),
            uuid_text(task.parent_task_id),
            tentative_project,
            tentative_parent,
            task.order,
            task.created_at,
            task.modified_at,
        ],
    )?;
    Ok(())
}

fn write_task(conn: &Connection, task: &Task) -> RepoResult<()> {
    task.validate()?;
    let (tentative_project, tentative_parent) = split_tentative(task.tentative);

    let changed = conn.execute(
        "UPDATE tasks
         SET
            title = ?2,
            note = ?3,
            status = ?4,
            flagged = ?5,
            estimated_minutes = ?6,
            due_date = ?7,
            defer_date = ?8,
            completed_at = ?9,
            dropped_at = ?10,
            project_id = ?11,
            parent_task_id = ?12,
            tentative_project_id = ?13,
            tentative_parent_task_id = ?14,
            sort_order = ?15,
            modified_at = ?16
         WHERE id = ?1;",
        params![
            task.id.to_string(),
            task.title.as_str(),
            task.note.as_deref(),
            task_status_to_db(task.status),
            bool_to_int(task.flagged),
            task.estimated_minutes,
            task.due_date,
            task.defer_date,
            task.completed_at,
            task.dropped_at,
            uuid_text(task.project_id),
            uuid_text(task.parent_task_id),
            tentative_project,
            tentative_parent,
            task.order,
            task.modified_at,
        ],
    )?;

    if changed == 0 {
        return Err(RepoError::not_found(EntityKind::Task, task.id));
    }
    Ok(())
}

fn split_tentative(target: Option<TentativeTarget>) -> (Option<String>, Option<String>) {
    match target {
        None => (None, None),
        Some(TentativeTarget::Project(id)) => (Some(id.to_string()), None),
        Some(TentativeTarget::ParentTask(id)) => (None, Some(id.to_string())),
    }
}

pub(crate) fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let id_text: String = row.get("id")?;
    let id = parse_uuid(&id_text, "tasks.id")?;

    let status_text: String = row.get("status")?;
    let status = parse_task_status(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid task status `{status_text}` in tasks.status"))
    })?;

    let tentative_project =
        parse_optional_uuid(row.get("tentative_project_id")?, "tasks.tentative_project_id")?;
    let tentative_parent = parse_optional_uuid(
        row.get("tentative_parent_task_id")?,
        "tasks.tentative_parent_task_id",
    )?;
    let tentative = match (tentative_project, tentative_parent) {
        (None, None) => None,
        (Some(project_id), None) => Some(TentativeTarget::Project(project_id)),
        (None, Some(parent_id)) => Some(TentativeTarget::ParentTask(parent_id)),
        (Some(_), Some(_)) => {
            return Err(RepoError::InvalidData(format!(
                "task {id} has both tentative project and tentative parent"
            )));
        }
    };

    let task = Task {
        id,
        title: row.get("title")?,
        note: row.get("note")?,
        status,
        flagged: parse_bool(row.get("flagged")?, "tasks.flagged")?,
        estimated_minutes: row.get("estimated_minutes")?,
        due_date: row.get("due_date")?,
        defer_date: row.get("defer_date")?,
        completed_at: row.get("completed_at")?,
        dropped_at: row.get("dropped_at")?,
        project_id: parse_optional_uuid(row.get("project_id")?, "tasks.project_id")?,
        parent_task_id: parse_optional_uuid(row.get("parent_task_id")?, "tasks.parent_task_id")?,
        tentative,
        order: row.get("sort_order")?,
        created_at: row.get("created_at")?,
        modified_at: row.get("modified_at")?,
    };
    task.validate()
        .map_err(|err| RepoError::InvalidData(format!("task {id}: {err}")))?;
    Ok(task)
}

pub(crate) fn task_status_to_db(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Active => "active",
        TaskStatus::Completed => "completed",
        TaskStatus::Dropped => "dropped",
    }
}

fn parse_task_status(value: &str) -> Option<TaskStatus> {
    match value {
        "active" => Some(TaskStatus::Active),
        "completed" => Some(TaskStatus::Completed),
        "dropped" => Some(TaskStatus::Dropped),
        _ => None,
    }
}
