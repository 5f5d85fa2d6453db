//! Tag repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist hierarchical tags with optional location metadata.
//! - Maintain task and project tag associations.
//!
//! # Invariants
//! - Location columns are all-or-nothing for latitude and longitude.
//! - Association rows are unique per pair; re-adding is a no-op.
//! - New associations are appended after the owner's existing tags.

use crate::model::project::ProjectId;
use crate::model::tag::{Tag, TagId, TagLocation, TagStatus};
use crate::model::task::TaskId;
use crate::repo::{
    bool_to_int, ensure_connection_ready, parse_bool, parse_optional_uuid, parse_uuid, uuid_text,
    EntityKind, ParentFilter, RepoError, RepoResult, NAMED_ORDER_SQL,
};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior,
};

const TAG_COLUMNS_SQL: &str = "
    t.id,
    t.name,
    t.status,
    t.parent_id,
    t.sort_order,
    t.allows_next_action,
    t.children_mutually_exclusive,
    t.location_latitude,
    t.location_longitude,
    t.location_radius,
    t.location_name,
    t.created_at,
    t.modified_at";

#[derive(Debug, Clone, Default)]
pub struct TagListQuery {
    /// Exact status; when unset only active tags are listed unless
    /// `include_dropped`.
    pub status: Option<TagStatus>,
    pub include_dropped: bool,
    pub parent: Option<ParentFilter<TagId>>,
    pub has_location: Option<bool>,
}

/// Which junction table an association lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagOwner {
    Task(TaskId),
    Project(ProjectId),
}

impl TagOwner {
    fn table(self) -> &'static str {
        match self {
            Self::Task(_) => "task_tags",
            Self::Project(_) => "project_tags",
        }
    }

    fn column(self) -> &'static str {
        match self {
            Self::Task(_) => "task_id",
            Self::Project(_) => "project_id",
        }
    }

    fn id_text(self) -> String {
        match self {
            Self::Task(id) | Self::Project(id) => id.to_string(),
        }
    }
}

/// Repository interface for tag persistence.
pub trait TagRepository {
    fn create_tag(&self, tag: &Tag) -> RepoResult<TagId>;
    fn update_tag(&self, tag: &Tag) -> RepoResult<()>;
    fn get_tag(&self, id: TagId) -> RepoResult<Option<Tag>>;
    fn list_tags(&self, query: &TagListQuery) -> RepoResult<Vec<Tag>>;
    /// Active tags with a location, by name.
    fn list_location_tags(&self) -> RepoResult<Vec<Tag>>;
    /// Deletes a tag. Child tags move up one level unless `delete_children`.
    fn delete_tag(&self, id: TagId, delete_children: bool, now: i64) -> RepoResult<()>;
    fn parent_links(&self) -> RepoResult<Vec<(TagId, Option<TagId>)>>;

    /// Attaches `tag_id` to `owner`, first detaching every tag in `replaced`.
    fn attach_tag(
        &self,
        owner: TagOwner,
        tag_id: TagId,
        replaced: &[TagId],
        now: i64,
    ) -> RepoResult<()>;
    /// Returns whether an association was removed.
    fn detach_tag(&self, owner: TagOwner, tag_id: TagId) -> RepoResult<bool>;
    /// Tags attached to `owner` in association order.
    fn owner_tags(&self, owner: TagOwner) -> RepoResult<Vec<Tag>>;

    /// Siblings of `tag` that cannot share an owner with it: every other
    /// child of a `children_mutually_exclusive` parent, dropped ones included.
    fn exclusive_siblings(&self, tag: &Tag) -> RepoResult<Vec<TagId>> {
        let Some(parent_id) = tag.parent_id else {
            return Ok(Vec::new());
        };
        let exclusive = self
            .get_tag(parent_id)?
            .is_some_and(|parent| parent.children_mutually_exclusive);
        if !exclusive {
            return Ok(Vec::new());
        }
        let siblings = self.list_tags(&TagListQuery {
            include_dropped: true,
            parent: Some(ParentFilter::Under(parent_id)),
            ..TagListQuery::default()
        })?;
        Ok(siblings
            .into_iter()
            .map(|sibling| sibling.id)
            .filter(|id| *id != tag.id)
            .collect())
    }
}

/// SQLite-backed tag repository.
pub struct SqliteTagRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTagRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["tags", "task_tags", "project_tags"])?;
        Ok(Self { conn })
    }

    fn query_tags(&self, sql: &str, bind_values: Vec<Value>) -> RepoResult<Vec<Tag>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut tags = Vec::new();
        while let Some(row) = rows.next()? {
            tags.push(parse_tag_row(row)?);
        }
        Ok(tags)
    }
}

impl TagRepository for SqliteTagRepository<'_> {
    fn create_tag(&self, tag: &Tag) -> RepoResult<TagId> {
        tag.validate()?;
        let location = LocationColumns::from(tag.location.as_ref());
        self.conn.execute(
            "INSERT INTO tags (
                id,
                name,
                status,
                parent_id,
                sort_order,
                allows_next_action,
                children_mutually_exclusive,
                location_latitude,
                location_longitude,
                location_radius,
                location_name,
                created_at,
                modified_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13);",
            params![
                tag.id.to_string(),
                tag.name.as_str(),
                tag_status_to_db(tag.status),
                uuid_text(tag.parent_id),
                tag.order,
                bool_to_int(tag.allows_next_action),
                bool_to_int(tag.children_mutually_exclusive),
                location.latitude,
                location.longitude,
                location.radius,
                location.name,
                tag.created_at,
                tag.modified_at,
            ],
        )?;
        Ok(tag.id)
    }

    fn update_tag(&self, tag: &Tag) -> RepoResult<()> {
        tag.validate()?;
        let location = LocationColumns::from(tag.location.as_ref());
        let changed = self.conn.execute(
            "UPDATE tags
             SET
                name = ?2,
                status = ?3,
                parent_id = ?4,
                sort_order = ?5,
                allows_next_action = ?6,
                children_mutually_exclusive = ?7,
                location_latitude = ?8,
                location_longitude = ?9,
                location_radius = ?10,
                location_name = ?11,
                modified_at = ?12
             WHERE id = ?1;",
            params![
                tag.id.to_string(),
                tag.name.as_str(),
                tag_status_to_db(tag.status),
                uuid_text(tag.parent_id),
                tag.order,
                bool_to_int(tag.allows_next_action),
                bool_to_int(tag.children_mutually_exclusive),
                location.latitude,
                location.longitude,
                location.radius,
                location.name,
                tag.modified_at,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Tag, tag.id));
        }
        Ok(())
    }

    fn get_tag(&self, id: TagId) -> RepoResult<Option<Tag>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {TAG_COLUMNS_SQL} FROM tags t WHERE t.id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_tag_row(row)?));
        }
        Ok(None)
    }

    fn list_tags(&self, query: &TagListQuery) -> RepoResult<Vec<Tag>> {
        let mut sql = format!("SELECT {TAG_COLUMNS_SQL} FROM tags t WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        match query.status {
            Some(status) => {
                sql.push_str(" AND t.status = ?");
                bind_values.push(Value::Text(tag_status_to_db(status).to_string()));
            }
            None if !query.include_dropped => sql.push_str(" AND t.status = 'active'"),
            None => {}
        }
        match query.parent {
            None => {}
            Some(ParentFilter::Root) => sql.push_str(" AND t.parent_id IS NULL"),
            Some(ParentFilter::Under(parent_id)) => {
                sql.push_str(" AND t.parent_id = ?");
                bind_values.push(Value::Text(parent_id.to_string()));
            }
        }
        match query.has_location {
            None => {}
            Some(true) => sql.push_str(" AND t.location_latitude IS NOT NULL"),
            Some(false) => sql.push_str(" AND t.location_latitude IS NULL"),
        }
        sql.push(' ');
        sql.push_str(NAMED_ORDER_SQL);

        self.query_tags(&sql, bind_values)
    }

    fn list_location_tags(&self) -> RepoResult<Vec<Tag>> {
        self.query_tags(
            &format!(
                "SELECT {TAG_COLUMNS_SQL} FROM tags t
                 WHERE t.location_latitude IS NOT NULL
                   AND t.status = 'active'
                 ORDER BY t.name ASC, t.id ASC;"
            ),
            Vec::new(),
        )
    }

    fn delete_tag(&self, id: TagId, delete_children: bool, now: i64) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let parent: Option<Option<String>> = tx
            .query_row(
                "SELECT parent_id FROM tags WHERE id = ?1;",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(parent) = parent else {
            return Err(RepoError::not_found(EntityKind::Tag, id));
        };

        if !delete_children {
            tx.execute(
                "UPDATE tags
                 SET parent_id = ?2,
                     modified_at = ?3
                 WHERE parent_id = ?1;",
                params![id.to_string(), parent, now],
            )?;
        }
        tx.execute("DELETE FROM tags WHERE id = ?1;", [id.to_string()])?;
        tx.commit()?;
        Ok(())
    }

    fn parent_links(&self) -> RepoResult<Vec<(TagId, Option<TagId>)>> {
        let mut stmt = self.conn.prepare("SELECT id, parent_id FROM tags;")?;
        let mut rows = stmt.query([])?;
        let mut links = Vec::new();
        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            links.push((
                parse_uuid(&id, "tags.id")?,
                parse_optional_uuid(row.get(1)?, "tags.parent_id")?,
            ));
        }
        Ok(links)
    }

    fn attach_tag(
        &self,
        owner: TagOwner,
        tag_id: TagId,
        replaced: &[TagId],
        now: i64,
    ) -> RepoResult<()> {
        let table = owner.table();
        let column = owner.column();
        let owner_id = owner.id_text();

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        for replaced_id in replaced.iter().filter(|id| **id != tag_id) {
            tx.execute(
                &format!("DELETE FROM {table} WHERE {column} = ?1 AND tag_id = ?2;"),
                params![owner_id, replaced_id.to_string()],
            )?;
        }
        let next_order: i64 = tx.query_row(
            &format!("SELECT COALESCE(MAX(sort_order) + 1, 0) FROM {table} WHERE {column} = ?1;"),
            [owner_id.as_str()],
            |row| row.get(0),
        )?;
        tx.execute(
            &format!(
                "INSERT OR IGNORE INTO {table} ({column}, tag_id, sort_order, created_at)
                 VALUES (?1, ?2, ?3, ?4);"
            ),
            params![owner_id, tag_id.to_string(), next_order, now],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn detach_tag(&self, owner: TagOwner, tag_id: TagId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            &format!(
                "DELETE FROM {} WHERE {} = ?1 AND tag_id = ?2;",
                owner.table(),
                owner.column()
            ),
            params![owner.id_text(), tag_id.to_string()],
        )?;
        Ok(changed > 0)
    }

    fn owner_tags(&self, owner: TagOwner) -> RepoResult<Vec<Tag>> {
        let sql = format!(
            "SELECT {TAG_COLUMNS_SQL}
             FROM {table} j
             INNER JOIN tags t ON t.id = j.tag_id
             WHERE j.{column} = ?
             ORDER BY j.sort_order ASC, t.name ASC;",
            table = owner.table(),
            column = owner.column(),
        );
        self.query_tags(&sql, vec![Value::Text(owner.id_text())])
    }
}

struct LocationColumns<'a> {
    latitude: Option<f64>,
    longitude: Option<f64>,
    radius: Option<i64>,
    name: Option<&'a str>,
}

impl<'a> From<Option<&'a TagLocation>> for LocationColumns<'a> {
    fn from(value: Option<&'a TagLocation>) -> Self {
        Self {
            latitude: value.map(|loc| loc.latitude),
            longitude: value.map(|loc| loc.longitude),
            radius: value.and_then(|loc| loc.radius),
            name: value.and_then(|loc| loc.name.as_deref()),
        }
    }
}

fn parse_tag_row(row: &Row<'_>) -> RepoResult<Tag> {
    let id_text: String = row.get("id")?;
    let id = parse_uuid(&id_text, "tags.id")?;
    let status_text: String = row.get("status")?;
    let status = parse_tag_status(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid tag status `{status_text}` in tags.status"))
    })?;

    let latitude: Option<f64> = row.get("location_latitude")?;
    let longitude: Option<f64> = row.get("location_longitude")?;
    let location = match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Some(TagLocation {
            latitude,
            longitude,
            radius: row.get("location_radius")?,
            name: row.get("location_name")?,
        }),
        (None, None) => None,
        _ => {
            return Err(RepoError::InvalidData(format!(
                "tag {id}: latitude and longitude must be set together"
            )))
        }
    };

    let tag = Tag {
        id,
        name: row.get("name")?,
        status,
        parent_id: parse_optional_uuid(row.get("parent_id")?, "tags.parent_id")?,
        order: row.get("sort_order")?,
        allows_next_action: parse_bool(row.get("allows_next_action")?, "tags.allows_next_action")?,
        children_mutually_exclusive: parse_bool(
            row.get("children_mutually_exclusive")?,
            "tags.children_mutually_exclusive",
        )?,
        location,
        created_at: row.get("created_at")?,
        modified_at: row.get("modified_at")?,
    };
    tag.validate()
        .map_err(|err| RepoError::InvalidData(format!("tag {id}: {err}")))?;
    Ok(tag)
}

fn tag_status_to_db(status: TagStatus) -> &'static str {
    match status {
        TagStatus::Active => "active",
        TagStatus::OnHold => "on_hold",
        TagStatus::Dropped => "dropped",
    }
}

fn parse_tag_status(value: &str) -> Option<TagStatus> {
    match value {
        "active" => Some(TagStatus::Active),
        "on_hold" => Some(TagStatus::OnHold),
        "dropped" => Some(TagStatus::Dropped),
        _ => None,
    }
}
