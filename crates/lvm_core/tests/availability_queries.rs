use lvm_core::db::open_db_in_memory;
use lvm_core::repo::project_repo::{ProjectRepository, SqliteProjectRepository};
use lvm_core::repo::tag_repo::{SqliteTagRepository, TagOwner, TagRepository};
use lvm_core::repo::task_repo::{SqliteTaskRepository, TaskListQuery, TaskRepository};
use lvm_core::service::availability_service::{
    AvailabilityService, AvailabilityServiceError, EvaluatedTask,
};
use lvm_core::service::capture_service::{CaptureService, CaptureServiceError, ExtractedTask};
use lvm_core::service::inbox_service::InboxService;
use lvm_core::service::task_service::{TaskService, TaskServiceError};
use lvm_core::{
    BlockingReason, EngineError, EvaluationOptions, OrphanPolicy, Project, ProjectStatus,
    ProjectType, Tag, Task, TentativeTarget,
};
use rusqlite::Connection;

const HOUR: i64 = 60 * 60 * 1000;
const DAY: i64 = 24 * HOUR;
const NOW: i64 = 1_705_276_800_000;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn availability(
    conn: &Connection,
) -> AvailabilityService<SqliteTaskRepository<'_>, SqliteProjectRepository<'_>> {
    AvailabilityService::new(
        SqliteTaskRepository::try_new(conn).unwrap(),
        SqliteProjectRepository::try_new(conn).unwrap(),
        EvaluationOptions::default(),
    )
}

fn insert_project(conn: &Connection, project: &Project) {
    SqliteProjectRepository::try_new(conn)
        .unwrap()
        .create_project(project)
        .unwrap();
}

fn insert_task(conn: &Connection, task: &Task) {
    SqliteTaskRepository::try_new(conn)
        .unwrap()
        .create_task(task)
        .unwrap();
}

fn task_in(project: &Project, title: &str, order: i64) -> Task {
    let mut task = Task::new(title, NOW - DAY);
    task.project_id = Some(project.id);
    task.order = order;
    task
}

fn titles(items: &[EvaluatedTask]) -> Vec<&str> {
    items.iter().map(|item| item.task.title.as_str()).collect()
}

#[test]
fn subtask_inherits_earliest_due_and_latest_defer() {
    let conn = setup();
    let mut project = Project::new("Conference", ProjectType::Parallel, NOW);
    project.due_date = Some(NOW + 10 * DAY);
    project.defer_date = Some(NOW - 2 * DAY);
    insert_project(&conn, &project);

    let mut parent = task_in(&project, "Prepare talk", 0);
    parent.due_date = Some(NOW + 5 * DAY);
    parent.defer_date = Some(NOW + DAY);
    insert_task(&conn, &parent);
    let mut child = task_in(&project, "Draft slides", 0);
    child.parent_task_id = Some(parent.id);
    child.due_date = Some(NOW + 7 * DAY);
    insert_task(&conn, &child);

    let evaluated = availability(&conn).task_view(child.id, NOW).unwrap();
    assert_eq!(evaluated.view.effective_due_date, Some(NOW + 5 * DAY));
    assert_eq!(evaluated.view.effective_defer_date, Some(NOW + DAY));
    assert!(evaluated.view.has_local_due_date);
    assert!(!evaluated.view.has_local_defer_date);
    assert!(!evaluated.view.is_available);
    assert!(evaluated
        .view
        .blocking_reasons
        .contains(&BlockingReason::Deferred));
}

#[test]
fn sequential_project_offers_one_next_action_at_a_time() {
    let conn = setup();
    let project = Project::new("Move", ProjectType::Sequential, NOW);
    insert_project(&conn, &project);
    let first = task_in(&project, "Book van", 0);
    let second = task_in(&project, "Pack", 1);
    insert_task(&conn, &first);
    insert_task(&conn, &second);
    let loose = Task::new("Call mum", NOW);
    insert_task(&conn, &loose);

    let queries = availability(&conn);
    assert_eq!(titles(&queries.next_actions(NOW).unwrap()), vec!["Call mum", "Book van"]);

    let blocked = queries.task_view(second.id, NOW).unwrap();
    assert!(blocked
        .view
        .blocking_reasons
        .contains(&BlockingReason::Sequential));

    let tasks = TaskService::new(
        SqliteTaskRepository::try_new(&conn).unwrap(),
        SqliteProjectRepository::try_new(&conn).unwrap(),
    );
    tasks.complete_task(first.id, NOW).unwrap();

    let next = queries.first_available_in_project(project.id, NOW).unwrap();
    assert_eq!(next.map(|task| task.id), Some(second.id));
}

#[test]
fn parallel_project_contributes_only_its_first_available_task() {
    let conn = setup();
    let project = Project::new("Garden", ProjectType::Parallel, NOW);
    insert_project(&conn, &project);
    let mut deferred = task_in(&project, "Plant bulbs", 0);
    deferred.defer_date = Some(NOW + DAY);
    insert_task(&conn, &deferred);
    insert_task(&conn, &task_in(&project, "Mow", 1));
    insert_task(&conn, &task_in(&project, "Weed", 2));

    let next = availability(&conn).next_actions(NOW).unwrap();
    assert_eq!(titles(&next), vec!["Mow"]);
}

#[test]
fn on_hold_project_blocks_its_tasks() {
    let conn = setup();
    let mut project = Project::new("Someday", ProjectType::Parallel, NOW);
    project.status = ProjectStatus::OnHold;
    insert_project(&conn, &project);
    let task = task_in(&project, "Learn cello", 0);
    insert_task(&conn, &task);

    let queries = availability(&conn);
    let view = queries.task_view(task.id, NOW).unwrap().view;
    assert!(view.blocking_reasons.contains(&BlockingReason::ProjectOnHold));
    assert!(queries.next_actions(NOW).unwrap().is_empty());
    assert_eq!(queries.first_available_in_project(project.id, NOW).unwrap(), None);
}

#[test]
fn overdue_due_soon_and_deferred_views_use_effective_dates() {
    let conn = setup();
    let mut project = Project::new("Taxes", ProjectType::Parallel, NOW);
    project.due_date = Some(NOW - HOUR);
    insert_project(&conn, &project);
    insert_task(&conn, &task_in(&project, "Inherited overdue", 0));

    let mut soon = Task::new("Renew passport", NOW);
    soon.due_date = Some(NOW + 24 * HOUR);
    insert_task(&conn, &soon);
    let mut far = Task::new("Plan holiday", NOW);
    far.due_date = Some(NOW + 72 * HOUR);
    insert_task(&conn, &far);
    let mut waiting = Task::new("Follow up", NOW);
    waiting.defer_date = Some(NOW + 2 * DAY);
    insert_task(&conn, &waiting);
    let mut finished = Task::new("Old bill", NOW);
    finished.due_date = Some(NOW - DAY);
    finished.complete(NOW);
    insert_task(&conn, &finished);

    let queries = availability(&conn);
    assert_eq!(titles(&queries.overdue(NOW).unwrap()), vec!["Inherited overdue"]);
    assert_eq!(titles(&queries.due_soon(NOW, None).unwrap()), vec!["Renew passport"]);
    assert_eq!(
        titles(&queries.due_soon(NOW, Some(96)).unwrap()),
        vec!["Renew passport", "Plan holiday"]
    );
    assert_eq!(titles(&queries.deferred(NOW).unwrap()), vec!["Follow up"]);

    let available = queries.available(NOW).unwrap();
    assert!(available.iter().all(|item| item.task.title != "Follow up"));
    assert!(available.iter().all(|item| item.task.title != "Old bill"));
    assert_eq!(queries.evaluate_all(NOW).unwrap().len(), 5);
}

#[test]
fn defer_equal_to_now_is_available() {
    let conn = setup();
    let mut task = Task::new("Right on time", NOW);
    task.defer_date = Some(NOW);
    insert_task(&conn, &task);

    let view = availability(&conn).task_view(task.id, NOW).unwrap().view;
    assert!(view.is_available);
    assert!(view.blocking_reasons.is_empty());
}

#[test]
fn missing_project_follows_orphan_policy() {
    let conn = setup();
    let project = Project::new("Vanishing", ProjectType::Sequential, NOW);
    insert_project(&conn, &project);
    let task = task_in(&project, "Left behind", 0);
    insert_task(&conn, &task);
    conn.execute_batch("PRAGMA foreign_keys = OFF;").unwrap();
    conn.execute("DELETE FROM projects WHERE id = ?1;", [project.id.to_string()])
        .unwrap();

    let lenient = availability(&conn).task_view(task.id, NOW).unwrap();
    assert!(lenient.view.is_available);

    let strict = AvailabilityService::new(
        SqliteTaskRepository::try_new(&conn).unwrap(),
        SqliteProjectRepository::try_new(&conn).unwrap(),
        EvaluationOptions {
            orphan_policy: OrphanPolicy::Reject,
            ..EvaluationOptions::default()
        },
    );
    assert!(matches!(
        strict.task_view(task.id, NOW).unwrap_err(),
        AvailabilityServiceError::Engine(EngineError::OrphanedReference { .. })
    ));
}

#[test]
fn task_listing_can_keep_only_available_tasks() {
    let conn = setup();
    let mut deferred = Task::new("Later", NOW);
    deferred.defer_date = Some(NOW + DAY);
    insert_task(&conn, &deferred);
    let ready = Task::new("Now", NOW);
    insert_task(&conn, &ready);

    let tasks = TaskService::new(
        SqliteTaskRepository::try_new(&conn).unwrap(),
        SqliteProjectRepository::try_new(&conn).unwrap(),
    );
    let available = tasks
        .list_tasks(&TaskListQuery::default(), Some(NOW))
        .unwrap();
    assert_eq!(available.len(), 1);
    assert_eq!(available[0].id, ready.id);
    assert_eq!(tasks.list_tasks(&TaskListQuery::default(), None).unwrap().len(), 2);
}

#[test]
fn subtask_created_under_filed_parent_joins_its_project() {
    let conn = setup();
    let project = Project::new("Kitchen", ProjectType::Parallel, NOW);
    insert_project(&conn, &project);
    let parent = task_in(&project, "Paint", 0);
    insert_task(&conn, &parent);

    let tasks = TaskService::new(
        SqliteTaskRepository::try_new(&conn).unwrap(),
        SqliteProjectRepository::try_new(&conn).unwrap(),
    );
    let mut child = Task::new("Buy brushes", NOW);
    child.parent_task_id = Some(parent.id);
    let child = tasks.create_task(child).unwrap();
    assert_eq!(child.project_id, Some(project.id));

    let mut looped = tasks.get_task(parent.id).unwrap();
    looped.parent_task_id = Some(child.id);
    assert!(matches!(
        tasks.update_task(looped, NOW).unwrap_err(),
        TaskServiceError::Engine(EngineError::CyclicHierarchy { .. })
    ));
}

#[test]
fn capture_creates_tasks_with_dates_and_tags() {
    let conn = setup();
    let project = Project::new("Reading", ProjectType::Parallel, NOW);
    insert_project(&conn, &project);
    let tag = Tag::new("Books", None, NOW);
    let tags = SqliteTagRepository::try_new(&conn).unwrap();
    tags.create_tag(&tag).unwrap();

    let candidates: Vec<ExtractedTask> = serde_json::from_value(serde_json::json!([
        {
            "title": "  Read chapter 3 ",
            "dueDate": "2024-01-20",
            "estimatedMinutes": 30,
            "projectId": project.id,
            "tagIds": [tag.id]
        },
        { "title": "Return library book", "deferDate": "2024-01-16T09:00:00Z" }
    ]))
    .unwrap();

    let capture = CaptureService::new(
        SqliteTaskRepository::try_new(&conn).unwrap(),
        SqliteProjectRepository::try_new(&conn).unwrap(),
        SqliteTagRepository::try_new(&conn).unwrap(),
    );
    let outcome = capture.create_from_extraction(candidates, NOW).unwrap();
    assert_eq!(outcome.count, 2);

    let first = &outcome.tasks[0];
    assert_eq!(first.title, "Read chapter 3");
    assert_eq!(first.due_date, Some(NOW + 5 * DAY));
    assert_eq!(first.project_id, Some(project.id));
    assert_eq!(first.estimated_minutes, Some(30));
    assert_eq!(outcome.tasks[1].defer_date, Some(NOW + DAY + 9 * HOUR));
    assert!(outcome.tasks[1].is_inbox());

    let attached = tags
        .owner_tags(TagOwner::Task(first.id))
        .unwrap();
    assert_eq!(attached, vec![tag]);
}

#[test]
fn capture_rejects_bad_input_before_writing() {
    let conn = setup();
    let capture = CaptureService::new(
        SqliteTaskRepository::try_new(&conn).unwrap(),
        SqliteProjectRepository::try_new(&conn).unwrap(),
        SqliteTagRepository::try_new(&conn).unwrap(),
    );
    let candidates = vec![
        ExtractedTask {
            title: "Fine".to_string(),
            ..ExtractedTask::default()
        },
        ExtractedTask {
            title: "Broken".to_string(),
            due_date: Some("tomorrow-ish".to_string()),
            ..ExtractedTask::default()
        },
    ];

    let err = capture.create_from_extraction(candidates, NOW).unwrap_err();
    assert!(matches!(
        err,
        CaptureServiceError::InvalidDate { field: "due_date", .. }
    ));
    let stored = SqliteTaskRepository::try_new(&conn)
        .unwrap()
        .list_tasks(&TaskListQuery::default())
        .unwrap();
    assert!(stored.is_empty());
}

fn capture(
    conn: &Connection,
) -> CaptureService<SqliteTaskRepository<'_>, SqliteProjectRepository<'_>, SqliteTagRepository<'_>>
{
    CaptureService::new(
        SqliteTaskRepository::try_new(conn).unwrap(),
        SqliteProjectRepository::try_new(conn).unwrap(),
        SqliteTagRepository::try_new(conn).unwrap(),
    )
}

fn inbox(
    conn: &Connection,
) -> InboxService<SqliteTaskRepository<'_>, SqliteProjectRepository<'_>> {
    InboxService::new(
        SqliteTaskRepository::try_new(conn).unwrap(),
        SqliteProjectRepository::try_new(conn).unwrap(),
    )
}

fn reload(conn: &Connection, task: &Task) -> Task {
    SqliteTaskRepository::try_new(conn)
        .unwrap()
        .get_task(task.id)
        .unwrap()
        .unwrap()
}

fn subtask_of(parent: &Task, title: &str) -> Task {
    let mut child = Task::new(title, NOW - DAY);
    child.parent_task_id = Some(parent.id);
    child.project_id = parent.project_id;
    child
}

#[test]
fn capture_keeps_only_the_last_child_of_an_exclusive_tag() {
    let conn = setup();
    let tags = SqliteTagRepository::try_new(&conn).unwrap();
    let mut energy = Tag::new("Energy", None, NOW);
    energy.children_mutually_exclusive = true;
    tags.create_tag(&energy).unwrap();
    let high = Tag::new("High", Some(energy.id), NOW);
    let low = Tag::new("Low", Some(energy.id), NOW);
    let errand = Tag::new("Errand", None, NOW);
    for tag in [&high, &low, &errand] {
        tags.create_tag(tag).unwrap();
    }

    let outcome = capture(&conn)
        .create_from_extraction(
            vec![ExtractedTask {
                title: "Fix bike".to_string(),
                tag_ids: vec![high.id, errand.id, low.id, errand.id],
                ..ExtractedTask::default()
            }],
            NOW,
        )
        .unwrap();

    let attached = tags
        .owner_tags(TagOwner::Task(outcome.tasks[0].id))
        .unwrap();
    let names: Vec<&str> = attached.iter().map(|tag| tag.name.as_str()).collect();
    assert_eq!(names, vec!["Low", "Errand"]);
}

#[test]
fn capture_batch_is_written_all_or_nothing() {
    let conn = setup();
    conn.execute_batch(
        "CREATE TRIGGER refuse_second BEFORE INSERT ON tasks
         WHEN NEW.title = 'Second'
         BEGIN SELECT RAISE(ABORT, 'refused'); END;",
    )
    .unwrap();
    let candidates = ["First", "Second"]
        .into_iter()
        .map(|title| ExtractedTask {
            title: title.to_string(),
            ..ExtractedTask::default()
        })
        .collect();

    let err = capture(&conn)
        .create_from_extraction(candidates, NOW)
        .unwrap_err();
    assert!(matches!(err, CaptureServiceError::Repo(_)));
    let stored = SqliteTaskRepository::try_new(&conn)
        .unwrap()
        .list_tasks(&TaskListQuery::default())
        .unwrap();
    assert!(stored.is_empty());
}

#[test]
fn filing_an_item_moves_its_subtasks_into_the_project() {
    let conn = setup();
    let mut project = Project::new("Paused", ProjectType::Parallel, NOW);
    project.status = ProjectStatus::OnHold;
    insert_project(&conn, &project);
    let parent = Task::new("Plan party", NOW - DAY);
    insert_task(&conn, &parent);
    let child = subtask_of(&parent, "Send invites");
    insert_task(&conn, &child);
    let grandchild = subtask_of(&child, "Collect addresses");
    insert_task(&conn, &grandchild);

    inbox(&conn)
        .process_to_project(parent.id, project.id, None, NOW)
        .unwrap();

    for task in [&child, &grandchild] {
        let stored = reload(&conn, task);
        assert_eq!(stored.project_id, Some(project.id));
        assert_eq!(stored.modified_at, NOW);
    }
    let queries = availability(&conn);
    assert!(queries.next_actions(NOW).unwrap().is_empty());
    let view = queries.task_view(grandchild.id, NOW).unwrap().view;
    assert!(view.blocking_reasons.contains(&BlockingReason::ProjectOnHold));
}

#[test]
fn cleanup_carries_the_project_through_nested_tentative_items() {
    let conn = setup();
    let project = Project::new("Garden", ProjectType::Parallel, NOW);
    insert_project(&conn, &project);
    let outer = Task::new("Plant beds", NOW - DAY);
    let inner = Task::new("Buy soil", NOW - DAY);
    insert_task(&conn, &outer);
    insert_task(&conn, &inner);
    let below_inner = subtask_of(&inner, "Measure beds");
    insert_task(&conn, &below_inner);

    let service = inbox(&conn);
    service
        .set_tentative(inner.id, Some(TentativeTarget::ParentTask(outer.id)), NOW)
        .unwrap();
    service
        .set_tentative(outer.id, Some(TentativeTarget::Project(project.id)), NOW)
        .unwrap();
    assert_eq!(service.clean_up(OrphanPolicy::Reject, NOW).unwrap(), 2);

    let inner = reload(&conn, &inner);
    assert_eq!(inner.parent_task_id, Some(outer.id));
    assert_eq!(inner.project_id, Some(project.id));
    assert_eq!(reload(&conn, &below_inner).project_id, Some(project.id));
}

#[test]
fn moving_a_task_between_projects_takes_its_subtasks_along() {
    let conn = setup();
    let from = Project::new("Old", ProjectType::Parallel, NOW);
    let to = Project::new("New", ProjectType::Sequential, NOW);
    insert_project(&conn, &from);
    insert_project(&conn, &to);
    let parent = task_in(&from, "Migrate", 0);
    insert_task(&conn, &parent);
    let child = subtask_of(&parent, "Export data");
    insert_task(&conn, &child);

    let tasks = TaskService::new(
        SqliteTaskRepository::try_new(&conn).unwrap(),
        SqliteProjectRepository::try_new(&conn).unwrap(),
    );
    let mut moved = tasks.get_task(parent.id).unwrap();
    moved.project_id = Some(to.id);
    let moved = tasks.update_task(moved, NOW).unwrap();
    assert_eq!(moved.project_id, Some(to.id));
    assert_eq!(reload(&conn, &child).project_id, Some(to.id));

    let mut stray = reload(&conn, &child);
    stray.project_id = Some(from.id);
    let stray = tasks.update_task(stray, NOW).unwrap();
    assert_eq!(stray.project_id, Some(to.id));
}
