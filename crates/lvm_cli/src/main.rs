//! `lvm` command-line front end.
//!
//! # Responsibility
//! - Parse arguments and environment fallbacks into service calls.
//! - Render results as text lines or JSON.
//!
//! # Invariants
//! - `now` is read once per invocation and passed to every service call.
//! - Logging is only initialised when a log directory is configured.

mod output;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use lvm_core::engine::EvaluationOptions;
use lvm_core::repo::folder_repo::SqliteFolderRepository;
use lvm_core::repo::project_repo::{ProjectListQuery, SqliteProjectRepository};
use lvm_core::repo::tag_repo::SqliteTagRepository;
use lvm_core::repo::task_repo::{SqliteTaskRepository, TaskListQuery};
use lvm_core::service::availability_service::{AvailabilityService, EvaluatedTask};
use lvm_core::service::capture_service::{parse_iso_date, CaptureService, ExtractedTask};
use lvm_core::service::inbox_service::{InboxFilter, InboxService};
use lvm_core::service::project_service::{NewProject, ProjectFilter, ProjectService};
use lvm_core::service::task_service::TaskService;
use lvm_core::{
    init_logging, open_db, Connection, LogLevel, OrphanPolicy, Project, ProjectStatus,
    ProjectType, Task, TaskStatus, TentativeTarget,
};
use log::info;
use std::path::PathBuf;
use uuid::Uuid;

/// lvm - GTD task backend with availability and date inheritance
#[derive(Parser, Debug)]
#[command(name = "lvm")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, env = "LVM_DB", default_value = "lvm.db")]
    db: PathBuf,

    /// Directory for rolling log files; logging is off when unset
    #[arg(long, global = true, env = "LVM_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// trace, debug, info, warn or error; defaults to debug in debug builds
    #[arg(long, global = true, env = "LVM_LOG_LEVEL")]
    log_level: Option<String>,

    /// Look-ahead window for due-soon, in hours
    #[arg(long, global = true, env = "LVM_DUE_SOON_HOURS", default_value_t = 48)]
    due_soon_hours: i64,

    /// How missing parents and projects are treated
    #[arg(long, global = true, value_enum, default_value_t = OrphanArg::Ignore)]
    orphans: OrphanArg,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a task (in the inbox unless a project or parent is given)
    Add(AddArgs),

    /// List tasks
    List(ListArgs),

    /// List inbox items
    Inbox {
        /// Include completed and dropped items
        #[arg(long)]
        all: bool,
    },

    /// Show next actions
    Next,

    /// Show overdue tasks
    Overdue,

    /// Show tasks due soon
    DueSoon {
        /// Override the look-ahead window, in hours
        #[arg(long)]
        hours: Option<i64>,
    },

    /// Show one task with its effective dates and blocking reasons
    Show { id: Uuid },

    /// Complete a task
    Complete { id: Uuid },

    /// Drop a task
    Drop { id: Uuid },

    /// Return a completed or dropped task to active
    Restore { id: Uuid },

    /// Project management
    #[command(subcommand)]
    Project(ProjectCommands),

    /// Set or clear the tentative destination of an inbox item
    Tentative {
        id: Uuid,
        #[arg(long, conflicts_with_all = ["parent", "clear"])]
        project: Option<Uuid>,
        #[arg(long, conflicts_with = "clear")]
        parent: Option<Uuid>,
        #[arg(long)]
        clear: bool,
    },

    /// File every inbox item that has a tentative destination
    Cleanup,

    /// Inbox statistics
    Stats,

    /// Create tasks from a JSON array of extracted candidates
    Capture {
        /// JSON file; `-` reads stdin
        file: PathBuf,
    },
}

#[derive(Args, Debug)]
struct AddArgs {
    title: String,
    #[arg(long)]
    note: Option<String>,
    /// ISO-8601 date or date-time
    #[arg(long)]
    due: Option<String>,
    /// ISO-8601 date or date-time
    #[arg(long)]
    defer: Option<String>,
    #[arg(long)]
    project: Option<Uuid>,
    #[arg(long)]
    parent: Option<Uuid>,
    #[arg(long)]
    flagged: bool,
    /// Estimated duration in minutes
    #[arg(long)]
    estimate: Option<i64>,
}

#[derive(Args, Debug)]
struct ListArgs {
    #[arg(long, value_enum)]
    status: Vec<StatusArg>,
    #[arg(long)]
    project: Option<Uuid>,
    #[arg(long)]
    flagged: bool,
    /// Only inbox items
    #[arg(long)]
    inbox: bool,
    /// Only tasks available now
    #[arg(long)]
    available: bool,
}

#[derive(Subcommand, Debug)]
enum ProjectCommands {
    /// Create a project
    Add {
        title: String,
        #[arg(long = "type", value_enum)]
        kind: Option<ProjectTypeArg>,
        #[arg(long)]
        folder: Option<Uuid>,
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        defer: Option<String>,
        #[arg(long)]
        flagged: bool,
    },
    /// List projects
    List {
        #[arg(long, value_enum)]
        status: Option<ProjectStatusArg>,
        /// Only active, non-deferred projects
        #[arg(long)]
        available: bool,
        /// Only projects due for review
        #[arg(long)]
        review: bool,
    },
    /// Put a project on hold
    Hold { id: Uuid },
    /// Reactivate a project
    Activate { id: Uuid },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StatusArg {
    Active,
    Completed,
    Dropped,
}

impl From<StatusArg> for TaskStatus {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::Active => TaskStatus::Active,
            StatusArg::Completed => TaskStatus::Completed,
            StatusArg::Dropped => TaskStatus::Dropped,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProjectTypeArg {
    Parallel,
    Sequential,
    SingleActions,
}

impl From<ProjectTypeArg> for ProjectType {
    fn from(value: ProjectTypeArg) -> Self {
        match value {
            ProjectTypeArg::Parallel => ProjectType::Parallel,
            ProjectTypeArg::Sequential => ProjectType::Sequential,
            ProjectTypeArg::SingleActions => ProjectType::SingleActions,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProjectStatusArg {
    Active,
    OnHold,
    Completed,
    Dropped,
}

impl From<ProjectStatusArg> for ProjectStatus {
    fn from(value: ProjectStatusArg) -> Self {
        match value {
            ProjectStatusArg::Active => ProjectStatus::Active,
            ProjectStatusArg::OnHold => ProjectStatus::OnHold,
            ProjectStatusArg::Completed => ProjectStatus::Completed,
            ProjectStatusArg::Dropped => ProjectStatus::Dropped,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OrphanArg {
    Ignore,
    Reject,
}

impl From<OrphanArg> for OrphanPolicy {
    fn from(value: OrphanArg) -> Self {
        match value {
            OrphanArg::Ignore => OrphanPolicy::Ignore,
            OrphanArg::Reject => OrphanPolicy::Reject,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Some(log_dir) = &cli.log_dir {
        let log_dir = if log_dir.is_absolute() {
            log_dir.clone()
        } else {
            std::env::current_dir()
                .context("failed to resolve working directory")?
                .join(log_dir)
        };
        let level = cli
            .log_level
            .clone()
            .unwrap_or_else(|| LogLevel::build_default().to_string());
        init_logging(&level, &log_dir).context("failed to initialise logging")?;
    }
    let conn = open_db(&cli.db)
        .with_context(|| format!("failed to open database {}", cli.db.display()))?;
    let now = chrono::Utc::now().timestamp_millis();
    info!("event=cli_command module=cli status=start command={:?}", cli.command);
    run(&cli, &conn, now)
}

fn run(cli: &Cli, conn: &Connection, now: i64) -> Result<()> {
    let options = EvaluationOptions {
        due_soon_hours: cli.due_soon_hours,
        orphan_policy: cli.orphans.into(),
    };

    match &cli.command {
        Commands::Add(args) => {
            let task = TaskService::new(task_repo(conn)?, project_repo(conn)?)
                .create_task(build_task(args, now)?)?;
            emit_task(cli, &task)
        }
        Commands::List(args) => {
            let query = TaskListQuery {
                statuses: args.status.iter().copied().map(Into::into).collect(),
                flagged: args.flagged.then_some(true),
                project_id: args.project,
                inbox_only: args.inbox,
                ..TaskListQuery::default()
            };
            let tasks = TaskService::new(task_repo(conn)?, project_repo(conn)?)
                .list_tasks(&query, args.available.then_some(now))?;
            emit_tasks(cli, &tasks)
        }
        Commands::Inbox { all } => {
            let filter = InboxFilter {
                include_completed: *all,
                include_dropped: *all,
            };
            let items = inbox_service(conn)?.list(filter)?;
            emit_tasks(cli, &items)
        }
        Commands::Next => emit_evaluated(cli, &availability(conn, options)?.next_actions(now)?),
        Commands::Overdue => emit_evaluated(cli, &availability(conn, options)?.overdue(now)?),
        Commands::DueSoon { hours } => {
            emit_evaluated(cli, &availability(conn, options)?.due_soon(now, *hours)?)
        }
        Commands::Show { id } => {
            let item = availability(conn, options)?.task_view(*id, now)?;
            if cli.json {
                output::print_json(&item)
            } else {
                println!("{}", output::evaluated_line(&item));
                Ok(())
            }
        }
        Commands::Complete { id } => emit_task(cli, &tasks(conn)?.complete_task(*id, now)?),
        Commands::Drop { id } => emit_task(cli, &tasks(conn)?.drop_task(*id, now)?),
        Commands::Restore { id } => emit_task(cli, &tasks(conn)?.restore_task(*id, now)?),
        Commands::Project(command) => run_project(cli, conn, command, now),
        Commands::Tentative {
            id,
            project,
            parent,
            clear,
        } => {
            let target = match (project, parent) {
                (Some(project_id), None) => Some(TentativeTarget::Project(*project_id)),
                (None, Some(parent_id)) => Some(TentativeTarget::ParentTask(*parent_id)),
                (None, None) if *clear => None,
                _ => bail!("pass one of --project, --parent or --clear"),
            };
            let task = inbox_service(conn)?.set_tentative(*id, target, now)?;
            emit_task(cli, &task)
        }
        Commands::Cleanup => {
            let processed = inbox_service(conn)?.clean_up(options.orphan_policy, now)?;
            if cli.json {
                output::print_json(&serde_json::json!({ "processed": processed }))
            } else {
                println!("processed={processed}");
                Ok(())
            }
        }
        Commands::Stats => {
            let stats = inbox_service(conn)?.stats(now)?;
            if cli.json {
                output::print_json(&stats)
            } else {
                for line in output::stats_lines(&stats) {
                    println!("{line}");
                }
                Ok(())
            }
        }
        Commands::Capture { file } => {
            let text = if file.as_os_str() == "-" {
                std::io::read_to_string(std::io::stdin()).context("failed to read stdin")?
            } else {
                std::fs::read_to_string(file)
                    .with_context(|| format!("failed to read {}", file.display()))?
            };
            let candidates: Vec<ExtractedTask> =
                serde_json::from_str(&text).context("capture input must be a JSON array")?;
            let capture =
                CaptureService::new(task_repo(conn)?, project_repo(conn)?, tag_repo(conn)?);
            let outcome = capture.create_from_extraction(candidates, now)?;
            if cli.json {
                output::print_json(&outcome)
            } else {
                emit_tasks(cli, &outcome.tasks)
            }
        }
    }
}

fn run_project(cli: &Cli, conn: &Connection, command: &ProjectCommands, now: i64) -> Result<()> {
    let service = ProjectService::new(project_repo(conn)?, folder_repo(conn)?);
    match command {
        ProjectCommands::Add {
            title,
            kind,
            folder,
            due,
            defer,
            flagged,
        } => {
            let project = service.create_project(
                NewProject {
                    title: title.clone(),
                    kind: kind.map(Into::into),
                    folder_id: *folder,
                    due_date: parse_date_arg("--due", due.as_deref())?,
                    defer_date: parse_date_arg("--defer", defer.as_deref())?,
                    flagged: *flagged,
                    ..NewProject::default()
                },
                now,
            )?;
            emit_projects(cli, std::slice::from_ref(&project))
        }
        ProjectCommands::List {
            status,
            available,
            review,
        } => {
            let filter = ProjectFilter {
                query: ProjectListQuery {
                    status: status.map(Into::into),
                    available_at: available.then_some(now),
                    ..ProjectListQuery::default()
                },
                due_for_review_at: review.then_some(now),
            };
            emit_projects(cli, &service.list_projects(&filter)?)
        }
        ProjectCommands::Hold { id } => {
            emit_projects(cli, std::slice::from_ref(&service.hold_project(*id, now)?))
        }
        ProjectCommands::Activate { id } => {
            emit_projects(cli, std::slice::from_ref(&service.activate_project(*id, now)?))
        }
    }
}

fn build_task(args: &AddArgs, now: i64) -> Result<Task> {
    let mut task = Task::new(args.title.trim(), now);
    task.note = args.note.clone();
    task.due_date = parse_date_arg("--due", args.due.as_deref())?;
    task.defer_date = parse_date_arg("--defer", args.defer.as_deref())?;
    task.project_id = args.project;
    task.parent_task_id = args.parent;
    task.flagged = args.flagged;
    task.estimated_minutes = args.estimate;
    Ok(task)
}

fn parse_date_arg(flag: &str, value: Option<&str>) -> Result<Option<i64>> {
    match value {
        None => Ok(None),
        Some(text) => match parse_iso_date(text) {
            Some(millis) => Ok(Some(millis)),
            None => bail!("{flag} expects an ISO-8601 date, got `{text}`"),
        },
    }
}

fn emit_task(cli: &Cli, task: &Task) -> Result<()> {
    emit_tasks(cli, std::slice::from_ref(task))
}

fn emit_tasks(cli: &Cli, tasks: &[Task]) -> Result<()> {
    if cli.json {
        return output::print_json(tasks);
    }
    for task in tasks {
        println!("{}", output::task_line(task));
    }
    Ok(())
}

fn emit_evaluated(cli: &Cli, items: &[EvaluatedTask]) -> Result<()> {
    if cli.json {
        return output::print_json(items);
    }
    for item in items {
        println!("{}", output::evaluated_line(item));
    }
    Ok(())
}

fn emit_projects(cli: &Cli, projects: &[Project]) -> Result<()> {
    if cli.json {
        return output::print_json(projects);
    }
    for project in projects {
        println!("{}", output::project_line(project));
    }
    Ok(())
}

fn task_repo(conn: &Connection) -> Result<SqliteTaskRepository<'_>> {
    Ok(SqliteTaskRepository::try_new(conn)?)
}

fn project_repo(conn: &Connection) -> Result<SqliteProjectRepository<'_>> {
    Ok(SqliteProjectRepository::try_new(conn)?)
}

fn folder_repo(conn: &Connection) -> Result<SqliteFolderRepository<'_>> {
    Ok(SqliteFolderRepository::try_new(conn)?)
}

fn tag_repo(conn: &Connection) -> Result<SqliteTagRepository<'_>> {
    Ok(SqliteTagRepository::try_new(conn)?)
}

fn tasks(
    conn: &Connection,
) -> Result<TaskService<SqliteTaskRepository<'_>, SqliteProjectRepository<'_>>> {
    Ok(TaskService::new(task_repo(conn)?, project_repo(conn)?))
}

fn inbox_service(
    conn: &Connection,
) -> Result<InboxService<SqliteTaskRepository<'_>, SqliteProjectRepository<'_>>> {
    Ok(InboxService::new(task_repo(conn)?, project_repo(conn)?))
}

fn availability(
    conn: &Connection,
    options: EvaluationOptions,
) -> Result<AvailabilityService<SqliteTaskRepository<'_>, SqliteProjectRepository<'_>>> {
    Ok(AvailabilityService::new(
        task_repo(conn)?,
        project_repo(conn)?,
        options,
    ))
}
