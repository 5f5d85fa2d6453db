//! Text and JSON rendering for command results.

use chrono::DateTime;
use lvm_core::engine::InboxStats;
use lvm_core::service::availability_service::EvaluatedTask;
use lvm_core::{Project, ProjectStatus, Task, TaskStatus};
use serde::Serialize;

/// Prints `value` as pretty JSON.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn format_instant(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|instant| instant.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| millis.to_string())
}

fn status_mark(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Active => "[ ]",
        TaskStatus::Completed => "[x]",
        TaskStatus::Dropped => "[-]",
    }
}

pub fn task_line(task: &Task) -> String {
    let mut line = format!("{} {}  {}", status_mark(task.status), task.id, task.title);
    if task.flagged {
        line.push_str("  !");
    }
    if let Some(due) = task.due_date {
        line.push_str(&format!("  due={}", format_instant(due)));
    }
    if let Some(defer) = task.defer_date {
        line.push_str(&format!("  defer={}", format_instant(defer)));
    }
    line
}

pub fn evaluated_line(item: &EvaluatedTask) -> String {
    let mut line = format!(
        "{} {}  {}",
        status_mark(item.task.status),
        item.task.id,
        item.task.title
    );
    if let Some(due) = item.view.effective_due_date {
        let marker = if item.view.has_local_due_date { "" } else { "~" };
        line.push_str(&format!("  due={marker}{}", format_instant(due)));
    }
    if let Some(defer) = item.view.effective_defer_date {
        let marker = if item.view.has_local_defer_date { "" } else { "~" };
        line.push_str(&format!("  defer={marker}{}", format_instant(defer)));
    }
    if !item.view.blocking_reasons.is_empty() {
        let reasons: Vec<&str> = item
            .view
            .blocking_reasons
            .iter()
            .map(|reason| reason.as_str())
            .collect();
        line.push_str(&format!("  blocked={}", reasons.join(",")));
    }
    line
}

pub fn project_line(project: &Project) -> String {
    let status = match project.status {
        ProjectStatus::Active => "active",
        ProjectStatus::OnHold => "on_hold",
        ProjectStatus::Completed => "completed",
        ProjectStatus::Dropped => "dropped",
    };
    let mut line = format!("{}  {}  [{}]", project.id, project.title, status);
    if let Some(due) = project.due_date {
        line.push_str(&format!("  due={}", format_instant(due)));
    }
    if let Some(defer) = project.defer_date {
        line.push_str(&format!("  defer={}", format_instant(defer)));
    }
    line
}

pub fn stats_lines(stats: &InboxStats) -> Vec<String> {
    vec![
        format!("total={}", stats.total),
        format!("active={}", stats.active),
        format!("available={}", stats.available),
        format!("deferred={}", stats.deferred),
        format!("completed={}", stats.completed),
        format!("flagged={}", stats.flagged),
        format!("with_due_date={}", stats.with_due_date),
        format!("overdue={}", stats.overdue),
    ]
}
