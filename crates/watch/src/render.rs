//! Plain-text rendering of the instance page for the terminal.

use std::fmt::Write;

use opsdeck_core::types::Timestamp;
use opsdeck_workflow::{InstanceEvent, ViewSnapshot};

/// Render the page as a fixed-width table followed by a footer line.
pub fn render_table(snapshot: &ViewSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "   {:<24} {:<28} {:<12} {:<10} {:<6} {:>5}  {:<20} ACTIONS",
        "ID", "NAME", "STATUS", "MODE", "ACTIVE", "NODES", "LAST RUN",
    );

    for row in &snapshot.records {
        let instance = &row.instance;
        let actions: Vec<&str> = row.actions.iter().map(|a| a.as_str()).collect();
        let _ = writeln!(
            out,
            "{} {:<24} {:<28} {:<12} {:<10} {:<6} {:>5}  {:<20} {}",
            if row.selected { "[x]" } else { "[ ]" },
            truncate(&instance.id, 24),
            truncate(&instance.name, 28),
            truncate(instance.status.as_str(), 12),
            instance.run_mode.as_str(),
            active_label(instance.run_mode.as_str(), instance.is_active),
            instance.node_count(),
            last_run(instance.last_run_at.as_ref()),
            actions.join(","),
        );
    }

    let window = snapshot.window;
    let _ = write!(
        out,
        "page {}/{} ({} total, {} selected)",
        window.page,
        window.page_count(),
        window.total,
        snapshot.selected.len(),
    );
    out
}

/// One-line description of an event for the operator.
pub fn describe_event(event: &InstanceEvent) -> String {
    match event {
        InstanceEvent::ReloadApplied { page, total } => {
            format!("reloaded page {page} ({total} instances)")
        }
        InstanceEvent::ReloadFailed { error } => format!("reload failed: {error}"),
        InstanceEvent::InstanceCreated { instance_id, name } => {
            format!("created {name} ({instance_id})")
        }
        InstanceEvent::ActionAccepted {
            action,
            instance_id,
        } => format!("{action} accepted for {instance_id}"),
        InstanceEvent::ActionFailed {
            action,
            instance_id: Some(id),
            error,
        } => format!("{action} failed for {id}: {error}"),
        InstanceEvent::ActionFailed {
            action,
            instance_id: None,
            error,
        } => format!("{action} failed: {error}"),
        InstanceEvent::BatchDeleteFinished { deleted, failed } if failed.is_empty() => {
            format!("deleted {} instances", deleted.len())
        }
        InstanceEvent::BatchDeleteFinished { deleted, failed } => format!(
            "deleted {} instances, {} failed: {}",
            deleted.len(),
            failed.len(),
            failed.join(", "),
        ),
    }
}

fn active_label(run_mode: &str, is_active: bool) -> &'static str {
    match (run_mode, is_active) {
        ("persistent", true) => "yes",
        ("persistent", false) => "no",
        _ => "-",
    }
}

fn last_run(at: Option<&Timestamp>) -> String {
    match at {
        Some(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "never".to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut cut: String = s.chars().take(max.saturating_sub(1)).collect();
    cut.push('~');
    cut
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use opsdeck_core::pagination::PageWindow;
    use opsdeck_core::workflow_instance::{InstanceAction, InstanceStatus, RunMode, WorkflowInstance};
    use opsdeck_workflow::InstanceRow;

    use super::*;

    fn row(id: &str, run_mode: RunMode, selected: bool) -> InstanceRow {
        let instance = WorkflowInstance {
            id: id.to_string(),
            name: format!("scan {id}"),
            description: None,
            status: InstanceStatus::Other("queued".into()),
            run_mode,
            trigger_type: None,
            is_active: true,
            nodes: vec![serde_json::json!({ "id": "n1" })],
            last_run_at: Some(chrono::Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap()),
            created_at: None,
            updated_at: None,
        };
        InstanceRow {
            actions: instance.available_actions(),
            instance,
            selected,
        }
    }

    #[test]
    fn table_shows_rows_and_footer() {
        let snapshot = ViewSnapshot {
            records: vec![row("a", RunMode::Once, true), row("b", RunMode::Persistent, false)],
            window: PageWindow {
                page: 1,
                page_size: 2,
                total: 3,
            },
            selected: vec!["a".into()],
        };

        let table = render_table(&snapshot);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("[x] a "));
        assert!(lines[1].contains("queued"));
        assert!(lines[1].contains("2026-03-04 05:06:07"));
        assert!(lines[2].starts_with("[ ] b "));
        assert!(lines[2].contains("deactivate"));
        assert_eq!(lines[3], "page 1/2 (3 total, 1 selected)");
    }

    #[test]
    fn once_rows_show_no_activation_state() {
        assert_eq!(active_label(RunMode::Once.as_str(), true), "-");
        assert_eq!(active_label(RunMode::Persistent.as_str(), true), "yes");
    }

    #[test]
    fn truncate_marks_cut() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd~");
    }

    #[test]
    fn describes_batch_failures() {
        let event = InstanceEvent::BatchDeleteFinished {
            deleted: vec!["a".into()],
            failed: vec!["b".into(), "c".into()],
        };
        assert_eq!(describe_event(&event), "deleted 1 instances, 2 failed: b, c");
    }

    #[test]
    fn describes_refused_action() {
        let event = InstanceEvent::ActionFailed {
            action: InstanceAction::Activate.as_str(),
            instance_id: Some("a".into()),
            error: "not available".into(),
        };
        assert_eq!(describe_event(&event), "activate failed for a: not available");
    }
}
