//! Operator commands read from stdin.

use opsdeck_core::error::CoreError;
use opsdeck_core::workflow_instance::{InstanceAction, RunMode};
use opsdeck_workflow::{ActionError, InstanceManager, ReloadOutcome};

use crate::render;

pub const HELP: &str = "\
commands:
  list                          show the current page
  reload                        reload the current page now
  page N                        go to page N
  size N                        set the page size (back to page 1)
  select ID                     toggle selection of an instance
  select-all                    select every instance on the page
  clear                         clear the selection
  create NAME [once|persistent] create an empty instance
  start|stop|sync|activate|deactivate|delete ID
  delete-selected               delete every selected instance
  help                          show this help
  quit                          tear down and exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Reload,
    Page(u32),
    PageSize(u32),
    Select(String),
    SelectAll,
    Clear,
    Create { name: String, run_mode: RunMode },
    Action(InstanceAction, String),
    DeleteSelected,
    Help,
    Quit,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command \"{0}\" (try help)")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),
}

/// What the REPL should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Quit,
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    let Some((head, rest)) = split_head(line) else {
        return Ok(None);
    };

    let command = match head {
        "list" | "ls" => Command::List,
        "reload" => Command::Reload,
        "page" => Command::Page(number(rest, "page N")?),
        "size" => Command::PageSize(number(rest, "size N")?),
        "select" => Command::Select(single_id(rest, "select ID")?),
        "select-all" => Command::SelectAll,
        "clear" => Command::Clear,
        "create" => parse_create(rest)?,
        "start" => Command::Action(InstanceAction::Start, single_id(rest, "start ID")?),
        "stop" => Command::Action(InstanceAction::Stop, single_id(rest, "stop ID")?),
        "sync" => Command::Action(InstanceAction::Sync, single_id(rest, "sync ID")?),
        "activate" => Command::Action(InstanceAction::Activate, single_id(rest, "activate ID")?),
        "deactivate" => {
            Command::Action(InstanceAction::Deactivate, single_id(rest, "deactivate ID")?)
        }
        "delete" => Command::Action(InstanceAction::Delete, single_id(rest, "delete ID")?),
        "delete-selected" => Command::DeleteSelected,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

/// Run a parsed command against the mounted view.
pub async fn execute(manager: &InstanceManager, command: Command) -> Result<Reply, ActionError> {
    let text = match command {
        Command::List => render::render_table(&manager.snapshot().await),
        Command::Reload => {
            let outcome = manager
                .reload()
                .await
                .map_err(|source| ActionError::Backend {
                    action: "reload",
                    source,
                })?;
            describe_reload(outcome)
        }
        Command::Page(page) => describe_reload(manager.set_page(page).await?),
        Command::PageSize(size) => describe_reload(manager.set_page_size(size).await?),
        Command::Select(id) => {
            if manager.get(&id).await.is_none() {
                return Err(CoreError::NotFound {
                    entity: "workflow instance",
                    id,
                }
                .into());
            }
            if manager.toggle(&id).await {
                format!("selected {id}")
            } else {
                format!("deselected {id}")
            }
        }
        Command::SelectAll => format!("selected {} instances", manager.select_all().await),
        Command::Clear => {
            manager.clear_selection().await;
            "selection cleared".to_string()
        }
        Command::Create { name, run_mode } => {
            let created = manager.controller().create(&name, run_mode).await?;
            format!("created {} ({})", created.name, created.id)
        }
        Command::Action(action, id) => {
            manager.controller().execute(action, &id).await?;
            format!("{action} accepted for {id}")
        }
        Command::DeleteSelected => {
            let report = manager.controller().batch_delete().await?;
            let mut text = format!("deleted {} instances", report.deleted.len());
            for failure in &report.failed {
                text.push_str(&format!("\n  {} failed: {}", failure.instance_id, failure.error));
            }
            text
        }
        Command::Help => HELP.to_string(),
        Command::Quit => return Ok(Reply::Quit),
    };
    Ok(Reply::Text(text))
}

fn describe_reload(outcome: ReloadOutcome) -> String {
    match outcome {
        ReloadOutcome::Applied { page, total } => format!("page {page} loaded ({total} total)"),
        ReloadOutcome::Stale => "superseded by a newer reload".to_string(),
        ReloadOutcome::Cancelled => "view is no longer mounted".to_string(),
    }
}

fn split_head(line: &str) -> Option<(&str, &str)> {
    if line.is_empty() {
        return None;
    }
    Some(match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    })
}

fn number(rest: &str, usage: &'static str) -> Result<u32, CommandError> {
    rest.parse().map_err(|_| CommandError::Usage(usage))
}

fn single_id(rest: &str, usage: &'static str) -> Result<String, CommandError> {
    if rest.is_empty() || rest.contains(char::is_whitespace) {
        return Err(CommandError::Usage(usage));
    }
    Ok(rest.to_string())
}

/// `create NAME [once|persistent]`: a trailing run mode is optional and
/// everything before it is the name.
fn parse_create(rest: &str) -> Result<Command, CommandError> {
    const USAGE: &str = "create NAME [once|persistent]";

    let (name, run_mode) = match rest.rsplit_once(char::is_whitespace) {
        Some((name, last)) => match last.parse::<RunMode>() {
            Ok(mode) => (name.trim(), mode),
            Err(_) => (rest, RunMode::default()),
        },
        None => (rest, RunMode::default()),
    };

    if name.is_empty() {
        return Err(CommandError::Usage(USAGE));
    }
    Ok(Command::Create {
        name: name.to_string(),
        run_mode,
    })
}
