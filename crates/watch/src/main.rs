//! `opsdeck-watch` -- terminal view of a project's workflow instances.
//!
//! Mounts the instance view for one project, keeps it fresh by polling,
//! and reads operator commands from stdin (see `help`). Configuration is
//! read from the environment; see [`opsdeck_watch::config`].

use std::sync::Arc;

use opsdeck_client::{ConsoleApi, InstanceBackend};
use opsdeck_watch::commands::{self, Reply};
use opsdeck_watch::config::WatchConfig;
use opsdeck_watch::render;
use opsdeck_workflow::{InstanceEvent, InstanceManager};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "opsdeck_watch=info,opsdeck_workflow=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = WatchConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });

    let api = ConsoleApi::new(&config.client_config()).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to build API client");
        std::process::exit(1);
    });

    tracing::info!(
        api_url = %api.base_url(),
        project_id = %config.project_id,
        poll_interval_secs = config.poll_interval.as_secs(),
        page_size = config.page_size,
        "Starting opsdeck-watch",
    );

    let backend: Arc<dyn InstanceBackend> = Arc::new(api);
    let manager = InstanceManager::mount(backend, config.manager_config())
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to mount instance view");
            std::process::exit(1);
        });

    let events = tokio::spawn(log_events(manager.subscribe()));

    println!("{}", render::render_table(&manager.snapshot().await));
    run_repl(&manager).await;

    manager.teardown().await;
    events.abort();
    tracing::info!("opsdeck-watch stopped");
}

/// Read commands until `quit`, end of input, or Ctrl-C.
async fn run_repl(manager: &InstanceManager) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                return;
            }
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => return,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read stdin");
                return;
            }
        };

        let command = match commands::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        match commands::execute(manager, command).await {
            Ok(Reply::Text(text)) => println!("{text}"),
            Ok(Reply::Quit) => return,
            Err(e) => println!("error: {e}"),
        }
    }
}

/// Forward view notifications to the log.
async fn log_events(mut rx: broadcast::Receiver<InstanceEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                if let Ok(json) = serde_json::to_string(&event) {
                    tracing::debug!(event = %json, "Instance event");
                }
                match &event {
                    InstanceEvent::ReloadFailed { .. }
                    | InstanceEvent::ActionFailed { .. } => {
                        tracing::warn!("{}", render::describe_event(&event));
                    }
                    InstanceEvent::ReloadApplied { .. } => {}
                    _ => tracing::info!("{}", render::describe_event(&event)),
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event log fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}
