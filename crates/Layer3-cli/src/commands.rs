//! Command implementations

use anyhow::Context;
use hub_task::{AutomationConfig, Hub, RunId, ScriptRunState};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

const FOLLOW_POLL: Duration = Duration::from_millis(250);

/// Parse `key=value`; the value is read as JSON when it parses, else as text
pub fn parse_setting(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{}'", raw));
    }

    let value = serde_json::from_str::<Value>(value)
        .ok()
        .filter(|v| !v.is_object() && !v.is_array())
        .unwrap_or_else(|| Value::String(value.to_string()));

    Ok((key.to_string(), value))
}

/// Error code and exit status for a failed command; caller mistakes exit 2
pub fn error_code(err: &anyhow::Error) -> (&'static str, i32) {
    match err.chain().find_map(|e| e.downcast_ref::<hub_foundation::Error>()) {
        Some(e) if e.is_user_facing() => (e.kind(), 2),
        Some(e) => (e.kind(), 1),
        None => ("error", 1),
    }
}

pub fn types(hub: &Hub) -> anyhow::Result<()> {
    let types = hub.automations().available_types();
    println!("{}", serde_json::to_string_pretty(&types)?);
    Ok(())
}

pub async fn scripts(hub: &Hub) -> anyhow::Result<()> {
    let scripts = hub.scripts().list_scripts().await?;
    if scripts.is_empty() {
        println!("No scripts in {}", hub.scripts().root().display());
        return Ok(());
    }

    println!("{:<32} {:<6} {:>10} {:<8}", "FILENAME", "TYPE", "SIZE", "RUNNING");
    for script in scripts {
        println!(
            "{:<32} {:<6} {:>10} {:<8}",
            script.filename,
            script.extension,
            script.size,
            if script.is_running { "yes" } else { "" }
        );
    }
    Ok(())
}

pub async fn run_script(hub: &Hub, filename: &str, follow: bool) -> anyhow::Result<()> {
    let ticket = hub
        .scripts()
        .run(filename)
        .await
        .with_context(|| format!("Failed to start {}", filename))?;

    if !follow {
        println!("{}", serde_json::to_string_pretty(&ticket)?);
        return Ok(());
    }

    info!("Following run {} (Ctrl-C stops it)", ticket.id);
    let run = tokio::select! {
        run = wait_for_run(hub, &ticket.id) => run,
        _ = tokio::signal::ctrl_c() => {
            hub.scripts().stop(&ticket.id).await?;
            wait_for_run(hub, &ticket.id).await
        }
    };

    println!("{}", serde_json::to_string_pretty(&run)?);
    if run.status != ScriptRunState::Completed {
        anyhow::bail!("{} ended {}", filename, run.status);
    }
    Ok(())
}

/// Poll until the worker has recorded the run in history
async fn wait_for_run(hub: &Hub, id: &RunId) -> hub_task::ScriptRun {
    loop {
        if let Some(run) = hub.scripts().history().await.into_iter().find(|r| &r.id == id) {
            return run;
        }
        tokio::time::sleep(FOLLOW_POLL).await;
    }
}

pub async fn watch(hub: &Hub, kind: &str, settings: Vec<(String, Value)>) -> anyhow::Result<()> {
    let config: AutomationConfig = settings.into_iter().collect();
    let mut rx = hub.subscribe();

    let created = hub.automations().create(kind).await?;
    hub.automations().start(created.id, config).await?;

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Ok(status) => {
                    println!("{}", serde_json::to_string(&status)?);
                    if !status.is_running() && status.id == created.id {
                        break;
                    }
                }
                Err(RecvError::Lagged(n)) => warn!("Skipped {} status updates", n),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    hub.shutdown().await;
    Ok(())
}
