//! Watch command: monitor folders until Ctrl-C.

use anyhow::{Result, bail};
use console::style;
use tokio::sync::broadcast::error::RecvError;

use super::resolve_target;
use crate::cli::Context;
use sortify::{EngineEvent, MoveSource};

pub async fn run(ctx: &Context, ids: &[String], all: bool, json: bool) -> Result<()> {
    let engine = ctx.engine()?;

    let targets: Vec<_> = if all {
        engine.paths()
    } else if ids.is_empty() {
        engine.paths().into_iter().filter(|p| p.auto_organize).collect()
    } else {
        ids.iter()
            .map(|id| resolve_target(&engine, id))
            .collect::<Result<_>>()?
    };
    if targets.is_empty() {
        bail!("nothing to watch: pass path ids, --all, or enable one with `sortify paths auto <ID> on`");
    }

    let mut events = engine.subscribe();
    for entry in &targets {
        engine.start_monitoring(&entry.id)?;
        if !json {
            println!(
                "{} {} ({})",
                style("watching").cyan().bold(),
                entry.name,
                entry.path.display()
            );
        }
    }
    ctx.save(&engine)?;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            received = events.recv() => match received {
                Ok(event) => {
                    print_event(&event, json)?;
                    if matches!(event, EngineEvent::MonitoringStopped { .. })
                        && engine.active_watchers() == 0
                    {
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!("[watch] output fell behind, {missed} events not shown");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    let sessions: Vec<_> = targets
        .iter()
        .filter_map(|entry| engine.monitoring_since(&entry.id).map(|since| (entry, since)))
        .collect();
    engine.shutdown().await;
    ctx.save(&engine)?;
    if !json {
        for (entry, since) in sessions {
            let elapsed = chrono::Utc::now().signed_duration_since(since);
            println!(
                "{} {} after {}s",
                style("stopped").yellow(),
                entry.name,
                elapsed.num_seconds()
            );
        }
    }
    Ok(())
}

fn print_event(event: &EngineEvent, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }

    let origin = event
        .path_id()
        .map(|id| format!("[{id}] "))
        .unwrap_or_default();
    match event {
        EngineEvent::FileOrganized {
            source,
            details: event,
            ..
        } => {
            let tag = match source {
                MoveSource::Monitoring => style("organized").green(),
                MoveSource::Manual => style("moved").green(),
            };
            let renamed = if event.file_name != event.actual_file_name {
                format!(" as {}", event.actual_file_name)
            } else {
                String::new()
            };
            println!(
                "{origin}{tag} {} -> {}{renamed}",
                event.file_name, event.category
            );
        }
        EngineEvent::OrganizeFailed { file, error, .. } => {
            println!("{origin}{} {}: {error}", style("failed").red(), file.display());
        }
        EngineEvent::MonitoringStopped { reason, .. } => {
            println!("{origin}{} {reason}", style("stopped").yellow().bold());
        }
    }
    Ok(())
}
