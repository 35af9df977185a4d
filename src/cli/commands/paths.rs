//! Watched folder management (paths list/add/remove/auto).

use anyhow::Result;
use console::style;

use super::resolve_target;
use crate::cli::{Context, PathAction};

pub async fn run(ctx: &Context, action: PathAction) -> Result<()> {
    let engine = ctx.engine()?;

    match action {
        PathAction::List { json } => {
            let paths = engine.paths();
            if json {
                println!("{}", serde_json::to_string_pretty(&paths)?);
                return Ok(());
            }
            if paths.is_empty() {
                println!("No folders registered. Add one with `sortify paths add <DIR>`.");
                return Ok(());
            }
            for entry in paths {
                let auto = if entry.auto_organize {
                    style("auto").green().to_string()
                } else {
                    style("manual").dim().to_string()
                };
                println!(
                    "{}  {:<20} {:<6} {:>6} files  {}",
                    style(&entry.id).cyan(),
                    entry.name,
                    auto,
                    entry.stats.files_organized,
                    entry.path.display()
                );
                if let Some(last) = entry.stats.last_organized {
                    println!("{:14}last organized {last}", "");
                }
            }
        }

        PathAction::Add { path, name, auto } => {
            let mut entry = engine.add_path(&path, name.as_deref())?;
            if auto {
                entry = engine.set_auto_organize(&entry.id, true)?;
            }
            ctx.save(&engine)?;
            println!(
                "Added {} as {} ({})",
                entry.path.display(),
                style(&entry.id).cyan(),
                entry.name
            );
        }

        PathAction::Remove { target } => {
            let entry = resolve_target(&engine, &target)?;
            engine.remove_path(&entry.id).await?;
            ctx.save(&engine)?;
            println!("Removed {} ({})", entry.name, entry.path.display());
        }

        PathAction::Auto { target, enabled } => {
            let entry = resolve_target(&engine, &target)?;
            let entry = engine.set_auto_organize(&entry.id, enabled)?;
            ctx.save(&engine)?;
            println!(
                "Auto-organize {} for {}",
                if enabled { "enabled" } else { "disabled" },
                entry.name
            );
        }
    }

    Ok(())
}
