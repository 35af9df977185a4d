//! Undo command.

use anyhow::Result;
use console::style;
use std::path::Path;

use crate::cli::Context;

pub async fn run(ctx: &Context, source: &Path, target: &Path) -> Result<()> {
    let engine = ctx.engine()?;
    let outcome = engine.undo_move(source, target).await?;

    if outcome.renamed {
        println!(
            "{} {} was taken, restored as {}",
            style("renamed").yellow(),
            target.display(),
            outcome.resolved_path.display()
        );
    } else {
        println!(
            "{} {}",
            style("restored").green(),
            outcome.resolved_path.display()
        );
    }
    Ok(())
}
