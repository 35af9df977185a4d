//! One-shot organize command.

use anyhow::{Result, bail};
use console::style;
use std::path::Path;

use crate::cli::Context;
use sortify::OrganizeReport;

pub async fn run(ctx: &Context, target: &str, json: bool) -> Result<()> {
    let engine = ctx.engine()?;

    let (root, report) = match engine.resolve_path(target) {
        Some(entry) => {
            let report = engine.organize_id(&entry.id).await?;
            ctx.save(&engine)?;
            (entry.path, report)
        }
        None => {
            let root = Path::new(target).to_path_buf();
            (root.clone(), engine.organize(&root).await?)
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&root, &report);
    }

    if !report.is_clean() {
        bail!("{} file(s) could not be moved", report.failures.len());
    }
    Ok(())
}

fn print_report(root: &Path, report: &OrganizeReport) {
    for outcome in &report.outcomes {
        let from = outcome
            .original_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let to = outcome
            .resolved_destination_path
            .strip_prefix(root)
            .unwrap_or(&outcome.resolved_destination_path);
        println!("  {} {from} -> {}", style("moved").green(), to.display());
    }
    for failure in &report.failures {
        println!(
            "  {} {}: {}",
            style("failed").red(),
            failure.path.display(),
            failure.error
        );
    }

    println!(
        "\n{} moved, {} left in place, {} failed in {}",
        style(report.moved_count).bold(),
        report.skipped_count,
        report.failures.len(),
        root.display()
    );
}
