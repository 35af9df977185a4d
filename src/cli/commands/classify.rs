//! Classify command: dry-run of the category rules.

use anyhow::Result;

use crate::cli::Context;

pub fn run(ctx: &Context, files: &[String]) -> Result<()> {
    let engine = ctx.engine()?;
    let width = files.iter().map(|f| f.len()).max().unwrap_or(0);
    for file in files {
        let name = std::path::Path::new(file)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file.clone());
        println!("{file:<width$}  {}", engine.classify(&name));
    }
    Ok(())
}
