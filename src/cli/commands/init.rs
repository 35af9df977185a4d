//! Init and Config commands.

use anyhow::{Result, bail};
use std::path::PathBuf;

use crate::cli::Context;
use sortify::Settings;

/// Run init command - create configuration file and library document.
pub fn run_init(force: bool, library: Option<PathBuf>) -> Result<()> {
    let config_path = PathBuf::from(".sortify/settings.toml");

    if config_path.exists() && !force {
        bail!(
            "configuration file already exists at {} (use --force to overwrite)",
            config_path.display()
        );
    }

    let path = Settings::init_config_file(force).map_err(|e| anyhow::anyhow!("{e}"))?;
    println!("Created configuration file at: {}", path.display());

    let ctx = Context::load(Some(path.as_path()), library.as_deref())?;
    ctx.library()?;
    println!("Category library at: {}", ctx.library_path.display());
    println!("Edit these files to customize your settings.");
    Ok(())
}

/// Run config command - display current configuration.
pub fn run_config(ctx: &Context) -> Result<()> {
    println!("Current Configuration:");
    println!("{}", "=".repeat(50));
    println!("{}", toml::to_string_pretty(&ctx.settings)?);
    println!("Library: {}", ctx.library_path.display());
    Ok(())
}
