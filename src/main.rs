//! sortify: sort folders into category subfolders, once or continuously.

mod cli;

use anyhow::Result;
use clap::Parser;

use cli::commands;
use cli::{Cli, Commands, Context};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let command = match cli.command {
        Commands::Init { force } => {
            sortify::logging::init();
            return commands::init::run_init(force, cli.library);
        }
        command => command,
    };

    let ctx = Context::load(cli.config.as_deref(), cli.library.as_deref())?;
    sortify::logging::init_with_config(&ctx.settings.logging);

    match command {
        Commands::Config => commands::init::run_config(&ctx),
        Commands::Organize { target, json } => commands::organize::run(&ctx, &target, json).await,
        Commands::Watch { ids, all, json } => commands::watch::run(&ctx, &ids, all, json).await,
        Commands::Undo { source, target } => commands::undo::run(&ctx, &source, &target).await,
        Commands::Classify { files } => commands::classify::run(&ctx, &files),
        Commands::Paths { action } => commands::paths::run(&ctx, action).await,
        Commands::Categories { action } => commands::categories::run(&ctx, action),
        Commands::Init { .. } => Ok(()),
    }
}
