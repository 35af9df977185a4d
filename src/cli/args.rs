//! CLI argument parsing using clap.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

const AFTER_HELP: &str = "\
Quick Start:
  $ sortify paths add ~/Downloads          # Register a folder
  $ sortify organize ~/Downloads           # Sort it once
  $ sortify watch --all                    # Keep sorting new files
  $ sortify undo ~/Downloads/Images/a.jpg ~/Downloads/a.jpg";

/// Rule-based file organizer
#[derive(Parser)]
#[command(
    name = "sortify",
    version = env!("CARGO_PKG_VERSION"),
    about = "Sort files into category folders by extension",
    next_line_help = true,
    styles = clap_cargo_style(),
    after_help = AFTER_HELP
)]
pub struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the categories/paths JSON document (overrides settings)
    #[arg(long, global = true, env = "SORTIFY_LIBRARY")]
    pub library: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Set up .sortify directory with default configuration
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Display active settings
    Config,

    /// Move the files directly inside a folder into category subfolders
    Organize {
        /// Folder path or registered path id
        #[arg(value_name = "PATH|ID")]
        target: String,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Monitor registered folders and organize new files as they settle
    Watch {
        /// Path ids to monitor (default: paths with auto-organize enabled)
        #[arg(value_name = "ID")]
        ids: Vec<String>,

        /// Monitor every registered path
        #[arg(long, conflicts_with = "ids")]
        all: bool,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Move an organized file back to where it came from
    Undo {
        /// Current location of the file
        source: PathBuf,

        /// Location to restore it to
        target: PathBuf,
    },

    /// Show the category each file name maps to
    Classify {
        #[arg(required = true, value_name = "FILE")]
        files: Vec<String>,
    },

    /// Manage watched folders
    Paths {
        #[command(subcommand)]
        action: PathAction,
    },

    /// Manage category rules
    Categories {
        #[command(subcommand)]
        action: CategoryAction,
    },
}

#[derive(Subcommand)]
pub enum PathAction {
    /// List registered folders and their stats
    List {
        #[arg(long)]
        json: bool,
    },

    /// Register a folder
    Add {
        path: PathBuf,

        /// Display name (defaults to the folder name)
        #[arg(short, long)]
        name: Option<String>,

        /// Monitor this folder when `watch` runs without ids
        #[arg(long)]
        auto: bool,
    },

    /// Unregister a folder (files are not touched)
    Remove {
        #[arg(value_name = "PATH|ID")]
        target: String,
    },

    /// Enable or disable auto-organize for a folder
    Auto {
        #[arg(value_name = "PATH|ID")]
        target: String,

        #[arg(
            action = clap::ArgAction::Set,
            value_parser = clap::builder::BoolishValueParser::new(),
            value_name = "on|off"
        )]
        enabled: bool,
    },
}

#[derive(Subcommand)]
pub enum CategoryAction {
    /// List categories and their extensions
    List {
        #[arg(long)]
        json: bool,
    },

    /// Add a category
    Add {
        name: String,

        /// Extensions, with or without the leading dot
        #[arg(value_name = "EXT")]
        extensions: Vec<String>,
    },

    /// Remove a category
    Remove { name: String },

    /// Add extensions to a category
    AddExt {
        category: String,

        #[arg(required = true, value_name = "EXT")]
        extensions: Vec<String>,
    },

    /// Remove extensions from a category
    RemoveExt {
        category: String,

        #[arg(required = true, value_name = "EXT")]
        extensions: Vec<String>,
    },
}
