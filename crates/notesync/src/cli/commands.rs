//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::store::SortOrder;

/// New note arguments.
#[derive(Debug, Args)]
pub struct NewCommand {
    /// Note title
    pub title: String,

    /// Note text
    #[arg(short, long, default_value = "")]
    pub body: String,

    /// Comma-separated tags (e.g. "work, ideas")
    #[arg(short, long)]
    pub tags: Option<String>,

    /// Pin the new note
    #[arg(short, long)]
    pub pin: bool,
}

/// Show note arguments.
#[derive(Debug, Args)]
pub struct ShowCommand {
    /// Note id or unique id prefix
    pub id: String,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Edit note arguments.
#[derive(Debug, Args)]
pub struct EditCommand {
    /// Note id or unique id prefix
    pub id: String,

    /// New title
    #[arg(short = 'T', long)]
    pub title: Option<String>,

    /// New text
    #[arg(short, long)]
    pub body: Option<String>,

    /// New comma-separated tags (an empty string clears them)
    #[arg(short, long)]
    pub tags: Option<String>,
}

/// Arguments for commands that take a single note id.
#[derive(Debug, Args)]
pub struct IdCommand {
    /// Note id or unique id prefix
    pub id: String,
}

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Sort order (pinned notes always come first)
    #[arg(short, long, value_enum, default_value = "newest")]
    pub sort: SortArg,

    /// Only notes carrying this tag
    #[arg(short, long)]
    pub tag: Option<String>,

    /// List tombstones instead of active notes
    #[arg(long)]
    pub deleted: bool,

    /// Maximum number of results
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Search command arguments.
#[derive(Debug, Args)]
pub struct SearchCommand {
    /// The search query (title, text and tags, case-insensitive)
    pub query: String,

    /// Sort order for the results
    #[arg(short, long, value_enum, default_value = "newest")]
    pub sort: SortArg,

    /// Maximum number of results
    #[arg(short, long, default_value = "20")]
    pub limit: usize,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Sync command arguments.
#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Keep running and sync periodically until interrupted
    #[arg(short, long)]
    pub watch: bool,

    /// Seconds between syncs in watch mode
    #[arg(short, long, value_name = "SECS")]
    pub interval: Option<u64>,

    /// Sync folder to use for this run only
    #[arg(short, long, value_name = "DIR")]
    pub remote: Option<PathBuf>,

    /// Output the report as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Merge command arguments.
#[derive(Debug, Args)]
pub struct MergeCommand {
    /// Notes file to import (it is not modified)
    pub file: PathBuf,
}

/// Purge command arguments.
#[derive(Debug, Args)]
pub struct PurgeCommand {
    /// Remove tombstones older than this many days (0 removes all)
    #[arg(long, value_name = "DAYS")]
    pub older_than_days: Option<u32>,
}

/// Sync folder commands.
#[derive(Debug, Subcommand)]
pub enum RemoteCommand {
    /// Set the sync folder
    Set {
        /// Folder shared between machines (e.g. inside OneDrive or Dropbox)
        dir: PathBuf,
    },

    /// Show the sync folder and last sync time
    Show,

    /// Forget the sync folder
    Clear,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Sort order argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SortArg {
    /// Most recently modified first
    #[default]
    Newest,
    /// Least recently modified first
    Oldest,
    /// Title A-Z
    Title,
    /// Title Z-A
    TitleDesc,
    /// Longest text first
    Size,
}

impl From<SortArg> for SortOrder {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Newest => Self::Newest,
            SortArg::Oldest => Self::Oldest,
            SortArg::Title => Self::Title,
            SortArg::TitleDesc => Self::TitleDesc,
            SortArg::Size => Self::Size,
        }
    }
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// Formatted table
    Table,
    /// JSON output
    Json,
}
