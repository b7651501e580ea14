//! Command-line interface for notesync.
//!
//! This module provides the CLI structure for the `notes` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::logging::Verbosity;

pub use commands::{
    ConfigCommand, EditCommand, IdCommand, ListCommand, MergeCommand, NewCommand, OutputFormat,
    PurgeCommand, RemoteCommand, SearchCommand, ShowCommand, SortArg, StatusCommand, SyncCommand,
};

/// notes - Keep notes in a JSON file and sync them through a shared folder
///
/// Notes are stored locally and merged with a copy in a cloud-synced folder
/// using last-write-wins. Concurrent edits are kept as "Conflict:" notes.
#[derive(Debug, Parser)]
#[command(name = "notes")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for progress, -vv for merge details)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a note
    New(NewCommand),

    /// Show a note
    Show(ShowCommand),

    /// Edit a note
    Edit(EditCommand),

    /// Delete a note (kept as a tombstone until purged)
    Delete(IdCommand),

    /// Pin a note to the top of listings
    Pin(IdCommand),

    /// Unpin a note
    Unpin(IdCommand),

    /// List notes
    List(ListCommand),

    /// Search notes
    Search(SearchCommand),

    /// List all tags in use
    Tags,

    /// Show store and sync status
    Status(StatusCommand),

    /// Sync with the sync folder
    Sync(SyncCommand),

    /// Import notes from another notes file
    Merge(MergeCommand),

    /// Permanently remove old tombstones
    Purge(PurgeCommand),

    /// Manage the sync folder
    #[command(subcommand)]
    Remote(RemoteCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::Trace,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_name() {
        assert_eq!(Cli::command().get_name(), "notes");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_flags() {
        assert_eq!(parse(&["notes", "tags"]).verbosity(), Verbosity::Normal);
        assert_eq!(parse(&["notes", "-v", "tags"]).verbosity(), Verbosity::Verbose);
        assert_eq!(parse(&["notes", "-vv", "tags"]).verbosity(), Verbosity::Trace);
        assert_eq!(parse(&["notes", "-q", "-v", "tags"]).verbosity(), Verbosity::Quiet);
    }

    #[test]
    fn test_parse_new() {
        let cli = parse(&["notes", "new", "Groceries", "-b", "milk", "-t", "home, errands"]);
        let Command::New(cmd) = cli.command else {
            panic!("expected new");
        };
        assert_eq!(cmd.title, "Groceries");
        assert_eq!(cmd.body, "milk");
        assert_eq!(cmd.tags.as_deref(), Some("home, errands"));
        assert!(!cmd.pin);
    }

    #[test]
    fn test_parse_new_body_defaults_empty() {
        let Command::New(cmd) = parse(&["notes", "new", "Title only"]).command else {
            panic!("expected new");
        };
        assert_eq!(cmd.body, "");
    }

    #[test]
    fn test_parse_edit() {
        let cli = parse(&["notes", "edit", "ab12", "-T", "Renamed", "--tags", ""]);
        let Command::Edit(cmd) = cli.command else {
            panic!("expected edit");
        };
        assert_eq!(cmd.id, "ab12");
        assert_eq!(cmd.title.as_deref(), Some("Renamed"));
        assert!(cmd.body.is_none());
        assert_eq!(cmd.tags.as_deref(), Some(""));
    }

    #[test]
    fn test_parse_pin_and_delete() {
        assert!(matches!(parse(&["notes", "pin", "ab"]).command, Command::Pin(_)));
        assert!(matches!(parse(&["notes", "unpin", "ab"]).command, Command::Unpin(_)));
        assert!(matches!(parse(&["notes", "delete", "ab"]).command, Command::Delete(_)));
    }

    #[test]
    fn test_parse_list() {
        let cli = parse(&["notes", "list", "--sort", "title-desc", "--tag", "work", "-f", "json"]);
        let Command::List(cmd) = cli.command else {
            panic!("expected list");
        };
        assert_eq!(cmd.sort, SortArg::TitleDesc);
        assert_eq!(cmd.tag.as_deref(), Some("work"));
        assert_eq!(cmd.format, OutputFormat::Json);
        assert!(!cmd.deleted);
    }

    #[test]
    fn test_parse_list_defaults() {
        let Command::List(cmd) = parse(&["notes", "list"]).command else {
            panic!("expected list");
        };
        assert_eq!(cmd.sort, SortArg::Newest);
        assert_eq!(cmd.format, OutputFormat::Table);
        assert!(cmd.limit.is_none());
    }

    #[test]
    fn test_parse_search() {
        let Command::Search(cmd) = parse(&["notes", "search", "meeting notes"]).command else {
            panic!("expected search");
        };
        assert_eq!(cmd.query, "meeting notes");
        assert_eq!(cmd.limit, 20);
    }

    #[test]
    fn test_parse_sync_watch() {
        let cli = parse(&["notes", "sync", "--watch", "--interval", "30", "--remote", "/mnt/cloud"]);
        let Command::Sync(cmd) = cli.command else {
            panic!("expected sync");
        };
        assert!(cmd.watch);
        assert_eq!(cmd.interval, Some(30));
        assert_eq!(cmd.remote, Some(PathBuf::from("/mnt/cloud")));
    }

    #[test]
    fn test_parse_merge() {
        let Command::Merge(cmd) = parse(&["notes", "merge", "backup.json"]).command else {
            panic!("expected merge");
        };
        assert_eq!(cmd.file, PathBuf::from("backup.json"));
    }

    #[test]
    fn test_parse_purge() {
        let Command::Purge(cmd) = parse(&["notes", "purge", "--older-than-days", "7"]).command
        else {
            panic!("expected purge");
        };
        assert_eq!(cmd.older_than_days, Some(7));
    }

    #[test]
    fn test_parse_remote_set() {
        let cli = parse(&["notes", "remote", "set", "/mnt/cloud"]);
        assert!(matches!(
            cli.command,
            Command::Remote(RemoteCommand::Set { .. })
        ));
    }

    #[test]
    fn test_parse_config_validate() {
        let cli = parse(&["notes", "config", "validate", "--file", "/tmp/c.toml"]);
        assert!(matches!(
            cli.command,
            Command::Config(ConfigCommand::Validate { file: Some(_) })
        ));
    }

    #[test]
    fn test_parse_with_config() {
        let cli = parse(&["notes", "-c", "/custom/config.toml", "status"]);
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_parse_global_flag_after_subcommand() {
        let cli = parse(&["notes", "status", "--json", "-v"]);
        assert_eq!(cli.verbose, 1);
        assert!(matches!(cli.command, Command::Status(StatusCommand { json: true })));
    }

    #[test]
    fn test_missing_command_is_error() {
        assert!(Cli::try_parse_from(["notes"]).is_err());
    }
}
