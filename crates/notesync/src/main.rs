//! `notes` - CLI for notesync
//!
//! This binary manages a local note store and syncs it through a shared
//! folder.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Parser;

use notesync::cli::{
    Cli, Command, ConfigCommand, EditCommand, ListCommand, NewCommand, OutputFormat,
    RemoteCommand, SearchCommand, ShowCommand, SyncCommand,
};
use notesync::note::{parse_tags, Note, NoteUpdate};
use notesync::store::NotesDocument;
use notesync::sync::{reconcile_stores, run_autosync, FolderRemote, SyncState};
use notesync::{init_logging, Config, Error, NoteStore, SortOrder, SyncManager, SyncReport};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    match cli.command {
        Command::New(cmd) => handle_new(&config, cmd),
        Command::Show(cmd) => handle_show(&config, &cmd),
        Command::Edit(cmd) => handle_edit(&config, cmd),
        Command::Delete(cmd) => {
            let mut store = open_store(&config)?;
            let id = store.resolve_id(&cmd.id)?;
            if !store.delete(&id)? {
                bail!("note {} is already deleted", short(&id));
            }
            println!("Deleted {}", short(&id));
            Ok(())
        }
        Command::Pin(cmd) => handle_pin(&config, &cmd.id, true),
        Command::Unpin(cmd) => handle_pin(&config, &cmd.id, false),
        Command::List(cmd) => handle_list(&config, &cmd),
        Command::Search(cmd) => handle_search(&config, &cmd),
        Command::Tags => {
            let store = open_store(&config)?;
            for tag in store.tags() {
                println!("{tag}");
            }
            Ok(())
        }
        Command::Status(cmd) => handle_status(&config, cmd.json),
        Command::Sync(cmd) => handle_sync(&config, &cmd),
        Command::Merge(cmd) => handle_merge(&config, &cmd.file),
        Command::Purge(cmd) => {
            let Some(retention) = config.purge_retention(cmd.older_than_days) else {
                println!(
                    "Tombstone retention is disabled (tombstone_retention_days = 0); nothing purged"
                );
                return Ok(());
            };
            let mut store = open_store(&config)?;
            let removed = store.cleanup_tombstones(retention)?;
            println!(
                "Removed {removed} tombstones older than {} days",
                retention.num_days()
            );
            Ok(())
        }
        Command::Remote(cmd) => handle_remote(&config, cmd),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn open_store(config: &Config) -> anyhow::Result<NoteStore> {
    let path = config.notes_path();
    NoteStore::open(&path).with_context(|| format!("opening notes at {}", path.display()))
}

fn short(id: &str) -> &str {
    notesync::note::short_id(id)
}

fn handle_new(config: &Config, cmd: NewCommand) -> anyhow::Result<()> {
    let mut store = open_store(config)?;
    let tags = cmd.tags.as_deref().map(parse_tags).unwrap_or_default();
    let id = store.create(cmd.title, cmd.body, tags)?;
    if cmd.pin {
        store.set_pinned(&id, true)?;
    }
    println!("{id}");
    Ok(())
}

fn handle_show(config: &Config, cmd: &ShowCommand) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let id = store.resolve_id(&cmd.id)?;
    let note = store
        .get_including_deleted(&id)
        .ok_or_else(|| Error::note_not_found(&id))?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(note)?);
        return Ok(());
    }

    println!("{}", note.title);
    println!("{}", "-".repeat(note.title.chars().count().max(3)));
    println!("Id:       {}", note.id);
    println!("Modified: {} (v{})", format_time(note), note.version);
    if !note.tags.is_empty() {
        println!("Tags:     {}", note.tags.join(", "));
    }
    if note.pinned {
        println!("Pinned:   yes");
    }
    if note.deleted {
        println!("Deleted:  yes");
    }
    if !note.body.is_empty() {
        println!();
        println!("{}", note.body);
    }
    Ok(())
}

fn handle_edit(config: &Config, cmd: EditCommand) -> anyhow::Result<()> {
    let update = NoteUpdate {
        title: cmd.title,
        body: cmd.body,
        tags: cmd.tags.as_deref().map(parse_tags),
    };
    if update.is_empty() {
        bail!("nothing to change (use --title, --body or --tags)");
    }

    let mut store = open_store(config)?;
    let id = store.resolve_id(&cmd.id)?;
    if !store.update(&id, update)? {
        bail!("note {} is deleted", short(&id));
    }
    println!("Updated {}", short(&id));
    Ok(())
}

fn handle_pin(config: &Config, id: &str, pinned: bool) -> anyhow::Result<()> {
    let mut store = open_store(config)?;
    let id = store.resolve_id(id)?;
    if !store.set_pinned(&id, pinned)? {
        bail!("note {} is deleted", short(&id));
    }
    println!("{} {}", if pinned { "Pinned" } else { "Unpinned" }, short(&id));
    Ok(())
}

fn handle_list(config: &Config, cmd: &ListCommand) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let mut notes: Vec<&Note> = if cmd.deleted {
        let mut tombstones = store.tombstones();
        tombstones.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        tombstones
    } else {
        store.sorted(SortOrder::from(cmd.sort))
    };
    if let Some(tag) = &cmd.tag {
        notes.retain(|n| n.has_tag(tag));
    }
    if let Some(limit) = cmd.limit {
        notes.truncate(limit);
    }
    print_notes(&notes, cmd.format)
}

fn handle_search(config: &Config, cmd: &SearchCommand) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let hits: Vec<String> = store.search(&cmd.query).iter().map(|n| n.id.clone()).collect();
    let mut notes: Vec<&Note> = store
        .sorted(SortOrder::from(cmd.sort))
        .into_iter()
        .filter(|n| hits.contains(&n.id))
        .collect();
    notes.truncate(cmd.limit);

    if notes.is_empty() && cmd.format != OutputFormat::Json {
        println!("No notes match \"{}\"", cmd.query);
        return Ok(());
    }
    print_notes(&notes, cmd.format)
}

fn print_notes(notes: &[&Note], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(notes)?);
        }
        OutputFormat::Plain => {
            for note in notes {
                let pin = if note.pinned { "*" } else { " " };
                println!("{pin} {} {}", note.short_id(), note.title);
            }
        }
        OutputFormat::Table => {
            println!(
                "{:<8}  {:<3}  {:<16}  {:<40}  TAGS",
                "ID", "PIN", "MODIFIED", "TITLE"
            );
            for note in notes {
                println!(
                    "{:<8}  {:<3}  {:<16}  {:<40}  {}",
                    note.short_id(),
                    if note.pinned { "*" } else { "" },
                    format_time(note),
                    truncate(&note.title, 40),
                    note.tags.join(", ")
                );
            }
        }
    }
    Ok(())
}

fn format_time(note: &Note) -> String {
    note.last_modified
        .with_timezone(&chrono::Local)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let stats = store.stats();
    let state = SyncState::load(&config.sync_state_path())?;
    let remote = resolve_remote_dir(config, &state, None);

    if json {
        let status = serde_json::json!({
            "notes_path": config.notes_path(),
            "active": stats.active,
            "pinned": stats.pinned,
            "tombstones": stats.tombstones,
            "file_size_bytes": stats.file_size_bytes,
            "newest": stats.newest,
            "oldest": stats.oldest,
            "remote_dir": remote,
            "last_sync": state.last_sync,
            "last_conflicts": state.last_conflicts,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("notes status");
    println!("------------");
    println!("Notes file:  {}", config.notes_path().display());
    println!("Notes:       {} ({} pinned)", stats.active, stats.pinned);
    println!("Tombstones:  {}", stats.tombstones);
    println!("File size:   {} bytes", stats.file_size_bytes);
    if let Some(newest) = stats.newest {
        println!("Last edit:   {}", newest.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S"));
    }
    match remote {
        Some(dir) => println!("Sync folder: {}", dir.display()),
        None => println!("Sync folder: (not set)"),
    }
    match state.last_sync {
        Some(at) => println!(
            "Last sync:   {} ({} conflicts)",
            at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S"),
            state.last_conflicts
        ),
        None => println!("Last sync:   never"),
    }
    Ok(())
}

/// Pick the sync folder: command line, then config, then `remote set`.
fn resolve_remote_dir(
    config: &Config,
    state: &SyncState,
    cli_override: Option<&Path>,
) -> Option<PathBuf> {
    cli_override
        .map(Path::to_path_buf)
        .or_else(|| config.sync.remote_dir.clone())
        .or_else(|| state.remote_dir.clone())
}

fn handle_sync(config: &Config, cmd: &SyncCommand) -> anyhow::Result<()> {
    let state_path = config.sync_state_path();
    let mut state = SyncState::load(&state_path)?;
    let dir = resolve_remote_dir(config, &state, cmd.remote.as_deref())
        .ok_or(Error::RemoteNotConfigured)?;

    let remote = FolderRemote::new(dir, &config.sync.conflict_file_patterns)?;
    let mut manager = SyncManager::new(Box::new(remote), config.sync_options());
    let mut store = open_store(config)?;

    if !cmd.watch {
        let report = manager.sync(&mut store)?;
        state.record_sync(&report);
        state.save(&state_path)?;
        return print_report(&report, cmd.json);
    }

    let interval = cmd
        .interval
        .map_or_else(|| config.autosync_interval(), std::time::Duration::from_secs);
    if interval.is_zero() {
        bail!("--interval must be greater than 0");
    }

    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    let completed = runtime.block_on(run_autosync(
        &mut manager,
        &mut store,
        interval,
        async {
            let _ = tokio::signal::ctrl_c().await;
        },
        |report| {
            state.record_sync(report);
            if let Err(e) = state.save(&state_path) {
                tracing::warn!("Failed to save sync state: {e}");
            }
            if let Err(e) = print_report(report, cmd.json) {
                tracing::warn!("Failed to print sync report: {e}");
            }
        },
    ));
    println!("Stopped after {completed} syncs");
    Ok(())
}

fn print_report(report: &SyncReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(report)?);
        return Ok(());
    }
    println!(
        "[{}] Synced with {}: {} notes, {} conflicts, {} tombstones cleaned",
        report.finished_at.with_timezone(&chrono::Local).format("%H:%M:%S"),
        report.remote,
        report.active,
        report.conflicts,
        report.cleaned
    );
    if report.folded_files > 0 {
        println!("  Folded {} conflict files from the sync folder", report.folded_files);
    }
    Ok(())
}

fn handle_merge(config: &Config, file: &Path) -> anyhow::Result<()> {
    let doc = NotesDocument::read(file)
        .with_context(|| format!("reading notes from {}", file.display()))?;
    let other = NoteStore::from_notes(doc.notes);

    let mut store = open_store(config)?;
    let outcome = reconcile_stores(&mut store, &other, &config.sync_options().merge)?;

    println!(
        "Merged {}: {} new, {} updated, {} conflicts",
        file.display(),
        outcome.stats.remote_only,
        outcome.stats.remote_wins,
        outcome.conflicts.len()
    );
    for conflict in &outcome.conflicts {
        println!(
            "  Conflict on {} \"{}\" (kept local, imported copy added)",
            short(&conflict.note_id),
            conflict.local.title
        );
    }
    Ok(())
}

fn handle_remote(config: &Config, cmd: RemoteCommand) -> anyhow::Result<()> {
    let state_path = config.sync_state_path();
    let mut state = SyncState::load(&state_path)?;

    match cmd {
        RemoteCommand::Set { dir } => {
            let dir = std::fs::canonicalize(&dir).unwrap_or(dir);
            state.set_remote_dir(&dir)?;
            state.save(&state_path)?;
            println!("Sync folder set to {}", dir.display());
            if config.sync.remote_dir.is_some() {
                println!("Note: sync.remote_dir in the configuration takes precedence.");
            }
        }
        RemoteCommand::Show => {
            match resolve_remote_dir(config, &state, None) {
                Some(dir) => println!("{}", dir.display()),
                None => println!("(not set)"),
            }
            if let Some(at) = state.last_sync {
                println!("Last sync: {}", at.to_rfc3339());
            }
        }
        RemoteCommand::Clear => {
            state.clear_remote_dir();
            state.save(&state_path)?;
            println!("Sync folder cleared");
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Notes path:           {}", config.notes_path().display());
                println!(
                    "  Tombstone retention:  {} days",
                    config.storage.tombstone_retention_days
                );
                println!();
                println!("[Sync]");
                match &config.sync.remote_dir {
                    Some(dir) => println!("  Remote dir:           {}", dir.display()),
                    None => println!("  Remote dir:           (from `notes remote set`)"),
                }
                println!("  Conflict window:      {}s", config.sync.conflict_window_secs);
                println!("  Autosync interval:    {}s", config.sync.autosync_interval_secs);
                println!(
                    "  Conflict patterns:    {}",
                    config.sync.conflict_file_patterns.join("  ")
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
