//! Periodic background sync.

use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::store::NoteStore;

use super::{SyncManager, SyncReport};

/// Default delay between automatic syncs.
pub const DEFAULT_AUTOSYNC_INTERVAL: Duration = Duration::from_secs(60);

/// Sync `store` every `interval` until `shutdown` resolves.
///
/// The first sync runs immediately. Before each sync the store is reloaded
/// from disk so edits made by other processes are picked up. Failed syncs
/// are logged and retried on the next tick. `on_report` is called after
/// every successful sync.
///
/// Returns the number of successful syncs.
pub async fn run_autosync<S, F>(
    manager: &mut SyncManager,
    store: &mut NoteStore,
    interval: Duration,
    shutdown: S,
    mut on_report: F,
) -> usize
where
    S: Future<Output = ()>,
    F: FnMut(&SyncReport),
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    info!(
        "Autosync every {}s with {}",
        interval.as_secs(),
        manager.remote().name()
    );

    let mut completed = 0;
    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("Autosync stopping after {completed} syncs");
                break;
            }
            _ = ticker.tick() => {
                if let Err(e) = store.reload() {
                    error!("Failed to reload notes before sync: {e}");
                    continue;
                }
                match manager.sync(store) {
                    Ok(report) => {
                        completed += 1;
                        debug!("Autosync #{completed} finished");
                        on_report(&report);
                    }
                    Err(e) => error!("Autosync failed: {e}"),
                }
            }
        }
    }
    completed
}
