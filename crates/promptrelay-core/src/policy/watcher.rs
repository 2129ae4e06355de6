//! Background reload of the policy file on filesystem changes.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::GatewayResult;
use crate::policy::store::PolicyStore;

/// Quiet period after a filesystem event before the reload fires. Editors
/// and atomic renames emit bursts of events for one logical change.
const DEBOUNCE_WINDOW: Duration = Duration::from_millis(250);

/// Watches the policy file and reloads the store when it changes.
///
/// The watch covers the file's parent directory: atomic saves replace the
/// file inode, which would detach a watch on the file itself. Events are
/// funneled into a channel and coalesced by a background task, so reload
/// storms from rapid successive writes collapse into one reload. Dropping
/// the watcher stops both the filesystem watch and the reload task.
pub struct PolicyWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl PolicyWatcher {
    pub fn spawn(store: Arc<PolicyStore>) -> GatewayResult<Self> {
        let path = store.path().to_path_buf();
        let file_name = path.file_name().map(std::ffi::OsStr::to_os_string);
        let (tx, rx) = mpsc::channel::<()>(16);

        let mut watcher =
            notify::recommended_watcher(move |result: Result<Event, notify::Error>| {
                match result {
                    Ok(event) => {
                        let relevant = matches!(
                            event.kind,
                            EventKind::Modify(_) | EventKind::Create(_)
                        ) && event
                            .paths
                            .iter()
                            .any(|p| p.file_name() == file_name.as_deref());
                        if relevant {
                            // A full channel already has a reload pending.
                            let _ = tx.try_send(());
                        }
                    }
                    Err(e) => warn!("Policy file watch error: {e}"),
                }
            })?;

        let watch_dir = path.parent().filter(|d| !d.as_os_str().is_empty()).unwrap_or(Path::new("."));
        watcher.watch(watch_dir, RecursiveMode::NonRecursive)?;

        let task = tokio::spawn(reload_loop(store, rx));
        info!("Watching {} for policy changes", path.display());

        Ok(Self { _watcher: watcher, task })
    }

    /// Stops the watch and cancels any pending reload.
    pub fn shutdown(self) {
        self.task.abort();
    }
}

impl Drop for PolicyWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn reload_loop(store: Arc<PolicyStore>, mut rx: mpsc::Receiver<()>) {
    while rx.recv().await.is_some() {
        tokio::time::sleep(DEBOUNCE_WINDOW).await;
        while rx.try_recv().is_ok() {}

        match store.reload() {
            Ok(()) => {
                let snapshot = store.current();
                info!(
                    "Policy reloaded after file change: {} whitelisted URL(s), limit {}",
                    snapshot.whitelist.len(),
                    snapshot.max_concurrent_per_client
                );
            }
            // reload() already logged the cause.
            Err(_) => debug!("File-change reload rejected, previous snapshot stays active"),
        }
    }
    debug!("Policy watch channel closed, reload task exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::cache::DecryptionCache;
    use tempfile::TempDir;

    async fn wait_for_limit(store: &PolicyStore, expected: u32) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if store.current().max_concurrent_per_client == expected {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await
        .expect("policy change was not picked up in time");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn reloads_when_file_appears_and_changes() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("config.json");
        let cache = Arc::new(DecryptionCache::new());
        let store = Arc::new(PolicyStore::open(&path, cache));
        assert_eq!(store.current().max_concurrent_per_client, 2);

        let watcher = PolicyWatcher::spawn(Arc::clone(&store)).expect("spawn watcher");

        std::fs::write(&path, r#"{"whitelist":[],"maxConcurrentRequestsPerIP":6}"#)
            .expect("create policy file");
        wait_for_limit(&store, 6).await;

        std::fs::write(&path, r#"{"whitelist":[],"maxConcurrentRequestsPerIP":3}"#)
            .expect("modify policy file");
        wait_for_limit(&store, 3).await;

        watcher.shutdown();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn malformed_write_keeps_previous_snapshot() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"whitelist":[],"maxConcurrentRequestsPerIP":4}"#)
            .expect("seed policy file");
        let cache = Arc::new(DecryptionCache::new());
        let store = Arc::new(PolicyStore::open(&path, cache));
        let _watcher = PolicyWatcher::spawn(Arc::clone(&store)).expect("spawn watcher");

        std::fs::write(&path, r#"{"maxConcurrentRequestsPerIP":-1}"#).expect("malformed write");
        // Give the debounced reload time to fire and fail.
        tokio::time::sleep(DEBOUNCE_WINDOW * 4).await;

        assert_eq!(store.current().max_concurrent_per_client, 4);
    }
}
