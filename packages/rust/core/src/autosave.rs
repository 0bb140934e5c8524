//! Periodic snapshot of the working document.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use chargen_shared::{CharacterDocument, DEFAULT_BACKUP_NAME};
use chargen_storage::BackupStore;

/// Saves the current working document under a fixed backup name on an
/// interval and once more when told to shut down.
///
/// Failures are logged and never stop the loop.
#[derive(Debug)]
pub struct Autosaver<S> {
    store: Arc<S>,
    name: String,
    interval: Duration,
}

impl<S: BackupStore + 'static> Autosaver<S> {
    pub fn new(store: Arc<S>, interval: Duration) -> Self {
        Self {
            store,
            name: DEFAULT_BACKUP_NAME.to_string(),
            interval,
        }
    }

    /// Save under `name` instead of the default.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Run until `shutdown` fires (or its sender is dropped), then take a
    /// final snapshot and exit.
    pub fn spawn(
        self,
        current: watch::Receiver<Option<CharacterDocument>>,
        mut shutdown: oneshot::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(name = %self.name, interval_secs = self.interval.as_secs(), "autosave started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => self.snapshot(&current).await,
                    _ = &mut shutdown => {
                        self.snapshot(&current).await;
                        info!(name = %self.name, "autosave stopped");
                        break;
                    }
                }
            }
        })
    }

    async fn snapshot(&self, current: &watch::Receiver<Option<CharacterDocument>>) {
        let Some(doc) = current.borrow().clone() else {
            debug!("no working document yet; skipping autosave");
            return;
        };

        match self.store.save(&self.name, &doc).await {
            Ok(backup) => debug!(name = %backup.name, id = %backup.id, "autosaved"),
            Err(e) => warn!(error = %e, "autosave failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chargen_storage::MemoryBackupStore;

    fn doc(name: &str) -> Option<CharacterDocument> {
        Some(CharacterDocument {
            name: name.into(),
            ..Default::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn saves_on_interval() {
        let store = Arc::new(MemoryBackupStore::new());
        let (tx, rx) = watch::channel(doc("Mira"));
        let (stop, shutdown) = oneshot::channel();

        let handle = Autosaver::new(store.clone(), Duration::from_secs(30)).spawn(rx, shutdown);

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(store.list().await.unwrap().is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        let saved = store.load(DEFAULT_BACKUP_NAME).await.unwrap().unwrap();
        assert_eq!(saved.data.name, "Mira");

        tx.send_replace(doc("Mira II"));
        tokio::time::sleep(Duration::from_secs(30)).await;
        let saved = store.load(DEFAULT_BACKUP_NAME).await.unwrap().unwrap();
        assert_eq!(saved.data.name, "Mira II");

        drop(tx);
        stop.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn final_snapshot_on_shutdown() {
        let store = Arc::new(MemoryBackupStore::new());
        let (tx, rx) = watch::channel(None);
        let (stop, shutdown) = oneshot::channel();

        let handle = Autosaver::new(store.clone(), Duration::from_secs(3600))
            .with_name("Session")
            .spawn(rx, shutdown);

        tx.send_replace(doc("Latest"));
        stop.send(()).unwrap();
        handle.await.unwrap();

        let saved = store.load("session").await.unwrap().unwrap();
        assert_eq!(saved.data.name, "Latest");
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_saved_without_a_document() {
        let store = Arc::new(MemoryBackupStore::new());
        let (_tx, rx) = watch::channel(None);
        let (stop, shutdown) = oneshot::channel();

        let handle = Autosaver::new(store.clone(), Duration::from_secs(10)).spawn(rx, shutdown);
        tokio::time::sleep(Duration::from_secs(45)).await;
        stop.send(()).unwrap();
        handle.await.unwrap();

        assert!(store.list().await.unwrap().is_empty());
    }
}
