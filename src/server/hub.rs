//! Fan-out of document snapshots to watchers.

use linkcal_core::Snapshot;
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

/// Snapshots buffered per document before slow watchers lag.
const CHANNEL_CAPACITY: usize = 16;

/// Tracks all watchers for broadcasting updates.
pub struct SnapshotHub {
    /// Broadcast channels per (collection, id)
    channels: RwLock<HashMap<(String, String), broadcast::Sender<Snapshot>>>,
}

impl SnapshotHub {
    /// Creates a new hub.
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribes to updates of one document.
    pub async fn subscribe(&self, collection: &str, id: &str) -> broadcast::Receiver<Snapshot> {
        let key = (collection.to_string(), id.to_string());

        let mut channels = self.channels.write().await;

        if let Some(sender) = channels.get(&key) {
            sender.subscribe()
        } else {
            let (sender, receiver) = broadcast::channel(CHANNEL_CAPACITY);
            channels.insert(key, sender);
            receiver
        }
    }

    /// Sends a snapshot to every watcher of a document.
    ///
    /// Channels whose watchers are all gone are dropped.
    pub async fn broadcast(&self, collection: &str, id: &str, snapshot: Snapshot) {
        let key = (collection.to_string(), id.to_string());

        let mut channels = self.channels.write().await;

        if let Some(sender) = channels.get(&key) {
            if sender.send(snapshot).is_err() {
                channels.remove(&key);
            }
        }
    }
}

impl Default for SnapshotHub {
    fn default() -> Self {
        Self::new()
    }
}
