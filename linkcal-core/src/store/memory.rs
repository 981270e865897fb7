//! In-process document store.
//!
//! Behaves like the cloud service: watchers get the current snapshot and then
//! one per write. Can be switched offline to simulate an unreachable store.

use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::broadcast;

use super::cloud::{CloudError, DocumentStore, Snapshot, SnapshotStream};

type Key = (String, String);

/// Snapshots buffered per watched document before slow watchers lag.
const CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Default)]
pub struct MemoryDocuments {
    documents: Mutex<HashMap<Key, Value>>,
    channels: Mutex<HashMap<Key, broadcast::Sender<Snapshot>>>,
    offline: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every operation fails with [`CloudError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn get_raw(&self, collection: &str, id: &str) -> Option<Value> {
        self.docs().get(&key(collection, id)).cloned()
    }

    /// Deletes a document and tells watchers it is gone.
    pub fn remove(&self, collection: &str, id: &str) {
        let key = key(collection, id);
        self.docs().remove(&key);
        self.broadcast(&key, Snapshot::missing());
    }

    /// Number of successful `set` and `merge` calls.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of watchers currently attached to a document.
    pub fn watcher_count(&self, collection: &str, id: &str) -> usize {
        self.channels()
            .get(&key(collection, id))
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    fn docs(&self) -> std::sync::MutexGuard<'_, HashMap<Key, Value>> {
        self.documents.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn channels(&self) -> std::sync::MutexGuard<'_, HashMap<Key, broadcast::Sender<Snapshot>>> {
        self.channels.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_online(&self) -> Result<(), CloudError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(CloudError::Unavailable("store is offline".to_string()))
        } else {
            Ok(())
        }
    }

    fn subscribe(&self, key: &Key) -> broadcast::Receiver<Snapshot> {
        let mut channels = self.channels();
        if let Some(sender) = channels.get(key) {
            sender.subscribe()
        } else {
            let (sender, receiver) = broadcast::channel(CHANNEL_CAPACITY);
            channels.insert(key.clone(), sender);
            receiver
        }
    }

    /// Channels whose watchers are all gone are dropped.
    fn broadcast(&self, key: &Key, snapshot: Snapshot) {
        let mut channels = self.channels();
        if let Some(sender) = channels.get(key) {
            if sender.send(snapshot).is_err() {
                channels.remove(key);
            }
        }
    }

    fn write(&self, key: Key, update: impl FnOnce(Option<Value>) -> Value) {
        let stored = {
            let mut docs = self.docs();
            let updated = update(docs.remove(&key));
            docs.insert(key.clone(), updated.clone());
            updated
        };
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.broadcast(&key, Snapshot::of(stored));
    }
}

fn key(collection: &str, id: &str) -> Key {
    (collection.to_string(), id.to_string())
}

impl DocumentStore for MemoryDocuments {
    fn get<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Value>, CloudError>> {
        let result = self
            .check_online()
            .map(|()| self.get_raw(collection, id));
        Box::pin(async move { result })
    }

    fn set<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        data: Value,
    ) -> BoxFuture<'a, Result<(), CloudError>> {
        let result = self
            .check_online()
            .map(|()| self.write(key(collection, id), |_| data));
        Box::pin(async move { result })
    }

    fn merge<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        fields: Map<String, Value>,
    ) -> BoxFuture<'a, Result<(), CloudError>> {
        let result = self.check_online().map(|()| {
            self.write(key(collection, id), |existing| {
                let mut merged = match existing {
                    Some(Value::Object(map)) => map,
                    _ => Map::new(),
                };
                merged.extend(fields);
                Value::Object(merged)
            })
        });
        Box::pin(async move { result })
    }

    fn watch<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, Result<SnapshotStream, CloudError>> {
        let result = self.check_online().map(|()| {
            let key = key(collection, id);
            // Subscribe before reading so no write falls between the two
            let receiver = self.subscribe(&key);
            let current = match self.docs().get(&key) {
                Some(data) => Snapshot::of(data.clone()),
                None => Snapshot::missing(),
            };

            let updates = stream::unfold(receiver, |mut receiver| async move {
                loop {
                    match receiver.recv().await {
                        Ok(snapshot) => return Some((Ok::<_, CloudError>(snapshot), receiver)),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!("Watcher lagged, skipped {} snapshot(s)", skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            });

            stream::once(async move { Ok::<_, CloudError>(current) })
                .chain(updates)
                .boxed()
        });
        Box::pin(async move { result })
    }
}
