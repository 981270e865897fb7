//! Per-host calendar storage on a key-value store.
//!
//! Each calendar lives under the key `calendar:<id>` as a serialized
//! [`CalendarDocument`]. Failures never reach the caller: they are shown on
//! the status line and an empty calendar is used instead.

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::calendar_id::CalendarId;
use crate::models::CalendarDocument;
use crate::status::StatusBoard;

pub const READ_ERROR: &str = "Local storage read error";
pub const WRITE_ERROR: &str = "Local storage write error";

/// Errors reported by a key-value store
#[derive(Error, Debug)]
pub enum KeyValueError {
    #[error("Storage quota exceeded: {needed} bytes needed, quota is {quota}")]
    QuotaExceeded { needed: usize, quota: usize },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// A string key-value store, such as a browser's local storage.
pub trait KeyValueStore: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, KeyValueError>>;

    fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, Result<(), KeyValueError>>;
}

/// Key-value store kept in memory, with an optional size quota.
#[derive(Debug, Default)]
pub struct MemoryKeyValue {
    entries: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
    writes: AtomicUsize,
}

impl MemoryKeyValue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits the total size of keys and values to `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            quota: Some(bytes),
            ..Self::default()
        }
    }

    /// Stores `value` directly, bypassing the quota and write counter.
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<String>) {
        self.lock().insert(key.into(), value.into());
    }

    pub fn get_raw(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    /// Number of successful writes through [`KeyValueStore::set`].
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyValueStore for MemoryKeyValue {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, KeyValueError>> {
        let value = self.lock().get(key).cloned();
        Box::pin(async move { Ok(value) })
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, Result<(), KeyValueError>> {
        let result = {
            let mut entries = self.lock();
            let others: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            match self.quota {
                Some(quota) if needed > quota => Err(KeyValueError::QuotaExceeded { needed, quota }),
                _ => {
                    entries.insert(key.to_string(), value);
                    self.writes.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }
        };
        Box::pin(async move { result })
    }
}

/// Calendar storage on top of a [`KeyValueStore`].
#[derive(Clone)]
pub struct LocalStore {
    kv: Arc<dyn KeyValueStore>,
}

impl LocalStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Loads a calendar. Missing calendars are empty; unreadable ones are
    /// reported on the status line and treated as empty.
    pub async fn load(&self, id: &CalendarId, status: &StatusBoard) -> CalendarDocument {
        let key = id.storage_key();
        match self.kv.get(&key).await {
            Ok(None) => CalendarDocument::empty(),
            Ok(Some(raw)) => match CalendarDocument::from_json(&raw) {
                Ok(document) => {
                    tracing::debug!("Loaded {} event(s) from {}", document.events.len(), key);
                    document
                }
                Err(e) => {
                    tracing::warn!("Corrupt local document at {}: {}", key, e);
                    status.error(READ_ERROR);
                    CalendarDocument::empty()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", key, e);
                status.error(READ_ERROR);
                CalendarDocument::empty()
            }
        }
    }

    /// Writes a calendar, replacing what was stored. Returns whether the
    /// write succeeded; failures are reported on the status line.
    pub async fn save(
        &self,
        id: &CalendarId,
        document: &CalendarDocument,
        status: &StatusBoard,
    ) -> bool {
        let key = id.storage_key();
        let raw = match document.to_json() {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Failed to serialize {}: {}", key, e);
                status.error(WRITE_ERROR);
                return false;
            }
        };

        match self.kv.set(&key, raw).await {
            Ok(()) => {
                tracing::debug!("Saved {} event(s) to {}", document.events.len(), key);
                true
            }
            Err(e) => {
                tracing::warn!("Failed to write {}: {}", key, e);
                status.error(WRITE_ERROR);
                false
            }
        }
    }
}
