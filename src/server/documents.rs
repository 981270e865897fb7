//! Document operations behind the HTTP and WebSocket routes.
//!
//! Writes hold the storage lock while they save and broadcast, and watchers
//! subscribe under the same lock, so every watcher sees each write exactly
//! once after its initial snapshot.

use chrono::Utc;
use linkcal_core::Snapshot;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use super::hub::SnapshotHub;
use super::storage::{ServerStorage, ServerStorageError};

/// Field stamped with the write time, in epoch milliseconds.
pub const UPDATED_AT: &str = "updatedAt";

/// Errors that can occur while serving documents.
#[derive(Debug)]
pub enum DocumentServiceError {
    /// Storage error.
    Storage(ServerStorageError),
    /// Request body is not a JSON object.
    InvalidBody(String),
}

impl std::fmt::Display for DocumentServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentServiceError::Storage(e) => write!(f, "Storage error: {}", e),
            DocumentServiceError::InvalidBody(e) => write!(f, "Invalid document: {}", e),
        }
    }
}

impl std::error::Error for DocumentServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DocumentServiceError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ServerStorageError> for DocumentServiceError {
    fn from(e: ServerStorageError) -> Self {
        DocumentServiceError::Storage(e)
    }
}

/// Shared handle to the stored documents and their watchers.
#[derive(Clone)]
pub struct DocumentService {
    storage: Arc<RwLock<ServerStorage>>,
    hub: Arc<SnapshotHub>,
}

impl DocumentService {
    pub fn new(storage: ServerStorage) -> Self {
        Self {
            storage: Arc::new(RwLock::new(storage)),
            hub: Arc::new(SnapshotHub::new()),
        }
    }

    pub async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, DocumentServiceError> {
        let storage = self.storage.read().await;
        Ok(storage.load(collection, id)?)
    }

    /// Replaces a document. Returns what was stored.
    pub async fn set(
        &self,
        collection: &str,
        id: &str,
        data: Value,
    ) -> Result<Value, DocumentServiceError> {
        let fields = into_object(data)?;
        let storage = self.storage.write().await;
        self.store(&storage, collection, id, fields).await
    }

    /// Overwrites the given top-level fields, creating the document if it
    /// does not exist. Returns what was stored.
    pub async fn merge(
        &self,
        collection: &str,
        id: &str,
        data: Value,
    ) -> Result<Value, DocumentServiceError> {
        let fields = into_object(data)?;
        let storage = self.storage.write().await;

        let mut merged = match storage.load(collection, id)? {
            Some(Value::Object(existing)) => existing,
            _ => Map::new(),
        };
        merged.extend(fields);

        self.store(&storage, collection, id, merged).await
    }

    /// The document's current snapshot and a receiver for later ones.
    pub async fn watch(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<(Snapshot, broadcast::Receiver<Snapshot>), DocumentServiceError> {
        let storage = self.storage.read().await;
        let current = match storage.load(collection, id)? {
            Some(data) => Snapshot::of(data),
            None => Snapshot::missing(),
        };
        let receiver = self.hub.subscribe(collection, id).await;
        Ok((current, receiver))
    }

    async fn store(
        &self,
        storage: &ServerStorage,
        collection: &str,
        id: &str,
        mut fields: Map<String, Value>,
    ) -> Result<Value, DocumentServiceError> {
        fields.insert(
            UPDATED_AT.to_string(),
            Value::from(Utc::now().timestamp_millis()),
        );
        let document = Value::Object(fields);

        storage.save(collection, id, &document)?;
        tracing::debug!("Stored {}/{}", collection, id);

        self.hub
            .broadcast(collection, id, Snapshot::of(document.clone()))
            .await;
        Ok(document)
    }
}

fn into_object(data: Value) -> Result<Map<String, Value>, DocumentServiceError> {
    match data {
        Value::Object(map) => Ok(map),
        other => Err(DocumentServiceError::InvalidBody(format!(
            "expected a JSON object, got {}",
            kind(&other)
        ))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
