//! Calendar storage in a shared cloud document store.
//!
//! Documents live in the `calendars` collection, keyed by calendar id. Every
//! calendar that has been loaded once has a durable document.

use chrono::Utc;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

use crate::calendar_id::CalendarId;
use crate::models::CalendarDocument;

/// Collection holding calendar documents.
pub const CALENDARS: &str = "calendars";

/// Errors reported by a cloud document store
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Cloud store unavailable: {0}")]
    Unavailable(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Server returned status {0}")]
    Status(u16),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),
}

/// State of one document as delivered to watchers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub exists: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Snapshot {
    pub fn missing() -> Self {
        Self {
            exists: false,
            data: None,
        }
    }

    pub fn of(data: Value) -> Self {
        Self {
            exists: true,
            data: Some(data),
        }
    }

    /// The calendar carried by this snapshot, if there is one.
    ///
    /// Snapshots of deleted or absent documents, and of documents without
    /// data, carry nothing.
    pub fn into_document(self) -> Option<CalendarDocument> {
        if !self.exists {
            return None;
        }
        match self.data {
            Some(Value::Null) | None => None,
            Some(data) => Some(CalendarDocument::from_value_lenient(&data)),
        }
    }
}

/// Stream of snapshots for one watched document.
pub type SnapshotStream = BoxStream<'static, Result<Snapshot, CloudError>>;

/// A document database addressed by `(collection, id)`.
pub trait DocumentStore: Send + Sync {
    /// Fetches a document; `None` if it does not exist.
    fn get<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Value>, CloudError>>;

    /// Replaces a document.
    fn set<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        data: Value,
    ) -> BoxFuture<'a, Result<(), CloudError>>;

    /// Overwrites the given top-level fields, creating the document if needed.
    fn merge<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        fields: Map<String, Value>,
    ) -> BoxFuture<'a, Result<(), CloudError>>;

    /// Watches a document: the current snapshot first, then one per write.
    fn watch<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, Result<SnapshotStream, CloudError>>;
}

/// Calendar storage on top of a [`DocumentStore`].
#[derive(Clone)]
pub struct CloudStore {
    documents: Arc<dyn DocumentStore>,
}

impl CloudStore {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    pub fn documents(&self) -> Arc<dyn DocumentStore> {
        Arc::clone(&self.documents)
    }

    /// Loads a calendar, creating an empty document for unknown ids.
    pub async fn load(&self, id: &CalendarId) -> Result<CalendarDocument, CloudError> {
        match self.documents.get(CALENDARS, id.as_str()).await? {
            Some(data) => {
                let document = CalendarDocument::from_value_lenient(&data);
                tracing::debug!(
                    "Loaded {} event(s) for calendar {} from cloud",
                    document.events.len(),
                    id
                );
                Ok(document)
            }
            None => {
                let created = CalendarDocument {
                    events: Vec::new(),
                    updated_at: Some(Utc::now()),
                };
                let data = serde_json::to_value(&created)
                    .map_err(|e| CloudError::InvalidDocument(e.to_string()))?;
                self.documents.set(CALENDARS, id.as_str(), data).await?;
                tracing::info!("Created cloud document for calendar {}", id);
                Ok(CalendarDocument::empty())
            }
        }
    }

    /// Replaces the calendar's events and bumps its timestamp.
    pub async fn save(&self, id: &CalendarId, document: &CalendarDocument) -> Result<(), CloudError> {
        let events = serde_json::to_value(&document.events)
            .map_err(|e| CloudError::InvalidDocument(e.to_string()))?;

        let mut fields = Map::new();
        fields.insert("events".to_string(), events);
        fields.insert(
            "updatedAt".to_string(),
            Value::from(Utc::now().timestamp_millis()),
        );

        self.documents.merge(CALENDARS, id.as_str(), fields).await?;
        tracing::debug!(
            "Saved {} event(s) for calendar {} to cloud",
            document.events.len(),
            id
        );
        Ok(())
    }
}
