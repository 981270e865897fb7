//! Persistence backends for calendar documents.
//!
//! A [`Backend`] is chosen once, from whether a cloud document store is
//! available, and hides the fallback from cloud to local storage.

mod cloud;
mod local;
mod memory;
mod remote;

pub use cloud::{CloudError, CloudStore, DocumentStore, Snapshot, SnapshotStream, CALENDARS};
pub use local::{KeyValueError, KeyValueStore, LocalStore, MemoryKeyValue, READ_ERROR, WRITE_ERROR};
pub use memory::MemoryDocuments;
pub use remote::{HealthInfo, RemoteDocuments};

use std::sync::Arc;

use crate::calendar_id::CalendarId;
use crate::feed::ChangeFeed;
use crate::models::CalendarDocument;
use crate::status::StatusBoard;

pub const CLOUD_LOAD_ERROR: &str = "Failed to load from cloud, using local data";
pub const CLOUD_SAVE_ERROR: &str = "Failed to save to cloud";

/// Where a loaded calendar came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Local,
    Cloud,
    /// The cloud could not be read; local data was used instead.
    Fallback,
}

/// A loaded calendar and its origin.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub document: CalendarDocument,
    pub source: LoadSource,
}

#[derive(Clone)]
pub enum Backend {
    Local(LocalStore),
    Cloud {
        cloud: CloudStore,
        /// Read when the cloud cannot be
        fallback: LocalStore,
    },
}

impl Backend {
    /// Uses the cloud store when one is provided, the local store otherwise.
    pub fn select(cloud: Option<Arc<dyn DocumentStore>>, local: Arc<dyn KeyValueStore>) -> Self {
        let local = LocalStore::new(local);
        match cloud {
            Some(documents) => Backend::Cloud {
                cloud: CloudStore::new(documents),
                fallback: local,
            },
            None => Backend::Local(local),
        }
    }

    pub fn is_cloud(&self) -> bool {
        matches!(self, Backend::Cloud { .. })
    }

    /// Loads a calendar. Never fails: problems end up on the status line.
    pub async fn load(&self, id: &CalendarId, status: &StatusBoard) -> Loaded {
        match self {
            Backend::Local(local) => Loaded {
                document: local.load(id, status).await,
                source: LoadSource::Local,
            },
            Backend::Cloud { cloud, fallback } => match cloud.load(id).await {
                Ok(document) => Loaded {
                    document,
                    source: LoadSource::Cloud,
                },
                Err(e) => {
                    tracing::warn!("Cloud load of {} failed: {}", id, e);
                    status.error(CLOUD_LOAD_ERROR);
                    Loaded {
                        document: fallback.load(id, status).await,
                        source: LoadSource::Fallback,
                    }
                }
            },
        }
    }

    /// Writes the full calendar. Returns whether the write succeeded.
    pub async fn save(&self, id: &CalendarId, document: &CalendarDocument, status: &StatusBoard) -> bool {
        match self {
            Backend::Local(local) => local.save(id, document, status).await,
            Backend::Cloud { cloud, .. } => match cloud.save(id, document).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("Cloud save of {} failed: {}", id, e);
                    status.error(CLOUD_SAVE_ERROR);
                    false
                }
            },
        }
    }

    /// Change notifications, available only for the cloud store.
    pub fn change_feed(&self) -> Option<ChangeFeed> {
        match self {
            Backend::Local(_) => None,
            Backend::Cloud { cloud, .. } => Some(ChangeFeed::new(cloud.documents())),
        }
    }
}
