//! Push notifications of remote calendar changes.

use futures::StreamExt;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::calendar_id::CalendarId;
use crate::models::CalendarDocument;
use crate::store::{DocumentStore, CALENDARS};

/// Subscribes to calendars in a cloud document store.
#[derive(Clone)]
pub struct ChangeFeed {
    documents: Arc<dyn DocumentStore>,
}

impl ChangeFeed {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    /// Calls `on_update` with the calendar's current state, then again after
    /// every write to it, until the subscription is cancelled.
    ///
    /// Snapshots of missing documents are skipped. Must be called within a
    /// tokio runtime.
    pub fn subscribe<F>(&self, id: &CalendarId, on_update: F) -> Subscription
    where
        F: Fn(CalendarDocument) + Send + Sync + 'static,
    {
        let documents = Arc::clone(&self.documents);
        let id = id.clone();

        let task = tokio::spawn(async move {
            let mut stream = match documents.watch(CALENDARS, id.as_str()).await {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::warn!("Failed to watch calendar {}: {}", id, e);
                    return;
                }
            };

            while let Some(item) = stream.next().await {
                match item {
                    Ok(snapshot) => match snapshot.into_document() {
                        Some(document) => on_update(document),
                        None => tracing::debug!("Ignoring empty snapshot for {}", id),
                    },
                    Err(e) => tracing::warn!("Change feed error for {}: {}", id, e),
                }
            }
            tracing::debug!("Change feed for {} ended", id);
        });

        Subscription { task: Some(task) }
    }
}

/// An active change feed. Dropping it cancels delivery.
#[derive(Debug)]
pub struct Subscription {
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Stops delivery. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
