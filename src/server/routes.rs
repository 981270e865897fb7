//! HTTP and WebSocket endpoints of the document server.
//!
//! # Endpoints
//!
//! - `GET /health`: Health check
//! - `GET /v1/{collection}/{id}`: Fetch a document (404 if absent)
//! - `PUT /v1/{collection}/{id}`: Replace a document
//! - `PATCH /v1/{collection}/{id}`: Merge top-level fields into a document
//! - `GET /v1/{collection}/{id}/watch`: WebSocket of document snapshots

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use linkcal_core::Snapshot;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use super::documents::{DocumentService, DocumentServiceError};
use super::storage::ServerStorageError;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub documents: DocumentService,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/v1/{collection}/{id}",
            get(get_document).put(put_document).patch(patch_document),
        )
        .route("/v1/{collection}/{id}/watch", get(watch_document))
        .with_state(state)
}

/// Error response body
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

/// An error returned from a handler.
pub struct ApiError {
    status: StatusCode,
    error: &'static str,
    message: String,
}

impl ApiError {
    fn not_found(collection: &str, id: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error: "not_found",
            message: format!("No document {}/{}", collection, id),
        }
    }
}

impl From<DocumentServiceError> for ApiError {
    fn from(e: DocumentServiceError) -> Self {
        let (status, error) = match &e {
            DocumentServiceError::InvalidBody(_) => (StatusCode::BAD_REQUEST, "invalid_body"),
            DocumentServiceError::Storage(ServerStorageError::InvalidSegment(_)) => {
                (StatusCode::BAD_REQUEST, "invalid_path")
            }
            DocumentServiceError::Storage(_) => {
                tracing::error!("{}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error")
            }
        };
        Self {
            status,
            error,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.error,
                message: self.message,
            }),
        )
            .into_response()
    }
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Health check endpoint
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn get_document(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    match state.documents.get(&collection, &id).await? {
        Some(document) => Ok(Json(document)),
        None => Err(ApiError::not_found(&collection, &id)),
    }
}

async fn put_document(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let stored = state.documents.set(&collection, &id, body).await?;
    Ok(Json(stored))
}

async fn patch_document(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let stored = state.documents.merge(&collection, &id, body).await?;
    Ok(Json(stored))
}

async fn watch_document(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let (initial, updates) = state.documents.watch(&collection, &id).await?;
    tracing::debug!("Watcher attached to {}/{}", collection, id);
    Ok(ws.on_upgrade(move |socket| stream_snapshots(socket, initial, updates)))
}

/// Sends the initial snapshot, then one per write, until either side closes.
async fn stream_snapshots(
    socket: WebSocket,
    initial: Snapshot,
    mut updates: broadcast::Receiver<Snapshot>,
) {
    let (mut sender, mut receiver) = socket.split();

    if send_snapshot(&mut sender, &initial).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(snapshot) => {
                    if send_snapshot(&mut sender, &snapshot).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Later snapshots supersede the skipped ones
                    tracing::warn!("Watcher lagged, skipped {} snapshot(s)", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {
                    // Watchers only listen
                }
            },
        }
    }

    let _ = sender.send(Message::Close(None)).await;
}

async fn send_snapshot<S>(sender: &mut S, snapshot: &Snapshot) -> Result<(), ()>
where
    S: SinkExt<Message> + Unpin,
{
    let text = serde_json::to_string(snapshot).map_err(|e| {
        tracing::error!("Failed to encode snapshot: {}", e);
    })?;
    sender.send(Message::Text(text.into())).await.map_err(|_| ())
}
