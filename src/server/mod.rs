//! The linkcal cloud document server.
//!
//! Stores JSON documents by `(collection, id)` and pushes every write to
//! WebSocket watchers of the same document.

pub mod documents;
pub mod hub;
pub mod routes;
pub mod storage;

pub use documents::{DocumentService, DocumentServiceError, UPDATED_AT};
pub use hub::SnapshotHub;
pub use routes::{router, ApiError, AppState};
pub use storage::{ServerStorage, ServerStorageError};

use axum::http::header::{self, InvalidHeaderValue};
use axum::http::{HeaderValue, Method};
use axum::Router;
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Builds the full application: routes, request tracing and optional CORS.
///
/// `cors_origin` is either `*` or a single origin.
pub fn build_app(
    data_dir: impl Into<PathBuf>,
    cors_origin: Option<&str>,
) -> Result<Router, InvalidHeaderValue> {
    let state = AppState {
        documents: DocumentService::new(ServerStorage::new(data_dir)),
    };

    let mut app = router(state).layer(TraceLayer::new_for_http());

    if let Some(origin) = cors_origin {
        let cors = CorsLayer::new()
            .allow_methods([Method::GET, Method::PUT, Method::PATCH])
            .allow_headers([header::CONTENT_TYPE]);
        let cors = if origin.trim() == "*" {
            cors.allow_origin(Any)
        } else {
            cors.allow_origin(HeaderValue::from_str(origin.trim())?)
        };
        app = app.layer(cors);
    }

    Ok(app)
}
