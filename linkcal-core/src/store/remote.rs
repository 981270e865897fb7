//! Client for the linkcal document server.
//!
//! Documents are fetched and written over HTTP; watching a document opens a
//! WebSocket on which the server sends one JSON snapshot per text frame.

use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::cloud::{CloudError, DocumentStore, Snapshot, SnapshotStream};

/// Timeout for opening a watch connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Response of the server's health endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthInfo {
    pub status: String,
    pub version: String,
}

/// Document store backed by a remote `linkcal-server`.
#[derive(Debug, Clone)]
pub struct RemoteDocuments {
    server_url: String,
    client: reqwest::Client,
}

impl RemoteDocuments {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Asks the server whether it is up.
    pub async fn check(&self) -> Result<HealthInfo, CloudError> {
        let response = self
            .client
            .get(self.build_http_url("/health"))
            .send()
            .await
            .map_err(request_error)?;

        if !response.status().is_success() {
            return Err(CloudError::Status(response.status().as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| CloudError::Http(e.to_string()))
    }

    async fn fetch(&self, collection: &str, id: &str) -> Result<Option<Value>, CloudError> {
        let url = self.build_http_url(&document_path(collection, id));
        let response = self.client.get(&url).send().await.map_err(request_error)?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json()
                .await
                .map(Some)
                .map_err(|e| CloudError::InvalidDocument(e.to_string())),
            status => Err(CloudError::Status(status.as_u16())),
        }
    }

    async fn write(
        &self,
        method: reqwest::Method,
        collection: &str,
        id: &str,
        body: Value,
    ) -> Result<(), CloudError> {
        let url = self.build_http_url(&document_path(collection, id));
        let response = self
            .client
            .request(method, &url)
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;

        if !response.status().is_success() {
            return Err(CloudError::Status(response.status().as_u16()));
        }
        Ok(())
    }

    async fn open_watch(&self, collection: &str, id: &str) -> Result<SnapshotStream, CloudError> {
        let ws_url = self.build_ws_url(&format!("{}/watch", document_path(collection, id)));

        let (ws_stream, _) = timeout(CONNECT_TIMEOUT, connect_async(&ws_url))
            .await
            .map_err(|_| CloudError::Unavailable("timed out connecting".to_string()))?
            .map_err(|e| CloudError::WebSocket(e.to_string()))?;

        tracing::debug!("Watching {}", ws_url);

        let snapshots = stream::unfold(ws_stream, |mut ws| async move {
            loop {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => {
                        let snapshot = serde_json::from_str::<Snapshot>(text.as_str())
                            .map_err(|e| CloudError::InvalidDocument(e.to_string()));
                        return Some((snapshot, ws));
                    }
                    Some(Ok(Message::Close(_))) | None => return None,
                    Some(Ok(_)) => {
                        // Pings are answered by tungstenite; nothing else is sent
                    }
                    Some(Err(e)) => {
                        return Some((Err(CloudError::WebSocket(e.to_string())), ws));
                    }
                }
            }
        });

        Ok(snapshots.boxed())
    }

    /// Builds the WebSocket URL for a path.
    fn build_ws_url(&self, path: &str) -> String {
        // Convert http(s) to ws(s) if needed
        let base_url = if self.server_url.starts_with("http://") {
            self.server_url.replacen("http://", "ws://", 1)
        } else if self.server_url.starts_with("https://") {
            self.server_url.replacen("https://", "wss://", 1)
        } else if !self.server_url.starts_with("ws://") && !self.server_url.starts_with("wss://") {
            format!("ws://{}", self.server_url)
        } else {
            self.server_url.clone()
        };

        format!("{}{}", base_url.trim_end_matches('/'), path)
    }

    /// Builds an HTTP URL for a path.
    fn build_http_url(&self, path: &str) -> String {
        // Convert ws(s) to http(s) if needed
        let base_url = if self.server_url.starts_with("ws://") {
            self.server_url.replacen("ws://", "http://", 1)
        } else if self.server_url.starts_with("wss://") {
            self.server_url.replacen("wss://", "https://", 1)
        } else if !self.server_url.starts_with("http://")
            && !self.server_url.starts_with("https://")
        {
            format!("http://{}", self.server_url)
        } else {
            self.server_url.clone()
        };

        format!("{}{}", base_url.trim_end_matches('/'), path)
    }
}

fn document_path(collection: &str, id: &str) -> String {
    format!(
        "/v1/{}/{}",
        urlencoding::encode(collection),
        urlencoding::encode(id)
    )
}

fn request_error(e: reqwest::Error) -> CloudError {
    if e.is_connect() || e.is_timeout() {
        CloudError::Unavailable(e.to_string())
    } else {
        CloudError::Http(e.to_string())
    }
}

impl DocumentStore for RemoteDocuments {
    fn get<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Value>, CloudError>> {
        Box::pin(self.fetch(collection, id))
    }

    fn set<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        data: Value,
    ) -> BoxFuture<'a, Result<(), CloudError>> {
        Box::pin(self.write(reqwest::Method::PUT, collection, id, data))
    }

    fn merge<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        fields: Map<String, Value>,
    ) -> BoxFuture<'a, Result<(), CloudError>> {
        Box::pin(self.write(reqwest::Method::PATCH, collection, id, Value::Object(fields)))
    }

    fn watch<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, Result<SnapshotStream, CloudError>> {
        Box::pin(self.open_watch(collection, id))
    }
}
