//! Server-side JSON document storage.
//!
//! Stores one JSON file per document in the following structure:
//! ```text
//! <DATA_DIR>/
//!   <collection>/
//!     <id>.json
//! ```
//!
//! Writes go to a temp file that is renamed over the document.

use serde_json::Value;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::PathBuf;

/// Errors that can occur during server storage operations.
#[derive(Debug)]
pub enum ServerStorageError {
    /// I/O error reading or writing a file.
    IoError(PathBuf, io::Error),
    /// A stored document is not valid JSON.
    JsonError(PathBuf, String),
    /// Invalid collection or document id (e.g., contains path separators).
    InvalidSegment(String),
}

impl std::fmt::Display for ServerStorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerStorageError::IoError(path, e) => {
                write!(f, "I/O error for {}: {}", path.display(), e)
            }
            ServerStorageError::JsonError(path, e) => {
                write!(f, "Failed to load document {}: {}", path.display(), e)
            }
            ServerStorageError::InvalidSegment(segment) => {
                write!(f, "Invalid path segment: {}", segment)
            }
        }
    }
}

impl std::error::Error for ServerStorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerStorageError::IoError(_, e) => Some(e),
            _ => None,
        }
    }
}

/// Server-side storage for JSON documents, grouped by collection.
#[derive(Debug, Clone)]
pub struct ServerStorage {
    data_dir: PathBuf,
}

impl ServerStorage {
    /// Creates a new server storage instance.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Validates a collection name or document id to prevent path traversal.
    pub fn validate_segment(segment: &str) -> Result<(), ServerStorageError> {
        if segment.is_empty()
            || segment.contains('/')
            || segment.contains('\\')
            || segment.contains("..")
            || segment.starts_with('.')
            || segment.contains('\0')
        {
            return Err(ServerStorageError::InvalidSegment(segment.to_string()));
        }
        Ok(())
    }

    fn collection_dir(&self, collection: &str) -> PathBuf {
        self.data_dir.join(collection)
    }

    fn doc_path(&self, collection: &str, id: &str) -> PathBuf {
        self.collection_dir(collection).join(format!("{}.json", id))
    }

    /// Loads a document.
    ///
    /// Returns `Ok(None)` if the document doesn't exist yet.
    pub fn load(&self, collection: &str, id: &str) -> Result<Option<Value>, ServerStorageError> {
        Self::validate_segment(collection)?;
        Self::validate_segment(id)?;

        let path = self.doc_path(collection, id);

        match fs::read(&path) {
            Ok(bytes) => {
                let value = serde_json::from_slice(&bytes)
                    .map_err(|e| ServerStorageError::JsonError(path, e.to_string()))?;
                Ok(Some(value))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ServerStorageError::IoError(path, e)),
        }
    }

    /// Saves a document, replacing any previous version.
    ///
    /// Creates the collection directory if it doesn't exist.
    pub fn save(&self, collection: &str, id: &str, doc: &Value) -> Result<(), ServerStorageError> {
        Self::validate_segment(collection)?;
        Self::validate_segment(id)?;

        let collection_dir = self.collection_dir(collection);
        let path = self.doc_path(collection, id);

        // Create collection directory if needed
        fs::create_dir_all(&collection_dir)
            .map_err(|e| ServerStorageError::IoError(collection_dir.clone(), e))?;

        let bytes = serde_json::to_vec(doc)
            .map_err(|e| ServerStorageError::JsonError(path.clone(), e.to_string()))?;

        // Write atomically using temp file + rename
        let temp_path = path.with_extension("json.tmp");

        let mut file = File::create(&temp_path)
            .map_err(|e| ServerStorageError::IoError(temp_path.clone(), e))?;

        file.write_all(&bytes)
            .map_err(|e| ServerStorageError::IoError(temp_path.clone(), e))?;

        file.sync_all()
            .map_err(|e| ServerStorageError::IoError(temp_path.clone(), e))?;

        // Rename to final path (atomic on most filesystems)
        fs::rename(&temp_path, &path).map_err(|e| ServerStorageError::IoError(path, e))?;

        Ok(())
    }
}
