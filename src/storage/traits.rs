//! Persistence seam for case stores.
//!
//! A [`StoreBackend`] reads and writes whole [`StoreDocument`]s. The layered
//! store never touches files directly, so the same case logic runs against
//! the in-memory backend in tests and the file backend in production.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entry::Entry;
use crate::store::StoreKind;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No document exists at the path.
    #[error("Store not found: {0}")]
    NotFound(String),

    /// I/O failure.
    #[error("I/O error on {path}: {message}")]
    Io {
        path: String,
        message: String,
    },

    /// Document failed checksum or framing validation.
    #[error("Corrupted store {path}: {reason}")]
    Corrupted {
        path: String,
        reason: String,
    },

    /// Another process holds the case lock.
    #[error("Case directory is locked: {0}")]
    Locked(String),

    /// Serialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Backend error.
    #[error("Storage backend error: {0}")]
    BackendError(String),
}

impl StorageError {
    /// Returns true if the operation may succeed when retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Locked(_))
    }

    /// Returns true if the document does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Serialized form of one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreDocument {
    pub kind: StoreKind,
    #[serde(default)]
    pub entries: Vec<Entry>,
}

impl StoreDocument {
    #[must_use]
    pub fn new(kind: StoreKind, entries: Vec<Entry>) -> Self {
        Self { kind, entries }
    }

    #[must_use]
    pub fn empty(kind: StoreKind) -> Self {
        Self::new(kind, Vec::new())
    }
}

/// Storage trait for store documents.
///
/// Writes replace the whole document at `path`.
pub trait StoreBackend: Send + Sync + fmt::Debug {
    /// Returns true if a document exists at `path`.
    fn exists(&self, path: &Path) -> Result<bool, StorageError>;

    /// Reads the document at `path`. Returns `NotFound` if absent.
    fn read(&self, path: &Path) -> Result<StoreDocument, StorageError>;

    /// Writes `doc` to `path`, replacing any previous document.
    fn write(&self, path: &Path, doc: &StoreDocument) -> Result<(), StorageError>;
}
