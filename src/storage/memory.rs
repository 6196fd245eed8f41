//! In-memory storage backend.
//!
//! Thread-safe [`StoreBackend`] keeping documents in a map. It is intended
//! for embedded usage and tests, and counts writes so callers can check
//! which stores a flush actually persisted.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::storage::traits::{StorageError, StoreBackend, StoreDocument};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

#[derive(Debug, Default)]
struct MemoryState {
    documents: HashMap<PathBuf, StoreDocument>,
    writes: Vec<PathBuf>,
}

/// In-memory document backend.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: RwLock<MemoryState>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a document without counting it as a write.
    pub fn insert(&self, path: impl Into<PathBuf>, doc: StoreDocument) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("memory.insert"))?;
        state.documents.insert(path.into(), doc);
        Ok(())
    }

    /// Returns a copy of the document at `path`.
    pub fn document(&self, path: &Path) -> Result<Option<StoreDocument>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("memory.document"))?;
        Ok(state.documents.get(path).cloned())
    }

    /// Number of writes performed so far.
    pub fn write_count(&self) -> Result<usize, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("memory.write_count"))?;
        Ok(state.writes.len())
    }

    /// Paths written so far, in write order.
    pub fn written_paths(&self) -> Result<Vec<PathBuf>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("memory.written_paths"))?;
        Ok(state.writes.clone())
    }
}

impl StoreBackend for MemoryBackend {
    fn exists(&self, path: &Path) -> Result<bool, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("memory.exists"))?;
        Ok(state.documents.contains_key(path))
    }

    fn read(&self, path: &Path) -> Result<StoreDocument, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("memory.read"))?;
        state
            .documents
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.display().to_string()))
    }

    fn write(&self, path: &Path, doc: &StoreDocument) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("memory.write"))?;
        state.documents.insert(path.to_path_buf(), doc.clone());
        state.writes.push(path.to_path_buf());
        Ok(())
    }
}
