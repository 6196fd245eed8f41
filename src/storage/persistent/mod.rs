//! File-backed persistence for case stores.
//!
//! Each store lives in its own file inside the case directory:
//! - Header with magic bytes and format version
//! - JSON body (compatible with the serde attributes on entries)
//! - CRC32 checksum for corruption detection
//! - Write to a temporary file, then rename
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                  case directory               │
//! ├───────────────────────────────────────────────┤
//! │  env_case.store   env_run.store               │
//! │  env_build.store  env_mach_pes.store          │
//! │  env_batch.store  ...                         │
//! │                      ↑                        │
//! │             FileBackend (codec)               │
//! │                      ↑                        │
//! │       FileLock (.case.lock, advisory)         │
//! └───────────────────────────────────────────────┘
//! ```

mod codec;
mod file_lock;
mod files;

pub use codec::{FORMAT_VERSION, MAGIC, MAX_DOCUMENT_SIZE};
pub use file_lock::{FileLock, LOCK_FILE_NAME};
pub use files::FileBackend;

use crate::error::{CaseError, CaseResult};

/// Configuration for the file backend.
#[derive(Debug, Clone)]
pub struct FileBackendConfig {
    /// Whether to fsync each store file before renaming it into place.
    pub sync_on_write: bool,
    /// Largest encoded document the backend will write (bytes).
    pub max_document_size: usize,
}

impl Default for FileBackendConfig {
    fn default() -> Self {
        Self {
            sync_on_write: true,
            max_document_size: MAX_DOCUMENT_SIZE,
        }
    }
}

impl FileBackendConfig {
    const MIN_DOCUMENT_SIZE: usize = 16;

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns `InvalidConfig` when the size limit is outside
    /// `[16, MAX_DOCUMENT_SIZE]`.
    pub fn validate(self) -> CaseResult<Self> {
        if self.max_document_size < Self::MIN_DOCUMENT_SIZE {
            return Err(CaseError::invalid_config(format!(
                "max_document_size must be at least {} bytes (got {})",
                Self::MIN_DOCUMENT_SIZE,
                self.max_document_size
            )));
        }
        if self.max_document_size > MAX_DOCUMENT_SIZE {
            return Err(CaseError::invalid_config(format!(
                "max_document_size must be at most {MAX_DOCUMENT_SIZE} bytes (got {})",
                self.max_document_size
            )));
        }
        Ok(self)
    }
}
