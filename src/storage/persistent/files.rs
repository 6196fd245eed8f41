//! File-backed store documents.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::codec;
use super::FileBackendConfig;
use crate::error::CaseResult;
use crate::storage::{StorageError, StoreBackend, StoreDocument};

fn io_err(path: &Path, e: &std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

/// Backend storing each document in its own checksummed file.
///
/// Writes go to a sibling temporary file that is renamed over the target,
/// so a crash mid-write leaves the previous document intact.
#[derive(Debug, Clone, Default)]
pub struct FileBackend {
    config: FileBackendConfig,
}

impl FileBackend {
    /// Creates a backend after validating `config`.
    ///
    /// # Errors
    /// `InvalidConfig` if the size limit is out of range.
    pub fn new(config: FileBackendConfig) -> CaseResult<Self> {
        Ok(Self {
            config: config.validate()?,
        })
    }

    #[must_use]
    pub fn config(&self) -> &FileBackendConfig {
        &self.config
    }

    fn temp_path(path: &Path) -> PathBuf {
        let mut name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        path.with_file_name(name)
    }
}

impl StoreBackend for FileBackend {
    fn exists(&self, path: &Path) -> Result<bool, StorageError> {
        match fs::metadata(path) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_err(path, &e)),
        }
    }

    fn read(&self, path: &Path) -> Result<StoreDocument, StorageError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(path.display().to_string()));
            }
            Err(e) => return Err(io_err(path, &e)),
        };

        let mut reader = BufReader::new(file);
        codec::decode(&mut reader).map_err(|e| match e.kind() {
            ErrorKind::InvalidData | ErrorKind::UnexpectedEof => StorageError::Corrupted {
                path: path.display().to_string(),
                reason: e.to_string(),
            },
            _ => io_err(path, &e),
        })
    }

    fn write(&self, path: &Path, doc: &StoreDocument) -> Result<(), StorageError> {
        let bytes = codec::encode(doc).map_err(|e| StorageError::SerializationError(e.to_string()))?;
        if bytes.len() > self.config.max_document_size {
            return Err(StorageError::SerializationError(format!(
                "{} is {} bytes, above the configured limit of {}",
                path.display(),
                bytes.len(),
                self.config.max_document_size
            )));
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| io_err(parent, &e))?;
            }
        }

        let tmp = Self::temp_path(path);
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp)
                .map_err(|e| io_err(&tmp, &e))?;
            file.write_all(&bytes).map_err(|e| io_err(&tmp, &e))?;
            if self.config.sync_on_write {
                file.sync_all().map_err(|e| io_err(&tmp, &e))?;
            }
        }
        fs::rename(&tmp, path).map_err(|e| io_err(path, &e))?;

        tracing::debug!(path = %path.display(), kind = %doc.kind, entries = doc.entries.len(), "wrote store");
        Ok(())
    }
}
