//! Storage backends for case stores.
//!
//! [`StoreBackend`] is the persistence seam. [`MemoryBackend`] keeps
//! documents in memory; the `persistent` feature adds the file backend.

mod memory;
mod traits;

#[cfg(feature = "persistent")]
pub mod persistent;

pub use memory::MemoryBackend;
pub use traits::{StorageError, StoreBackend, StoreDocument};

#[cfg(feature = "persistent")]
pub use persistent::{FileBackend, FileBackendConfig, FileLock};
