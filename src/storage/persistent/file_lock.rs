//! Advisory lock on a case directory.
//!
//! The layered store does no cross-process locking of its own. Tools that
//! run against one case directory concurrently take a [`FileLock`] for the
//! duration of a read-write scope. The holder's pid is written into the
//! lock file so a contended lock can be traced back to its owner.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::storage::StorageError;

/// Name of the lock file created inside the case directory.
pub const LOCK_FILE_NAME: &str = ".case.lock";

/// Exclusive lock on a case directory, released on drop.
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
    // held for its OS lock
    _handle: File,
}

impl FileLock {
    /// Locks `dir` without blocking.
    ///
    /// # Errors
    /// - `StorageError::Locked` if another holder has the directory
    /// - `StorageError::Io` if the lock file cannot be opened or locked
    pub fn acquire(dir: &Path) -> Result<Self, StorageError> {
        let path = dir.join(LOCK_FILE_NAME);
        let io = |e: io::Error| StorageError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        };

        let mut handle = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(io)?;

        if !sys::try_lock_exclusive(&handle).map_err(io)? {
            let holder = Self::holder(dir).unwrap_or_else(|| "unknown".to_string());
            tracing::debug!(dir = %dir.display(), holder = %holder, "case directory is locked");
            return Err(StorageError::Locked(format!("{} (held by pid {holder})", dir.display())));
        }

        handle.set_len(0).map_err(io)?;
        write!(handle, "{}", std::process::id()).map_err(io)?;

        tracing::debug!(path = %path.display(), "locked case directory");
        Ok(Self {
            path,
            _handle: handle,
        })
    }

    /// Pid recorded by the current or last holder of `dir`'s lock.
    #[must_use]
    pub fn holder(dir: &Path) -> Option<String> {
        let text = fs::read_to_string(dir.join(LOCK_FILE_NAME)).ok()?;
        let pid = text.trim();
        (!pid.is_empty()).then(|| pid.to_string())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
mod sys {
    use std::fs::File;
    use std::io;
    use std::os::unix::io::AsRawFd;

    /// Returns `Ok(false)` when someone else holds the lock.
    pub(super) fn try_lock_exclusive(file: &File) -> io::Result<bool> {
        // SAFETY: the descriptor is owned by `file` and open for its lifetime.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc == 0 {
            return Ok(true);
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(code) if code == libc::EWOULDBLOCK => Ok(false),
            _ => Err(err),
        }
    }
}

#[cfg(windows)]
mod sys {
    use std::fs::File;
    use std::io;
    use std::os::windows::io::AsRawHandle;

    use windows_sys::Win32::Foundation::{ERROR_LOCK_VIOLATION, HANDLE};
    use windows_sys::Win32::Storage::FileSystem::{
        LockFileEx, LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY,
    };
    use windows_sys::Win32::System::IO::OVERLAPPED;

    /// Returns `Ok(false)` when someone else holds the lock.
    pub(super) fn try_lock_exclusive(file: &File) -> io::Result<bool> {
        let handle = file.as_raw_handle() as HANDLE;
        // SAFETY: the handle is owned by `file`; OVERLAPPED is plain data.
        let ok = unsafe {
            let mut overlapped: OVERLAPPED = std::mem::zeroed();
            LockFileEx(
                handle,
                LOCKFILE_EXCLUSIVE_LOCK | LOCKFILE_FAIL_IMMEDIATELY,
                0,
                1,
                0,
                &mut overlapped,
            )
        };
        if ok != 0 {
            return Ok(true);
        }
        let err = io::Error::last_os_error();
        #[allow(clippy::cast_possible_wrap)]
        let contended = err.raw_os_error() == Some(ERROR_LOCK_VIOLATION as i32);
        if contended {
            Ok(false)
        } else {
            Err(err)
        }
    }
}

#[cfg(not(any(unix, windows)))]
mod sys {
    use std::fs::File;
    use std::io;

    pub(super) fn try_lock_exclusive(_file: &File) -> io::Result<bool> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "directory locking is not available on this platform",
        ))
    }
}
