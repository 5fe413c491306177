//! Exclusive advisory lock over the data directory.
//!
//! Mutating operations (`check`, `commit`, `discard`, initial sync) hold a
//! [`DataLock`] for their whole duration. The lock is released when the guard
//! drops, on every exit path.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::store::DataDir;

#[derive(Debug)]
pub struct DataLock {
    file: File,
}

impl DataLock {
    /// Take the lock without waiting; `SyncError::Locked` if it is held.
    pub fn acquire(data: &DataDir) -> Result<Self> {
        std::fs::create_dir_all(data.root())?;
        let path = data.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!(path = %path.display(), "lock acquired");
                Ok(Self { file })
            }
            Err(e)
                if e.kind() == ErrorKind::WouldBlock
                    || e.raw_os_error() == fs2::lock_contended_error().raw_os_error() =>
            {
                Err(SyncError::Locked(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for DataLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
