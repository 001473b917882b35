//! Best-effort cross-process job lock.
//!
//! A non-blocking exclusive [`File::try_lock`] on a lock file. Acquisition
//! never waits: if another holder has the lock the caller gets `Ok(None)` and
//! is expected to skip its run. The lock is released when the guard drops and
//! the file handle closes.

use std::fs::{self, File, OpenOptions, TryLockError};
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Holds the lock until dropped.
#[derive(Debug)]
pub struct JobLockGuard {
    _file: File,
    path: PathBuf,
}

impl JobLockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for JobLockGuard {
    fn drop(&mut self) {
        debug!(path = %self.path.display(), "Released job lock");
    }
}

/// Try to take the lock at `path`, creating parent directories as needed.
///
/// # Returns
///
/// `Ok(Some(guard))` when acquired, `Ok(None)` when another holder has it.
///
/// # Errors
///
/// I/O errors opening or locking the lock file, other than contention.
pub fn try_acquire(path: &Path) -> io::Result<Option<JobLockGuard>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(path)?;

    match file.try_lock() {
        Ok(()) => {
            debug!(path = %path.display(), "Acquired job lock");
            Ok(Some(JobLockGuard {
                _file: file,
                path: path.to_path_buf(),
            }))
        }
        Err(TryLockError::WouldBlock) => Ok(None),
        Err(TryLockError::Error(e)) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_acquire_is_refused_until_release() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".locks/digest_job.lock");

        let first = try_acquire(&path).unwrap();
        assert!(first.is_some());
        assert!(try_acquire(&path).unwrap().is_none());

        drop(first);
        assert!(try_acquire(&path).unwrap().is_some());
    }
}
