use crate::CoreError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;
use tracing::trace;

/// Exclusive advisory lock on a file, released on drop.
///
/// Acquire order is always the application lock first, then the shared
/// middleware lock.
pub struct AppLock {
    lock_file: File,
}

fn open_lock_file(lock_path: &Path) -> Result<File, CoreError> {
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(lock_path)?)
}

impl AppLock {
    pub fn acquire(lock_path: &Path) -> Result<Self, CoreError> {
        let file = open_lock_file(lock_path)?;
        file.lock_exclusive()
            .map_err(|e| CoreError::Lock(format!("{}: {e}", lock_path.display())))?;
        trace!("acquired {}", lock_path.display());
        Ok(Self { lock_file: file })
    }

    pub fn try_acquire(lock_path: &Path) -> Result<Option<Self>, CoreError> {
        let file = open_lock_file(lock_path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { lock_file: file })),
            Err(_) => Ok(None),
        }
    }
}

impl Drop for AppLock {
    fn drop(&mut self) {
        let _ = self.lock_file.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join(".locks").join("shop.lock");
        let _lock = AppLock::acquire(&lock_path).unwrap();
        assert!(lock_path.exists());
    }

    #[test]
    fn try_acquire_returns_none_when_held() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("shop.lock");
        let _lock = AppLock::acquire(&lock_path).unwrap();
        assert!(AppLock::try_acquire(&lock_path).unwrap().is_none());
    }

    #[test]
    fn locks_are_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let _shop = AppLock::acquire(&dir.path().join("shop.lock")).unwrap();
        assert!(AppLock::try_acquire(&dir.path().join("blog.lock"))
            .unwrap()
            .is_some());
    }

    #[test]
    fn lock_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("shop.lock");
        {
            let _lock = AppLock::acquire(&lock_path).unwrap();
        }
        assert!(AppLock::try_acquire(&lock_path).unwrap().is_some());
    }
}
