//! Storage for the dynamic config files. The stores only see whole-file
//! reads, writes and removals, so the same code manages a local dynamic
//! directory or one on a remote server.

use crate::ProxyError;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

pub trait ConfigFiles {
    /// `None` when the file does not exist.
    fn read(&self, path: &Path) -> Result<Option<String>, ProxyError>;
    fn write(&self, path: &Path, content: &str) -> Result<(), ProxyError>;
    /// Removing a missing file succeeds.
    fn remove(&self, path: &Path) -> Result<(), ProxyError>;
    fn describe(&self) -> String;
}

/// Fsync a directory so that a preceding rename into it is durable.
fn fsync_dir(dir: &Path) -> io::Result<()> {
    std::fs::File::open(dir)?.sync_all()
}

/// Replace `dest` with `content` via a temp file in the same directory,
/// creating parent directories as needed.
pub fn write_atomic(dest: &Path, content: &[u8]) -> io::Result<()> {
    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| e.error)?;
    fsync_dir(dir)
}

/// Delete `path` durably. A missing file is not an error.
pub fn remove_file(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => match path.parent() {
            Some(dir) => fsync_dir(dir),
            None => Ok(()),
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// The local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFiles;

impl ConfigFiles for LocalFiles {
    fn read(&self, path: &Path) -> Result<Option<String>, ProxyError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, path: &Path, content: &str) -> Result<(), ProxyError> {
        Ok(write_atomic(path, content.as_bytes())?)
    }

    fn remove(&self, path: &Path) -> Result<(), ProxyError> {
        Ok(remove_file(path)?)
    }

    fn describe(&self) -> String {
        "local".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_atomic_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested").join("shop.yml");
        write_atomic(&dest, b"first").unwrap();
        write_atomic(&dest, b"second").unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "second");
        let leftovers: Vec<_> = std::fs::read_dir(dest.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn local_files_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop.yml");
        assert!(LocalFiles.read(&path).unwrap().is_none());
        LocalFiles.write(&path, "http: {}\n").unwrap();
        assert_eq!(LocalFiles.read(&path).unwrap().as_deref(), Some("http: {}\n"));
        LocalFiles.remove(&path).unwrap();
        assert!(!path.exists());
        LocalFiles.remove(&path).unwrap();
    }
}
