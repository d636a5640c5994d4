use crate::ProxyError;
use std::fs;
use std::path::{Path, PathBuf};

const MIDDLEWARES_FILE: &str = "middlewares.yml";
const LOCKS_DIR: &str = ".locks";

/// Lock name guarding the shared middleware file.
pub const MIDDLEWARES_LOCK: &str = "middlewares";

/// Directory layout of the proxy's dynamic configuration.
///
/// ```text
/// <dynamic>/
///   <app>.yml          routers and services of one application
///   middlewares.yml    shared middlewares (https redirect, auth, redirects, path rewrites)
///   .locks/<name>.lock advisory locks, see quayside-core
/// ```
#[derive(Debug, Clone)]
pub struct ProxyLayout {
    root: PathBuf,
}

impl ProxyLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of an application's config file. Callers validate `app` first.
    #[inline]
    pub fn app_config(&self, app: &str) -> PathBuf {
        self.root.join(format!("{app}.yml"))
    }

    #[inline]
    pub fn middlewares_file(&self) -> PathBuf {
        self.root.join(MIDDLEWARES_FILE)
    }

    #[inline]
    pub fn locks_dir(&self) -> PathBuf {
        self.root.join(LOCKS_DIR)
    }

    #[inline]
    pub fn lock_file(&self, name: &str) -> PathBuf {
        self.locks_dir().join(format!("{name}.lock"))
    }

    pub fn initialize(&self) -> Result<(), ProxyError> {
        fs::create_dir_all(&self.root)?;
        fs::create_dir_all(self.locks_dir())?;
        Ok(())
    }
}

/// Application names become file names, so they are restricted to
/// `[A-Za-z0-9_-]{1,64}`.
pub fn validate_app_name(name: &str) -> Result<(), ProxyError> {
    if name.is_empty() || name.len() > 64 {
        return Err(ProxyError::InvalidAppName(format!(
            "'{name}': application name must be 1-64 characters"
        )));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    {
        return Err(ProxyError::InvalidAppName(format!(
            "'{name}': application name must match [a-zA-Z0-9_-]"
        )));
    }
    if name == MIDDLEWARES_LOCK {
        return Err(ProxyError::InvalidAppName(format!(
            "'{name}' is reserved for the shared middleware file"
        )));
    }
    Ok(())
}
