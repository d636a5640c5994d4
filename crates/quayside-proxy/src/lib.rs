//! File-based reverse-proxy configuration for Quayside.
//!
//! The proxy watches a dynamic directory holding one `<app>.yml` per
//! application (routers and services) plus a shared `middlewares.yml`. This
//! crate owns the on-disk model of those files (`FileConfig`), their layout
//! (`ProxyLayout`), the per-app and shared stores, and the `ProxyManager`
//! facade that applies domain, credential and redirect changes. The files
//! are reached through `ConfigFiles`, so the directory may be local or on a
//! remote server. Every local write is atomic.

pub mod app;
pub mod config;
pub mod files;
pub mod layout;
pub mod manager;
pub mod middleware;
pub mod router;
pub mod security;

pub use app::AppConfigStore;
pub use config::{
    AddPrefix, BasicAuth, FileConfig, HttpConfig, LoadBalancer, Middleware, RedirectRegex,
    RedirectScheme, Router, RouterTls, Server, Service, StripPrefix,
};
pub use files::{remove_file, write_atomic, ConfigFiles, LocalFiles};
pub use layout::{validate_app_name, ProxyLayout, MIDDLEWARES_LOCK};
pub use manager::ProxyManager;
pub use middleware::MiddlewareStore;
pub use router::{AppRouting, Redirect};
pub use security::{hash_credential, validate_username, BCRYPT_COST};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("proxy I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt proxy config '{}': {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to serialize proxy config: {0}")]
    Serialize(#[from] serde_yaml::Error),
    #[error("invalid application name: {0}")]
    InvalidAppName(String),
    #[error("invalid username: {0}")]
    InvalidUsername(String),
    #[error("failed to hash credential: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("remote proxy config error: {0}")]
    Remote(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_error_display_corrupt() {
        let source = serde_yaml::from_str::<FileConfig>("http: [").unwrap_err();
        let e = ProxyError::Corrupt {
            path: PathBuf::from("/tmp/dynamic/shop.yml"),
            source,
        };
        let msg = e.to_string();
        assert!(msg.contains("corrupt proxy config"));
        assert!(msg.contains("shop.yml"));
    }

    #[test]
    fn proxy_error_display_invalid_app_name() {
        let e = ProxyError::InvalidAppName("bad/name".to_owned());
        assert!(e.to_string().contains("bad/name"));
    }
}
