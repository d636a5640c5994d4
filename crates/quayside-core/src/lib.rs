//! Deployment orchestration for Quayside.
//!
//! This crate ties the compose transforms and the proxy file manager together
//! behind the `Engine`: it resolves where an application's compose file lives,
//! reads and writes it on the right host (local filesystem or a remote server
//! over ssh), applies the deployment mode, and runs every proxy change under
//! the per-application and shared-middleware locks.

pub mod compose;
pub mod concurrency;
pub mod config;
pub mod engine;
pub mod host;

pub use compose::{ComposeApp, DeploymentMode, SourceKind};
pub use concurrency::AppLock;
pub use config::{EngineConfig, PathsConfig, ServerConfig};
pub use engine::Engine;
pub use host::{
    shell_quote, write_file_script, CommandExecutor, Host, HostFiles, LocalHost,
    RemoteConnector, RemoteHost, SshConnector, SshExecutor,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("compose error: {0}")]
    Compose(#[from] quayside_compose::ComposeError),
    #[error("proxy error: {0}")]
    Proxy(#[from] quayside_proxy::ProxyError),
    #[error("config error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("remote error on '{server}': {message}")]
    Remote { server: String, message: String },
    #[error("lock error: {0}")]
    Lock(String),
}
