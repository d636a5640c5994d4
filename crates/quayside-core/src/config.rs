//! Engine configuration, `quayside.toml`.
//!
//! ```toml
//! [paths]
//! base = "/etc/quayside"
//! # compose = "/srv/quayside/compose"
//! # dynamic = "/etc/quayside/traefik/dynamic"
//!
//! [servers.edge-1]
//! host = "deploy@10.0.0.12"
//! port = 2222
//! identity_file = "/root/.ssh/quayside"
//! ```

use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONFIG_ENV: &str = "QUAYSIDE_CONFIG";
pub const BASE_ENV: &str = "QUAYSIDE_BASE";
pub const SYSTEM_CONFIG: &str = "/etc/quayside/quayside.toml";
pub const DEFAULT_BASE: &str = "/etc/quayside";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub servers: BTreeMap<String, ServerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    #[serde(default = "default_base")]
    pub base: PathBuf,
    /// Root of per-application checkouts. Defaults to `<base>/compose`.
    #[serde(default)]
    pub compose: Option<PathBuf>,
    /// The proxy's dynamic directory. Defaults to `<base>/traefik/dynamic`.
    #[serde(default)]
    pub dynamic: Option<PathBuf>,
}

/// An ssh destination for remote deployments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub identity_file: Option<PathBuf>,
}

fn default_base() -> PathBuf {
    PathBuf::from(DEFAULT_BASE)
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            base: default_base(),
            compose: None,
            dynamic: None,
        }
    }
}

impl PathsConfig {
    pub fn compose_root(&self) -> PathBuf {
        self.compose
            .clone()
            .unwrap_or_else(|| self.base.join("compose"))
    }

    pub fn dynamic_root(&self) -> PathBuf {
        self.dynamic
            .clone()
            .unwrap_or_else(|| self.base.join("traefik").join("dynamic"))
    }
}

impl EngineConfig {
    /// Rooted at `base`, with every other path derived from it.
    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self {
            paths: PathsConfig {
                base: base.into(),
                ..PathsConfig::default()
            },
            ..Self::default()
        }
    }

    pub fn parse(content: &str) -> Result<Self, CoreError> {
        toml::from_str(content).map_err(|e| CoreError::Config(format!("invalid config: {e}")))
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::parse(&content)
    }

    /// Resolve the configuration from the process environment: an explicit
    /// path, then `QUAYSIDE_CONFIG`, then the system file, then defaults.
    /// `QUAYSIDE_BASE` overrides the base path of whichever was found.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, CoreError> {
        Self::resolve_with(explicit, |key| std::env::var(key).ok(), Path::new(SYSTEM_CONFIG))
    }

    pub fn resolve_with(
        explicit: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
        system: &Path,
    ) -> Result<Self, CoreError> {
        let from_env = env(CONFIG_ENV).filter(|p| !p.is_empty()).map(PathBuf::from);
        let mut config = if let Some(path) = explicit.map(Path::to_path_buf).or(from_env) {
            debug!("loading config from {}", path.display());
            Self::load(&path)?
        } else if system.exists() {
            debug!("loading config from {}", system.display());
            Self::load(system)?
        } else {
            debug!("no config file found, using defaults");
            Self::default()
        };

        if let Some(base) = env(BASE_ENV).filter(|b| !b.is_empty()) {
            config.paths.base = PathBuf::from(base);
        }
        Ok(config)
    }

    pub fn server(&self, name: &str) -> Result<&ServerConfig, CoreError> {
        self.servers
            .get(name)
            .ok_or_else(|| CoreError::Config(format!("unknown server '{name}'")))
    }
}
