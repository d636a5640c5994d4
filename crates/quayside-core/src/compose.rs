use crate::CoreError;
use quayside_compose::ComposeType;
use serde::Serialize;
use std::path::{Component, Path, PathBuf};

const DEFAULT_COMPOSE_FILE: &str = "docker-compose.yml";

/// Where the compose file of an application comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceKind {
    /// Compose content pasted by the user, stored as `docker-compose.yml`.
    Raw,
    /// A checked-out repository; `compose_path` is relative to its root.
    Repository { compose_path: String },
}

/// How a deployment avoids colliding with other deployments on one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DeploymentMode {
    Plain,
    /// Every resource name gets `-<suffix>`.
    Randomized { suffix: String },
    /// Services join a private network named after the suffix (the app name
    /// when unset); volumes are suffixed only with `isolate_volumes`.
    Isolated {
        suffix: Option<String>,
        isolate_volumes: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComposeApp {
    pub app_name: String,
    pub source: SourceKind,
    pub mode: DeploymentMode,
    pub compose_type: ComposeType,
    /// Remote server name from the engine config; `None` deploys locally.
    pub server: Option<String>,
}

impl ComposeApp {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            source: SourceKind::Raw,
            mode: DeploymentMode::Plain,
            compose_type: ComposeType::DockerCompose,
            server: None,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: SourceKind) -> Self {
        self.source = source;
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: DeploymentMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_compose_type(mut self, compose_type: ComposeType) -> Self {
        self.compose_type = compose_type;
        self
    }

    #[must_use]
    pub fn on_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    pub fn is_isolated(&self) -> bool {
        matches!(self.mode, DeploymentMode::Isolated { .. })
    }

    /// `<compose_root>/<app>/code/<file>`.
    pub fn compose_path(&self, compose_root: &Path) -> Result<PathBuf, CoreError> {
        let code = compose_root.join(&self.app_name).join("code");
        match &self.source {
            SourceKind::Raw => Ok(code.join(DEFAULT_COMPOSE_FILE)),
            SourceKind::Repository { compose_path } => {
                let relative = Path::new(compose_path);
                let escapes = relative
                    .components()
                    .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
                if compose_path.is_empty() || escapes {
                    return Err(CoreError::Config(format!(
                        "compose path '{compose_path}' must be relative to the repository"
                    )));
                }
                Ok(code.join(relative))
            }
        }
    }
}
