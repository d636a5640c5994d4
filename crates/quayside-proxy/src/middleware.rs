use crate::config::{FileConfig, Middleware};
use crate::files::ConfigFiles;
use crate::layout::ProxyLayout;
use crate::ProxyError;
use quayside_compose::REDIRECT_TO_HTTPS;
use std::rc::Rc;
use tracing::{debug, info};

/// The shared `middlewares.yml`.
#[derive(Clone)]
pub struct MiddlewareStore {
    layout: ProxyLayout,
    files: Rc<dyn ConfigFiles>,
}

impl MiddlewareStore {
    pub fn new(layout: ProxyLayout, files: Rc<dyn ConfigFiles>) -> Self {
        Self { layout, files }
    }

    /// The shared config, or an empty one if the file is missing or empty.
    pub fn load(&self) -> Result<FileConfig, ProxyError> {
        let mut config = FileConfig::read(self.files.as_ref(), &self.layout.middlewares_file())?
            .unwrap_or_else(FileConfig::empty);
        config.http_mut();
        Ok(config)
    }

    pub fn save(&self, config: &FileConfig) -> Result<(), ProxyError> {
        let path = self.layout.middlewares_file();
        config.write(self.files.as_ref(), &path)?;
        debug!("wrote shared middlewares {} on {}", path.display(), self.files.describe());
        Ok(())
    }

    /// The skeleton every installation starts from: the permanent
    /// http-to-https redirect.
    pub fn default_config() -> FileConfig {
        let mut config = FileConfig::empty();
        config.http_mut().middlewares.insert(
            REDIRECT_TO_HTTPS.to_owned(),
            Middleware::redirect_scheme("https", true),
        );
        config
    }

    /// Write the default skeleton if no shared file exists yet. Returns
    /// whether the file was created.
    pub fn ensure_default(&self) -> Result<bool, ProxyError> {
        let path = self.layout.middlewares_file();
        if self.files.read(&path)?.is_some() {
            return Ok(false);
        }
        Self::default_config().write(self.files.as_ref(), &path)?;
        info!("created shared middlewares {} on {}", path.display(), self.files.describe());
        Ok(true)
    }
}
