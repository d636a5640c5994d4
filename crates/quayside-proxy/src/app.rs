use crate::config::FileConfig;
use crate::files::ConfigFiles;
use crate::layout::{validate_app_name, ProxyLayout};
use crate::ProxyError;
use std::rc::Rc;
use tracing::debug;

/// Per-application router/service files, `<dynamic>/<app>.yml`.
#[derive(Clone)]
pub struct AppConfigStore {
    layout: ProxyLayout,
    files: Rc<dyn ConfigFiles>,
}

impl AppConfigStore {
    pub fn new(layout: ProxyLayout, files: Rc<dyn ConfigFiles>) -> Self {
        Self { layout, files }
    }

    /// The app's config, or an empty one if the file is missing or empty.
    pub fn load_or_create(&self, app: &str) -> Result<FileConfig, ProxyError> {
        validate_app_name(app)?;
        let path = self.layout.app_config(app);
        let mut config =
            FileConfig::read(self.files.as_ref(), &path)?.unwrap_or_else(FileConfig::empty);
        config.http_mut();
        Ok(config)
    }

    pub fn save(&self, app: &str, config: &FileConfig) -> Result<(), ProxyError> {
        validate_app_name(app)?;
        let path = self.layout.app_config(app);
        config.write(self.files.as_ref(), &path)?;
        debug!("wrote proxy config {} on {}", path.display(), self.files.describe());
        Ok(())
    }

    pub fn exists(&self, app: &str) -> Result<bool, ProxyError> {
        validate_app_name(app)?;
        Ok(self.files.read(&self.layout.app_config(app))?.is_some())
    }

    pub fn remove(&self, app: &str) -> Result<(), ProxyError> {
        validate_app_name(app)?;
        let path = self.layout.app_config(app);
        self.files.remove(&path)?;
        debug!("removed proxy config {} on {}", path.display(), self.files.describe());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Router;
    use crate::files::LocalFiles;

    fn store() -> (tempfile::TempDir, AppConfigStore) {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProxyLayout::new(dir.path());
        layout.initialize().unwrap();
        (dir, AppConfigStore::new(layout, Rc::new(LocalFiles)))
    }

    #[test]
    fn missing_file_gives_empty_config() {
        let (_dir, store) = store();
        let config = store.load_or_create("shop").unwrap();
        assert_eq!(config, FileConfig::empty());
        assert!(!store.exists("shop").unwrap());
    }

    #[test]
    fn save_load_remove() {
        let (_dir, store) = store();
        let mut config = store.load_or_create("shop").unwrap();
        config.http_mut().routers.insert(
            "shop-router-1".to_owned(),
            Router {
                rule: "Host(`shop.example.com`)".to_owned(),
                service: "shop-service-1".to_owned(),
                entry_points: vec!["web".to_owned()],
                ..Router::default()
            },
        );
        store.save("shop", &config).unwrap();
        assert!(store.exists("shop").unwrap());
        assert_eq!(store.load_or_create("shop").unwrap(), config);

        store.remove("shop").unwrap();
        assert!(!store.exists("shop").unwrap());
        store.remove("shop").unwrap();
    }

    #[test]
    fn rejects_path_like_names() {
        let (_dir, store) = store();
        assert!(matches!(
            store.load_or_create("../shop"),
            Err(ProxyError::InvalidAppName(_))
        ));
        assert!(store.exists("../shop").is_err());
    }
}
