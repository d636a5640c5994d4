use crate::compose::{ComposeApp, DeploymentMode};
use crate::concurrency::AppLock;
use crate::config::EngineConfig;
use crate::host::{
    shell_quote, write_file_script, Host, HostFiles, LocalHost, RemoteConnector, RemoteHost,
    SshConnector,
};
use crate::CoreError;
use quayside_compose::{
    apply_suffix, ensure_references, inject_domains_with, isolate_deployment, parse_document_str,
    to_yaml_string, ComposeDocument, Domain, InjectOptions,
};
use quayside_proxy::{validate_app_name, FileConfig, ProxyLayout, ProxyManager, Redirect, MIDDLEWARES_LOCK};
use std::path::PathBuf;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Entry point for every deployment operation.
///
/// Compose operations read and write through the application's host. Proxy
/// operations act on the dynamic directory of the named server, or the local
/// one when no server is given. They run under the application lock and,
/// when the shared middleware file is involved, the middleware lock taken
/// second. Locks are always local files.
pub struct Engine {
    config: EngineConfig,
    proxy: ProxyManager,
    remote: Box<dyn RemoteConnector>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let remote = Box::new(SshConnector::new(config.servers.clone()));
        Self::with_connector(config, remote)
    }

    pub fn with_connector(config: EngineConfig, remote: Box<dyn RemoteConnector>) -> Self {
        let proxy = ProxyManager::new(ProxyLayout::new(config.paths.dynamic_root()));
        Self {
            config,
            proxy,
            remote,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn proxy(&self) -> &ProxyManager {
        &self.proxy
    }

    pub fn compose_path(&self, app: &ComposeApp) -> Result<PathBuf, CoreError> {
        validate_app_name(&app.app_name)?;
        app.compose_path(&self.config.paths.compose_root())
    }

    fn host_for(&self, app: &ComposeApp) -> Result<Box<dyn Host>, CoreError> {
        match &app.server {
            None => Ok(Box::new(LocalHost)),
            Some(server) => Ok(Box::new(RemoteHost::new(self.remote.connect(server)?))),
        }
    }

    /// The proxy manager for `server`'s dynamic directory, or the local one.
    pub fn proxy_on(&self, server: Option<&str>) -> Result<ProxyManager, CoreError> {
        match server {
            None => Ok(self.proxy.clone()),
            Some(server) => {
                let host = RemoteHost::new(self.remote.connect(server)?);
                debug!("proxy config on {}", host.describe());
                Ok(ProxyManager::with_files(
                    self.proxy.layout().clone(),
                    Rc::new(HostFiles::new(Box::new(host))),
                ))
            }
        }
    }

    fn lock(&self, name: &str) -> Result<AppLock, CoreError> {
        AppLock::acquire(&self.proxy.layout().lock_file(name))
    }

    fn lock_app(&self, app: &str) -> Result<AppLock, CoreError> {
        validate_app_name(app)?;
        self.lock(app)
    }

    /// The app lock and then the shared middleware lock.
    fn lock_app_and_shared(&self, app: &str) -> Result<(AppLock, AppLock), CoreError> {
        let app_lock = self.lock_app(app)?;
        let shared = self.lock(MIDDLEWARES_LOCK)?;
        Ok((app_lock, shared))
    }

    /// The app's compose document, or `None` if the file does not exist.
    pub fn load_compose(&self, app: &ComposeApp) -> Result<Option<ComposeDocument>, CoreError> {
        let path = self.compose_path(app)?;
        let host = self.host_for(app)?;
        debug!("loading {} from {}", path.display(), host.describe());
        match host.read(&path)? {
            Some(content) => Ok(Some(parse_document_str(&content)?)),
            None => Ok(None),
        }
    }

    /// Load the compose file and apply the deployment mode and domains.
    /// `None` if the file does not exist.
    pub fn prepare_compose(
        &self,
        app: &ComposeApp,
        domains: &[Domain],
    ) -> Result<Option<ComposeDocument>, CoreError> {
        let Some(doc) = self.load_compose(app)? else {
            return Ok(None);
        };
        Ok(Some(transform(app, &doc, domains)?))
    }

    /// Prepare the compose file and write it back in place. Returns the
    /// written path, or `None` if there was no compose file.
    pub fn write_compose(
        &self,
        app: &ComposeApp,
        domains: &[Domain],
    ) -> Result<Option<PathBuf>, CoreError> {
        let _lock = self.lock_app(&app.app_name)?;
        let Some(doc) = self.prepare_compose(app, domains)? else {
            warn!("no compose file for {}", app.app_name);
            return Ok(None);
        };
        let path = self.compose_path(app)?;
        let yaml = to_yaml_string(&doc)?;
        let host = self.host_for(app)?;
        host.write(&path, &yaml)?;
        info!("wrote {} on {}", path.display(), host.describe());
        Ok(Some(path))
    }

    /// [`write_compose`](Self::write_compose), skipped when there are no
    /// domains to inject.
    pub fn write_domains_to_compose(
        &self,
        app: &ComposeApp,
        domains: &[Domain],
    ) -> Result<Option<PathBuf>, CoreError> {
        if domains.is_empty() {
            return Ok(None);
        }
        self.write_compose(app, domains)
    }

    /// Shell snippet for a remote build pipeline that writes the prepared
    /// compose file. Failures render as a snippet that appends the error to
    /// `log_path` and exits 1. Empty when there are no domains.
    pub fn remote_write_script(
        &self,
        app: &ComposeApp,
        domains: &[Domain],
        log_path: &str,
    ) -> String {
        if domains.is_empty() {
            return String::new();
        }
        let rendered = self.compose_path(app).and_then(|path| {
            let doc = self.prepare_compose(app, domains)?;
            let yaml = doc.map(|d| to_yaml_string(&d)).transpose()?;
            Ok((path, yaml))
        });
        match rendered {
            Ok((path, Some(yaml))) => write_file_script(&path, &yaml),
            Ok((_, None)) => failure_script("❌ Error: Compose file not found", log_path),
            Err(e) => {
                warn!("failed to prepare compose for {}: {e}", app.app_name);
                failure_script(&format!("❌ Error preparing compose file: {e}"), log_path)
            }
        }
    }

    pub fn ensure_default_middlewares(&self, server: Option<&str>) -> Result<bool, CoreError> {
        let proxy = self.proxy_on(server)?;
        if server.is_none() {
            proxy.layout().initialize()?;
        }
        let _lock = self.lock(MIDDLEWARES_LOCK)?;
        Ok(proxy.ensure_default_middlewares()?)
    }

    pub fn manage_domain(
        &self,
        app: &str,
        domain: &Domain,
        server: Option<&str>,
    ) -> Result<(), CoreError> {
        let proxy = self.proxy_on(server)?;
        let _locks = self.lock_app_and_shared(app)?;
        Ok(proxy.manage_domain(app, domain)?)
    }

    pub fn remove_domain(&self, app: &str, key: u32, server: Option<&str>) -> Result<(), CoreError> {
        let proxy = self.proxy_on(server)?;
        let _locks = self.lock_app_and_shared(app)?;
        Ok(proxy.remove_domain(app, key)?)
    }

    pub fn add_credential(
        &self,
        app: &str,
        username: &str,
        password: &str,
        server: Option<&str>,
    ) -> Result<(), CoreError> {
        let proxy = self.proxy_on(server)?;
        let _locks = self.lock_app_and_shared(app)?;
        Ok(proxy.add_credential(app, username, password)?)
    }

    pub fn remove_credential(
        &self,
        app: &str,
        username: &str,
        server: Option<&str>,
    ) -> Result<(), CoreError> {
        let proxy = self.proxy_on(server)?;
        let _locks = self.lock_app_and_shared(app)?;
        Ok(proxy.remove_credential(app, username)?)
    }

    pub fn add_redirect(
        &self,
        app: &str,
        redirect: &Redirect,
        server: Option<&str>,
    ) -> Result<(), CoreError> {
        let proxy = self.proxy_on(server)?;
        let _locks = self.lock_app_and_shared(app)?;
        Ok(proxy.add_redirect(app, redirect)?)
    }

    pub fn remove_redirect(&self, app: &str, key: u32, server: Option<&str>) -> Result<(), CoreError> {
        let proxy = self.proxy_on(server)?;
        let _locks = self.lock_app_and_shared(app)?;
        Ok(proxy.remove_redirect(app, key)?)
    }

    /// The app's current proxy config. Read-only, so unlocked.
    pub fn app_routes(&self, app: &str, server: Option<&str>) -> Result<FileConfig, CoreError> {
        Ok(self.proxy_on(server)?.apps().load_or_create(app)?)
    }

    /// The shared middleware file. Read-only, so unlocked.
    pub fn shared_middlewares(&self, server: Option<&str>) -> Result<FileConfig, CoreError> {
        Ok(self.proxy_on(server)?.middlewares().load()?)
    }
}

/// Apply the deployment mode, check references, then inject domains.
fn transform(
    app: &ComposeApp,
    doc: &ComposeDocument,
    domains: &[Domain],
) -> Result<ComposeDocument, CoreError> {
    let moded = match &app.mode {
        DeploymentMode::Plain => doc.clone(),
        DeploymentMode::Randomized { suffix } => apply_suffix(doc, suffix),
        DeploymentMode::Isolated {
            suffix,
            isolate_volumes,
        } => {
            let suffix = suffix
                .as_deref()
                .filter(|s| !s.is_empty())
                .unwrap_or(&app.app_name);
            isolate_deployment(doc, suffix, *isolate_volumes)
        }
    };
    ensure_references(&moded)?;

    if domains.is_empty() {
        return Ok(moded);
    }
    let options = InjectOptions {
        compose_type: app.compose_type,
        isolated: app.is_isolated(),
    };
    Ok(inject_domains_with(&moded, domains, &options)?)
}

fn failure_script(message: &str, log_path: &str) -> String {
    format!(
        "echo {} >> {};\nexit 1;\n",
        shell_quote(message),
        shell_quote(log_path)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::SourceKind;
    use quayside_compose::{CertificateType, ComposeType, INGRESS_NETWORK};

    const COMPOSE: &str = "services:\n  web:\n    image: nginx\n    depends_on: [app]\n  app:\n    image: node\n";

    fn engine() -> (tempfile::TempDir, Engine) {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::new(EngineConfig::with_base(dir.path()));
        (dir, engine)
    }

    fn write_app(engine: &Engine, app: &ComposeApp, content: &str) {
        let path = engine.compose_path(app).unwrap();
        LocalHost.write(&path, content).unwrap();
    }

    fn web_domain() -> Domain {
        Domain::new("shop.example.com", 1)
            .with_service("web")
            .with_https(CertificateType::Letsencrypt)
    }

    #[test]
    fn load_missing_compose_is_none() {
        let (_dir, engine) = engine();
        assert!(engine.load_compose(&ComposeApp::new("shop")).unwrap().is_none());
        assert!(engine
            .write_compose(&ComposeApp::new("shop"), &[])
            .unwrap()
            .is_none());
    }

    #[test]
    fn randomized_prepare_suffixes_then_injects() {
        let (_dir, engine) = engine();
        let app = ComposeApp::new("shop").with_mode(DeploymentMode::Randomized {
            suffix: "x1".to_owned(),
        });
        write_app(&engine, &app, COMPOSE);
        let domain = Domain::new("shop.example.com", 1).with_service("web-x1");
        let doc = engine.prepare_compose(&app, &[domain]).unwrap().unwrap();
        assert!(doc.services.contains_key("web-x1"));
        assert!(doc.services["web-x1"].network_names().contains(&INGRESS_NETWORK));
    }

    #[test]
    fn randomized_prepare_keeps_link_aliases() {
        let (_dir, engine) = engine();
        let app = ComposeApp::new("shop").with_mode(DeploymentMode::Randomized {
            suffix: "x1".to_owned(),
        });
        write_app(
            &engine,
            &app,
            "services:\n  web:\n    links: ['db:database']\n  db:\n    image: postgres\n",
        );
        let doc = engine.prepare_compose(&app, &[]).unwrap().unwrap();
        assert_eq!(
            doc.services["web-x1"].links,
            Some(vec!["db-x1:database".to_owned()])
        );
    }

    #[test]
    fn isolated_prepare_uses_app_network() {
        let (_dir, engine) = engine();
        let app = ComposeApp::new("shop").with_mode(DeploymentMode::Isolated {
            suffix: None,
            isolate_volumes: false,
        });
        write_app(&engine, &app, COMPOSE);
        let doc = engine.prepare_compose(&app, &[web_domain()]).unwrap().unwrap();
        assert!(doc.networks.as_ref().unwrap().contains_key("shop"));
        assert!(!doc.networks.as_ref().unwrap().contains_key(INGRESS_NETWORK));
        assert_eq!(doc.services["web"].network_names(), vec!["shop"]);
    }

    #[test]
    fn dangling_references_fail_fast() {
        let (_dir, engine) = engine();
        let app = ComposeApp::new("shop");
        write_app(&engine, &app, "services:\n  web:\n    links: [db]\n");
        let err = engine.prepare_compose(&app, &[]).unwrap_err();
        assert!(err.to_string().starts_with("compose error:"));
    }

    #[test]
    fn write_domains_skips_empty_list() {
        let (_dir, engine) = engine();
        let app = ComposeApp::new("shop");
        write_app(&engine, &app, COMPOSE);
        assert!(engine.write_domains_to_compose(&app, &[]).unwrap().is_none());
        let path = engine.compose_path(&app).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), COMPOSE);
    }

    #[test]
    fn write_domains_writes_stack_labels() {
        let (_dir, engine) = engine();
        let app = ComposeApp::new("shop")
            .with_source(SourceKind::Repository {
                compose_path: "deploy/stack.yml".to_owned(),
            })
            .with_compose_type(ComposeType::Stack);
        write_app(&engine, &app, COMPOSE);
        let path = engine
            .write_domains_to_compose(&app, &[web_domain()])
            .unwrap()
            .unwrap();
        assert!(path.ends_with("shop/code/deploy/stack.yml"));
        let written = engine.load_compose(&app).unwrap().unwrap();
        let deploy = written.services["web"].deploy.as_ref().unwrap();
        assert_eq!(deploy.labels.as_ref().unwrap().count_key("traefik.enable"), 1);
    }

    #[test]
    fn remote_script_reports_missing_compose() {
        let (_dir, engine) = engine();
        let app = ComposeApp::new("shop");
        let script = engine.remote_write_script(&app, &[web_domain()], "/var/log/shop.log");
        assert!(script.contains("Compose file not found"));
        assert!(script.contains(">> '/var/log/shop.log'"));
        assert!(script.trim_end().ends_with("exit 1;"));
        assert!(engine.remote_write_script(&app, &[], "/l").is_empty());
    }

    #[test]
    fn remote_script_reports_errors() {
        let (_dir, engine) = engine();
        let app = ComposeApp::new("shop");
        write_app(&engine, &app, COMPOSE);
        let domain = Domain::new("a.example.com", 1).with_service("missing");
        let script = engine.remote_write_script(&app, &[domain], "/l");
        assert!(script.contains("'missing'"));
        assert!(script.contains("exit 1;"));
    }

    #[test]
    fn proxy_operations_take_locks() {
        let (_dir, engine) = engine();
        engine.ensure_default_middlewares(None).unwrap();
        engine.manage_domain("shop", &web_domain(), None).unwrap();
        let layout = engine.proxy().layout();
        assert!(layout.lock_file("shop").exists());
        assert!(layout.lock_file(MIDDLEWARES_LOCK).exists());
        // Locks are released once the operation returns.
        assert!(AppLock::try_acquire(&layout.lock_file("shop")).unwrap().is_some());

        let routes = engine.app_routes("shop", None).unwrap();
        assert_eq!(routes.router_count(), 2);
        engine.remove_domain("shop", 1, None).unwrap();
        assert!(!layout.app_config("shop").exists());
    }

    #[test]
    fn unknown_proxy_server_is_config_error() {
        let (_dir, engine) = engine();
        let err = engine
            .manage_domain("shop", &web_domain(), Some("nowhere"))
            .unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
        assert!(!engine.proxy().layout().app_config("shop").exists());
    }

    #[test]
    fn invalid_app_name_is_rejected_before_locking() {
        let (_dir, engine) = engine();
        let err = engine.manage_domain("../x", &web_domain(), None).unwrap_err();
        assert!(err.to_string().starts_with("proxy error:"));
        assert!(!engine.proxy().layout().lock_file("../x").exists());
    }
}
