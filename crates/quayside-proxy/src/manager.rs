//! Domain, credential and redirect changes against the dynamic directory.
//!
//! Every operation is a read-modify-write of the app file and, where needed,
//! the shared middleware file. The manager itself does not lock; callers that
//! can run concurrently serialize through the locks named in
//! [`ProxyLayout::lock_file`].

use crate::app::AppConfigStore;
use crate::config::{BasicAuth, FileConfig, Middleware, RedirectRegex, Router};
use crate::files::{ConfigFiles, LocalFiles};
use crate::layout::{validate_app_name, ProxyLayout};
use crate::middleware::MiddlewareStore;
use crate::router::{
    attach_middleware, auth_middleware, create_router, create_service, detach_middleware,
    is_https_redirect, path_middlewares, redirect_middleware, router_key, secure_router_key,
    service_key, AppRouting, Redirect,
};
use crate::security::{hash_credential, validate_username};
use crate::ProxyError;
use quayside_compose::{Domain, EntryPoint};
use std::rc::Rc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct ProxyManager {
    layout: ProxyLayout,
    apps: AppConfigStore,
    middlewares: MiddlewareStore,
}

impl ProxyManager {
    /// A manager for a dynamic directory on the local filesystem.
    pub fn new(layout: ProxyLayout) -> Self {
        Self::with_files(layout, Rc::new(LocalFiles))
    }

    /// A manager whose files live wherever `files` puts them.
    pub fn with_files(layout: ProxyLayout, files: Rc<dyn ConfigFiles>) -> Self {
        Self {
            apps: AppConfigStore::new(layout.clone(), files.clone()),
            middlewares: MiddlewareStore::new(layout.clone(), files),
            layout,
        }
    }

    pub fn layout(&self) -> &ProxyLayout {
        &self.layout
    }

    pub fn apps(&self) -> &AppConfigStore {
        &self.apps
    }

    pub fn middlewares(&self) -> &MiddlewareStore {
        &self.middlewares
    }

    pub fn ensure_default_middlewares(&self) -> Result<bool, ProxyError> {
        self.middlewares.ensure_default()
    }

    /// Route `domain` to the application. Re-running with the same domain
    /// produces the same files.
    pub fn manage_domain(&self, app: &str, domain: &Domain) -> Result<(), ProxyError> {
        validate_app_name(app)?;
        let key = domain.unique_config_key;

        let mut shared = self.middlewares.load()?;
        let routing = shared
            .middlewares()
            .map(|m| AppRouting::from_middlewares(app, m))
            .unwrap_or_default();

        let mut config = self.apps.load_or_create(app)?;
        let http = config.http_mut();
        http.routers.insert(
            router_key(app, key),
            create_router(app, domain, EntryPoint::Web, &routing),
        );
        if domain.https {
            http.routers.insert(
                secure_router_key(app, key),
                create_router(app, domain, EntryPoint::WebSecure, &routing),
            );
        } else {
            http.routers.remove(&secure_router_key(app, key));
        }
        http.services
            .insert(service_key(app, key), create_service(app, domain));

        if sync_path_middlewares(&mut shared, app, domain) {
            self.middlewares.save(&shared)?;
        }
        self.apps.save(app, &config)?;
        info!("routed {} to {app} ({key})", domain.host);
        Ok(())
    }

    /// Remove a domain's routers, service and path middlewares. The app file
    /// is deleted when its last router goes.
    pub fn remove_domain(&self, app: &str, key: u32) -> Result<(), ProxyError> {
        validate_app_name(app)?;

        let mut config = self.apps.load_or_create(app)?;
        let http = config.http_mut();
        http.routers.remove(&router_key(app, key));
        http.routers.remove(&secure_router_key(app, key));
        http.services.remove(&service_key(app, key));

        let mut shared = self.middlewares.load()?;
        let shared_http = shared.http_mut();
        let strip = shared_http
            .middlewares
            .remove(&format!("stripprefix-{app}-{key}"));
        let add = shared_http
            .middlewares
            .remove(&format!("addprefix-{app}-{key}"));
        if strip.is_some() || add.is_some() {
            self.middlewares.save(&shared)?;
        }

        if config.router_count() == 0 {
            self.apps.remove(app)?;
            info!("removed last domain of {app}, deleted its proxy config");
        } else {
            self.apps.save(app, &config)?;
            info!("removed domain {key} of {app}");
        }
        Ok(())
    }

    /// Add or replace a basic-auth credential and protect the app's routers.
    pub fn add_credential(
        &self,
        app: &str,
        username: &str,
        password: &str,
    ) -> Result<(), ProxyError> {
        validate_app_name(app)?;
        let entry = hash_credential(username, password)?;
        let name = auth_middleware(app);

        let mut shared = self.middlewares.load()?;
        shared
            .http_mut()
            .middlewares
            .entry(name.clone())
            .or_default()
            .basic_auth
            .get_or_insert_with(|| BasicAuth {
                remove_header: Some(true),
                ..BasicAuth::default()
            })
            .upsert(entry);
        self.middlewares.save(&shared)?;

        self.update_app_routers(app, |router| attach_middleware(router, app, &name))?;
        info!("added credential '{username}' to {app}");
        Ok(())
    }

    /// Remove a credential. When none remain, the auth middleware is deleted
    /// and detached from the app's routers.
    pub fn remove_credential(&self, app: &str, username: &str) -> Result<(), ProxyError> {
        validate_app_name(app)?;
        validate_username(username)?;
        let name = auth_middleware(app);

        let mut shared = self.middlewares.load()?;
        let http = shared.http_mut();
        let Some(auth) = http
            .middlewares
            .get_mut(&name)
            .and_then(|m| m.basic_auth.as_mut())
        else {
            debug!("{app} has no credentials");
            return Ok(());
        };
        auth.remove_user(username);
        let now_empty = auth.users.is_empty();
        if now_empty {
            http.middlewares.remove(&name);
        }
        self.middlewares.save(&shared)?;

        if now_empty {
            self.update_app_routers(app, |router| {
                detach_middleware(router, &name);
            })?;
        }
        info!("removed credential '{username}' from {app}");
        Ok(())
    }

    pub fn add_redirect(&self, app: &str, redirect: &Redirect) -> Result<(), ProxyError> {
        validate_app_name(app)?;
        let name = redirect_middleware(app, redirect.unique_config_key);

        let mut shared = self.middlewares.load()?;
        shared.http_mut().middlewares.insert(
            name.clone(),
            Middleware {
                redirect_regex: Some(RedirectRegex {
                    regex: redirect.regex.clone(),
                    replacement: redirect.replacement.clone(),
                    permanent: redirect.permanent,
                    ..RedirectRegex::default()
                }),
                ..Middleware::default()
            },
        );
        self.middlewares.save(&shared)?;

        self.update_app_routers(app, |router| attach_middleware(router, app, &name))?;
        info!("added redirect {} to {app}", redirect.unique_config_key);
        Ok(())
    }

    pub fn remove_redirect(&self, app: &str, key: u32) -> Result<(), ProxyError> {
        validate_app_name(app)?;
        let name = redirect_middleware(app, key);

        let mut shared = self.middlewares.load()?;
        if shared.http_mut().middlewares.remove(&name).is_some() {
            self.middlewares.save(&shared)?;
        }

        self.update_app_routers(app, |router| {
            detach_middleware(router, &name);
        })?;
        info!("removed redirect {key} from {app}");
        Ok(())
    }

    /// Apply `f` to every non-redirect router of the app and write the file
    /// back if anything changed. Apps without a config file are left alone.
    fn update_app_routers(
        &self,
        app: &str,
        mut f: impl FnMut(&mut Router),
    ) -> Result<(), ProxyError> {
        if !self.apps.exists(app)? {
            return Ok(());
        }
        let mut config = self.apps.load_or_create(app)?;
        if config.router_count() == 0 {
            return Ok(());
        }
        let before = config.clone();
        for router in config.http_mut().routers.values_mut() {
            if !is_https_redirect(router) {
                f(router);
            }
        }
        if config != before {
            self.apps.save(app, &config)?;
        }
        Ok(())
    }
}

/// Bring the domain's strip/add prefix middlewares in line with its
/// settings. Returns whether the shared config changed.
fn sync_path_middlewares(shared: &mut FileConfig, app: &str, domain: &Domain) -> bool {
    let wanted = path_middlewares(app, domain);
    let middlewares = &mut shared.http_mut().middlewares;
    let mut changed = false;

    for name in [
        domain.strip_prefix_middleware(app),
        domain.add_prefix_middleware(app),
    ] {
        if !wanted.iter().any(|(n, _)| *n == name) && middlewares.remove(&name).is_some() {
            changed = true;
        }
    }
    for (name, middleware) in wanted {
        if middlewares.get(&name) != Some(&middleware) {
            middlewares.insert(name, middleware);
            changed = true;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use quayside_compose::CertificateType;

    fn manager() -> (tempfile::TempDir, ProxyManager) {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProxyLayout::new(dir.path());
        layout.initialize().unwrap();
        let manager = ProxyManager::new(layout);
        manager.ensure_default_middlewares().unwrap();
        (dir, manager)
    }

    fn https_domain(key: u32) -> Domain {
        Domain::new("shop.example.com", key)
            .with_port(3000)
            .with_https(CertificateType::Letsencrypt)
    }

    #[test]
    fn manage_domain_writes_routers_and_service() {
        let (_dir, m) = manager();
        m.manage_domain("shop", &https_domain(1)).unwrap();
        let config = m.apps().load_or_create("shop").unwrap();
        let http = config.http.unwrap();
        assert_eq!(
            http.routers.keys().collect::<Vec<_>>(),
            vec!["shop-router-1", "shop-router-websecure-1"]
        );
        assert!(http.services.contains_key("shop-service-1"));
    }

    #[test]
    fn turning_https_off_drops_secure_router() {
        let (_dir, m) = manager();
        m.manage_domain("shop", &https_domain(1)).unwrap();
        m.manage_domain("shop", &Domain::new("shop.example.com", 1))
            .unwrap();
        let config = m.apps().load_or_create("shop").unwrap();
        let routers = &config.http.unwrap().routers;
        assert!(routers.contains_key("shop-router-1"));
        assert!(!routers.contains_key("shop-router-websecure-1"));
        assert!(routers["shop-router-1"].middlewares.is_empty());
    }

    #[test]
    fn path_middlewares_follow_domain_settings() {
        let (_dir, m) = manager();
        let mut domain = https_domain(2).with_path("/api");
        domain.strip_path = true;
        m.manage_domain("shop", &domain).unwrap();
        let shared = m.middlewares().load().unwrap();
        assert!(shared.middlewares().unwrap().contains_key("stripprefix-shop-2"));

        domain.strip_path = false;
        m.manage_domain("shop", &domain).unwrap();
        let shared = m.middlewares().load().unwrap();
        assert!(!shared.middlewares().unwrap().contains_key("stripprefix-shop-2"));
        assert!(shared.middlewares().unwrap().contains_key("redirect-to-https"));
    }

    #[test]
    fn credentials_attach_and_detach() {
        let (_dir, m) = manager();
        m.manage_domain("shop", &https_domain(1)).unwrap();
        m.add_credential("shop", "admin", "pw1").unwrap();
        m.add_credential("shop", "admin", "pw2").unwrap();

        let shared = m.middlewares().load().unwrap();
        let auth = shared.middlewares().unwrap()["auth-shop"]
            .basic_auth
            .clone()
            .unwrap();
        assert_eq!(auth.usernames(), vec!["admin"]);
        assert_eq!(auth.remove_header, Some(true));
        // Re-adding a user replaces the hash.
        let (_, hash) = auth.users[0].split_once(':').unwrap();
        assert!(bcrypt::verify("pw2", hash).unwrap());

        let routers = m.apps().load_or_create("shop").unwrap().http.unwrap().routers;
        assert_eq!(routers["shop-router-1"].middlewares, vec!["redirect-to-https"]);
        assert_eq!(
            routers["shop-router-websecure-1"].middlewares,
            vec!["auth-shop"]
        );

        m.remove_credential("shop", "admin").unwrap();
        let shared = m.middlewares().load().unwrap();
        assert!(!shared.middlewares().unwrap().contains_key("auth-shop"));
        let routers = m.apps().load_or_create("shop").unwrap().http.unwrap().routers;
        assert!(routers["shop-router-websecure-1"].middlewares.is_empty());
    }

    #[test]
    fn credential_without_app_file_creates_nothing_for_app() {
        let (_dir, m) = manager();
        m.add_credential("blog", "admin", "pw").unwrap();
        assert!(!m.apps().exists("blog").unwrap());
        // New routers pick the credential set up from the shared file.
        m.manage_domain("blog", &Domain::new("blog.example.com", 1))
            .unwrap();
        let routers = m.apps().load_or_create("blog").unwrap().http.unwrap().routers;
        assert_eq!(routers["blog-router-1"].middlewares, vec!["auth-blog"]);
    }

    #[test]
    fn redirects_precede_auth() {
        let (_dir, m) = manager();
        m.manage_domain("shop", &Domain::new("shop.example.com", 1))
            .unwrap();
        m.add_credential("shop", "admin", "pw").unwrap();
        let redirect = Redirect {
            unique_config_key: 7,
            regex: "^https?://www\\.(.*)".to_owned(),
            replacement: "https://${1}".to_owned(),
            permanent: true,
        };
        m.add_redirect("shop", &redirect).unwrap();

        let routers = m.apps().load_or_create("shop").unwrap().http.unwrap().routers;
        assert_eq!(
            routers["shop-router-1"].middlewares,
            vec!["redirect-shop-7", "auth-shop"]
        );
        let shared = m.middlewares().load().unwrap();
        let regex = shared.middlewares().unwrap()["redirect-shop-7"]
            .redirect_regex
            .clone()
            .unwrap();
        assert_eq!(regex.replacement, "https://${1}");

        m.remove_redirect("shop", 7).unwrap();
        let routers = m.apps().load_or_create("shop").unwrap().http.unwrap().routers;
        assert_eq!(routers["shop-router-1"].middlewares, vec!["auth-shop"]);
        let shared = m.middlewares().load().unwrap();
        assert!(!shared.middlewares().unwrap().contains_key("redirect-shop-7"));
    }

    #[test]
    fn remove_unknown_credential_is_noop() {
        let (_dir, m) = manager();
        m.remove_credential("shop", "nobody").unwrap();
        assert!(!m.apps().exists("shop").unwrap());
    }
}
