//! Router and service construction for one application's domains.

use crate::config::{LoadBalancer, Middleware, Router, RouterTls, Server, Service};
use quayside_compose::{Domain, EntryPoint, REDIRECT_TO_HTTPS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub fn router_key(app: &str, key: u32) -> String {
    format!("{app}-router-{key}")
}

pub fn secure_router_key(app: &str, key: u32) -> String {
    format!("{app}-router-websecure-{key}")
}

pub fn service_key(app: &str, key: u32) -> String {
    format!("{app}-service-{key}")
}

pub fn auth_middleware(app: &str) -> String {
    format!("auth-{app}")
}

pub fn redirect_middleware(app: &str, key: u32) -> String {
    format!("redirect-{app}-{key}")
}

/// A regex redirect rule attached to every non-redirect router of an app.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Redirect {
    pub unique_config_key: u32,
    pub regex: String,
    pub replacement: String,
    #[serde(default)]
    pub permanent: bool,
}

/// App-wide middlewares that every non-redirect router carries, read from
/// the shared middleware file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppRouting {
    /// `redirect-<app>-<key>` names, ordered by key.
    pub redirects: Vec<String>,
    /// `auth-<app>` exists with at least one user.
    pub has_auth: bool,
}

impl AppRouting {
    pub fn from_middlewares(app: &str, middlewares: &BTreeMap<String, Middleware>) -> Self {
        let prefix = format!("redirect-{app}-");
        let mut keyed: Vec<(u32, &String)> = middlewares
            .keys()
            .filter_map(|name| {
                let key = name.strip_prefix(&prefix)?;
                // A longer app name sharing the prefix leaves a non-numeric tail.
                key.parse::<u32>().ok().map(|k| (k, name))
            })
            .collect();
        keyed.sort();

        let has_auth = middlewares
            .get(&auth_middleware(app))
            .and_then(|m| m.basic_auth.as_ref())
            .is_some_and(|auth| !auth.users.is_empty());

        Self {
            redirects: keyed.into_iter().map(|(_, name)| name.clone()).collect(),
            has_auth,
        }
    }
}

/// Path-rewriting middlewares a domain needs, as `(name, definition)`.
pub fn path_middlewares(app: &str, domain: &Domain) -> Vec<(String, Middleware)> {
    let mut out = Vec::new();
    if let Some(prefix) = domain.stripped_prefix() {
        out.push((
            domain.strip_prefix_middleware(app),
            Middleware::strip_prefix(prefix),
        ));
    }
    if let Some(prefix) = domain.added_prefix() {
        out.push((
            domain.add_prefix_middleware(app),
            Middleware::add_prefix(prefix),
        ));
    }
    out
}

/// Whether a router is the plain-HTTP half of an HTTPS domain, whose only
/// job is to redirect.
pub fn is_https_redirect(router: &Router) -> bool {
    router.middlewares.iter().any(|m| m == REDIRECT_TO_HTTPS)
}

pub fn create_router(
    app: &str,
    domain: &Domain,
    entrypoint: EntryPoint,
    routing: &AppRouting,
) -> Router {
    let middlewares = if entrypoint == EntryPoint::Web && domain.https {
        vec![REDIRECT_TO_HTTPS.to_owned()]
    } else {
        let mut names: Vec<String> = path_middlewares(app, domain)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        names.extend(routing.redirects.iter().cloned());
        if routing.has_auth {
            names.push(auth_middleware(app));
        }
        names
    };

    let tls = match entrypoint {
        EntryPoint::WebSecure => domain.cert_resolver().map(|resolver| RouterTls {
            cert_resolver: Some(resolver.to_owned()),
            ..RouterTls::default()
        }),
        EntryPoint::Web => None,
    };

    Router {
        rule: domain.rule(),
        service: service_key(app, domain.unique_config_key),
        entry_points: vec![entrypoint.as_str().to_owned()],
        middlewares,
        tls,
        ..Router::default()
    }
}

pub fn create_service(app: &str, domain: &Domain) -> Service {
    Service {
        load_balancer: Some(LoadBalancer {
            servers: vec![Server {
                url: format!("http://{app}:{}", domain.port),
                ..Server::default()
            }],
            pass_host_header: Some(true),
            ..LoadBalancer::default()
        }),
        ..Service::default()
    }
}

/// Add `name` to a router's middlewares if missing. Redirects go before the
/// auth middleware so that unauthenticated requests are still redirected.
pub fn attach_middleware(router: &mut Router, app: &str, name: &str) {
    if router.middlewares.iter().any(|m| m == name) {
        return;
    }
    let auth = auth_middleware(app);
    match router.middlewares.iter().position(|m| *m == auth) {
        Some(pos) if name != auth => router.middlewares.insert(pos, name.to_owned()),
        _ => router.middlewares.push(name.to_owned()),
    }
}

pub fn detach_middleware(router: &mut Router, name: &str) -> bool {
    let before = router.middlewares.len();
    router.middlewares.retain(|m| m != name);
    router.middlewares.len() != before
}
