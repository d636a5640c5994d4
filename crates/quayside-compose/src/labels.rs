//! Reverse-proxy label injection for compose deployments.
//!
//! Each domain becomes a set of `traefik.*` labels on its target service. The
//! injector validates every domain before touching the document, so a bad
//! domain never leaves a partially labelled copy behind.

use crate::document::{ComposeDocument, Deploy, Labels};
use crate::domain::{Domain, EntryPoint, REDIRECT_TO_HTTPS};
use crate::reserved::INGRESS_NETWORK;
use crate::ComposeError;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const TRAEFIK_ENABLE: &str = "traefik.enable=true";

/// Where labels live: `services.<s>.labels` for compose, and
/// `services.<s>.deploy.labels` for swarm stacks.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ComposeType {
    #[default]
    DockerCompose,
    Stack,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InjectOptions {
    pub compose_type: ComposeType,
    /// Isolated deployments reach the proxy through their own network, so
    /// the shared ingress network is left out.
    pub isolated: bool,
}

pub fn router_name(service_name: &str, domain: &Domain, entrypoint: EntryPoint) -> String {
    format!(
        "{service_name}-{}-{}",
        domain.unique_config_key,
        entrypoint.as_str()
    )
}

pub fn create_domain_labels(
    service_name: &str,
    domain: &Domain,
    entrypoint: EntryPoint,
) -> Vec<String> {
    let router = router_name(service_name, domain, entrypoint);
    let mut labels = vec![
        format!("traefik.http.routers.{router}.rule={}", domain.rule()),
        format!("traefik.http.routers.{router}.entrypoints={entrypoint}"),
        format!(
            "traefik.http.services.{router}.loadbalancer.server.port={}",
            domain.port
        ),
        format!("traefik.http.routers.{router}.service={router}"),
    ];

    let mut middlewares = Vec::new();
    if entrypoint == EntryPoint::Web && domain.https {
        middlewares.push(format!("{REDIRECT_TO_HTTPS}@file"));
    }

    if let Some(prefix) = domain.stripped_prefix() {
        let name = domain.strip_prefix_middleware(service_name);
        if entrypoint == EntryPoint::Web {
            labels.push(format!(
                "traefik.http.middlewares.{name}.stripprefix.prefixes={prefix}"
            ));
        }
        middlewares.push(name);
    }

    if let Some(prefix) = domain.added_prefix() {
        let name = domain.add_prefix_middleware(service_name);
        if entrypoint == EntryPoint::Web {
            labels.push(format!(
                "traefik.http.middlewares.{name}.addprefix.prefix={prefix}"
            ));
        }
        middlewares.push(name);
    }

    if !middlewares.is_empty() {
        labels.push(format!(
            "traefik.http.routers.{router}.middlewares={}",
            middlewares.join(",")
        ));
    }

    if entrypoint == EntryPoint::WebSecure {
        if let Some(resolver) = domain.cert_resolver() {
            labels.push(format!(
                "traefik.http.routers.{router}.tls.certresolver={resolver}"
            ));
        }
    }

    labels
}

/// Inject compose labels for `domains` and attach the shared ingress network.
pub fn inject_domains(
    doc: &ComposeDocument,
    domains: &[Domain],
) -> Result<ComposeDocument, ComposeError> {
    inject_domains_with(doc, domains, &InjectOptions::default())
}

pub fn inject_domains_with(
    doc: &ComposeDocument,
    domains: &[Domain],
    options: &InjectOptions,
) -> Result<ComposeDocument, ComposeError> {
    let mut targets = Vec::with_capacity(domains.len());
    for domain in domains {
        let service_name = domain
            .service_name
            .as_deref()
            .ok_or(ComposeError::MissingServiceName(domain.unique_config_key))?;
        if !doc.services.contains_key(service_name) {
            return Err(ComposeError::ServiceNotFound(service_name.to_owned()));
        }
        targets.push((service_name, domain));
    }

    let mut out = doc.clone();
    for (service_name, domain) in targets {
        debug!(
            "injecting domain {} ({}) into service '{service_name}'",
            domain.host, domain.unique_config_key
        );
        let mut new_labels = Vec::new();
        for entrypoint in EntryPoint::for_domain(domain) {
            new_labels.extend(create_domain_labels(service_name, domain, entrypoint));
        }
        if !options.isolated {
            new_labels.push(format!("traefik.docker.network={INGRESS_NETWORK}"));
            new_labels.push(format!("traefik.swarm.network={INGRESS_NETWORK}"));
        }

        let service = out
            .services
            .get_mut(service_name)
            .ok_or_else(|| ComposeError::ServiceNotFound(service_name.to_owned()))?;
        let labels = match options.compose_type {
            ComposeType::DockerCompose => service
                .labels
                .get_or_insert_with(|| Labels::List(Vec::new())),
            ComposeType::Stack => service
                .deploy
                .get_or_insert_with(Deploy::default)
                .labels
                .get_or_insert_with(|| Labels::List(Vec::new())),
        };
        labels.upsert(TRAEFIK_ENABLE);
        for label in &new_labels {
            labels.upsert(label);
        }

        if !options.isolated {
            service.attach_network(INGRESS_NETWORK);
        }
    }

    if !options.isolated && !domains.is_empty() {
        out.declare_external_network(INGRESS_NETWORK, false);
    }

    Ok(out)
}
