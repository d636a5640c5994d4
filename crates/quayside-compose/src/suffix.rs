//! Collision-avoidance suffixing.
//!
//! Renames services, networks, volumes, configs and secrets by appending
//! `-<suffix>`, and rewrites every field that refers to them. The rewrite is
//! organised by field shape (single name, list of names, map keyed by name)
//! rather than by compose keyword; each shape helper consults the reserved
//! name policy for the resource kind it is rewriting.
//!
//! All functions take the input by reference and return a new value.

use crate::document::{
    ComposeDocument, DependsOn, Extends, ExtendsSpec, NetworkAttachment, ResourceMap, ResourceRef,
    ResourceRefSpec, ServiceDefinition, ServiceNetworks, ServiceVolume, VolumeMount,
};
use crate::reserved::{is_reserved, ResourceKind};
use std::collections::BTreeMap;
use tracing::debug;

type Services = BTreeMap<String, ServiceDefinition>;

/// 8 hex characters from the operating system's secure random source.
pub fn generate_suffix() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..8].to_owned()
}

fn suffix_name(kind: ResourceKind, name: &str, suffix: &str) -> String {
    if is_reserved(kind, name) {
        name.to_owned()
    } else {
        format!("{name}-{suffix}")
    }
}

fn suffix_list(kind: ResourceKind, names: &[String], suffix: &str) -> Vec<String> {
    names.iter().map(|n| suffix_name(kind, n, suffix)).collect()
}

fn rekey<V: Clone>(
    kind: ResourceKind,
    map: &BTreeMap<String, V>,
    suffix: &str,
) -> BTreeMap<String, V> {
    map.iter()
        .map(|(name, value)| (suffix_name(kind, name, suffix), value.clone()))
        .collect()
}

/// `volumes_from` entries may carry a `container:` prefix (not a service) or
/// a trailing `:ro` / `:rw` access mode.
fn suffix_volumes_from_entry(entry: &str, suffix: &str) -> String {
    if entry.starts_with("container:") {
        return entry.to_owned();
    }
    match entry.rsplit_once(':') {
        Some((service, mode)) if mode == "ro" || mode == "rw" => {
            format!("{}:{mode}", suffix_name(ResourceKind::Service, service, suffix))
        }
        _ => suffix_name(ResourceKind::Service, entry, suffix),
    }
}

/// `links` entries are `service` or `service:alias`; the alias is a hostname
/// inside the container and keeps its name.
fn suffix_link(entry: &str, suffix: &str) -> String {
    match entry.split_once(':') {
        Some((service, alias)) => {
            format!("{}:{alias}", suffix_name(ResourceKind::Service, service, suffix))
        }
        None => suffix_name(ResourceKind::Service, entry, suffix),
    }
}

fn suffix_service_refs(service: &ServiceDefinition, suffix: &str) -> ServiceDefinition {
    let kind = ResourceKind::Service;
    let mut out = service.clone();

    out.container_name = service
        .container_name
        .as_deref()
        .map(|n| format!("{n}-{suffix}"));

    out.depends_on = service.depends_on.as_ref().map(|deps| match deps {
        DependsOn::List(names) => DependsOn::List(suffix_list(kind, names, suffix)),
        DependsOn::Map(map) => DependsOn::Map(rekey(kind, map, suffix)),
    });

    out.links = service
        .links
        .as_ref()
        .map(|entries| entries.iter().map(|e| suffix_link(e, suffix)).collect());

    out.volumes_from = service.volumes_from.as_ref().map(|entries| {
        entries
            .iter()
            .map(|e| suffix_volumes_from_entry(e, suffix))
            .collect()
    });

    out.extends = service.extends.as_ref().map(|ext| match ext {
        Extends::Name(name) => Extends::Name(suffix_name(kind, name, suffix)),
        Extends::Spec(spec) => Extends::Spec(ExtendsSpec {
            service: suffix_name(kind, &spec.service, suffix),
            ..spec.clone()
        }),
    });

    out
}

/// Rename every service and rewrite `depends_on`, `links`, `volumes_from`,
/// `extends` and `container_name`.
pub fn suffix_service_names(services: &Services, suffix: &str) -> Services {
    services
        .iter()
        .map(|(name, service)| {
            (
                suffix_name(ResourceKind::Service, name, suffix),
                suffix_service_refs(service, suffix),
            )
        })
        .collect()
}

pub fn suffix_all_service_names(doc: &ComposeDocument, suffix: &str) -> ComposeDocument {
    ComposeDocument {
        services: suffix_service_names(&doc.services, suffix),
        ..doc.clone()
    }
}

/// Rekey a root-level resource map, leaving reserved names in place.
pub fn suffix_root_resources(map: &ResourceMap, kind: ResourceKind, suffix: &str) -> ResourceMap {
    rekey(kind, map, suffix)
}

fn map_services(
    services: &Services,
    f: impl Fn(&ServiceDefinition) -> ServiceDefinition,
) -> Services {
    services
        .iter()
        .map(|(name, service)| (name.clone(), f(service)))
        .collect()
}

/// Every settings key is suffixed except `aliases`, whose values are
/// hostnames and not resource names.
fn suffix_attachment(settings: &NetworkAttachment, suffix: &str) -> NetworkAttachment {
    NetworkAttachment {
        aliases: settings.aliases.clone(),
        extra: settings
            .extra
            .iter()
            .map(|(key, value)| (format!("{key}-{suffix}"), value.clone()))
            .collect(),
    }
}

pub fn suffix_service_networks(services: &Services, suffix: &str) -> Services {
    let kind = ResourceKind::Network;
    map_services(services, |service| {
        let mut out = service.clone();
        out.networks = service.networks.as_ref().map(|nets| match nets {
            ServiceNetworks::List(names) => ServiceNetworks::List(suffix_list(kind, names, suffix)),
            ServiceNetworks::Map(map) => ServiceNetworks::Map(
                map.iter()
                    .map(|(name, settings)| {
                        (
                            suffix_name(kind, name, suffix),
                            settings.as_ref().map(|s| suffix_attachment(s, suffix)),
                        )
                    })
                    .collect(),
            ),
        });
        out
    })
}

pub fn suffix_all_networks(doc: &ComposeDocument, suffix: &str) -> ComposeDocument {
    ComposeDocument {
        networks: doc
            .networks
            .as_ref()
            .map(|n| suffix_root_resources(n, ResourceKind::Network, suffix)),
        services: suffix_service_networks(&doc.services, suffix),
        ..doc.clone()
    }
}

/// Suffix the source of a short-form volume entry.
///
/// Bind mounts (`./x`, `/x`) and variable expansions (`$PWD/x`) are returned
/// as-is. For `name/sub/path` only the leading volume name is suffixed.
pub fn suffix_volume_source(source: &str, suffix: &str) -> String {
    if source.is_empty() || source.starts_with(['.', '/', '$']) {
        return source.to_owned();
    }
    match source.split_once('/') {
        Some((volume, rest)) => format!(
            "{}/{rest}",
            suffix_name(ResourceKind::Volume, volume, suffix)
        ),
        None => suffix_name(ResourceKind::Volume, source, suffix),
    }
}

fn suffix_service_volume(volume: &ServiceVolume, suffix: &str) -> ServiceVolume {
    match volume {
        ServiceVolume::Short(spec) => match spec.split_once(':') {
            Some((source, rest)) => {
                ServiceVolume::Short(format!("{}:{rest}", suffix_volume_source(source, suffix)))
            }
            None => ServiceVolume::Short(spec.clone()),
        },
        ServiceVolume::Long(mount) if mount.kind.as_deref() == Some("volume") => {
            ServiceVolume::Long(VolumeMount {
                source: mount
                    .source
                    .as_deref()
                    .map(|s| suffix_name(ResourceKind::Volume, s, suffix)),
                ..mount.clone()
            })
        }
        ServiceVolume::Long(_) => volume.clone(),
    }
}

pub fn suffix_service_volumes(services: &Services, suffix: &str) -> Services {
    map_services(services, |service| {
        let mut out = service.clone();
        out.volumes = service.volumes.as_ref().map(|volumes| {
            volumes
                .iter()
                .map(|v| suffix_service_volume(v, suffix))
                .collect()
        });
        out
    })
}

pub fn suffix_all_volumes(doc: &ComposeDocument, suffix: &str) -> ComposeDocument {
    ComposeDocument {
        volumes: doc
            .volumes
            .as_ref()
            .map(|v| suffix_root_resources(v, ResourceKind::Volume, suffix)),
        services: suffix_service_volumes(&doc.services, suffix),
        ..doc.clone()
    }
}

fn suffix_refs(kind: ResourceKind, refs: &[ResourceRef], suffix: &str) -> Vec<ResourceRef> {
    refs.iter()
        .map(|r| match r {
            ResourceRef::Name(name) => ResourceRef::Name(suffix_name(kind, name, suffix)),
            ResourceRef::Long(spec) => ResourceRef::Long(ResourceRefSpec {
                source: suffix_name(kind, &spec.source, suffix),
                ..spec.clone()
            }),
        })
        .collect()
}

pub fn suffix_service_configs(services: &Services, suffix: &str) -> Services {
    map_services(services, |service| {
        let mut out = service.clone();
        out.configs = service
            .configs
            .as_deref()
            .map(|refs| suffix_refs(ResourceKind::Config, refs, suffix));
        out
    })
}

pub fn suffix_all_configs(doc: &ComposeDocument, suffix: &str) -> ComposeDocument {
    ComposeDocument {
        configs: doc
            .configs
            .as_ref()
            .map(|c| suffix_root_resources(c, ResourceKind::Config, suffix)),
        services: suffix_service_configs(&doc.services, suffix),
        ..doc.clone()
    }
}

pub fn suffix_service_secrets(services: &Services, suffix: &str) -> Services {
    map_services(services, |service| {
        let mut out = service.clone();
        out.secrets = service
            .secrets
            .as_deref()
            .map(|refs| suffix_refs(ResourceKind::Secret, refs, suffix));
        out
    })
}

pub fn suffix_all_secrets(doc: &ComposeDocument, suffix: &str) -> ComposeDocument {
    ComposeDocument {
        secrets: doc
            .secrets
            .as_ref()
            .map(|s| suffix_root_resources(s, ResourceKind::Secret, suffix)),
        services: suffix_service_secrets(&doc.services, suffix),
        ..doc.clone()
    }
}

/// Suffix every resource kind and every reference to it. An empty suffix
/// returns an unchanged copy.
///
/// No referential-integrity check happens here: a reference to a missing
/// service is renamed like any other. See [`crate::check_references`].
pub fn apply_suffix(doc: &ComposeDocument, suffix: &str) -> ComposeDocument {
    if suffix.is_empty() {
        return doc.clone();
    }
    debug!(
        "suffixing compose document ({} services) with '{suffix}'",
        doc.services.len()
    );
    let doc = suffix_all_service_names(doc, suffix);
    let doc = suffix_all_networks(&doc, suffix);
    let doc = suffix_all_volumes(&doc, suffix);
    let doc = suffix_all_configs(&doc, suffix);
    suffix_all_secrets(&doc, suffix)
}
