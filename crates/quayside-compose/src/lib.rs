//! Compose document model and transforms for Quayside.
//!
//! This crate owns everything that rewrites a compose file: the typed
//! `ComposeDocument` model with lossless YAML round-trips, collision-avoidance
//! suffixing, per-deployment network isolation, reverse-proxy label injection
//! and the dangling-reference check. Every transform is pure and returns a new
//! document.

pub mod document;
pub mod domain;
pub mod integrity;
pub mod isolation;
pub mod labels;
pub mod reserved;
pub mod suffix;

pub use document::{
    parse_document_file, parse_document_str, to_yaml_string, ComposeDocument, DependsOn, Deploy,
    Extends, Labels, ResourceDefinition, ResourceMap, ResourceRef, ServiceDefinition,
    ServiceNetworks, ServiceVolume,
};
pub use domain::{parse_domains_json, CertificateType, Domain, EntryPoint, REDIRECT_TO_HTTPS};
pub use integrity::{check_references, ensure_references, DanglingReference};
pub use isolation::{isolate_deployment, isolate_network};
pub use labels::{
    create_domain_labels, inject_domains, inject_domains_with, router_name, ComposeType,
    InjectOptions,
};
pub use reserved::{is_reserved, ResourceKind, INGRESS_NETWORK};
pub use suffix::{
    apply_suffix, generate_suffix, suffix_all_configs, suffix_all_networks, suffix_all_secrets,
    suffix_all_service_names, suffix_all_volumes, suffix_root_resources, suffix_service_configs,
    suffix_service_names, suffix_service_networks, suffix_service_secrets,
    suffix_service_volumes, suffix_volume_source,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("compose I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid compose YAML: {0}")]
    Parse(#[source] serde_yaml::Error),
    #[error("failed to serialize compose document: {0}")]
    Serialize(#[source] serde_yaml::Error),
    #[error("invalid domain list: {0}")]
    DomainList(#[from] serde_json::Error),
    #[error("service '{0}' not found in compose file")]
    ServiceNotFound(String),
    #[error("domain {0} has no service name")]
    MissingServiceName(u32),
    #[error("{} dangling reference(s): {}", .0.len(), format_dangling(.0))]
    DanglingReferences(Vec<DanglingReference>),
}

fn format_dangling(refs: &[DanglingReference]) -> String {
    refs.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
