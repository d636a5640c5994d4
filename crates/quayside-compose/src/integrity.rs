//! Dangling-reference detection.
//!
//! The suffixer rewrites names blindly, so a reference that did not resolve
//! before a transform will not resolve after it either. This check runs on
//! the final document so such deployments fail before they reach a host.

use crate::document::{ComposeDocument, DependsOn, Extends, ServiceDefinition};
use crate::reserved::{is_reserved, ResourceKind};
use crate::ComposeError;
use serde::Serialize;
use std::fmt;

/// The implicit network every compose project gets.
const DEFAULT_NETWORK: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DanglingReference {
    pub service: String,
    pub field: &'static str,
    pub target: String,
}

impl fmt::Display for DanglingReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "service '{}' {} references unknown '{}'",
            self.service, self.field, self.target
        )
    }
}

fn service_targets(service: &ServiceDefinition) -> Vec<(&'static str, &str)> {
    let mut targets = Vec::new();

    match &service.depends_on {
        Some(DependsOn::List(names)) => {
            targets.extend(names.iter().map(|n| ("depends_on", n.as_str())));
        }
        Some(DependsOn::Map(map)) => {
            targets.extend(map.keys().map(|n| ("depends_on", n.as_str())));
        }
        None => {}
    }

    // `service:alias`
    for link in service.links.iter().flatten() {
        let name = link.split_once(':').map_or(link.as_str(), |(s, _)| s);
        targets.push(("links", name));
    }

    for entry in service.volumes_from.iter().flatten() {
        if entry.starts_with("container:") {
            continue;
        }
        let name = match entry.rsplit_once(':') {
            Some((s, mode)) if mode == "ro" || mode == "rw" => s,
            _ => entry.as_str(),
        };
        targets.push(("volumes_from", name));
    }

    match &service.extends {
        Some(Extends::Name(name)) => targets.push(("extends", name.as_str())),
        Some(Extends::Spec(spec)) if spec.file.is_none() => {
            targets.push(("extends", spec.service.as_str()));
        }
        _ => {}
    }

    targets
}

/// Every service-level reference that does not resolve within `doc`.
pub fn check_references(doc: &ComposeDocument) -> Vec<DanglingReference> {
    let mut dangling = Vec::new();

    for (name, service) in &doc.services {
        for (field, target) in service_targets(service) {
            if !doc.services.contains_key(target) {
                dangling.push(DanglingReference {
                    service: name.clone(),
                    field,
                    target: target.to_owned(),
                });
            }
        }

        for network in service.network_names() {
            if network == DEFAULT_NETWORK || is_reserved(ResourceKind::Network, network) {
                continue;
            }
            let declared = doc
                .networks
                .as_ref()
                .is_some_and(|root| root.contains_key(network));
            if !declared {
                dangling.push(DanglingReference {
                    service: name.clone(),
                    field: "networks",
                    target: network.to_owned(),
                });
            }
        }
    }

    dangling
}

/// [`check_references`] as a hard failure.
pub fn ensure_references(doc: &ComposeDocument) -> Result<(), ComposeError> {
    let dangling = check_references(doc);
    if dangling.is_empty() {
        Ok(())
    } else {
        Err(ComposeError::DanglingReferences(dangling))
    }
}
