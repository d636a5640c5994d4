//! Per-deployment network isolation.
//!
//! An isolated deployment gets its own externally created network, named
//! after the deployment, attached to the root of the document and to every
//! service.

use crate::document::ComposeDocument;
use crate::suffix::suffix_all_volumes;
use tracing::debug;

pub fn isolate_network(doc: &ComposeDocument, network: &str) -> ComposeDocument {
    let mut out = doc.clone();
    out.declare_external_network(network, true);
    for service in out.services.values_mut() {
        service.attach_network(network);
    }
    out
}

/// Isolate a deployment on a network named `suffix`. With `suffix_volumes`
/// the named volumes are suffixed too, so each instance gets its own data.
pub fn isolate_deployment(
    doc: &ComposeDocument,
    suffix: &str,
    suffix_volumes: bool,
) -> ComposeDocument {
    if suffix.is_empty() {
        return doc.clone();
    }
    debug!("isolating deployment on network '{suffix}' (volumes: {suffix_volumes})");
    let isolated = isolate_network(doc, suffix);
    if suffix_volumes {
        suffix_all_volumes(&isolated, suffix)
    } else {
        isolated
    }
}
