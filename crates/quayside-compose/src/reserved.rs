//! Resource names owned by the platform rather than by any one deployment.
//!
//! Every transform consults [`is_reserved`] before renaming a resource, so a
//! new reserved name only has to be added to the table below.

use std::fmt;

/// The shared ingress network the reverse proxy is attached to. Always
/// external, never suffixed.
pub const INGRESS_NETWORK: &str = "quayside-network";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Service,
    Network,
    Volume,
    Config,
    Secret,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Service => write!(f, "service"),
            ResourceKind::Network => write!(f, "network"),
            ResourceKind::Volume => write!(f, "volume"),
            ResourceKind::Config => write!(f, "config"),
            ResourceKind::Secret => write!(f, "secret"),
        }
    }
}

const RESERVED: &[(ResourceKind, &str)] = &[(ResourceKind::Network, INGRESS_NETWORK)];

pub fn is_reserved(kind: ResourceKind, name: &str) -> bool {
    RESERVED.iter().any(|(k, n)| *k == kind && *n == name)
}
