use crate::ComposeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shared middleware that redirects plain HTTP to HTTPS. Defined once in the
/// proxy's shared middleware file.
pub const REDIRECT_TO_HTTPS: &str = "redirect-to-https";

/// Certificate resolver name used for Let's Encrypt certificates.
pub const LETSENCRYPT_RESOLVER: &str = "letsencrypt";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CertificateType {
    Letsencrypt,
    #[default]
    None,
    Custom,
}

/// A public route to a service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub https: bool,
    /// Target service key in the compose document. Unused for
    /// single-container applications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    /// Caller-stable id distinguishing several domains of one service.
    pub unique_config_key: u32,
    #[serde(default)]
    pub certificate_type: CertificateType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_cert_resolver: Option<String>,
    #[serde(default)]
    pub strip_path: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_path: Option<String>,
}

fn default_port() -> u16 {
    80
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPoint {
    Web,
    WebSecure,
}

impl EntryPoint {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryPoint::Web => "web",
            EntryPoint::WebSecure => "websecure",
        }
    }

    /// `web` always, plus `websecure` when the domain serves HTTPS.
    pub fn for_domain(domain: &Domain) -> Vec<EntryPoint> {
        if domain.https {
            vec![EntryPoint::Web, EntryPoint::WebSecure]
        } else {
            vec![EntryPoint::Web]
        }
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Domain {
    pub fn new(host: impl Into<String>, unique_config_key: u32) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            path: None,
            https: false,
            service_name: None,
            unique_config_key,
            certificate_type: CertificateType::None,
            custom_cert_resolver: None,
            strip_path: false,
            internal_path: None,
        }
    }

    #[must_use]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service_name = Some(service.into());
        self
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_https(mut self, certificate_type: CertificateType) -> Self {
        self.https = true;
        self.certificate_type = certificate_type;
        self
    }

    /// The path prefix the router matches on, if it is more specific than `/`.
    pub fn routed_path(&self) -> Option<&str> {
        self.path
            .as_deref()
            .filter(|p| !p.is_empty() && *p != "/")
    }

    /// `Host(`host`)`, narrowed with `PathPrefix` when a path is routed.
    pub fn rule(&self) -> String {
        match self.routed_path() {
            Some(path) => format!("Host(`{}`) && PathPrefix(`{path}`)", self.host),
            None => format!("Host(`{}`)", self.host),
        }
    }

    /// Prefix to strip before forwarding, when `stripPath` is set.
    pub fn stripped_prefix(&self) -> Option<&str> {
        if self.strip_path {
            self.routed_path()
        } else {
            None
        }
    }

    /// Prefix to add before forwarding. Only absolute, non-root paths that
    /// differ from the routed path count.
    pub fn added_prefix(&self) -> Option<&str> {
        self.internal_path
            .as_deref()
            .filter(|p| p.starts_with('/') && *p != "/" && Some(*p) != self.path.as_deref())
    }

    pub fn strip_prefix_middleware(&self, owner: &str) -> String {
        format!("stripprefix-{owner}-{}", self.unique_config_key)
    }

    pub fn add_prefix_middleware(&self, owner: &str) -> String {
        format!("addprefix-{owner}-{}", self.unique_config_key)
    }

    /// Certificate resolver for the `websecure` router, if any.
    pub fn cert_resolver(&self) -> Option<&str> {
        match self.certificate_type {
            CertificateType::Letsencrypt => Some(LETSENCRYPT_RESOLVER),
            CertificateType::Custom => self.custom_cert_resolver.as_deref(),
            CertificateType::None => None,
        }
    }
}

/// Parse a JSON array of domains, as handed over by the deployment pipeline.
pub fn parse_domains_json(input: &str) -> Result<Vec<Domain>, ComposeError> {
    Ok(serde_json::from_str(input)?)
}
