//! On-disk model of a dynamic proxy configuration file.
//!
//! Only the fields the engine manages are typed; everything else a human
//! (or another tool) put in the file is carried through `extra`.

use crate::files::ConfigFiles;
use crate::ProxyError;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::Path;

pub type Extra = BTreeMap<String, Value>;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FileConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpConfig>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HttpConfig {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub routers: BTreeMap<String, Router>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub services: BTreeMap<String, Service>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub middlewares: BTreeMap<String, Middleware>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Router {
    pub rule: String,
    pub service: String,
    #[serde(default)]
    pub entry_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub middlewares: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<RouterTls>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouterTls {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_resolver: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_balancer: Option<LoadBalancer>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancer {
    #[serde(default)]
    pub servers: Vec<Server>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass_host_header: Option<bool>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Server {
    pub url: String,
    #[serde(flatten)]
    pub extra: Extra,
}

/// A middleware definition. Exactly one of the typed fields is expected to
/// be set; middleware kinds the engine does not manage live in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Middleware {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_scheme: Option<RedirectScheme>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_regex: Option<RedirectRegex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic_auth: Option<BasicAuth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strip_prefix: Option<StripPrefix>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_prefix: Option<AddPrefix>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RedirectScheme {
    pub scheme: String,
    #[serde(default)]
    pub permanent: bool,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RedirectRegex {
    pub regex: String,
    pub replacement: String,
    #[serde(default)]
    pub permanent: bool,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BasicAuth {
    /// `username:bcrypt-hash` entries.
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_header: Option<bool>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StripPrefix {
    #[serde(default)]
    pub prefixes: Vec<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AddPrefix {
    pub prefix: String,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Middleware {
    pub fn redirect_scheme(scheme: &str, permanent: bool) -> Self {
        Self {
            redirect_scheme: Some(RedirectScheme {
                scheme: scheme.to_owned(),
                permanent,
                extra: Extra::new(),
            }),
            ..Self::default()
        }
    }

    pub fn strip_prefix(prefix: &str) -> Self {
        Self {
            strip_prefix: Some(StripPrefix {
                prefixes: vec![prefix.to_owned()],
                extra: Extra::new(),
            }),
            ..Self::default()
        }
    }

    pub fn add_prefix(prefix: &str) -> Self {
        Self {
            add_prefix: Some(AddPrefix {
                prefix: prefix.to_owned(),
                extra: Extra::new(),
            }),
            ..Self::default()
        }
    }
}

impl FileConfig {
    /// The empty application config: `{http: {routers: {}, services: {}}}`.
    pub fn empty() -> Self {
        Self {
            http: Some(HttpConfig::default()),
            extra: Extra::new(),
        }
    }

    /// Mutable access to the `http` block, creating it if absent.
    pub fn http_mut(&mut self) -> &mut HttpConfig {
        self.http.get_or_insert_with(HttpConfig::default)
    }

    pub fn routers(&self) -> impl Iterator<Item = (&String, &Router)> {
        self.http.iter().flat_map(|h| h.routers.iter())
    }

    pub fn router_count(&self) -> usize {
        self.http.as_ref().map_or(0, |h| h.routers.len())
    }

    pub fn middlewares(&self) -> Option<&BTreeMap<String, Middleware>> {
        self.http.as_ref().map(|h| &h.middlewares)
    }

    /// Read a config file. A missing or empty file yields `None`; a file that
    /// does not parse is reported as corrupt and left untouched.
    pub fn read(files: &dyn ConfigFiles, path: &Path) -> Result<Option<Self>, ProxyError> {
        let Some(content) = files.read(path)? else {
            return Ok(None);
        };
        if content.trim().is_empty() {
            return Ok(None);
        }
        let parsed: Option<Self> =
            serde_yaml::from_str(&content).map_err(|source| ProxyError::Corrupt {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(parsed)
    }

    /// Replace `path` with this config.
    pub fn write(&self, files: &dyn ConfigFiles, path: &Path) -> Result<(), ProxyError> {
        let yaml = serde_yaml::to_string(self)?;
        files.write(path, &yaml)
    }
}
