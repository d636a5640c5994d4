//! Typed representation of the compose schema subset the engine rewrites.
//!
//! Every field that can name another resource is modelled as a tagged union
//! decided once at parse time, so transforms match exhaustively instead of
//! re-checking shapes. Every key the engine does not understand is carried in
//! an `extra` map and written back verbatim.

use crate::ComposeError;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Keys preserved verbatim alongside the typed fields.
pub type Extra = BTreeMap<String, Value>;

/// Root-level `networks`, `volumes`, `configs` or `secrets` map. A `null`
/// value (`backend:` with no body) is kept as `None`.
pub type ResourceMap = BTreeMap<String, Option<ResourceDefinition>>;

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ComposeDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Value>,
    #[serde(default)]
    pub services: BTreeMap<String, ServiceDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub networks: Option<ResourceMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volumes: Option<ResourceMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configs: Option<ResourceMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets: Option<ResourceMap>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ResourceDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ServiceDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<DependsOn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volumes_from: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<Extends>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub networks: Option<ServiceNetworks>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volumes: Option<Vec<ServiceVolume>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configs: Option<Vec<ResourceRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets: Option<Vec<ResourceRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Labels>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy: Option<Deploy>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// `depends_on: [a, b]` or `depends_on: {a: {condition: ...}}`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum DependsOn {
    List(Vec<String>),
    Map(BTreeMap<String, Value>),
}

/// `extends: base` or `extends: {service: base, file: other.yml}`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Extends {
    Name(String),
    Spec(ExtendsSpec),
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ExtendsSpec {
    pub service: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ServiceNetworks {
    List(Vec<String>),
    Map(BTreeMap<String, Option<NetworkAttachment>>),
}

/// Per-network settings of a service. `aliases` holds hostnames, not
/// resource names.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct NetworkAttachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aliases: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ServiceVolume {
    /// `source:target[:mode]`, or a bare container path for anonymous volumes.
    Short(String),
    Long(VolumeMount),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct VolumeMount {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Service-level `configs` / `secrets` entry.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ResourceRef {
    Name(String),
    Long(ResourceRefSpec),
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ResourceRefSpec {
    pub source: String,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Labels {
    List(Vec<String>),
    Map(BTreeMap<String, Value>),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Deploy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Labels>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl ResourceDefinition {
    /// `{external: true}`, optionally pinned to a concrete runtime name.
    pub fn external(name: Option<&str>) -> Self {
        let mut extra = Extra::new();
        extra.insert("external".to_owned(), Value::Bool(true));
        Self {
            name: name.map(str::to_owned),
            extra,
        }
    }

    pub fn is_external(&self) -> bool {
        match self.extra.get("external") {
            Some(Value::Bool(b)) => *b,
            Some(Value::Mapping(_)) => true,
            _ => false,
        }
    }
}

impl ComposeDocument {
    /// Declare `name` at the root as an externally managed network,
    /// replacing any previous definition.
    pub fn declare_external_network(&mut self, name: &str, pin_name: bool) {
        let networks = self.networks.get_or_insert_with(ResourceMap::new);
        let definition = ResourceDefinition::external(pin_name.then_some(name));
        networks.insert(name.to_owned(), Some(definition));
    }
}

impl ServiceDefinition {
    /// Attach the service to `network`, keeping whichever shape the service
    /// already uses. Does nothing if it is already attached.
    pub fn attach_network(&mut self, network: &str) {
        match &mut self.networks {
            None => self.networks = Some(ServiceNetworks::List(vec![network.to_owned()])),
            Some(ServiceNetworks::List(names)) => {
                if !names.iter().any(|n| n == network) {
                    names.push(network.to_owned());
                }
            }
            Some(ServiceNetworks::Map(map)) => {
                map.entry(network.to_owned()).or_insert(None);
            }
        }
    }

    /// Names of the networks this service is attached to.
    pub fn network_names(&self) -> Vec<&str> {
        match &self.networks {
            None => Vec::new(),
            Some(ServiceNetworks::List(names)) => names.iter().map(String::as_str).collect(),
            Some(ServiceNetworks::Map(map)) => map.keys().map(String::as_str).collect(),
        }
    }
}

impl Labels {
    /// Insert `key=value`, replacing any label with the same key so each key
    /// appears exactly once.
    pub fn upsert(&mut self, label: &str) {
        let (key, value) = label.split_once('=').unwrap_or((label, ""));
        match self {
            Labels::List(entries) => {
                let existing = entries
                    .iter()
                    .position(|e| e.split_once('=').map_or(e.as_str(), |(k, _)| k) == key);
                match existing {
                    Some(pos) => label.clone_into(&mut entries[pos]),
                    None => entries.push(label.to_owned()),
                }
            }
            Labels::Map(map) => {
                map.insert(key.to_owned(), Value::String(value.to_owned()));
            }
        }
    }

    /// Number of labels with the given key.
    pub fn count_key(&self, key: &str) -> usize {
        match self {
            Labels::List(entries) => entries
                .iter()
                .filter(|e| e.split_once('=').map_or(e.as_str(), |(k, _)| k) == key)
                .count(),
            Labels::Map(map) => usize::from(map.contains_key(key)),
        }
    }

    /// Value of the label with the given key, rendered as a string.
    pub fn get(&self, key: &str) -> Option<String> {
        match self {
            Labels::List(entries) => entries.iter().find_map(|e| {
                e.split_once('=')
                    .filter(|(k, _)| *k == key)
                    .map(|(_, v)| v.to_owned())
            }),
            Labels::Map(map) => map.get(key).map(|v| match v {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => serde_yaml::to_string(other)
                    .map(|s| s.trim_end().to_owned())
                    .unwrap_or_default(),
            }),
        }
    }
}

pub fn parse_document_str(input: &str) -> Result<ComposeDocument, ComposeError> {
    if input.trim().is_empty() {
        return Ok(ComposeDocument::default());
    }
    serde_yaml::from_str(input).map_err(ComposeError::Parse)
}

pub fn parse_document_file(path: impl AsRef<Path>) -> Result<ComposeDocument, ComposeError> {
    let content = fs::read_to_string(path)?;
    parse_document_str(&content)
}

/// Serialize a document back to YAML. Long values such as router rules are
/// never wrapped.
pub fn to_yaml_string(doc: &ComposeDocument) -> Result<String, ComposeError> {
    serde_yaml::to_string(doc).map_err(ComposeError::Serialize)
}
