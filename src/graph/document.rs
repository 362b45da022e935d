use crate::error::BuildError;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A drawflow document: named modules, each a map of node entries.
///
/// Both the UI export (`{"drawflow": {...}}`) and the bare module map are
/// accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowGraphDocument {
    pub modules: BTreeMap<String, Module>,
}

impl FlowGraphDocument {
    const WRAPPER_KEY: &'static str = "drawflow";

    pub fn from_json(json: &str) -> Result<Self, BuildError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| BuildError::InvalidDocument(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_value(mut value: Value) -> Result<Self, BuildError> {
        if let Some(inner) = value
            .as_object_mut()
            .and_then(|object| object.remove(Self::WRAPPER_KEY))
        {
            value = inner;
        }
        let modules = serde_json::from_value(value)
            .map_err(|e| BuildError::InvalidDocument(e.to_string()))?;
        Ok(Self { modules })
    }

    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.get(name)
    }

    pub fn with_module(mut self, name: impl Into<String>, module: Module) -> Self {
        self.modules.insert(name.into(), module);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Module {
    #[serde(default)]
    pub data: BTreeMap<String, NodeEntry>,
}

impl Module {
    pub fn node(&self, key: &str) -> Option<&NodeEntry> {
        self.data.get(key)
    }

    /// Node entries in natural id order: numeric ids ascending, then the
    /// rest lexicographically.
    pub fn nodes_in_order(&self) -> Vec<(&str, &NodeEntry)> {
        let mut nodes: Vec<(&str, &NodeEntry)> = self
            .data
            .iter()
            .map(|(key, entry)| (key.as_str(), entry))
            .collect();
        nodes.sort_by(|(a, _), (b, _)| natural_order(a, b));
        nodes
    }
}

pub fn natural_order(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEntry {
    #[serde(deserialize_with = "node_id")]
    pub id: String,
    /// The node type tag, resolved through the node registry.
    pub name: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, deserialize_with = "ports")]
    pub inputs: BTreeMap<String, Port>,
    #[serde(default, deserialize_with = "ports")]
    pub outputs: BTreeMap<String, Port>,
}

impl NodeEntry {
    /// The only output port whose connections are followed.
    pub const PRIMARY_OUTPUT: &'static str = "output_1";

    pub fn is_root(&self) -> bool {
        self.inputs.values().all(|port| port.connections.is_empty())
    }

    pub fn parent_ids(&self) -> impl Iterator<Item = &str> {
        self.inputs
            .values()
            .flat_map(|port| port.connections.iter().map(|c| c.node.as_str()))
    }

    /// Ids connected to the primary output, in connection order.
    pub fn targets(&self) -> Vec<&str> {
        self.outputs
            .get(Self::PRIMARY_OUTPUT)
            .map(|port| port.connections.iter().map(|c| c.node.as_str()).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Port {
    #[serde(default)]
    pub connections: Vec<Connection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    #[serde(deserialize_with = "node_id")]
    pub node: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl Connection {
    pub fn to(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            input: None,
            output: None,
        }
    }
}

/// Ids come as numbers or strings depending on the exporter.
fn node_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!("invalid node id {other}"))),
    }
}

/// Empty port sets are sometimes exported as `[]`.
fn ports<'de, D>(deserializer: D) -> Result<BTreeMap<String, Port>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Object(map) => map
            .into_iter()
            .map(|(name, port)| {
                serde_json::from_value(port)
                    .map(|port| (name, port))
                    .map_err(de::Error::custom)
            })
            .collect(),
        Value::Array(items) if items.is_empty() => Ok(BTreeMap::new()),
        Value::Null => Ok(BTreeMap::new()),
        other => Err(de::Error::custom(format!("invalid port set {other}"))),
    }
}
