//! Topology graph read contract.
//!
//! The controller only needs one thing from the graph: resolve a selector
//! string to a node and read typed attributes off it. The graph store itself
//! and its query language live elsewhere; `MemoryGraph` is the in-process
//! implementation backing the daemon and tests.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::Deserialize;

/// A typed attribute value on a node.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    List(Vec<String>),
}

/// A node handle with typed attribute lookup.
#[derive(Debug, Clone, Deserialize)]
pub struct Node {
    pub id: String,
    /// Identifier of the agent host owning this node.
    pub host: String,
    /// Selector strings this node answers to.
    #[serde(default)]
    pub matchers: Vec<String>,
    #[serde(default)]
    pub fields: HashMap<String, FieldValue>,
}

impl Node {
    pub fn new(id: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            matchers: Vec::new(),
            fields: HashMap::new(),
        }
    }

    pub fn with_matcher(mut self, selector: impl Into<String>) -> Self {
        self.matchers.push(selector.into());
        self
    }

    pub fn with_string(mut self, path: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields
            .insert(path.into(), FieldValue::String(value.into()));
        self
    }

    pub fn with_string_list(
        mut self,
        path: impl Into<String>,
        values: impl IntoIterator<Item = String>,
    ) -> Self {
        self.fields
            .insert(path.into(), FieldValue::List(values.into_iter().collect()));
        self
    }

    /// Look up a string attribute by path.
    pub fn field_string(&self, path: &str) -> Option<String> {
        match self.fields.get(path)? {
            FieldValue::String(s) => Some(s.clone()),
            FieldValue::List(_) => None,
        }
    }

    /// Look up a string-list attribute by path.
    pub fn field_string_list(&self, path: &str) -> Option<Vec<String>> {
        match self.fields.get(path)? {
            FieldValue::List(l) => Some(l.clone()),
            FieldValue::String(_) => None,
        }
    }
}

/// Read side of the topology graph.
///
/// Implementations hold their read lock only for the duration of a single
/// `lookup` call; the returned node is a snapshot.
pub trait TopologyGraph: Send + Sync {
    /// Resolve a selector to a node. When several nodes match, the first
    /// match wins; callers wanting determinism use unambiguous selectors.
    fn lookup(&self, selector: &str) -> Option<Node>;
}

/// In-memory topology graph.
pub struct MemoryGraph {
    nodes: RwLock<Vec<Node>>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(Vec::new()),
        }
    }

    /// Load a node list from JSON, as produced by topology exports.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let nodes: Vec<Node> = serde_json::from_str(json)?;
        Ok(Self {
            nodes: RwLock::new(nodes),
        })
    }

    pub fn add_node(&self, node: Node) {
        self.nodes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(node);
    }

    pub fn remove_node(&self, id: &str) {
        self.nodes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|n| n.id != id);
    }
}

impl Default for MemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl TopologyGraph for MemoryGraph {
    fn lookup(&self, selector: &str) -> Option<Node> {
        let nodes = self.nodes.read().unwrap_or_else(|e| e.into_inner());
        nodes
            .iter()
            .find(|n| n.matchers.iter().any(|m| m == selector))
            .cloned()
    }
}
