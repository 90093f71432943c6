//! Knowledge Graph: directed graph of typed nodes and edges.
//!
//! - **Storage** ([`KnowledgeGraph`]): a `petgraph` `DiGraph` plus an id index,
//!   both behind one `RwLock` so the graph can be shared across threads.
//! - **Traversal** ([`traverse`]): breadth-first neighborhood walks in both
//!   directions.
//!
//! Nodes are unique by id. Edges may only connect existing nodes; parallel
//! edges are allowed. The full state round-trips through [`GraphSnapshot`].

pub mod index;
pub mod traverse;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use index::{GraphStats, KnowledgeGraph, QueryHit};
pub use traverse::{EdgeDirection, RelatedNode};

/// A node in the knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeNode {
    /// Unique id.
    pub id: String,
    /// Human-readable label, searched by [`KnowledgeGraph::query`].
    pub label: String,
    /// Free-form type tag ("subject", "news", ...).
    pub node_type: String,
    /// Arbitrary properties; string values are searched by `query`.
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
    /// Confidence in [0.0, 1.0].
    pub confidence: f64,
}

impl KnowledgeNode {
    /// Create a node with full confidence and no properties.
    pub fn new(id: impl Into<String>, label: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            node_type: node_type.into(),
            properties: BTreeMap::new(),
            confidence: 1.0,
        }
    }

    /// Set the confidence score.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Attach a property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// A directed, typed edge between two existing nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEdge {
    pub source: String,
    pub target: String,
    /// Relation type ("has_fact", "related_to", ...).
    pub relation: String,
    pub weight: f64,
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl KnowledgeEdge {
    /// Create an edge with weight 1.0.
    pub fn new(source: impl Into<String>, target: impl Into<String>, relation: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation: relation.into(),
            weight: 1.0,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Full graph state: nodes in insertion order, then edges in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<KnowledgeNode>,
    pub edges: Vec<KnowledgeEdge>,
}
