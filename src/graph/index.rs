//! In-memory knowledge graph.
//!
//! Uses `petgraph` for the graph structure and a `HashMap` id index for O(1)
//! node lookups. Both live behind a single `RwLock` so that every mutation is
//! observed atomically.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use petgraph::Direction;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::error::{GraphError, GraphResult};

use super::{GraphSnapshot, KnowledgeEdge, KnowledgeNode};

#[derive(Default)]
struct GraphState {
    graph: DiGraph<KnowledgeNode, KnowledgeEdge>,
    /// Node id → NodeIndex.
    index: HashMap<String, NodeIndex>,
}

impl GraphState {
    /// Insert or replace a node. Returns `true` when the id was new.
    fn upsert(&mut self, node: KnowledgeNode) -> bool {
        if let Some(&idx) = self.index.get(&node.id) {
            tracing::debug!(node_id = %node.id, "replacing existing node");
            self.graph[idx] = node;
            return false;
        }
        let id = node.id.clone();
        let idx = self.graph.add_node(node);
        self.index.insert(id, idx);
        true
    }

    fn link(&mut self, edge: KnowledgeEdge) -> GraphResult<()> {
        let source = self.lookup(&edge.source)?;
        let target = self.lookup(&edge.target)?;
        self.graph.add_edge(source, target, edge);
        Ok(())
    }

    fn lookup(&self, id: &str) -> GraphResult<NodeIndex> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::NodeNotFound {
                node_id: id.to_owned(),
            })
    }
}

/// A node matched by [`KnowledgeGraph::query`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryHit {
    pub node: KnowledgeNode,
    pub score: f64,
}

/// Node and edge counts, overall and per type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub nodes_by_type: BTreeMap<String, usize>,
    pub edges_by_relation: BTreeMap<String, usize>,
}

const LABEL_MATCH_SCORE: f64 = 2.0;
const PROPERTY_MATCH_SCORE: f64 = 1.0;

/// In-memory knowledge graph backed by petgraph.
pub struct KnowledgeGraph {
    state: RwLock<GraphState>,
}

impl KnowledgeGraph {
    /// Create a new empty knowledge graph.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(GraphState::default()),
        }
    }

    /// Insert a node, replacing the payload of any node with the same id.
    ///
    /// Returns `true` when the id was not present before.
    pub fn add_node(&self, node: KnowledgeNode) -> bool {
        self.state.write().expect("graph lock poisoned").upsert(node)
    }

    /// Insert an edge between two existing nodes.
    ///
    /// Fails with [`GraphError::NodeNotFound`] if either endpoint is missing,
    /// in which case the graph is left unchanged.
    pub fn add_edge(&self, edge: KnowledgeEdge) -> GraphResult<()> {
        self.state.write().expect("graph lock poisoned").link(edge)
    }

    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<KnowledgeNode> {
        let state = self.state.read().expect("graph lock poisoned");
        state.index.get(id).map(|&idx| state.graph[idx].clone())
    }

    /// Check if a node exists.
    pub fn has_node(&self, id: &str) -> bool {
        self.state
            .read()
            .expect("graph lock poisoned")
            .index
            .contains_key(id)
    }

    /// Ids of nodes reachable over one outgoing edge, in edge insertion order.
    pub fn neighbors(&self, id: &str) -> Vec<String> {
        let state = self.state.read().expect("graph lock poisoned");
        let Some(&idx) = state.index.get(id) else {
            return vec![];
        };
        let mut edges: Vec<_> = state
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (e.id(), e.weight().target.clone()))
            .collect();
        edges.sort_by_key(|(ei, _)| *ei);
        edges.into_iter().map(|(_, target)| target).collect()
    }

    /// All edges touching `id` (outgoing and incoming), in edge insertion order.
    ///
    /// A self-loop is reported once.
    pub fn edges_of(&self, id: &str) -> Vec<KnowledgeEdge> {
        let state = self.state.read().expect("graph lock poisoned");
        let Some(&idx) = state.index.get(id) else {
            return vec![];
        };
        let mut edges: Vec<(EdgeIndex, &KnowledgeEdge)> = state
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .chain(state.graph.edges_directed(idx, Direction::Incoming))
            .map(|e| (e.id(), e.weight()))
            .collect();
        edges.sort_by_key(|(ei, _)| *ei);
        edges.dedup_by_key(|(ei, _)| *ei);
        edges.into_iter().map(|(_, edge)| edge.clone()).collect()
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.state.read().expect("graph lock poisoned").graph.node_count()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.state.read().expect("graph lock poisoned").graph.edge_count()
    }

    /// Ranked keyword search over node labels and string properties.
    ///
    /// Case-insensitive. A label containing `text` scores 2.0 and every string
    /// property containing it adds 1.0. Nodes scoring zero are dropped; ties
    /// keep node insertion order.
    pub fn query(&self, text: &str, limit: usize) -> Vec<QueryHit> {
        let needle = text.to_lowercase();
        let state = self.state.read().expect("graph lock poisoned");

        let mut hits: Vec<QueryHit> = state
            .graph
            .node_indices()
            .filter_map(|idx| {
                let node = &state.graph[idx];
                let mut score = 0.0;
                if node.label.to_lowercase().contains(&needle) {
                    score += LABEL_MATCH_SCORE;
                }
                for value in node.properties.values() {
                    if let Some(s) = value.as_str() {
                        if s.to_lowercase().contains(&needle) {
                            score += PROPERTY_MATCH_SCORE;
                        }
                    }
                }
                (score > 0.0).then(|| QueryHit {
                    node: node.clone(),
                    score,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        hits
    }

    /// Node and edge counts per type.
    pub fn stats(&self) -> GraphStats {
        let state = self.state.read().expect("graph lock poisoned");
        let mut stats = GraphStats {
            node_count: state.graph.node_count(),
            edge_count: state.graph.edge_count(),
            ..Default::default()
        };
        for node in state.graph.node_weights() {
            *stats.nodes_by_type.entry(node.node_type.clone()).or_default() += 1;
        }
        for edge in state.graph.edge_weights() {
            *stats
                .edges_by_relation
                .entry(edge.relation.clone())
                .or_default() += 1;
        }
        stats
    }

    /// Copy the full graph state.
    pub fn export(&self) -> GraphSnapshot {
        let state = self.state.read().expect("graph lock poisoned");
        GraphSnapshot {
            nodes: state.graph.node_weights().cloned().collect(),
            edges: state.graph.edge_weights().cloned().collect(),
        }
    }

    /// Replace the graph contents with a snapshot.
    ///
    /// Destructive: existing contents are discarded first. If any edge
    /// references a node missing from the snapshot the import aborts with
    /// [`GraphError::NodeNotFound`] and the graph is left empty.
    pub fn import(&self, snapshot: GraphSnapshot) -> GraphResult<()> {
        let mut state = self.state.write().expect("graph lock poisoned");
        *state = GraphState::default();

        let mut fresh = GraphState::default();
        for node in snapshot.nodes {
            fresh.upsert(node);
        }
        for edge in snapshot.edges {
            fresh.link(edge)?;
        }

        tracing::info!(
            nodes = fresh.graph.node_count(),
            edges = fresh.graph.edge_count(),
            "imported graph snapshot"
        );
        *state = fresh;
        Ok(())
    }

    /// Serialize the full graph state to JSON.
    pub fn to_json(&self) -> GraphResult<String> {
        serde_json::to_string_pretty(&self.export()).map_err(|e| GraphError::Snapshot {
            message: e.to_string(),
        })
    }

    /// Build a graph from JSON produced by [`to_json`](Self::to_json).
    pub fn from_json(json: &str) -> GraphResult<Self> {
        let snapshot: GraphSnapshot =
            serde_json::from_str(json).map_err(|e| GraphError::Snapshot {
                message: e.to_string(),
            })?;
        let graph = Self::new();
        graph.import(snapshot)?;
        Ok(graph)
    }
}

impl Default for KnowledgeGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for KnowledgeGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeGraph")
            .field("nodes", &self.node_count())
            .field("edges", &self.edge_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn node(id: &str, label: &str, node_type: &str) -> KnowledgeNode {
        KnowledgeNode::new(id, label, node_type)
    }

    fn sample_graph() -> KnowledgeGraph {
        let kg = KnowledgeGraph::new();
        kg.add_node(node("aapl", "Apple Inc.", "company"));
        kg.add_node(node("tim", "Tim Cook", "person").with_property("role", "Apple CEO"));
        kg.add_node(node("msft", "Microsoft", "company"));
        kg.add_edge(KnowledgeEdge::new("tim", "aapl", "leads")).unwrap();
        kg.add_edge(KnowledgeEdge::new("aapl", "msft", "competes_with"))
            .unwrap();
        kg
    }

    #[test]
    fn add_and_lookup_nodes() {
        let kg = sample_graph();
        assert_eq!(kg.node_count(), 3);
        assert_eq!(kg.edge_count(), 2);
        assert!(kg.has_node("aapl"));
        assert_eq!(kg.node("msft").unwrap().label, "Microsoft");
        assert!(kg.node("goog").is_none());
    }

    #[test]
    fn duplicate_id_replaces_payload() {
        let kg = sample_graph();
        let inserted = kg.add_node(node("aapl", "Apple", "issuer"));
        assert!(!inserted);
        assert_eq!(kg.node_count(), 3);
        assert_eq!(kg.node("aapl").unwrap().node_type, "issuer");
        // Edges survive the replacement.
        assert_eq!(kg.neighbors("aapl"), vec!["msft".to_string()]);
    }

    #[test]
    fn edge_with_missing_endpoint_fails_without_mutation() {
        let kg = sample_graph();
        let err = kg
            .add_edge(KnowledgeEdge::new("aapl", "goog", "competes_with"))
            .unwrap_err();
        assert!(matches!(err, GraphError::NodeNotFound { ref node_id } if node_id == "goog"));
        assert_eq!(kg.edge_count(), 2);
        assert_eq!(kg.node_count(), 3);
    }

    #[test]
    fn parallel_edges_allowed() {
        let kg = sample_graph();
        kg.add_edge(KnowledgeEdge::new("aapl", "msft", "competes_with"))
            .unwrap();
        assert_eq!(kg.edge_count(), 3);
        assert_eq!(kg.neighbors("aapl").len(), 2);
    }

    #[test]
    fn edges_of_includes_both_directions() {
        let kg = sample_graph();
        let edges = kg.edges_of("aapl");
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].relation, "leads");
        assert_eq!(edges[1].relation, "competes_with");
        assert!(kg.edges_of("missing").is_empty());
    }

    #[test]
    fn query_ranks_label_over_property() {
        let kg = sample_graph();
        let hits = kg.query("APPLE", 10);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].node.id, "aapl");
        assert_eq!(hits[0].score, 2.0);
        assert_eq!(hits[1].node.id, "tim");
        assert_eq!(hits[1].score, 1.0);
    }

    #[test]
    fn query_ties_keep_insertion_order_and_truncate() {
        let kg = KnowledgeGraph::new();
        kg.add_node(node("b", "tech b", "t"));
        kg.add_node(node("a", "tech a", "t"));
        kg.add_node(node("c", "tech c", "t"));
        let hits = kg.query("tech", 2);
        let ids: Vec<_> = hits.iter().map(|h| h.node.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert!(kg.query("nothing", 10).is_empty());
    }

    #[test]
    fn stats_count_per_type() {
        let stats = sample_graph().stats();
        assert_eq!(stats.node_count, 3);
        assert_eq!(stats.nodes_by_type.get("company"), Some(&2));
        assert_eq!(stats.edges_by_relation.get("leads"), Some(&1));
    }

    #[test]
    fn export_import_preserves_nodes_and_edges() {
        let kg = sample_graph();
        let snapshot = kg.export();

        let restored = KnowledgeGraph::new();
        restored.add_node(node("stale", "Stale", "junk"));
        restored.import(snapshot.clone()).unwrap();

        let nodes = |g: &GraphSnapshot| -> BTreeSet<(String, String, String)> {
            g.nodes
                .iter()
                .map(|n| (n.id.clone(), n.label.clone(), n.node_type.clone()))
                .collect()
        };
        let edges = |g: &GraphSnapshot| -> BTreeSet<(String, String, String)> {
            g.edges
                .iter()
                .map(|e| (e.source.clone(), e.target.clone(), e.relation.clone()))
                .collect()
        };
        let after = restored.export();
        assert_eq!(nodes(&snapshot), nodes(&after));
        assert_eq!(edges(&snapshot), edges(&after));
        assert!(!restored.has_node("stale"));
    }

    #[test]
    fn import_with_dangling_edge_leaves_graph_empty() {
        let kg = sample_graph();
        let snapshot = GraphSnapshot {
            nodes: vec![node("x", "X", "t")],
            edges: vec![KnowledgeEdge::new("x", "y", "r")],
        };
        let err = kg.import(snapshot).unwrap_err();
        assert!(matches!(err, GraphError::NodeNotFound { .. }));
        assert_eq!(kg.node_count(), 0);
        assert_eq!(kg.edge_count(), 0);
    }

    #[test]
    fn json_round_trip() {
        let kg = sample_graph();
        let json = kg.to_json().unwrap();
        let restored = KnowledgeGraph::from_json(&json).unwrap();
        assert_eq!(restored.export(), kg.export());
        assert!(matches!(
            KnowledgeGraph::from_json("{not json"),
            Err(GraphError::Snapshot { .. })
        ));
    }
}
