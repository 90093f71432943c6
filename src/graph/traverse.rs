//! Breadth-first neighborhood traversal.
//!
//! [`related`] walks outgoing *and* incoming edges with one global visited
//! set. Each reachable node is reported once, with the depth and relation of
//! the first path that reached it. Edge direction does not affect depth: a
//! node one incoming hop away is at depth 1, the same as one outgoing hop.

use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use super::KnowledgeNode;
use super::index::KnowledgeGraph;

/// Which way the edge that reached a node points, relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeDirection {
    Outgoing,
    Incoming,
}

/// A node discovered by [`related`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedNode {
    pub node: KnowledgeNode,
    /// Hops from the start node (1 = direct neighbor).
    pub depth: usize,
    /// Relation of the edge that first reached this node.
    pub relation: String,
    pub direction: EdgeDirection,
}

/// Nodes within `max_depth` hops of `node_id`, in discovery order.
///
/// When `relation` is set only edges of that relation are followed. The start
/// node itself is not reported; an unknown start node yields an empty result.
pub fn related(
    graph: &KnowledgeGraph,
    node_id: &str,
    relation: Option<&str>,
    max_depth: usize,
) -> Vec<RelatedNode> {
    if !graph.has_node(node_id) {
        return vec![];
    }

    let mut visited: HashSet<String> = HashSet::new();
    let mut found = Vec::new();
    // BFS queue: (node id, depth)
    let mut queue: VecDeque<(String, usize)> = VecDeque::new();

    visited.insert(node_id.to_owned());
    queue.push_back((node_id.to_owned(), 0));

    while let Some((current, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }

        for edge in graph.edges_of(&current) {
            if relation.is_some_and(|r| r != edge.relation) {
                continue;
            }
            let (next, direction) = if edge.source == current {
                (edge.target, EdgeDirection::Outgoing)
            } else {
                (edge.source, EdgeDirection::Incoming)
            };
            if !visited.insert(next.clone()) {
                continue;
            }
            if let Some(node) = graph.node(&next) {
                found.push(RelatedNode {
                    node,
                    depth: depth + 1,
                    relation: edge.relation,
                    direction,
                });
                queue.push_back((next, depth + 1));
            }
        }
    }

    found
}

impl KnowledgeGraph {
    /// See [`related`].
    pub fn related(&self, node_id: &str, relation: Option<&str>, max_depth: usize) -> Vec<RelatedNode> {
        related(self, node_id, relation, max_depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::KnowledgeEdge;

    fn build_chain_graph() -> KnowledgeGraph {
        // A --r--> B --r--> C --r--> D, and E --s--> A
        let kg = KnowledgeGraph::new();
        for id in ["A", "B", "C", "D", "E"] {
            kg.add_node(KnowledgeNode::new(id, id, "t"));
        }
        kg.add_edge(KnowledgeEdge::new("A", "B", "r")).unwrap();
        kg.add_edge(KnowledgeEdge::new("B", "C", "r")).unwrap();
        kg.add_edge(KnowledgeEdge::new("C", "D", "r")).unwrap();
        kg.add_edge(KnowledgeEdge::new("E", "A", "s")).unwrap();
        kg
    }

    fn ids(result: &[RelatedNode]) -> Vec<&str> {
        result.iter().map(|r| r.node.id.as_str()).collect()
    }

    #[test]
    fn depth_one_includes_both_directions() {
        let kg = build_chain_graph();
        let result = kg.related("A", None, 1);
        assert_eq!(ids(&result), vec!["B", "E"]);
        assert_eq!(result[0].direction, EdgeDirection::Outgoing);
        assert_eq!(result[1].direction, EdgeDirection::Incoming);
        assert!(result.iter().all(|r| r.depth == 1));
    }

    #[test]
    fn full_chain_depths() {
        let kg = build_chain_graph();
        let result = kg.related("A", None, 10);
        assert_eq!(result.len(), 4);
        let d = result.iter().find(|r| r.node.id == "D").unwrap();
        assert_eq!(d.depth, 3);
    }

    #[test]
    fn relation_filter() {
        let kg = build_chain_graph();
        let result = kg.related("A", Some("s"), 5);
        assert_eq!(ids(&result), vec!["E"]);
        assert_eq!(result[0].relation, "s");
    }

    #[test]
    fn first_path_wins() {
        // A -> B, A -> C, C -> B: B is reported once at depth 1.
        let kg = KnowledgeGraph::new();
        for id in ["A", "B", "C"] {
            kg.add_node(KnowledgeNode::new(id, id, "t"));
        }
        kg.add_edge(KnowledgeEdge::new("A", "B", "direct")).unwrap();
        kg.add_edge(KnowledgeEdge::new("A", "C", "r")).unwrap();
        kg.add_edge(KnowledgeEdge::new("C", "B", "indirect")).unwrap();

        let result = kg.related("A", None, 3);
        assert_eq!(result.len(), 2);
        let b = result.iter().find(|r| r.node.id == "B").unwrap();
        assert_eq!(b.depth, 1);
        assert_eq!(b.relation, "direct");
    }

    #[test]
    fn missing_start_or_zero_depth_is_empty() {
        let kg = build_chain_graph();
        assert!(kg.related("Z", None, 3).is_empty());
        assert!(kg.related("A", None, 0).is_empty());
    }
}
