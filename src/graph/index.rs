//! In-memory semantic graph with an IRI identity index.
//!
//! Nodes live in an append-only table addressed by [`NodeId`]; a `DashMap`
//! maps canonical IRIs to ids and another holds each subject's outgoing
//! edges. Node creation goes through the map's entry API, so get-or-create is
//! atomic per IRI even if callers share the graph across threads.

use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::error::SchemaError;

use super::{Edge, Node, NodeId, Object};

/// In-memory node/edge store for one run.
pub struct SemanticGraph {
    /// Node table; `NodeId(n)` lives at index `n - 1`.
    nodes: RwLock<Vec<Node>>,
    /// Canonical IRI → NodeId.
    iri_index: DashMap<String, NodeId>,
    /// Subject → outgoing edges in insertion order.
    edges: DashMap<NodeId, Vec<Edge>>,
    edge_count: AtomicUsize,
}

impl SemanticGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(Vec::new()),
            iri_index: DashMap::new(),
            edges: DashMap::new(),
            edge_count: AtomicUsize::new(0),
        }
    }

    /// Return the node bound to `iri`, creating it with `class` if absent.
    ///
    /// The boolean is `true` when the node was created by this call. An IRI
    /// already bound to a different class is a [`SchemaError::ClassConflict`].
    pub fn get_or_insert_node(&self, iri: &str, class: &str) -> Result<(NodeId, bool), SchemaError> {
        match self.iri_index.entry(iri.to_string()) {
            Entry::Occupied(entry) => {
                let id = *entry.get();
                let nodes = self.nodes.read().expect("node table lock poisoned");
                let existing = &nodes[id.index()];
                if existing.class != class {
                    return Err(SchemaError::ClassConflict {
                        iri: iri.to_string(),
                        existing: existing.class.clone(),
                        requested: class.to_string(),
                    });
                }
                Ok((id, false))
            }
            Entry::Vacant(entry) => {
                let mut nodes = self.nodes.write().expect("node table lock poisoned");
                let id = NodeId::new(nodes.len() as u64 + 1).expect("node ids start at 1");
                nodes.push(Node {
                    id,
                    iri: iri.to_string(),
                    class: class.to_string(),
                });
                entry.insert(id);
                Ok((id, true))
            }
        }
    }

    /// Look up a node id by canonical IRI.
    pub fn lookup(&self, iri: &str) -> Option<NodeId> {
        self.iri_index.get(iri).map(|r| *r.value())
    }

    /// Fetch a node by id.
    pub fn node(&self, id: NodeId) -> Option<Node> {
        let nodes = self.nodes.read().expect("node table lock poisoned");
        nodes.get(id.index()).cloned()
    }

    /// Append an edge unless an identical one exists; multi-valued relations accumulate.
    ///
    /// Returns `false` if the edge was already present.
    pub fn add_edge(&self, edge: Edge) -> bool {
        let mut list = self.edges.entry(edge.subject).or_default();
        if list.contains(&edge) {
            return false;
        }
        list.push(edge);
        self.edge_count.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Replace every edge for `(edge.subject, edge.relation)` with `edge`.
    ///
    /// Returns the number of edges replaced; re-setting an identical edge
    /// replaces nothing.
    pub fn set_edge(&self, edge: Edge) -> usize {
        let mut list = self.edges.entry(edge.subject).or_default();
        let unchanged = list.contains(&edge);
        let before = list.len();
        list.retain(|e| e.relation != edge.relation);
        let removed = before - list.len();
        list.push(edge);
        drop(list);

        if removed > 0 {
            self.edge_count.fetch_sub(removed, Ordering::Relaxed);
        }
        self.edge_count.fetch_add(1, Ordering::Relaxed);
        removed - usize::from(unchanged)
    }

    /// Attach an edge honoring multiplicity: single-valued relations replace.
    pub fn attach(&self, edge: Edge, single_valued: bool) -> usize {
        if single_valued {
            self.set_edge(edge)
        } else {
            self.add_edge(edge);
            0
        }
    }

    /// Outgoing edges of a subject, in insertion order.
    pub fn edges_from(&self, subject: NodeId) -> Vec<Edge> {
        self.edges
            .get(&subject)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    /// Objects of `(subject, relation)`.
    pub fn objects_of(&self, subject: NodeId, relation: &str) -> Vec<Object> {
        self.edges
            .get(&subject)
            .map(|r| {
                r.value()
                    .iter()
                    .filter(|e| e.relation == relation)
                    .map(|e| e.object.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All nodes in creation order.
    pub fn nodes(&self) -> Vec<Node> {
        self.nodes.read().expect("node table lock poisoned").clone()
    }

    /// All nodes of one class in creation order.
    pub fn nodes_of_class(&self, class: &str) -> Vec<Node> {
        let nodes = self.nodes.read().expect("node table lock poisoned");
        nodes.iter().filter(|n| n.class == class).cloned().collect()
    }

    /// All edges, grouped by subject in node creation order.
    pub fn all_edges(&self) -> Vec<Edge> {
        let count = self.nodes.read().expect("node table lock poisoned").len();
        (1..=count as u64)
            .filter_map(NodeId::new)
            .flat_map(|id| self.edges_from(id))
            .collect()
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.iri_index.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edge_count.load(Ordering::Relaxed)
    }
}

impl Default for SemanticGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SemanticGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticGraph")
            .field("nodes", &self.node_count())
            .field("edges", &self.edge_count())
            .finish()
    }
}
