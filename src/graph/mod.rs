//! Semantic graph: typed nodes and edges built during a run.
//!
//! - **In-memory layer** ([`SemanticGraph`]): identity index and per-subject
//!   edge lists, written by the resolver, mapper and vocabulary cache
//! - **Query layer** ([`SparqlStore`](sparql::SparqlStore)): oxigraph store the
//!   validated graph is loaded into for SPARQL queries and export
//!
//! Both layers share the [`Node`] / [`Edge`] data model below.

pub mod index;
pub mod sparql;

use std::num::NonZeroU64;

use crate::literal::TypedLiteral;

pub use index::SemanticGraph;

/// Run-scoped node handle.
///
/// Uses `NonZeroU64` so that `Option<NodeId>` is the same size as `NodeId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NodeId(NonZeroU64);

impl NodeId {
    /// Create a `NodeId` from a raw value; `None` if zero.
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(NodeId)
    }

    /// Get the underlying value.
    pub fn get(self) -> u64 {
        self.0.get()
    }

    /// Position in the node table.
    pub(crate) fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

/// A uniquely identified entity with one declared class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    /// Canonical IRI, unique within a run.
    pub iri: String,
    /// Schema class name; never changes once assigned.
    pub class: String,
}

/// The object position of an edge.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Node(NodeId),
    Literal(TypedLiteral),
}

impl Object {
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Self::Node(id) => Some(*id),
            Self::Literal(_) => None,
        }
    }

    pub fn as_literal(&self) -> Option<&TypedLiteral> {
        match self {
            Self::Literal(lit) => Some(lit),
            Self::Node(_) => None,
        }
    }
}

impl From<NodeId> for Object {
    fn from(id: NodeId) -> Self {
        Self::Node(id)
    }
}

impl From<TypedLiteral> for Object {
    fn from(lit: TypedLiteral) -> Self {
        Self::Literal(lit)
    }
}

/// A directed, typed relation from a node to a node or literal.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub subject: NodeId,
    /// Schema relation name.
    pub relation: String,
    pub object: Object,
}

impl Edge {
    pub fn new(subject: NodeId, relation: impl Into<String>, object: impl Into<Object>) -> Self {
        Self {
            subject,
            relation: relation.into(),
            object: object.into(),
        }
    }
}
