//! Entity resolution: (class, natural key) → the one canonical node.
//!
//! Every reference the pipeline creates goes through [`EntityResolver`]:
//! mapped reference fields, companion constants, vocabulary terms and their
//! parents. The canonical IRI is `class IRI + "/" + escaped key`, and the
//! graph's identity index guarantees at most one node per IRI.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::SchemaError;
use crate::graph::{NodeId, SemanticGraph};
use crate::schema::Schema;

/// The identity of an entity: a class plus its external code.
///
/// Cannot be built from a blank code, so a missing value can never
/// materialize a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    class: String,
    code: String,
}

impl NaturalKey {
    /// Key for `class` and `code`; `None` if `code` is blank.
    pub fn new(class: impl Into<String>, code: &str) -> Option<Self> {
        let code = code.trim();
        if code.is_empty() {
            return None;
        }
        Some(Self {
            class: class.into(),
            code: code.to_string(),
        })
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn code(&self) -> &str {
        &self.code
    }
}

impl std::fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.class, self.code)
    }
}

/// Outcome of a [`EntityResolver::resolve`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub node: NodeId,
    /// Whether this call created the node.
    pub created: bool,
}

/// Get-or-create over the run's identity index.
#[derive(Clone)]
pub struct EntityResolver {
    schema: Arc<Schema>,
    graph: Arc<SemanticGraph>,
    stats: Arc<ResolverStats>,
}

/// Created/reused counters shared by all clones of a resolver.
#[derive(Debug, Default)]
pub struct ResolverStats {
    created: AtomicUsize,
    reused: AtomicUsize,
}

impl ResolverStats {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    pub fn reused(&self) -> usize {
        self.reused.load(Ordering::Relaxed)
    }
}

impl EntityResolver {
    pub fn new(schema: Arc<Schema>, graph: Arc<SemanticGraph>) -> Self {
        Self {
            schema,
            graph,
            stats: Arc::new(ResolverStats::default()),
        }
    }

    /// Canonical IRI for a key, without touching the graph.
    pub fn canonical_iri(&self, key: &NaturalKey) -> Result<String, SchemaError> {
        let class = self.schema.class(key.class())?;
        Ok(format!("{}/{}", class.iri, iri_escape(key.code())))
    }

    /// Return the node for `key`, creating exactly one if none exists yet.
    pub fn resolve(&self, key: &NaturalKey) -> Result<Resolution, SchemaError> {
        let iri = self.canonical_iri(key)?;
        let (node, created) = self.graph.get_or_insert_node(&iri, key.class())?;
        if created {
            self.stats.created.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(%iri, class = key.class(), "created node");
        } else {
            self.stats.reused.fetch_add(1, Ordering::Relaxed);
        }
        Ok(Resolution { node, created })
    }

    /// Look up the node for `key` without creating it.
    pub fn find(&self, key: &NaturalKey) -> Result<Option<NodeId>, SchemaError> {
        Ok(self.graph.lookup(&self.canonical_iri(key)?))
    }

    pub fn stats(&self) -> &ResolverStats {
        &self.stats
    }
}

impl std::fmt::Debug for EntityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityResolver")
            .field("created", &self.stats.created())
            .field("reused", &self.stats.reused())
            .finish()
    }
}

/// Escape a natural key for use as an IRI path segment (RFC 3987).
fn iri_escape(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '.' | '_' | '~' => result.push(c),
            '!' | '$' | '&' | '\'' | '(' | ')' | '*' | '+' | ',' | ';' | '=' | ':' | '@' => {
                result.push(c)
            }
            _ => {
                let mut buf = [0u8; 4];
                for byte in c.encode_utf8(&mut buf).as_bytes() {
                    result.push_str(&format!("%{byte:02X}"));
                }
            }
        }
    }
    result
}
