//! SPARQL RDF store backed by oxigraph.
//!
//! The validated [`SemanticGraph`] is loaded into this store once per run;
//! queries and export read from here, never from the in-memory graph.

use std::io::Write;
use std::str::FromStr;

use oxigraph::io::{RdfFormat, RdfSerializer};
use oxigraph::model::{GraphNameRef, Literal, NamedNode, Quad, Term};
use oxigraph::sparql::QueryResults;
use oxigraph::store::Store;

use crate::error::GraphError;
use crate::literal::TypedLiteral;
use crate::namespace::NamespaceRegistry;
use crate::schema::Schema;

use super::{Object, SemanticGraph};

/// Result type for graph operations.
pub type GraphResult<T> = std::result::Result<T, GraphError>;

const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// RDF syntaxes the store can export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Turtle,
    NTriples,
    RdfXml,
}

impl ExportFormat {
    fn rdf_format(self) -> RdfFormat {
        match self {
            Self::Turtle => RdfFormat::Turtle,
            Self::NTriples => RdfFormat::NTriples,
            Self::RdfXml => RdfFormat::RdfXml,
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "turtle" | "ttl" => Ok(Self::Turtle),
            "ntriples" | "n-triples" | "nt" => Ok(Self::NTriples),
            "rdfxml" | "rdf-xml" | "rdf" | "xml" => Ok(Self::RdfXml),
            other => Err(format!(
                "unknown export format \"{other}\" (expected turtle, ntriples or rdfxml)"
            )),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Turtle => write!(f, "turtle"),
            Self::NTriples => write!(f, "ntriples"),
            Self::RdfXml => write!(f, "rdfxml"),
        }
    }
}

/// One solution row: variable → rendered value, in projection order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    values: Vec<(String, String)>,
}

impl Binding {
    /// Rendered value bound to `variable`, if any.
    pub fn get(&self, variable: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(v, _)| v == variable)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl std::fmt::Display for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, (var, value)) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, "  ")?;
            }
            write!(f, "?{var}={value}")?;
        }
        Ok(())
    }
}

/// Lazy, one-pass stream of SELECT solutions.
pub struct QueryRows<'a> {
    variables: Vec<String>,
    inner: Box<dyn Iterator<Item = GraphResult<Binding>> + 'a>,
}

impl QueryRows<'_> {
    /// Projected variable names.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }
}

impl Iterator for QueryRows<'_> {
    type Item = GraphResult<Binding>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl std::fmt::Debug for QueryRows<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryRows")
            .field("variables", &self.variables)
            .finish_non_exhaustive()
    }
}

/// SPARQL-capable RDF store.
pub struct SparqlStore {
    store: Store,
}

impl SparqlStore {
    /// Create a new in-memory SPARQL store (no persistence).
    pub fn in_memory() -> GraphResult<Self> {
        let store = Store::new().map_err(|e| GraphError::Store {
            message: format!("failed to create oxigraph store: {e}"),
        })?;
        Ok(Self { store })
    }

    /// Open or create a persistent SPARQL store at the given path.
    pub fn open(path: &std::path::Path) -> GraphResult<Self> {
        std::fs::create_dir_all(path).map_err(|e| GraphError::Store {
            message: format!("failed to create oxigraph directory: {e}"),
        })?;
        let store = Store::open(path).map_err(|e| GraphError::Store {
            message: format!("failed to open oxigraph store at {}: {e}", path.display()),
        })?;
        Ok(Self { store })
    }

    /// Insert every node (as `rdf:type`) and edge of `graph`.
    ///
    /// Returns the number of quads written.
    pub fn load(&self, graph: &SemanticGraph, schema: &Schema) -> GraphResult<usize> {
        let rdf_type = named(RDF_TYPE)?;
        let mut written = 0;

        for node in graph.nodes() {
            let class = schema.class(&node.class).map_err(store_error)?;
            self.insert(Quad::new(
                named(&node.iri)?,
                rdf_type.clone(),
                named(&class.iri)?,
                GraphNameRef::DefaultGraph,
            ))?;
            written += 1;

            for edge in graph.edges_from(node.id) {
                let relation = schema.relation(&edge.relation).map_err(store_error)?;
                let object: Term = match &edge.object {
                    Object::Node(id) => {
                        let target = graph.node(*id).ok_or_else(|| GraphError::Store {
                            message: format!("edge from <{}> points at missing {id}", node.iri),
                        })?;
                        named(&target.iri)?.into()
                    }
                    Object::Literal(lit) => literal(lit)?.into(),
                };
                self.insert(Quad::new(
                    named(&node.iri)?,
                    named(&relation.iri)?,
                    object,
                    GraphNameRef::DefaultGraph,
                ))?;
                written += 1;
            }
        }

        tracing::info!(quads = written, "loaded graph into query store");
        Ok(written)
    }

    fn insert(&self, quad: Quad) -> GraphResult<()> {
        self.store.insert(&quad).map_err(|e| GraphError::Store {
            message: format!("insert failed: {e}"),
        })?;
        Ok(())
    }

    /// Execute a SPARQL SELECT query, streaming solutions.
    ///
    /// ASK results come back as one row binding `result`; CONSTRUCT and
    /// DESCRIBE are rejected.
    pub fn select(&self, sparql: &str) -> GraphResult<QueryRows<'_>> {
        let results = self.store.query(sparql).map_err(|e| GraphError::Sparql {
            message: format!("SPARQL query failed: {e}"),
        })?;

        match results {
            QueryResults::Solutions(solutions) => {
                let variables = solutions
                    .variables()
                    .iter()
                    .map(|v| v.as_str().to_string())
                    .collect();
                let inner = solutions.map(|solution| {
                    let solution = solution.map_err(|e| GraphError::Sparql {
                        message: format!("solution error: {e}"),
                    })?;
                    Ok(Binding {
                        values: solution
                            .iter()
                            .map(|(var, term)| (var.as_str().to_string(), render(term)))
                            .collect(),
                    })
                });
                Ok(QueryRows {
                    variables,
                    inner: Box::new(inner),
                })
            }
            QueryResults::Boolean(b) => Ok(QueryRows {
                variables: vec!["result".into()],
                inner: Box::new(std::iter::once(Ok(Binding {
                    values: vec![("result".into(), b.to_string())],
                }))),
            }),
            QueryResults::Graph(_) => Err(GraphError::Sparql {
                message: "CONSTRUCT/DESCRIBE queries are not supported".into(),
            }),
        }
    }

    /// Execute a SPARQL ASK query.
    pub fn ask(&self, sparql: &str) -> GraphResult<bool> {
        let results = self.store.query(sparql).map_err(|e| GraphError::Sparql {
            message: format!("SPARQL query failed: {e}"),
        })?;
        match results {
            QueryResults::Boolean(b) => Ok(b),
            _ => Err(GraphError::Sparql {
                message: "expected boolean result from ASK query".into(),
            }),
        }
    }

    /// Remove every quad.
    pub fn clear(&self) -> GraphResult<()> {
        self.store.clear().map_err(|e| GraphError::Store {
            message: format!("clear failed: {e}"),
        })
    }

    /// Number of quads in the store.
    pub fn len(&self) -> GraphResult<usize> {
        self.store.len().map_err(|e| GraphError::Store {
            message: format!("count failed: {e}"),
        })
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> GraphResult<bool> {
        self.len().map(|n| n == 0)
    }

    /// Serialize the default graph, declaring the registry's prefixes where
    /// the syntax supports them.
    pub fn dump<W: Write>(
        &self,
        format: ExportFormat,
        namespaces: &NamespaceRegistry,
        writer: W,
    ) -> GraphResult<W> {
        let mut serializer = RdfSerializer::from_format(format.rdf_format());
        if format != ExportFormat::NTriples {
            for (prefix, base) in namespaces.iter() {
                serializer = serializer
                    .with_prefix(prefix, base)
                    .map_err(|e| GraphError::Export {
                        message: format!("invalid prefix {prefix}: {e}"),
                    })?;
            }
        }
        let writer = self
            .store
            .dump_graph_to_writer(GraphNameRef::DefaultGraph, serializer, writer)
            .map_err(|e| GraphError::Export {
                message: e.to_string(),
            })?;
        tracing::info!(%format, "exported graph");
        Ok(writer)
    }
}

impl std::fmt::Debug for SparqlStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparqlStore").finish()
    }
}

fn named(iri: &str) -> GraphResult<NamedNode> {
    NamedNode::new(iri).map_err(|e| GraphError::Store {
        message: format!("invalid IRI <{iri}>: {e}"),
    })
}

fn literal(lit: &TypedLiteral) -> GraphResult<Literal> {
    Ok(match lit {
        TypedLiteral::String(s) => Literal::new_simple_literal(s.as_str()),
        other => Literal::new_typed_literal(other.lexical(), named(&other.kind().datatype_iri())?),
    })
}

fn store_error(e: crate::error::SchemaError) -> GraphError {
    GraphError::Store {
        message: e.to_string(),
    }
}

/// IRIs and literals render as their bare lexical value.
fn render(term: &Term) -> String {
    match term {
        Term::NamedNode(n) => n.as_str().to_string(),
        Term::Literal(l) => l.value().to_string(),
        Term::BlankNode(b) => format!("_:{}", b.as_str()),
        #[allow(unreachable_patterns)]
        other => other.to_string(),
    }
}
