//! Read queries over the loaded graph.
//!
//! Queries are written against the configured prefixes without declaring
//! them: the executor prepends the namespace registry's `PREFIX` prologue.

use serde::Serialize;

use crate::config::NamedQuery;
use crate::graph::sparql::{GraphResult, QueryRows, SparqlStore};
use crate::namespace::NamespaceRegistry;

/// Submits SPARQL to a [`SparqlStore`].
#[derive(Debug)]
pub struct QueryExecutor<'a> {
    store: &'a SparqlStore,
    prologue: String,
}

/// Collected result of a named report.
#[derive(Debug, Clone, Serialize)]
pub struct QueryReport {
    pub name: String,
    pub variables: Vec<String>,
    pub rows: Vec<Vec<(String, String)>>,
}

impl std::fmt::Display for QueryReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "== {} ({} rows)", self.name, self.rows.len())?;
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(|(k, v)| format!("?{k}={v}")).collect();
            writeln!(f, "  {}", cells.join("  "))?;
        }
        Ok(())
    }
}

impl<'a> QueryExecutor<'a> {
    pub fn new(store: &'a SparqlStore, namespaces: &NamespaceRegistry) -> Self {
        Self {
            store,
            prologue: namespaces.sparql_prologue(),
        }
    }

    fn prefixed(&self, sparql: &str) -> String {
        format!("{}{sparql}", self.prologue)
    }

    /// Run a SELECT query; bindings are produced lazily, one pass.
    pub fn select(&self, sparql: &str) -> GraphResult<QueryRows<'a>> {
        tracing::debug!(sparql, "running query");
        self.store.select(&self.prefixed(sparql))
    }

    /// Run an ASK query.
    pub fn ask(&self, sparql: &str) -> GraphResult<bool> {
        self.store.ask(&self.prefixed(sparql))
    }

    /// Run a configured report and collect its rows.
    pub fn run_named(&self, query: &NamedQuery) -> GraphResult<QueryReport> {
        let rows = self.select(&query.sparql)?;
        let variables = rows.variables().to_vec();
        let rows = rows
            .map(|binding| {
                binding.map(|b| {
                    b.iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect()
                })
            })
            .collect::<GraphResult<Vec<Vec<_>>>>()?;
        tracing::info!(query = %query.name, rows = rows.len(), "report complete");
        Ok(QueryReport {
            name: query.name.clone(),
            variables,
            rows,
        })
    }
}
