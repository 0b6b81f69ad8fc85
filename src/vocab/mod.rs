//! Controlled vocabularies: code-list terms materialized as concept nodes.
//!
//! The [`VocabularyCache`] fetches each configured code list from a
//! [`VocabularySource`] at most once per run, creates one node per term through
//! the [`EntityResolver`], and attaches the SKOS label/notation/hierarchy edges.

pub mod source;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::{SchemaError, VocabularyError};
use crate::graph::{Edge, NodeId, SemanticGraph};
use crate::literal::TypedLiteral;
use crate::resolve::{EntityResolver, NaturalKey};
use crate::schema::{Schema, vocab_relations};

pub use source::{
    SkosFileSource, SkosHttpSource, StaticVocabularySource, VocabularyEntry, VocabularySource,
};

/// A loaded code-list term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlledVocabularyTerm {
    pub node: NodeId,
    pub code: String,
    pub label: String,
    pub parent: Option<String>,
    /// Derived comparison key, for code lists with a label separator.
    pub normalized_key: Option<String>,
}

/// Result of an [`VocabularyCache::ensure_loaded`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadOutcome {
    /// Terms in the code list.
    pub terms: usize,
    /// Nodes created by this call.
    pub created: usize,
    /// Whether this call hit the vocabulary source.
    pub fetched: bool,
}

/// Per-run cache of loaded code lists.
pub struct VocabularyCache {
    schema: Arc<Schema>,
    graph: Arc<SemanticGraph>,
    resolver: EntityResolver,
    source: Box<dyn VocabularySource>,
    loaded: HashMap<String, Vec<ControlledVocabularyTerm>>,
}

impl VocabularyCache {
    pub fn new(
        schema: Arc<Schema>,
        graph: Arc<SemanticGraph>,
        resolver: EntityResolver,
        source: Box<dyn VocabularySource>,
    ) -> Self {
        Self {
            schema,
            graph,
            resolver,
            source,
            loaded: HashMap::new(),
        }
    }

    /// Load `code_list` into the graph unless it already is.
    ///
    /// Every entry is checked before the first node is created, so a failed
    /// load leaves no trace of the list in the graph.
    pub fn ensure_loaded(&mut self, code_list: &str) -> Result<LoadOutcome, VocabularyError> {
        if let Some(terms) = self.loaded.get(code_list) {
            return Ok(LoadOutcome {
                terms: terms.len(),
                created: 0,
                fetched: false,
            });
        }

        let def = self
            .schema
            .code_list(code_list)
            .ok_or_else(|| VocabularyError::UnknownCodeList {
                code_list: code_list.to_string(),
            })?
            .clone();

        let entries = self.source.fetch(code_list)?;
        tracing::debug!(code_list, entries = entries.len(), "fetched vocabulary");

        let mut seen = HashSet::new();
        let mut keyed = Vec::with_capacity(entries.len());
        for entry in &entries {
            let key = NaturalKey::new(def.class.as_str(), &entry.code).ok_or_else(|| {
                VocabularyError::MalformedTerm {
                    code_list: code_list.to_string(),
                    label: entry.label.clone(),
                }
            })?;
            if !seen.insert(key.code().to_string()) {
                tracing::warn!(code_list, code = key.code(), "duplicate term, keeping the first");
                continue;
            }
            let iri = self.resolver.canonical_iri(&key)?;
            if let Some(existing) = self.graph.lookup(&iri).and_then(|id| self.graph.node(id)) {
                if existing.class != key.class() {
                    return Err(SchemaError::ClassConflict {
                        iri,
                        existing: existing.class,
                        requested: key.class().to_string(),
                    }
                    .into());
                }
            }
            keyed.push((key, entry));
        }

        let single = |name: &str| -> Result<bool, VocabularyError> {
            Ok(self.schema.relation(name)?.single_valued)
        };
        let notation_single = single(vocab_relations::NOTATION)?;
        let label_single = single(vocab_relations::PREF_LABEL)?;
        let hidden_single = single(vocab_relations::HIDDEN_LABEL)?;
        let broader_single = single(vocab_relations::BROADER)?;

        let mut created = 0;
        let mut terms = Vec::with_capacity(keyed.len());
        let mut by_code: HashMap<String, NodeId> = HashMap::with_capacity(keyed.len());

        for (key, entry) in &keyed {
            let res = self.resolver.resolve(key)?;
            if res.created {
                created += 1;
            }
            let label = entry.label.trim().to_string();
            self.graph.attach(
                Edge::new(
                    res.node,
                    vocab_relations::NOTATION,
                    TypedLiteral::String(key.code().to_string()),
                ),
                notation_single,
            );
            self.graph.attach(
                Edge::new(
                    res.node,
                    vocab_relations::PREF_LABEL,
                    TypedLiteral::String(label.clone()),
                ),
                label_single,
            );

            let normalized_key = def.normalization.map(|n| n.normalize(&label));
            if let Some(hidden) = &normalized_key {
                self.graph.attach(
                    Edge::new(
                        res.node,
                        vocab_relations::HIDDEN_LABEL,
                        TypedLiteral::String(hidden.clone()),
                    ),
                    hidden_single,
                );
            }

            by_code.insert(key.code().to_string(), res.node);
            terms.push(ControlledVocabularyTerm {
                node: res.node,
                code: key.code().to_string(),
                label,
                parent: entry
                    .parent
                    .as_deref()
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string),
                normalized_key,
            });
        }

        for term in &terms {
            let Some(parent) = &term.parent else { continue };
            match by_code.get(parent) {
                Some(parent_node) if *parent_node != term.node => {
                    self.graph.attach(
                        Edge::new(term.node, vocab_relations::BROADER, *parent_node),
                        broader_single,
                    );
                }
                Some(_) => {}
                None => tracing::warn!(
                    code_list,
                    code = %term.code,
                    %parent,
                    "parent term not in code list, skipping broader link"
                ),
            }
        }

        tracing::info!(code_list, terms = terms.len(), created, "loaded code list");
        let outcome = LoadOutcome {
            terms: terms.len(),
            created,
            fetched: true,
        };
        self.loaded.insert(code_list.to_string(), terms);
        Ok(outcome)
    }

    /// Load every configured code list, in name order.
    pub fn load_all(&mut self) -> Result<LoadOutcome, VocabularyError> {
        let names: Vec<String> = self.schema.code_lists().map(|c| c.name.clone()).collect();
        let mut total = LoadOutcome::default();
        for name in names {
            let outcome = self.ensure_loaded(&name)?;
            total.terms += outcome.terms;
            total.created += outcome.created;
            total.fetched |= outcome.fetched;
        }
        Ok(total)
    }

    /// Iterate over the terms of a loaded code list.
    ///
    /// Each call starts a fresh pass.
    pub fn all_terms(
        &self,
        code_list: &str,
    ) -> Result<std::slice::Iter<'_, ControlledVocabularyTerm>, VocabularyError> {
        self.loaded
            .get(code_list)
            .map(|terms| terms.iter())
            .ok_or_else(|| VocabularyError::NotLoaded {
                code_list: code_list.to_string(),
            })
    }

    pub fn is_loaded(&self, code_list: &str) -> bool {
        self.loaded.contains_key(code_list)
    }

    /// Find a term by its code.
    pub fn find_by_code(&self, code_list: &str, code: &str) -> Option<&ControlledVocabularyTerm> {
        let code = code.trim();
        self.loaded.get(code_list)?.iter().find(|t| t.code == code)
    }

    /// Find a term whose normalized key matches `text` normalized the same way.
    ///
    /// `None` for code lists without a label separator.
    pub fn find_by_normalized_key(
        &self,
        code_list: &str,
        text: &str,
    ) -> Option<&ControlledVocabularyTerm> {
        let normalization = self.schema.code_list(code_list)?.normalization?;
        let wanted = normalization.normalize(text);
        if wanted.is_empty() {
            return None;
        }
        self.loaded
            .get(code_list)?
            .iter()
            .find(|t| t.normalized_key.as_deref() == Some(wanted.as_str()))
    }
}

impl std::fmt::Debug for VocabularyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut loaded: Vec<_> = self.loaded.keys().collect();
        loaded.sort();
        f.debug_struct("VocabularyCache")
            .field("loaded", &loaded)
            .finish()
    }
}
