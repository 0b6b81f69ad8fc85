//! Namespace registry: short prefixes → base IRIs.
//!
//! Built once from configuration and never mutated afterwards. Well-known
//! vocabularies (`rdf`, `rdfs`, `xsd`, `owl`, `skos`) are always present;
//! configuration may add prefixes but not rebind these.

use std::collections::BTreeMap;

use crate::error::SchemaError;

/// Well-known prefixes every registry starts with.
pub const WELL_KNOWN: &[(&str, &str)] = &[
    ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
    ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
    ("xsd", "http://www.w3.org/2001/XMLSchema#"),
    ("owl", "http://www.w3.org/2002/07/owl#"),
    ("skos", "http://www.w3.org/2004/02/skos/core#"),
];

/// Immutable prefix → base IRI table.
#[derive(Debug, Clone)]
pub struct NamespaceRegistry {
    prefixes: BTreeMap<String, String>,
}

impl NamespaceRegistry {
    /// Registry holding only the well-known prefixes.
    pub fn well_known() -> Self {
        Self {
            prefixes: WELL_KNOWN
                .iter()
                .map(|(p, iri)| (p.to_string(), iri.to_string()))
                .collect(),
        }
    }

    /// Registry with the well-known prefixes plus `extra`.
    pub fn with_prefixes<'a>(
        extra: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, SchemaError> {
        let mut registry = Self::well_known();
        for (prefix, base) in extra {
            if !base.contains("://") && !base.starts_with("urn:") {
                return Err(SchemaError::InvalidIri {
                    iri: base.to_string(),
                    message: format!("base for prefix \"{prefix}\" is not absolute"),
                });
            }
            if WELL_KNOWN.iter().any(|(p, iri)| *p == prefix && *iri != base) {
                return Err(SchemaError::Duplicate {
                    what: "namespace",
                    name: prefix.to_string(),
                });
            }
            registry.prefixes.insert(prefix.to_string(), base.to_string());
        }
        Ok(registry)
    }

    /// Base IRI for a prefix.
    pub fn base(&self, prefix: &str) -> Result<&str, SchemaError> {
        self.prefixes
            .get(prefix)
            .map(String::as_str)
            .ok_or_else(|| SchemaError::UnknownNamespace {
                prefix: prefix.to_string(),
            })
    }

    /// `prefix` + `local` as a full IRI.
    pub fn expand(&self, prefix: &str, local: &str) -> Result<String, SchemaError> {
        Ok(format!("{}{local}", self.base(prefix)?))
    }

    /// Shorten an IRI to `prefix:local` using the longest matching base.
    pub fn compact(&self, iri: &str) -> String {
        self.prefixes
            .iter()
            .filter(|(_, base)| iri.starts_with(base.as_str()))
            .max_by_key(|(_, base)| base.len())
            .map(|(prefix, base)| format!("{prefix}:{}", &iri[base.len()..]))
            .unwrap_or_else(|| format!("<{iri}>"))
    }

    /// SPARQL `PREFIX` declarations for every registered namespace.
    pub fn sparql_prologue(&self) -> String {
        self.prefixes
            .iter()
            .map(|(prefix, base)| format!("PREFIX {prefix}: <{base}>\n"))
            .collect()
    }

    /// Iterate over `(prefix, base)` pairs in prefix order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes.iter().map(|(p, b)| (p.as_str(), b.as_str()))
    }
}

impl Default for NamespaceRegistry {
    fn default() -> Self {
        Self::well_known()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AK: &str = "http://www.semanticweb.org/akennedy/ontologies/2019/9/untitled-ontology-16#";

    #[test]
    fn expands_configured_prefix() {
        let ns = NamespaceRegistry::with_prefixes([("ak", AK)]).unwrap();
        assert_eq!(ns.expand("ak", "Sample").unwrap(), format!("{AK}Sample"));
    }

    #[test]
    fn unknown_prefix_is_schema_error() {
        let ns = NamespaceRegistry::well_known();
        assert!(matches!(
            ns.expand("dbo", "Fish"),
            Err(SchemaError::UnknownNamespace { .. })
        ));
    }

    #[test]
    fn well_known_prefixes_cannot_be_rebound() {
        let err = NamespaceRegistry::with_prefixes([("skos", "http://example.org/skos#")]);
        assert!(err.is_err());
    }

    #[test]
    fn relative_base_rejected() {
        assert!(NamespaceRegistry::with_prefixes([("ak", "ontology#")]).is_err());
    }

    #[test]
    fn compact_prefers_longest_base() {
        let ns = NamespaceRegistry::with_prefixes([
            ("ices", "https://vocab.ices.dk/services/rdf/collection/"),
            ("species", "https://vocab.ices.dk/services/rdf/collection/IC_Species/"),
        ])
        .unwrap();
        assert_eq!(
            ns.compact("https://vocab.ices.dk/services/rdf/collection/IC_Species/COD"),
            "species:COD"
        );
        assert_eq!(ns.compact("http://example.org/x"), "<http://example.org/x>");
    }

    #[test]
    fn prologue_declares_every_prefix() {
        let ns = NamespaceRegistry::with_prefixes([("ak", AK)]).unwrap();
        let prologue = ns.sparql_prologue();
        assert!(prologue.contains(&format!("PREFIX ak: <{AK}>")));
        assert!(prologue.contains("PREFIX skos: <http://www.w3.org/2004/02/skos/core#>"));
    }
}
