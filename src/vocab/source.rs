//! Vocabulary sources: where code-list terms come from.
//!
//! - [`SkosHttpSource`]: GET `base_url + code_list`, parse the SKOS document
//! - [`SkosFileSource`]: read `dir/code_list.<ext>`, parse the SKOS document
//! - [`StaticVocabularySource`]: in-memory term sets for seeding and tests

use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use oxigraph::io::{RdfFormat, RdfParser};
use oxigraph::model::Term;

use crate::config::{RdfSyntax, VocabularyConfig, VocabularySourceKind};
use crate::error::VocabularyError;

const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
const SKOS_CONCEPT: &str = "http://www.w3.org/2004/02/skos/core#Concept";
const SKOS_NOTATION: &str = "http://www.w3.org/2004/02/skos/core#notation";
const SKOS_PREF_LABEL: &str = "http://www.w3.org/2004/02/skos/core#prefLabel";
const SKOS_BROADER: &str = "http://www.w3.org/2004/02/skos/core#broader";

/// One term as returned by a vocabulary source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabularyEntry {
    /// Term identifier within its code list.
    pub code: String,
    /// Preferred label.
    pub label: String,
    /// Identifier of the parent term, if the list is hierarchical.
    pub parent: Option<String>,
}

impl VocabularyEntry {
    pub fn new(code: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            label: label.into(),
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }
}

/// A provider of complete code-list term sets.
pub trait VocabularySource {
    /// Fetch every term of `code_list`. Blocking.
    fn fetch(&self, code_list: &str) -> Result<Vec<VocabularyEntry>, VocabularyError>;
}

/// Build the source selected by `[vocabulary]`.
pub fn from_config(config: &VocabularyConfig) -> Result<Box<dyn VocabularySource>, VocabularyError> {
    match config.source {
        VocabularySourceKind::Http => Ok(Box::new(SkosHttpSource::new(
            config.base_url.clone(),
            config.format,
            Duration::from_secs(config.timeout_secs),
        ))),
        VocabularySourceKind::Files => {
            let dir = config.dir.clone().ok_or_else(|| VocabularyError::Fetch {
                code_list: "*".into(),
                location: "[vocabulary] dir".into(),
                message: "`source = \"files\"` requires `dir`".into(),
            })?;
            Ok(Box::new(SkosFileSource::new(dir, config.format)))
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

/// Fetches SKOS collections over HTTP.
pub struct SkosHttpSource {
    base_url: String,
    syntax: RdfSyntax,
    agent: ureq::Agent,
}

impl SkosHttpSource {
    pub fn new(base_url: impl Into<String>, syntax: RdfSyntax, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            syntax,
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl VocabularySource for SkosHttpSource {
    fn fetch(&self, code_list: &str) -> Result<Vec<VocabularyEntry>, VocabularyError> {
        let url = format!("{}{code_list}", self.base_url);
        tracing::debug!(%url, "fetching code list");

        let response = self
            .agent
            .get(&url)
            .set("Accept", rdf_format(self.syntax).media_type())
            .call()
            .map_err(|e| {
                let message = match e {
                    ureq::Error::Status(code, _) => format!("HTTP error {code}"),
                    ureq::Error::Transport(transport) => transport.to_string(),
                };
                VocabularyError::Fetch {
                    code_list: code_list.to_string(),
                    location: url.clone(),
                    message,
                }
            })?;

        parse_skos(response.into_reader(), self.syntax, code_list)
    }
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// Reads SKOS collections from `dir/<code_list>.<ext>`.
pub struct SkosFileSource {
    dir: PathBuf,
    syntax: RdfSyntax,
}

impl SkosFileSource {
    pub fn new(dir: impl Into<PathBuf>, syntax: RdfSyntax) -> Self {
        Self {
            dir: dir.into(),
            syntax,
        }
    }
}

impl VocabularySource for SkosFileSource {
    fn fetch(&self, code_list: &str) -> Result<Vec<VocabularyEntry>, VocabularyError> {
        let path = self
            .dir
            .join(format!("{code_list}.{}", self.syntax.extension()));
        let file = std::fs::File::open(&path).map_err(|e| VocabularyError::Fetch {
            code_list: code_list.to_string(),
            location: path.display().to_string(),
            message: e.to_string(),
        })?;
        parse_skos(std::io::BufReader::new(file), self.syntax, code_list)
    }
}

// ---------------------------------------------------------------------------
// Static
// ---------------------------------------------------------------------------

/// In-memory term sets; counts fetches so callers can observe caching.
#[derive(Debug, Default)]
pub struct StaticVocabularySource {
    lists: HashMap<String, Vec<VocabularyEntry>>,
    fetches: AtomicUsize,
}

impl StaticVocabularySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the full term set of a code list.
    pub fn with_list(mut self, code_list: impl Into<String>, entries: Vec<VocabularyEntry>) -> Self {
        self.lists.insert(code_list.into(), entries);
        self
    }

    /// Number of `fetch` calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

impl VocabularySource for StaticVocabularySource {
    fn fetch(&self, code_list: &str) -> Result<Vec<VocabularyEntry>, VocabularyError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        self.lists
            .get(code_list)
            .cloned()
            .ok_or_else(|| VocabularyError::Fetch {
                code_list: code_list.to_string(),
                location: "static".into(),
                message: "no such code list".into(),
            })
    }
}

impl<S: VocabularySource + ?Sized> VocabularySource for std::sync::Arc<S> {
    fn fetch(&self, code_list: &str) -> Result<Vec<VocabularyEntry>, VocabularyError> {
        (**self).fetch(code_list)
    }
}

// ---------------------------------------------------------------------------
// SKOS parsing
// ---------------------------------------------------------------------------

fn rdf_format(syntax: RdfSyntax) -> RdfFormat {
    match syntax {
        RdfSyntax::RdfXml => RdfFormat::RdfXml,
        RdfSyntax::Turtle => RdfFormat::Turtle,
        RdfSyntax::NTriples => RdfFormat::NTriples,
    }
}

#[derive(Default)]
struct PendingConcept {
    typed: bool,
    notation: Option<String>,
    label: Option<(String, bool)>,
    broader: Option<String>,
}

/// Extract `(code, label, parent)` entries from a SKOS document.
///
/// A term's code is its `skos:notation`, falling back to the last IRI
/// segment. English or untagged labels win over other languages. Entries
/// are returned in IRI order.
pub fn parse_skos(
    reader: impl Read,
    syntax: RdfSyntax,
    code_list: &str,
) -> Result<Vec<VocabularyEntry>, VocabularyError> {
    let mut concepts: BTreeMap<String, PendingConcept> = BTreeMap::new();

    for quad in RdfParser::from_format(rdf_format(syntax)).for_reader(reader) {
        let quad = quad.map_err(|e| VocabularyError::Parse {
            code_list: code_list.to_string(),
            message: e.to_string(),
        })?;
        let subject = quad
            .subject
            .to_string()
            .trim_start_matches('<')
            .trim_end_matches('>')
            .to_string();
        let pending = concepts.entry(subject).or_default();

        match (quad.predicate.as_str(), &quad.object) {
            (RDF_TYPE, Term::NamedNode(n)) if n.as_str() == SKOS_CONCEPT => pending.typed = true,
            (SKOS_NOTATION, Term::Literal(l)) => pending.notation = Some(l.value().to_string()),
            (SKOS_PREF_LABEL, Term::Literal(l)) => {
                let preferred = matches!(l.language(), None | Some("en"));
                let replace = match &pending.label {
                    None => true,
                    Some((_, current_preferred)) => preferred && !current_preferred,
                };
                if replace {
                    pending.label = Some((l.value().to_string(), preferred));
                }
            }
            (SKOS_BROADER, Term::NamedNode(n)) => {
                pending.broader.get_or_insert_with(|| n.as_str().to_string());
            }
            _ => {}
        }
    }

    let code_of = |iri: &str, pending: Option<&PendingConcept>| -> String {
        pending
            .and_then(|p| p.notation.clone())
            .unwrap_or_else(|| last_segment(iri).to_string())
    };

    let entries = concepts
        .iter()
        .filter(|(_, p)| p.typed || p.notation.is_some())
        .map(|(iri, p)| {
            let code = code_of(iri, Some(p));
            let label = p
                .label
                .as_ref()
                .map(|(l, _)| l.clone())
                .unwrap_or_else(|| code.clone());
            VocabularyEntry {
                code,
                label,
                parent: p
                    .broader
                    .as_deref()
                    .map(|b| code_of(b, concepts.get(b))),
            }
        })
        .collect();

    Ok(entries)
}

fn last_segment(iri: &str) -> &str {
    iri.rsplit(['/', '#']).next().unwrap_or(iri)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPECIES_TTL: &str = r#"
        @prefix skos: <http://www.w3.org/2004/02/skos/core#> .
        @prefix c: <https://vocab.ices.dk/services/rdf/collection/SpecWoRMS/> .

        c:126436 a skos:Concept ;
            skos:notation "126436" ;
            skos:prefLabel "Gadus morhua (Linnaeus, 1758)" , "Kabeljau"@de .

        c:127023 a skos:Concept ;
            skos:prefLabel "Cabeza"@es , "Scomber scombrus (Linnaeus, 1758)"@en ;
            skos:broader c:125530 .

        c:125530 a skos:Concept ;
            skos:prefLabel "Scombridae" .
    "#;

    #[test]
    fn parses_concepts_from_turtle() {
        let entries = parse_skos(SPECIES_TTL.as_bytes(), RdfSyntax::Turtle, "SpecWoRMS").unwrap();
        assert_eq!(entries.len(), 3);

        let cod = entries.iter().find(|e| e.code == "126436").unwrap();
        assert_eq!(cod.label, "Gadus morhua (Linnaeus, 1758)");
        assert_eq!(cod.parent, None);

        let mackerel = entries.iter().find(|e| e.code == "127023").unwrap();
        assert_eq!(mackerel.label, "Scomber scombrus (Linnaeus, 1758)");
        assert_eq!(mackerel.parent.as_deref(), Some("125530"));
    }

    #[test]
    fn malformed_document_is_parse_error() {
        let err = parse_skos("not turtle at all <".as_bytes(), RdfSyntax::Turtle, "IC_Species")
            .unwrap_err();
        assert!(matches!(err, VocabularyError::Parse { .. }));
    }

    #[test]
    fn file_source_reads_by_code_list_name() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("SpecWoRMS.ttl"), SPECIES_TTL).unwrap();
        let source = SkosFileSource::new(dir.path(), RdfSyntax::Turtle);
        assert_eq!(source.fetch("SpecWoRMS").unwrap().len(), 3);
        assert!(matches!(
            source.fetch("IC_Species"),
            Err(VocabularyError::Fetch { .. })
        ));
    }

    #[test]
    fn static_source_counts_fetches() {
        let source = StaticVocabularySource::new()
            .with_list("IC_Species", vec![VocabularyEntry::new("COD", "Gadus morhua")]);
        assert_eq!(source.fetch("IC_Species").unwrap().len(), 1);
        assert!(source.fetch("IC_GearType").is_err());
        assert_eq!(source.fetch_count(), 2);
    }

    #[test]
    fn files_source_requires_dir() {
        let config = VocabularyConfig {
            source: VocabularySourceKind::Files,
            ..Default::default()
        };
        assert!(from_config(&config).is_err());
    }

    #[test]
    fn last_segment_handles_hash_and_slash() {
        assert_eq!(last_segment("http://example.org/a/b"), "b");
        assert_eq!(last_segment("http://example.org/ns#c"), "c");
    }
}
