//! TOML configuration for a semfish run.
//!
//! The configuration is read once by the binary. The schema, mapping table and
//! code lists are compiled into an immutable [`Schema`](crate::schema::Schema);
//! the `[source]` table is handed unparsed to the row source.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::literal::LiteralKind;

/// Root of `semfish.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemfishConfig {
    /// Extra namespace prefixes (prefix → base IRI).
    #[serde(default)]
    pub namespaces: BTreeMap<String, String>,
    #[serde(default)]
    pub coercion: CoercionConfig,
    #[serde(default)]
    pub classes: Vec<ClassConfig>,
    #[serde(default)]
    pub relations: Vec<RelationConfig>,
    pub mapping: MappingConfig,
    #[serde(default)]
    pub code_lists: Vec<CodeListConfig>,
    #[serde(default)]
    pub vocabulary: VocabularyConfig,
    /// Opaque settings for the row source.
    #[serde(default)]
    pub source: BTreeMap<String, String>,
    /// Named SPARQL reports run after a successful validation gate.
    #[serde(default)]
    pub queries: Vec<NamedQuery>,
}

impl SemfishConfig {
    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content, &path.display().to_string())
    }

    /// Parse configuration text; `origin` names it in error messages.
    pub fn from_toml_str(content: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoercionConfig {
    /// Offset applied to date-time literals, in minutes east of UTC.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassConfig {
    pub name: String,
    /// Namespace prefix the class IRI is built from.
    pub namespace: String,
    /// Local name override; defaults to `name`.
    #[serde(default)]
    pub local: Option<String>,
    /// Whether instances are controlled-vocabulary concepts.
    #[serde(default)]
    pub concept: bool,
    /// Relations every instance must carry.
    #[serde(default)]
    pub required: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationConfig {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub local: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    pub range: RangeConfig,
    #[serde(default)]
    pub single_valued: bool,
}

/// `range = { class = "Species" }`, `range = { literal = "decimal" }` or `range = "concept"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RangeConfig {
    Class(String),
    Literal(LiteralKind),
    Concept,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingConfig {
    pub subject_class: String,
    pub subject_key: String,
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    pub field: String,
    pub relation: String,
    /// Target class override, required when the relation's range is `concept`.
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub companions: Vec<CompanionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanionConfig {
    pub relation: String,
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeListConfig {
    pub name: String,
    pub class: String,
    /// Enables normalized comparison keys: label up to this character, lower-cased.
    #[serde(default)]
    pub label_separator: Option<char>,
}

/// Which vocabulary source adapter to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VocabularySourceKind {
    #[default]
    Http,
    Files,
}

/// RDF syntax of vocabulary documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RdfSyntax {
    #[default]
    RdfXml,
    Turtle,
    NTriples,
}

impl RdfSyntax {
    /// Conventional file extension.
    pub fn extension(self) -> &'static str {
        match self {
            Self::RdfXml => "rdf",
            Self::Turtle => "ttl",
            Self::NTriples => "nt",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabularyConfig {
    #[serde(default)]
    pub source: VocabularySourceKind,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default)]
    pub format: RdfSyntax,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://vocab.ices.dk/services/rdf/collection/".into()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self {
            source: VocabularySourceKind::default(),
            base_url: default_base_url(),
            dir: None,
            format: RdfSyntax::default(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedQuery {
    pub name: String,
    pub sparql: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = include_str!("../config/semfish.toml");

    #[test]
    fn bundled_config_parses() {
        let config = SemfishConfig::from_toml_str(SAMPLE, "semfish.toml").unwrap();
        assert_eq!(config.mapping.subject_class, "Sample");
        assert_eq!(config.mapping.subject_key, "SampleID");
        assert!(config.classes.iter().any(|c| c.name == "Species"));
        assert!(!config.queries.is_empty());
    }

    #[test]
    fn range_variants_deserialize() {
        let toml = r#"
            [mapping]
            subject_class = "Sample"
            subject_key = "SampleID"

            [[relations]]
            name = "hasSpecies"
            namespace = "ak"
            range = { class = "Species" }

            [[relations]]
            name = "hasMeasurement"
            namespace = "ak"
            range = { literal = "decimal" }
            single_valued = true

            [[relations]]
            name = "inList"
            namespace = "ak"
            range = "concept"
        "#;
        let config = SemfishConfig::from_toml_str(toml, "inline").unwrap();
        assert_eq!(config.relations[0].range, RangeConfig::Class("Species".into()));
        assert_eq!(
            config.relations[1].range,
            RangeConfig::Literal(LiteralKind::Decimal)
        );
        assert!(config.relations[1].single_valued);
        assert_eq!(config.relations[2].range, RangeConfig::Concept);
    }

    #[test]
    fn defaults_fill_optional_sections() {
        let toml = r#"
            [mapping]
            subject_class = "Sample"
            subject_key = "SampleID"
        "#;
        let config = SemfishConfig::from_toml_str(toml, "inline").unwrap();
        assert_eq!(config.coercion.utc_offset_minutes, 0);
        assert_eq!(config.vocabulary.source, VocabularySourceKind::Http);
        assert_eq!(config.vocabulary.timeout_secs, 30);
        assert!(config.source.is_empty());
    }

    #[test]
    fn syntax_error_names_origin() {
        let err = SemfishConfig::from_toml_str("[mapping", "broken.toml").unwrap_err();
        assert!(format!("{err}").contains("broken.toml"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = SemfishConfig::load(Path::new("/nonexistent/semfish.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
