//! Immutable schema: classes, relations, code lists and the record mapping table.
//!
//! A [`Schema`] is compiled once from [`SemfishConfig`] and shared by every
//! component through an `Arc`. Compilation checks every cross reference, so
//! later stages can only hit a [`SchemaError`] for names that did not come
//! from configuration.

use std::collections::{BTreeMap, HashMap};

use crate::config::{MappingConfig, RangeConfig, SemfishConfig};
use crate::error::SchemaError;
use crate::literal::LiteralKind;
use crate::namespace::NamespaceRegistry;

/// Relations every schema carries for vocabulary terms.
pub mod vocab_relations {
    /// The term's code within its code list.
    pub const NOTATION: &str = "skos:notation";
    /// Human-readable preferred label.
    pub const PREF_LABEL: &str = "skos:prefLabel";
    /// Normalized comparison key, for code lists that derive one.
    pub const HIDDEN_LABEL: &str = "skos:hiddenLabel";
    /// Parent term in the code-list hierarchy.
    pub const BROADER: &str = "skos:broader";
}

/// A declared class.
#[derive(Debug, Clone)]
pub struct ClassDef {
    pub name: String,
    pub iri: String,
    /// Instances are controlled-vocabulary concepts.
    pub concept: bool,
    /// Relations every instance must carry.
    pub required: Vec<String>,
}

/// What a relation may point at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Range {
    /// Nodes of exactly this class.
    Class(String),
    /// Nodes of any concept class.
    Concept,
    /// Literals of this kind.
    Literal(LiteralKind),
}

impl std::fmt::Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Class(c) => write!(f, "class {c}"),
            Self::Concept => write!(f, "a concept"),
            Self::Literal(k) => write!(f, "{k} literal"),
        }
    }
}

/// A declared relation.
#[derive(Debug, Clone)]
pub struct RelationDef {
    pub name: String,
    pub iri: String,
    /// Class subjects must belong to; `None` admits any subject.
    pub domain: Option<String>,
    pub range: Range,
    pub single_valued: bool,
}

/// Label → comparison key derivation for taxonomic code lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelNormalization {
    pub separator: char,
}

impl LabelNormalization {
    /// Cut at the first separator, trim, lower-case.
    pub fn normalize(&self, label: &str) -> String {
        let head = label.split(self.separator).next().unwrap_or_default();
        head.trim().to_lowercase()
    }
}

/// A configured controlled-vocabulary code list.
#[derive(Debug, Clone)]
pub struct CodeListDef {
    pub name: String,
    /// Concept class the terms are created as.
    pub class: String,
    pub normalization: Option<LabelNormalization>,
}

/// What a mapped field produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Resolve the raw value as a natural key of this class.
    Reference(String),
    /// Coerce the raw value to a literal of this kind.
    Literal(LiteralKind),
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reference(c) => write!(f, "class {c}"),
            Self::Literal(k) => write!(f, "{k} literal"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multiplicity {
    Single,
    Multi,
}

/// Constant reference attached alongside a field whenever the field yields a value.
#[derive(Debug, Clone)]
pub struct Companion {
    pub relation: String,
    pub class: String,
    pub key: String,
}

/// One row of the mapping table.
#[derive(Debug, Clone)]
pub struct FieldMapping {
    pub field: String,
    pub relation: String,
    pub target: Target,
    pub multiplicity: Multiplicity,
    pub companions: Vec<Companion>,
}

/// Declarative field → relation table for one kind of input row.
#[derive(Debug, Clone)]
pub struct RecordMapping {
    pub subject_class: String,
    pub subject_key: String,
    pub fields: Vec<FieldMapping>,
}

impl RecordMapping {
    /// Compile a mapping against `schema`, checking every relation and target.
    pub fn from_config(config: &MappingConfig, schema: &Schema) -> Result<Self, SchemaError> {
        schema.class(&config.subject_class)?;

        let mut fields = Vec::with_capacity(config.fields.len());
        for field in &config.fields {
            let relation = schema.relation(&field.relation)?;
            let target = match (&relation.range, &field.class) {
                (Range::Literal(kind), None) => Target::Literal(*kind),
                (Range::Class(class), None) => Target::Reference(class.clone()),
                (Range::Class(class), Some(over)) if class == over => {
                    Target::Reference(class.clone())
                }
                (Range::Concept, Some(over)) if schema.class(over)?.concept => {
                    Target::Reference(over.clone())
                }
                (range, over) => {
                    return Err(SchemaError::IncompatibleTarget {
                        field: field.field.clone(),
                        relation: field.relation.clone(),
                        target: over
                            .as_deref()
                            .map(|c| format!("class {c}"))
                            .unwrap_or_else(|| "no class".into()),
                        range: range.to_string(),
                    });
                }
            };

            let mut companions = Vec::with_capacity(field.companions.len());
            for companion in &field.companions {
                let rel = schema.relation(&companion.relation)?;
                let Range::Class(class) = &rel.range else {
                    return Err(SchemaError::IncompatibleTarget {
                        field: field.field.clone(),
                        relation: companion.relation.clone(),
                        target: format!("constant \"{}\"", companion.key),
                        range: rel.range.to_string(),
                    });
                };
                companions.push(Companion {
                    relation: companion.relation.clone(),
                    class: class.clone(),
                    key: companion.key.clone(),
                });
            }

            fields.push(FieldMapping {
                field: field.field.clone(),
                relation: field.relation.clone(),
                target,
                multiplicity: if relation.single_valued {
                    Multiplicity::Single
                } else {
                    Multiplicity::Multi
                },
                companions,
            });
        }

        Ok(Self {
            subject_class: config.subject_class.clone(),
            subject_key: config.subject_key.clone(),
            fields,
        })
    }
}

/// The compiled, immutable schema.
#[derive(Debug, Clone)]
pub struct Schema {
    namespaces: NamespaceRegistry,
    classes: HashMap<String, ClassDef>,
    relations: HashMap<String, RelationDef>,
    code_lists: BTreeMap<String, CodeListDef>,
}

impl Schema {
    /// Compile the schema sections of a configuration.
    pub fn from_config(config: &SemfishConfig) -> Result<Self, SchemaError> {
        let namespaces = NamespaceRegistry::with_prefixes(
            config
                .namespaces
                .iter()
                .map(|(p, b)| (p.as_str(), b.as_str())),
        )?;

        let mut classes = HashMap::new();
        for class in &config.classes {
            let iri = namespaces.expand(&class.namespace, class.local.as_deref().unwrap_or(&class.name))?;
            let def = ClassDef {
                name: class.name.clone(),
                iri,
                concept: class.concept,
                required: class.required.clone(),
            };
            if classes.contains_key(&class.name) {
                return Err(SchemaError::Duplicate {
                    what: "class",
                    name: class.name.clone(),
                });
            }
            if classes.values().any(|c: &ClassDef| c.iri == def.iri) {
                return Err(SchemaError::Duplicate {
                    what: "class IRI",
                    name: def.iri,
                });
            }
            classes.insert(class.name.clone(), def);
        }

        let mut relations = HashMap::new();
        for (name, local, range, single_valued) in [
            (vocab_relations::NOTATION, "notation", Range::Literal(LiteralKind::String), true),
            (vocab_relations::PREF_LABEL, "prefLabel", Range::Literal(LiteralKind::String), true),
            (vocab_relations::HIDDEN_LABEL, "hiddenLabel", Range::Literal(LiteralKind::String), true),
            (vocab_relations::BROADER, "broader", Range::Concept, false),
        ] {
            relations.insert(
                name.to_string(),
                RelationDef {
                    name: name.to_string(),
                    iri: namespaces.expand("skos", local)?,
                    domain: None,
                    range,
                    single_valued,
                },
            );
        }

        for rel in &config.relations {
            let range = match &rel.range {
                RangeConfig::Class(c) => {
                    if !classes.contains_key(c) {
                        return Err(SchemaError::UnknownClass { class: c.clone() });
                    }
                    Range::Class(c.clone())
                }
                RangeConfig::Literal(k) => Range::Literal(*k),
                RangeConfig::Concept => Range::Concept,
            };
            if let Some(domain) = &rel.domain {
                if !classes.contains_key(domain) {
                    return Err(SchemaError::UnknownClass {
                        class: domain.clone(),
                    });
                }
            }
            let def = RelationDef {
                name: rel.name.clone(),
                iri: namespaces.expand(&rel.namespace, rel.local.as_deref().unwrap_or(&rel.name))?,
                domain: rel.domain.clone(),
                range,
                single_valued: rel.single_valued,
            };
            if relations.insert(rel.name.clone(), def).is_some() {
                return Err(SchemaError::Duplicate {
                    what: "relation",
                    name: rel.name.clone(),
                });
            }
        }

        for class in classes.values() {
            if let Some(missing) = class.required.iter().find(|r| !relations.contains_key(*r)) {
                return Err(SchemaError::UnknownRelation {
                    relation: missing.clone(),
                });
            }
        }

        let mut code_lists = BTreeMap::new();
        for list in &config.code_lists {
            let class = classes
                .get(&list.class)
                .ok_or_else(|| SchemaError::UnknownClass {
                    class: list.class.clone(),
                })?;
            if !class.concept {
                return Err(SchemaError::NotAConcept {
                    code_list: list.name.clone(),
                    class: list.class.clone(),
                });
            }
            let def = CodeListDef {
                name: list.name.clone(),
                class: list.class.clone(),
                normalization: list.label_separator.map(|separator| LabelNormalization { separator }),
            };
            if code_lists.insert(list.name.clone(), def).is_some() {
                return Err(SchemaError::Duplicate {
                    what: "code list",
                    name: list.name.clone(),
                });
            }
        }

        Ok(Self {
            namespaces,
            classes,
            relations,
            code_lists,
        })
    }

    /// The namespace registry the schema was built with.
    pub fn namespaces(&self) -> &NamespaceRegistry {
        &self.namespaces
    }

    /// Look up a class by name.
    pub fn class(&self, name: &str) -> Result<&ClassDef, SchemaError> {
        self.classes.get(name).ok_or_else(|| SchemaError::UnknownClass {
            class: name.to_string(),
        })
    }

    /// Look up a relation by name.
    pub fn relation(&self, name: &str) -> Result<&RelationDef, SchemaError> {
        self.relations
            .get(name)
            .ok_or_else(|| SchemaError::UnknownRelation {
                relation: name.to_string(),
            })
    }

    /// Look up a code list by name.
    pub fn code_list(&self, name: &str) -> Option<&CodeListDef> {
        self.code_lists.get(name)
    }

    /// All classes, sorted by name.
    pub fn classes(&self) -> Vec<&ClassDef> {
        let mut all: Vec<_> = self.classes.values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// All relations, sorted by name.
    pub fn relations(&self) -> Vec<&RelationDef> {
        let mut all: Vec<_> = self.relations.values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// All code lists in name order.
    pub fn code_lists(&self) -> impl Iterator<Item = &CodeListDef> {
        self.code_lists.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundled() -> SemfishConfig {
        SemfishConfig::from_toml_str(include_str!("../config/semfish.toml"), "semfish.toml").unwrap()
    }

    #[test]
    fn bundled_schema_compiles() {
        let config = bundled();
        let schema = Schema::from_config(&config).unwrap();
        let sample = schema.class("Sample").unwrap();
        assert!(sample.iri.ends_with("#Sample"));
        assert!(schema.relation("hasMeasurement").unwrap().single_valued);
        assert!(schema.relation(vocab_relations::BROADER).is_ok());
        assert!(schema.code_list("SpecWoRMS").unwrap().normalization.is_some());
        assert!(schema.code_list("IC_Species").unwrap().normalization.is_none());
    }

    #[test]
    fn bundled_mapping_infers_targets() {
        let config = bundled();
        let schema = Schema::from_config(&config).unwrap();
        let mapping = RecordMapping::from_config(&config.mapping, &schema).unwrap();

        let species = mapping.fields.iter().find(|f| f.field == "AphiaID").unwrap();
        assert_eq!(species.target, Target::Reference("Species".into()));
        assert_eq!(species.multiplicity, Multiplicity::Multi);

        let length = mapping.fields.iter().find(|f| f.field == "FishLength").unwrap();
        assert_eq!(length.target, Target::Literal(LiteralKind::Decimal));
        assert_eq!(length.multiplicity, Multiplicity::Single);
        assert_eq!(length.companions.len(), 3);
        assert_eq!(length.companions[0].class, "Unit");
    }

    #[test]
    fn unknown_range_class_rejected() {
        let mut config = bundled();
        config.relations[0].range = RangeConfig::Class("Vessel".into());
        assert!(matches!(
            Schema::from_config(&config),
            Err(SchemaError::UnknownClass { .. })
        ));
    }

    #[test]
    fn code_list_must_use_concept_class() {
        let mut config = bundled();
        config.code_lists[0].class = "Species".into();
        assert!(matches!(
            Schema::from_config(&config),
            Err(SchemaError::NotAConcept { .. })
        ));
    }

    #[test]
    fn classes_sharing_an_iri_rejected() {
        let mut config = bundled();
        let mut alias = config.classes[7].clone();
        alias.local = Some(alias.name.clone());
        alias.name = "WormsAlias".into();
        config.classes.push(alias);
        assert!(matches!(
            Schema::from_config(&config),
            Err(SchemaError::Duplicate { what: "class IRI", .. })
        ));
    }

    #[test]
    fn duplicate_relation_rejected() {
        let mut config = bundled();
        let dup = config.relations[0].clone();
        config.relations.push(dup);
        assert!(matches!(
            Schema::from_config(&config),
            Err(SchemaError::Duplicate { what: "relation", .. })
        ));
    }

    #[test]
    fn mapping_to_unknown_relation_rejected() {
        let mut config = bundled();
        config.mapping.fields[0].relation = "hasGear".into();
        let schema = Schema::from_config(&config).unwrap();
        assert!(matches!(
            RecordMapping::from_config(&config.mapping, &schema),
            Err(SchemaError::UnknownRelation { .. })
        ));
    }

    #[test]
    fn class_override_must_match_range() {
        let mut config = bundled();
        config.mapping.fields[0].class = Some("Species".into());
        let schema = Schema::from_config(&config).unwrap();
        assert!(matches!(
            RecordMapping::from_config(&config.mapping, &schema),
            Err(SchemaError::IncompatibleTarget { .. })
        ));
    }

    #[test]
    fn label_normalization_cuts_at_separator() {
        let norm = LabelNormalization { separator: '(' };
        assert_eq!(norm.normalize("Gadus morhua (Linnaeus, 1758)"), "gadus morhua");
        assert_eq!(norm.normalize("Scomber Scombrus"), "scomber scombrus");
        assert_eq!(norm.normalize("(unnamed)"), "");
    }
}
