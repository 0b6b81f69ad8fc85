//! Record mapping: one input row → one subject node and its edges.
//!
//! Fields are applied in mapping order. A blank value attaches nothing; a
//! literal that fails coercion becomes a [`FieldWarning`] and only that field
//! is skipped. Single-valued relations replace any earlier edge for the same
//! subject, including edges written by earlier rows with the same subject key.

use std::sync::Arc;

use crate::error::{MapError, SchemaError, SourceError, ValueFormatError};
use crate::graph::{Edge, NodeId, Object, SemanticGraph};
use crate::literal::{LiteralCoercer, is_blank};
use crate::resolve::{EntityResolver, NaturalKey};
use crate::schema::{FieldMapping, Multiplicity, RecordMapping, Schema, Target};
use crate::source::Row;

/// A field skipped because its value could not be coerced.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldWarning {
    pub row: u64,
    pub field: String,
    pub raw: String,
    pub error: ValueFormatError,
}

impl std::fmt::Display for FieldWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "row {}, field {}: {}", self.row, self.field, self.error)
    }
}

/// Outcome of mapping one row.
#[derive(Debug, Clone)]
pub struct MappedRow {
    pub subject: NodeId,
    /// Whether the subject node was created by this row.
    pub created: bool,
    /// Edges attached, companions included.
    pub attached: usize,
    /// Edges removed by single-valued replacement.
    pub replaced: usize,
    pub warnings: Vec<FieldWarning>,
}

/// Summary of a whole ingest.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub rows_read: usize,
    pub rows_mapped: usize,
    pub rows_skipped: usize,
    pub edges_attached: usize,
    pub edges_replaced: usize,
    pub warnings: Vec<FieldWarning>,
}

/// Applies a [`RecordMapping`] to rows.
#[derive(Debug, Clone)]
pub struct RecordMapper {
    schema: Arc<Schema>,
    graph: Arc<SemanticGraph>,
    resolver: EntityResolver,
    coercer: LiteralCoercer,
}

impl RecordMapper {
    pub fn new(
        schema: Arc<Schema>,
        graph: Arc<SemanticGraph>,
        resolver: EntityResolver,
        coercer: LiteralCoercer,
    ) -> Self {
        Self {
            schema,
            graph,
            resolver,
            coercer,
        }
    }

    /// Map one row into the graph.
    pub fn map_row(&self, row: &Row, mapping: &RecordMapping) -> Result<MappedRow, MapError> {
        let key = row
            .get(&mapping.subject_key)
            .and_then(|raw| NaturalKey::new(mapping.subject_class.as_str(), raw))
            .ok_or_else(|| MapError::MissingSubjectKey {
                row: row.number,
                field: mapping.subject_key.clone(),
            })?;
        let subject = self.resolver.resolve(&key)?;

        let mut mapped = MappedRow {
            subject: subject.node,
            created: subject.created,
            attached: 0,
            replaced: 0,
            warnings: Vec::new(),
        };

        for field in &mapping.fields {
            let raw = row.get(&field.field);
            if is_blank(raw) {
                continue;
            }
            let raw = raw.unwrap_or_default();

            let object = match self.field_object(field, raw) {
                Ok(Some(object)) => object,
                Ok(None) => continue,
                Err(FieldFailure::Value(error)) => {
                    tracing::warn!(
                        row = row.number,
                        field = %field.field,
                        raw,
                        %error,
                        "skipping field"
                    );
                    mapped.warnings.push(FieldWarning {
                        row: row.number,
                        field: field.field.clone(),
                        raw: raw.to_string(),
                        error,
                    });
                    continue;
                }
                Err(FieldFailure::Schema(e)) => return Err(e.into()),
            };

            mapped.replaced += self.graph.attach(
                Edge::new(subject.node, field.relation.as_str(), object),
                field.multiplicity == Multiplicity::Single,
            );
            mapped.attached += 1;

            for companion in &field.companions {
                let Some(key) = NaturalKey::new(companion.class.as_str(), &companion.key) else {
                    continue;
                };
                let target = self.resolver.resolve(&key)?;
                let single = self.schema.relation(&companion.relation)?.single_valued;
                mapped.replaced += self.graph.attach(
                    Edge::new(subject.node, companion.relation.as_str(), target.node),
                    single,
                );
                mapped.attached += 1;
            }
        }

        Ok(mapped)
    }

    /// Map every row; row-level problems skip the row, schema errors abort.
    pub fn ingest<I>(&self, rows: I, mapping: &RecordMapping) -> Result<IngestReport, SchemaError>
    where
        I: IntoIterator<Item = Result<Row, SourceError>>,
    {
        let mut report = IngestReport::default();

        for row in rows {
            report.rows_read += 1;
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable row");
                    report.rows_skipped += 1;
                    continue;
                }
            };
            match self.map_row(&row, mapping) {
                Ok(mapped) => {
                    report.rows_mapped += 1;
                    report.edges_attached += mapped.attached;
                    report.edges_replaced += mapped.replaced;
                    report.warnings.extend(mapped.warnings);
                }
                Err(MapError::MissingSubjectKey { row, field }) => {
                    tracing::warn!(row, %field, "skipping row without subject key");
                    report.rows_skipped += 1;
                }
                Err(MapError::Schema(e)) => return Err(e),
            }
        }

        tracing::info!(
            rows = report.rows_read,
            mapped = report.rows_mapped,
            skipped = report.rows_skipped,
            warnings = report.warnings.len(),
            "ingest complete"
        );
        Ok(report)
    }

    fn field_object(&self, field: &FieldMapping, raw: &str) -> Result<Option<Object>, FieldFailure> {
        match &field.target {
            Target::Literal(kind) => self
                .coercer
                .coerce(raw, *kind)
                .map(|lit| Some(lit.into()))
                .map_err(FieldFailure::Value),
            Target::Reference(class) => {
                let Some(key) = NaturalKey::new(class.as_str(), raw) else {
                    return Ok(None);
                };
                let res = self.resolver.resolve(&key).map_err(FieldFailure::Schema)?;
                Ok(Some(res.node.into()))
            }
        }
    }
}

enum FieldFailure {
    Value(ValueFormatError),
    Schema(SchemaError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SemfishConfig;
    use crate::literal::{LiteralKind, TypedLiteral};

    struct Fixture {
        mapper: RecordMapper,
        mapping: RecordMapping,
        graph: Arc<SemanticGraph>,
        resolver: EntityResolver,
    }

    fn fixture() -> Fixture {
        let config =
            SemfishConfig::from_toml_str(include_str!("../config/semfish.toml"), "semfish.toml")
                .unwrap();
        let schema = Arc::new(Schema::from_config(&config).unwrap());
        let mapping = RecordMapping::from_config(&config.mapping, &schema).unwrap();
        let graph = Arc::new(SemanticGraph::new());
        let resolver = EntityResolver::new(Arc::clone(&schema), Arc::clone(&graph));
        let mapper = RecordMapper::new(
            schema,
            Arc::clone(&graph),
            resolver.clone(),
            LiteralCoercer::default(),
        );
        Fixture {
            mapper,
            mapping,
            graph,
            resolver,
        }
    }

    fn row(n: u64, id: &str, aphia: Option<&str>, length: Option<&str>) -> Row {
        Row::new(n)
            .with("SampleID", Some(id))
            .with("AphiaID", aphia)
            .with("FishLength", length)
    }

    fn node(f: &Fixture, class: &str, code: &str) -> NodeId {
        f.resolver
            .find(&NaturalKey::new(class, code).unwrap())
            .unwrap()
            .unwrap()
    }

    #[test]
    fn maps_reference_and_literal_fields() {
        let f = fixture();
        let mapped = f
            .mapper
            .map_row(&row(1, "S1", Some("127023"), Some("23.5")), &f.mapping)
            .unwrap();
        assert!(mapped.created);
        assert!(mapped.warnings.is_empty());
        // hasSpecies + hasMeasurement + three companions
        assert_eq!(mapped.attached, 5);

        let species = node(&f, "Species", "127023");
        assert_eq!(
            f.graph.objects_of(mapped.subject, "hasSpecies"),
            vec![Object::Node(species)]
        );
        assert_eq!(
            f.graph.objects_of(mapped.subject, "hasMeasurement"),
            vec![Object::Literal(TypedLiteral::Decimal(23.5))]
        );
        assert_eq!(
            f.graph.objects_of(mapped.subject, "hasUnit"),
            vec![Object::Node(node(&f, "Unit", "cm"))]
        );
    }

    #[test]
    fn shared_references_deduplicate_across_rows() {
        let f = fixture();
        let a = f
            .mapper
            .map_row(&row(1, "S1", Some("127023"), None), &f.mapping)
            .unwrap();
        let b = f
            .mapper
            .map_row(&row(2, "S2", Some("127023"), None), &f.mapping)
            .unwrap();
        assert_ne!(a.subject, b.subject);
        assert_eq!(
            f.graph.objects_of(a.subject, "hasSpecies"),
            f.graph.objects_of(b.subject, "hasSpecies")
        );
        assert_eq!(f.graph.nodes_of_class("Species").len(), 1);
    }

    #[test]
    fn blank_values_attach_nothing() {
        let f = fixture();
        let mapped = f
            .mapper
            .map_row(&row(1, "S1", Some("  "), None), &f.mapping)
            .unwrap();
        assert_eq!(mapped.attached, 0);
        assert!(mapped.warnings.is_empty());
        assert!(f.graph.edges_from(mapped.subject).is_empty());
        assert_eq!(f.graph.node_count(), 1);
    }

    #[test]
    fn bad_literal_skips_only_that_field() {
        let f = fixture();
        let mapped = f
            .mapper
            .map_row(&row(4, "S4", Some("127023"), Some("abc")), &f.mapping)
            .unwrap();
        assert_eq!(mapped.warnings.len(), 1);
        let warning = &mapped.warnings[0];
        assert_eq!(warning.row, 4);
        assert_eq!(warning.field, "FishLength");
        assert_eq!(warning.raw, "abc");
        assert_eq!(warning.error.kind, LiteralKind::Decimal);

        assert_eq!(f.graph.objects_of(mapped.subject, "hasSpecies").len(), 1);
        assert!(f.graph.objects_of(mapped.subject, "hasMeasurement").is_empty());
        // Companions follow the primary edge.
        assert!(f.graph.objects_of(mapped.subject, "hasUnit").is_empty());
    }

    #[test]
    fn single_valued_relation_is_last_write_wins() {
        let f = fixture();
        f.mapper
            .map_row(&row(1, "S1", None, Some("23.5")), &f.mapping)
            .unwrap();
        let second = f
            .mapper
            .map_row(&row(2, "S1", None, Some("30")), &f.mapping)
            .unwrap();
        assert!(!second.created);
        assert_eq!(second.replaced, 1);
        assert_eq!(
            f.graph.objects_of(second.subject, "hasMeasurement"),
            vec![Object::Literal(TypedLiteral::Decimal(30.0))]
        );
        assert_eq!(f.graph.objects_of(second.subject, "hasUnit").len(), 1);
    }

    #[test]
    fn missing_subject_key_is_row_error() {
        let f = fixture();
        let row = Row::new(9).with("AphiaID", Some("127023"));
        let err = f.mapper.map_row(&row, &f.mapping).unwrap_err();
        assert!(matches!(err, MapError::MissingSubjectKey { row: 9, .. }));
        assert_eq!(f.graph.node_count(), 0);
    }

    #[test]
    fn ingest_skips_bad_rows_and_collects_warnings() {
        let f = fixture();
        let rows = vec![
            Ok(row(1, "S1", Some("127023"), Some("23.5"))),
            Err(SourceError::Record {
                line: 3,
                message: "expected 5 fields, found 2".into(),
            }),
            Ok(Row::new(3).with("SampleID", Some(""))),
            Ok(row(4, "S4", Some("127023"), Some("abc"))),
        ];
        let report = f.mapper.ingest(rows, &f.mapping).unwrap();
        assert_eq!(report.rows_read, 4);
        assert_eq!(report.rows_mapped, 2);
        assert_eq!(report.rows_skipped, 2);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(f.graph.nodes_of_class("Sample").len(), 2);
    }
}
