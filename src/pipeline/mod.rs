//! Pipeline facade: top-level API for a semfish run.
//!
//! The `Pipeline` owns every component and enforces the control flow:
//! vocabularies → row mapping → validation → (gate) → query store.
//! A [`PublishedGraph`] can only be obtained from a graph that passed
//! validation, so queries and export never see an invalid graph.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{NamedQuery, SemfishConfig};
use crate::error::{PipelineError, SemfishResult, SourceError};
use crate::graph::SemanticGraph;
use crate::graph::sparql::{ExportFormat, SparqlStore};
use crate::literal::LiteralCoercer;
use crate::mapper::{IngestReport, RecordMapper};
use crate::query::{QueryExecutor, QueryReport};
use crate::resolve::EntityResolver;
use crate::schema::{RecordMapping, Schema};
use crate::source::{CsvRowSource, Row};
use crate::validate::{ValidationReport, Validator};
use crate::vocab::{LoadOutcome, VocabularyCache, VocabularySource};

/// One run of the record-to-graph pipeline.
pub struct Pipeline {
    config: SemfishConfig,
    schema: Arc<Schema>,
    mapping: RecordMapping,
    graph: Arc<SemanticGraph>,
    resolver: EntityResolver,
    vocabulary: VocabularyCache,
    mapper: RecordMapper,
    validator: Validator,
    data_dir: Option<PathBuf>,
    rows_mapped: usize,
    warnings: usize,
}

impl Pipeline {
    /// Build a pipeline from configuration and an explicit vocabulary source.
    pub fn new(config: SemfishConfig, source: Box<dyn VocabularySource>) -> SemfishResult<Self> {
        let schema = Arc::new(Schema::from_config(&config)?);
        let mapping = RecordMapping::from_config(&config.mapping, &schema)?;
        let coercer = LiteralCoercer::with_offset_minutes(config.coercion.utc_offset_minutes)?;

        let graph = Arc::new(SemanticGraph::new());
        let resolver = EntityResolver::new(Arc::clone(&schema), Arc::clone(&graph));
        let vocabulary = VocabularyCache::new(
            Arc::clone(&schema),
            Arc::clone(&graph),
            resolver.clone(),
            source,
        );
        let mapper = RecordMapper::new(
            Arc::clone(&schema),
            Arc::clone(&graph),
            resolver.clone(),
            coercer,
        );
        let validator = Validator::new(Arc::clone(&schema));

        tracing::info!(
            classes = schema.classes().len(),
            relations = schema.relations().len(),
            fields = mapping.fields.len(),
            code_lists = schema.code_lists().count(),
            "initializing semfish pipeline"
        );

        Ok(Self {
            config,
            schema,
            mapping,
            graph,
            resolver,
            vocabulary,
            mapper,
            validator,
            data_dir: None,
            rows_mapped: 0,
            warnings: 0,
        })
    }

    /// Build a pipeline using the `[vocabulary]` source from configuration.
    pub fn from_config(config: SemfishConfig) -> SemfishResult<Self> {
        let source = crate::vocab::source::from_config(&config.vocabulary)?;
        Self::new(config, source)
    }

    /// Keep the query store on disk under `dir/oxigraph` instead of in memory.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Load every configured code list.
    pub fn load_vocabularies(&mut self) -> SemfishResult<LoadOutcome> {
        Ok(self.vocabulary.load_all()?)
    }

    /// Map rows into the graph.
    pub fn ingest<I>(&mut self, rows: I) -> SemfishResult<IngestReport>
    where
        I: IntoIterator<Item = Result<Row, SourceError>>,
    {
        let report = self.mapper.ingest(rows, &self.mapping)?;
        self.rows_mapped += report.rows_mapped;
        self.warnings += report.warnings.len();
        Ok(report)
    }

    /// Map rows from the configured CSV source, optionally overriding its path.
    pub fn ingest_configured(&mut self, input: Option<&Path>) -> SemfishResult<IngestReport> {
        let mut settings: BTreeMap<String, String> = self.config.source.clone();
        if let Some(path) = input {
            settings.insert("path".into(), path.display().to_string());
        }
        let rows = CsvRowSource::from_settings(&settings)?;
        self.ingest(rows)
    }

    /// Check the graph against the schema. Read-only.
    pub fn validate(&self) -> ValidationReport {
        self.validator.validate(&self.graph)
    }

    /// Validate, then load the graph into a fresh query store.
    ///
    /// Fails with [`PipelineError::ValidationFailed`] if the graph is invalid;
    /// nothing is loaded in that case.
    pub fn publish(&self) -> SemfishResult<PublishedGraph> {
        let report = self.validate();
        if !report.valid {
            return Err(PipelineError::ValidationFailed {
                violations: report.violations.len(),
            }
            .into());
        }

        let store = match &self.data_dir {
            Some(dir) => SparqlStore::open(&dir.join("oxigraph"))?,
            None => SparqlStore::in_memory()?,
        };
        store.clear()?;
        store.load(&self.graph, &self.schema)?;

        Ok(PublishedGraph {
            store,
            schema: Arc::clone(&self.schema),
            report,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn mapping(&self) -> &RecordMapping {
        &self.mapping
    }

    pub fn graph(&self) -> &SemanticGraph {
        &self.graph
    }

    pub fn vocabulary(&self) -> &VocabularyCache {
        &self.vocabulary
    }

    /// Configured named reports.
    pub fn queries(&self) -> &[NamedQuery] {
        &self.config.queries
    }

    /// Summary of the run so far.
    pub fn info(&self) -> PipelineInfo {
        let mut code_lists: Vec<String> = self
            .schema
            .code_lists()
            .filter(|c| self.vocabulary.is_loaded(&c.name))
            .map(|c| c.name.clone())
            .collect();
        code_lists.sort();
        PipelineInfo {
            node_count: self.graph.node_count(),
            edge_count: self.graph.edge_count(),
            nodes_created: self.resolver.stats().created(),
            nodes_reused: self.resolver.stats().reused(),
            code_lists,
            rows_mapped: self.rows_mapped,
            warnings: self.warnings,
            persistent: self.data_dir.is_some(),
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("graph", &self.graph)
            .field("vocabulary", &self.vocabulary)
            .field("data_dir", &self.data_dir)
            .finish()
    }
}

/// A validated graph loaded into the query store.
#[derive(Debug)]
pub struct PublishedGraph {
    store: SparqlStore,
    schema: Arc<Schema>,
    report: ValidationReport,
}

impl PublishedGraph {
    /// The (valid) report the graph was published with.
    pub fn report(&self) -> &ValidationReport {
        &self.report
    }

    pub fn store(&self) -> &SparqlStore {
        &self.store
    }

    /// Query executor with the registry's prefixes declared.
    pub fn executor(&self) -> QueryExecutor<'_> {
        QueryExecutor::new(&self.store, self.schema.namespaces())
    }

    /// Run each named report in order.
    pub fn run_reports(&self, queries: &[NamedQuery]) -> SemfishResult<Vec<QueryReport>> {
        let executor = self.executor();
        queries
            .iter()
            .map(|q| executor.run_named(q).map_err(Into::into))
            .collect()
    }

    /// Serialize the graph to `writer`.
    pub fn export<W: Write>(&self, format: ExportFormat, writer: W) -> SemfishResult<W> {
        Ok(self.store.dump(format, self.schema.namespaces(), writer)?)
    }
}

/// Summary information about a run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PipelineInfo {
    pub node_count: usize,
    pub edge_count: usize,
    pub nodes_created: usize,
    pub nodes_reused: usize,
    pub code_lists: Vec<String>,
    pub rows_mapped: usize,
    pub warnings: usize,
    pub persistent: bool,
}

impl std::fmt::Display for PipelineInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "semfish run info")?;
        writeln!(f, "  nodes:        {}", self.node_count)?;
        writeln!(f, "  edges:        {}", self.edge_count)?;
        writeln!(f, "  created:      {}", self.nodes_created)?;
        writeln!(f, "  reused:       {}", self.nodes_reused)?;
        writeln!(f, "  code lists:   {}", self.code_lists.join(", "))?;
        writeln!(f, "  rows mapped:  {}", self.rows_mapped)?;
        writeln!(f, "  warnings:     {}", self.warnings)?;
        writeln!(f, "  persistent:   {}", self.persistent)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SemfishError;
    use crate::graph::Edge;
    use crate::literal::TypedLiteral;
    use crate::vocab::{StaticVocabularySource, VocabularyEntry};

    fn config() -> SemfishConfig {
        SemfishConfig::from_toml_str(include_str!("../../config/semfish.toml"), "semfish.toml")
            .unwrap()
    }

    fn source() -> Box<dyn VocabularySource> {
        Box::new(
            StaticVocabularySource::new()
                .with_list("IC_Species", vec![VocabularyEntry::new("MAC", "Scomber scombrus")])
                .with_list(
                    "SpecWoRMS",
                    vec![VocabularyEntry::new("127023", "Scomber scombrus (Linnaeus, 1758)")],
                )
                .with_list("IC_Divisions", vec![VocabularyEntry::new("27.7.b", "Division 7.b")]),
        )
    }

    fn row(id: &str, length: &str) -> Result<Row, SourceError> {
        Ok(Row::new(1)
            .with("SampleID", Some(id))
            .with("AphiaID", Some("127023"))
            .with("FishLength", Some(length)))
    }

    #[test]
    fn end_to_end_publish() {
        let mut pipeline = Pipeline::new(config(), source()).unwrap();
        let loaded = pipeline.load_vocabularies().unwrap();
        assert_eq!(loaded.terms, 3);
        pipeline.ingest(vec![row("S1", "23.5")]).unwrap();

        let published = pipeline.publish().unwrap();
        assert!(published.report().valid);
        let reports = published.run_reports(pipeline.queries()).unwrap();
        assert_eq!(reports.len(), pipeline.queries().len());
        assert_eq!(reports[0].rows.len(), 1);

        let info = pipeline.info();
        assert_eq!(info.rows_mapped, 1);
        assert_eq!(info.code_lists.len(), 3);
        assert!(!info.persistent);
    }

    #[test]
    fn invalid_graph_is_not_published() {
        let pipeline = Pipeline::new(config(), source()).unwrap();
        let sample = pipeline
            .graph()
            .get_or_insert_node("http://example.org/s", "Sample")
            .unwrap()
            .0;
        pipeline.graph().add_edge(Edge::new(
            sample,
            "hasMeasurement",
            TypedLiteral::String("long".into()),
        ));

        let err = pipeline.publish().unwrap_err();
        assert!(matches!(
            err,
            SemfishError::Pipeline(PipelineError::ValidationFailed { violations: 1 })
        ));
    }

    #[test]
    fn bad_offset_is_schema_error() {
        let mut config = config();
        config.coercion.utc_offset_minutes = 24 * 60;
        assert!(matches!(
            Pipeline::new(config, source()),
            Err(SemfishError::Schema(_))
        ));
    }

    #[test]
    fn data_dir_store_is_replaced_on_publish() {
        let dir = tempfile::TempDir::new().unwrap();
        for id in ["S1", "S2"] {
            let mut pipeline = Pipeline::new(config(), source())
                .unwrap()
                .with_data_dir(dir.path());
            pipeline.ingest(vec![row(id, "20")]).unwrap();
            let published = pipeline.publish().unwrap();
            let samples = published
                .executor()
                .select("SELECT ?s WHERE { ?s a ak:Sample }")
                .unwrap()
                .count();
            assert_eq!(samples, 1);
        }
        assert!(dir.path().join("oxigraph").exists());
    }

    #[test]
    fn export_after_publish() {
        let mut pipeline = Pipeline::new(config(), source()).unwrap();
        pipeline.ingest(vec![row("S1", "23.5")]).unwrap();
        let published = pipeline.publish().unwrap();
        let out = published.export(ExportFormat::NTriples, Vec::new()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Sample/S1>"));
    }
}
