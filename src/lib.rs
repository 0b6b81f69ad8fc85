// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # semfish
//!
//! An entity-resolving record-to-graph mapper: tabular sampling records are
//! turned into a typed, validated semantic graph that can be queried with
//! SPARQL and exported as RDF.
//!
//! ## Architecture
//!
//! - **Schema** (`schema`, `namespace`): immutable classes, relations, code lists and
//!   the field → relation mapping table, compiled from TOML configuration
//! - **Graph** (`graph`): in-memory node/edge store with an IRI identity index,
//!   plus an oxigraph-backed SPARQL store for the validated result
//! - **Resolution** (`resolve`): one canonical node per (class, natural key)
//! - **Vocabularies** (`vocab`): SKOS code lists fetched once per run
//! - **Mapping** (`mapper`, `literal`, `source`): rows → edges and typed literals
//! - **Validation** (`validate`): schema conformance, gating query and export
//!
//! ## Library usage
//!
//! ```no_run
//! use semfish::config::SemfishConfig;
//! use semfish::pipeline::Pipeline;
//!
//! let config = SemfishConfig::load("semfish.toml".as_ref()).unwrap();
//! let mut pipeline = Pipeline::from_config(config).unwrap();
//! pipeline.load_vocabularies().unwrap();
//! pipeline.ingest_configured(None).unwrap();
//! let published = pipeline.publish().unwrap();
//! for report in published.run_reports(pipeline.queries()).unwrap() {
//!     print!("{report}");
//! }
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod literal;
pub mod mapper;
pub mod namespace;
pub mod pipeline;
pub mod query;
pub mod resolve;
pub mod schema;
pub mod source;
pub mod validate;
pub mod vocab;
