//! Rich diagnostic error types for the semfish pipeline.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so operators can locate
//! the offending input (row, field, code list, raw value).

use miette::Diagnostic;
use thiserror::Error;

use crate::literal::LiteralKind;

/// Top-level error type for the semfish pipeline.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain through to the operator.
#[derive(Debug, Error, Diagnostic)]
pub enum SemfishError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Value(#[from] ValueFormatError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Vocabulary(#[from] VocabularyError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Map(#[from] MapError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Pipeline(#[from] PipelineError),
}

// ---------------------------------------------------------------------------
// Schema errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SchemaError {
    #[error("unknown namespace prefix: \"{prefix}\"")]
    #[diagnostic(
        code(semfish::schema::unknown_namespace),
        help("Declare the prefix under [namespaces] in the configuration file.")
    )]
    UnknownNamespace { prefix: String },

    #[error("unknown class: \"{class}\"")]
    #[diagnostic(
        code(semfish::schema::unknown_class),
        help(
            "Every class referenced by a relation, mapping, companion or code list \
             must be declared as a [[classes]] entry."
        )
    )]
    UnknownClass { class: String },

    #[error("unknown relation: \"{relation}\"")]
    #[diagnostic(
        code(semfish::schema::unknown_relation),
        help("Declare the relation as a [[relations]] entry before mapping a field to it.")
    )]
    UnknownRelation { relation: String },

    #[error("duplicate {what} definition: \"{name}\"")]
    #[diagnostic(
        code(semfish::schema::duplicate),
        help("Class, relation and code list names must be unique within a schema.")
    )]
    Duplicate { what: &'static str, name: String },

    #[error("IRI {iri} is already bound to class \"{existing}\", cannot reuse it for \"{requested}\"")]
    #[diagnostic(
        code(semfish::schema::class_conflict),
        help(
            "Two classes expand to overlapping IRIs. Give each class a distinct \
             namespace or local name."
        )
    )]
    ClassConflict {
        iri: String,
        existing: String,
        requested: String,
    },

    #[error("class \"{class}\" used by code list \"{code_list}\" is not a concept class")]
    #[diagnostic(
        code(semfish::schema::not_a_concept),
        help("Set `concept = true` on the class that holds the code list terms.")
    )]
    NotAConcept { code_list: String, class: String },

    #[error("field \"{field}\" targets {target} but relation \"{relation}\" expects {range}")]
    #[diagnostic(
        code(semfish::schema::incompatible_target),
        help(
            "A field mapping's target must agree with its relation's range. Remove the \
             class override or point the field at a relation with a matching range."
        )
    )]
    IncompatibleTarget {
        field: String,
        relation: String,
        target: String,
        range: String,
    },

    #[error("invalid IRI \"{iri}\": {message}")]
    #[diagnostic(
        code(semfish::schema::invalid_iri),
        help("Namespace base IRIs must be absolute, e.g. \"http://example.org/ns#\".")
    )]
    InvalidIri { iri: String, message: String },

    #[error("invalid UTC offset of {minutes} minutes")]
    #[diagnostic(
        code(semfish::schema::invalid_offset),
        help("`utc_offset_minutes` must lie strictly between -1440 and 1440.")
    )]
    InvalidOffset { minutes: i32 },
}

// ---------------------------------------------------------------------------
// Value errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error, Diagnostic)]
#[error("cannot coerce {raw:?} to {kind}: {reason}")]
#[diagnostic(
    code(semfish::value::format),
    severity(Warning),
    help(
        "The field is skipped for this row and mapping continues. Fix the value \
         in the source data if the attribute is needed."
    )
)]
pub struct ValueFormatError {
    pub kind: LiteralKind,
    pub raw: String,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// Vocabulary errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum VocabularyError {
    #[error("code list \"{code_list}\" is not configured")]
    #[diagnostic(
        code(semfish::vocab::unknown_code_list),
        help("Add a [[code_lists]] entry naming this code list and its concept class.")
    )]
    UnknownCodeList { code_list: String },

    #[error("code list \"{code_list}\" has not been loaded")]
    #[diagnostic(
        code(semfish::vocab::not_loaded),
        help("Call `ensure_loaded` for the code list before reading its terms.")
    )]
    NotLoaded { code_list: String },

    #[error("failed to fetch code list \"{code_list}\" from {location}: {message}")]
    #[diagnostic(
        code(semfish::vocab::fetch),
        help(
            "The vocabulary source could not be reached. Check network access and \
             [vocabulary] base_url, or switch to `source = \"files\"` with a local copy."
        )
    )]
    Fetch {
        code_list: String,
        location: String,
        message: String,
    },

    #[error("failed to parse code list \"{code_list}\": {message}")]
    #[diagnostic(
        code(semfish::vocab::parse),
        help("The vocabulary document is not valid SKOS in the configured RDF format.")
    )]
    Parse { code_list: String, message: String },

    #[error("code list \"{code_list}\" contains a term with a blank identifier (label {label:?})")]
    #[diagnostic(
        code(semfish::vocab::malformed_term),
        help("No term of this code list was loaded. Fix or filter the source data.")
    )]
    MalformedTerm { code_list: String, label: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaError),
}

// ---------------------------------------------------------------------------
// Row mapping errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum MapError {
    #[error("row {row}: subject key field \"{field}\" is missing or blank")]
    #[diagnostic(
        code(semfish::map::missing_subject_key),
        severity(Warning),
        help("The row is skipped. Every row needs a value in the subject key column.")
    )]
    MissingSubjectKey { row: u64, field: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaError),
}

// ---------------------------------------------------------------------------
// Row source errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SourceError {
    #[error("row source setting \"{key}\" is missing")]
    #[diagnostic(
        code(semfish::source::missing_setting),
        help("Add `{key} = \"...\"` under [source] or pass it on the command line.")
    )]
    MissingSetting { key: String },

    #[error("row source setting \"{key}\" has invalid value {value:?}")]
    #[diagnostic(
        code(semfish::source::invalid_setting),
        help("The delimiter must be a single ASCII character.")
    )]
    InvalidSetting { key: String, value: String },

    #[error("failed to open {path}: {source}")]
    #[diagnostic(
        code(semfish::source::io),
        help("Check that the input file exists and is readable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record near line {line}: {message}")]
    #[diagnostic(
        code(semfish::source::record),
        severity(Warning),
        help("The record is skipped. Check quoting and column counts in the input.")
    )]
    Record { line: u64, message: String },
}

// ---------------------------------------------------------------------------
// Graph engine errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("SPARQL query error: {message}")]
    #[diagnostic(
        code(semfish::graph::sparql),
        help(
            "The SPARQL query failed. Check the query syntax; the namespace prefixes \
             from the configuration are declared automatically."
        )
    )]
    Sparql { message: String },

    #[error("graph store error: {message}")]
    #[diagnostic(
        code(semfish::graph::store),
        help(
            "The oxigraph store could not be created or written. Check the data \
             directory permissions, or run without --data-dir for an in-memory store."
        )
    )]
    Store { message: String },

    #[error("export failed: {message}")]
    #[diagnostic(
        code(semfish::graph::export),
        help("Check that the export path is writable.")
    )]
    Export { message: String },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read configuration {path}: {source}")]
    #[diagnostic(
        code(semfish::config::io),
        help("Pass an existing file with --config, or create semfish.toml in the working directory.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration {path}: {message}")]
    #[diagnostic(
        code(semfish::config::parse),
        help("See config/semfish.toml for a complete, annotated example.")
    )]
    Parse { path: String, message: String },
}

// ---------------------------------------------------------------------------
// Pipeline errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum PipelineError {
    #[error("graph failed validation with {violations} violation(s)")]
    #[diagnostic(
        code(semfish::pipeline::validation_failed),
        help(
            "Nothing was loaded, queried or exported. Run `semfish validate` to list \
             the violations and fix the mapping or the source data."
        )
    )]
    ValidationFailed { violations: usize },
}

/// Convenience alias for functions returning semfish results.
pub type SemfishResult<T> = std::result::Result<T, SemfishError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_converts_to_semfish_error() {
        let err = SchemaError::UnknownClass {
            class: "Vessel".into(),
        };
        let top: SemfishError = err.into();
        assert!(matches!(
            top,
            SemfishError::Schema(SchemaError::UnknownClass { .. })
        ));
    }

    #[test]
    fn map_error_wraps_schema_error() {
        let err: MapError = SchemaError::UnknownRelation {
            relation: "hasGear".into(),
        }
        .into();
        assert!(matches!(
            err,
            MapError::Schema(SchemaError::UnknownRelation { .. })
        ));
    }

    #[test]
    fn value_error_message_carries_raw_value() {
        let err = ValueFormatError {
            kind: LiteralKind::Decimal,
            raw: "abc".into(),
            reason: "invalid float literal".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("\"abc\""));
        assert!(msg.contains("decimal"));
    }

    #[test]
    fn missing_subject_key_names_row_and_field() {
        let err = MapError::MissingSubjectKey {
            row: 7,
            field: "SampleID".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("row 7"));
        assert!(msg.contains("SampleID"));
    }
}
