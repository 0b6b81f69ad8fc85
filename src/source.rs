//! Row sources: ordered records of `column → Option<String>`.
//!
//! [`CsvRowSource`] reads a headered CSV file. It is configured only through
//! the opaque `[source]` settings table:
//!
//! | key         | meaning                                   | default |
//! |-------------|-------------------------------------------|---------|
//! | `path`      | input file                                | required |
//! | `delimiter` | single ASCII character, or `tab`          | `,`     |
//! | `null`      | cell text that means "no value"           | none    |

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use crate::error::SourceError;

/// One input record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// 1-based data line number.
    pub number: u64,
    values: HashMap<String, Option<String>>,
}

impl Row {
    pub fn new(number: u64) -> Self {
        Self {
            number,
            values: HashMap::new(),
        }
    }

    /// Builder-style setter; `None` marks an explicit null.
    pub fn with(mut self, field: impl Into<String>, value: Option<&str>) -> Self {
        self.values.insert(field.into(), value.map(str::to_string));
        self
    }

    /// Raw value of a field; `None` if the column is absent or null.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).and_then(|v| v.as_deref())
    }

    pub fn has_column(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }
}

/// Headered CSV reader yielding [`Row`]s.
pub struct CsvRowSource<R: Read = File> {
    headers: Vec<String>,
    records: csv::StringRecordsIntoIter<R>,
    null: Option<String>,
    next_number: u64,
}

impl CsvRowSource<File> {
    /// Open the file named by the `path` setting.
    pub fn from_settings(settings: &BTreeMap<String, String>) -> Result<Self, SourceError> {
        let path = settings
            .get("path")
            .map(PathBuf::from)
            .ok_or_else(|| SourceError::MissingSetting { key: "path".into() })?;
        let file = File::open(&path).map_err(|source| SourceError::Io {
            path: path.display().to_string(),
            source,
        })?;
        tracing::info!(path = %path.display(), "reading rows");
        Self::from_reader(file, settings)
    }
}

impl<R: Read> CsvRowSource<R> {
    /// Read rows from any reader; `path` in `settings` is ignored.
    pub fn from_reader(reader: R, settings: &BTreeMap<String, String>) -> Result<Self, SourceError> {
        let delimiter = match settings.get("delimiter").map(String::as_str) {
            None => b',',
            Some("tab" | "\\t" | "\t") => b'\t',
            Some(d) if d.len() == 1 && d.is_ascii() => d.as_bytes()[0],
            Some(d) => {
                return Err(SourceError::InvalidSetting {
                    key: "delimiter".into(),
                    value: d.to_string(),
                });
            }
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(reader);

        let headers = reader
            .headers()
            .map_err(|e| record_error(&e, 1))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        Ok(Self {
            headers,
            records: reader.into_records(),
            null: settings.get("null").cloned(),
            next_number: 1,
        })
    }

    /// Column names from the header line.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }
}

impl<R: Read> Iterator for CsvRowSource<R> {
    type Item = Result<Row, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        let number = self.next_number;
        self.next_number += 1;

        let record = match record {
            Ok(r) => r,
            Err(e) => return Some(Err(record_error(&e, number + 1))),
        };
        if record.len() != self.headers.len() {
            return Some(Err(SourceError::Record {
                line: record.position().map_or(number + 1, |p| p.line()),
                message: format!(
                    "expected {} fields, found {}",
                    self.headers.len(),
                    record.len()
                ),
            }));
        }

        let values = self
            .headers
            .iter()
            .zip(record.iter())
            .map(|(header, cell)| {
                let value = match &self.null {
                    Some(null) if cell == null => None,
                    _ => Some(cell.to_string()),
                };
                (header.clone(), value)
            })
            .collect();

        Some(Ok(Row { number, values }))
    }
}

fn record_error(e: &csv::Error, fallback_line: u64) -> SourceError {
    SourceError::Record {
        line: e.position().map_or(fallback_line, |p| p.line()),
        message: e.to_string(),
    }
}
