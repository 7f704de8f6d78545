//! Fixture loading for local-development stores.
//!
//! # Responsibility
//! - Load JSON-lines documents into one collection of a local store.
//!
//! # Invariants
//! - Input is fully parsed before the store is touched; a bad line writes
//!   nothing.
//! - Reconciliation never calls into this module.

use crate::db::{open_store, DbError};
use crate::model::record::Document;
use crate::store::{put_documents, StoreError};
use log::{error, info};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::{self, BufRead};
use std::path::Path;

/// Seeding failure. Line numbers are 1-based.
#[derive(Debug)]
pub enum SeedError {
    Io(io::Error),
    EmptyCollectionName,
    InvalidLine { line: usize, message: String },
    MissingKey { line: usize, attribute: String },
    Db(DbError),
    Store(StoreError),
}

impl Display for SeedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "cannot read seed input: {err}"),
            Self::EmptyCollectionName => write!(f, "collection name cannot be empty"),
            Self::InvalidLine { line, message } => {
                write!(f, "line {line} is not a JSON object: {message}")
            }
            Self::MissingKey { line, attribute } => {
                write!(f, "line {line} has no string attribute `{attribute}`")
            }
            Self::Db(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SeedError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::EmptyCollectionName | Self::InvalidLine { .. } | Self::MissingKey { .. } => None,
        }
    }
}

impl From<io::Error> for SeedError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<DbError> for SeedError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<StoreError> for SeedError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Parses JSON-lines input into keyed documents.
///
/// Blank lines are skipped. Each document is keyed by the string value of
/// `key_attribute`.
pub fn parse_seed_lines(
    reader: impl BufRead,
    key_attribute: &str,
) -> Result<Vec<(String, Document)>, SeedError> {
    let mut documents = Vec::new();
    for (offset, line) in reader.lines().enumerate() {
        let line_no = offset + 1;
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let document = match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::Object(document)) => document,
            Ok(other) => {
                return Err(SeedError::InvalidLine {
                    line: line_no,
                    message: format!("found {}", json_kind(&other)),
                })
            }
            Err(err) => {
                return Err(SeedError::InvalidLine {
                    line: line_no,
                    message: err.to_string(),
                })
            }
        };

        let key = document
            .get(key_attribute)
            .and_then(Value::as_str)
            .ok_or_else(|| SeedError::MissingKey {
                line: line_no,
                attribute: key_attribute.to_string(),
            })?
            .to_string();
        documents.push((key, document));
    }
    Ok(documents)
}

/// Loads JSON-lines documents into `collection` of the store at `store_path`,
/// creating and migrating the store when needed. Returns the number of
/// documents written.
pub fn seed_collection(
    store_path: &Path,
    collection: &str,
    key_attribute: &str,
    reader: impl BufRead,
) -> Result<usize, SeedError> {
    if collection.trim().is_empty() {
        return Err(SeedError::EmptyCollectionName);
    }

    let documents = parse_seed_lines(reader, key_attribute).map_err(|err| {
        error!("event=seed module=service status=error collection={collection} error={err}");
        err
    })?;
    let mut conn = open_store(store_path)?;
    let written = put_documents(&mut conn, collection, &documents)?;
    info!(
        "event=seed module=service status=ok collection={collection} key_attribute={key_attribute} items={written} store={}",
        store_path.display()
    );
    Ok(written)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_seed_lines, SeedError};

    #[test]
    fn skips_blank_lines_and_keys_by_attribute() {
        let input = "{\"answer_entry\":\"a1\",\"state_form\":\"F\"}\n\n{\"answer_entry\":\"a2\",\"state_form\":\"F\"}\n";
        let documents = parse_seed_lines(input.as_bytes(), "answer_entry").expect("valid input");
        let keys: Vec<_> = documents.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(keys, vec!["a1", "a2"]);
    }

    #[test]
    fn reports_line_of_non_object() {
        let input = "{\"state_form\":\"F\"}\n[1]\n";
        let err = parse_seed_lines(input.as_bytes(), "state_form").expect_err("array line");
        assert!(matches!(err, SeedError::InvalidLine { line: 2, .. }));
    }

    #[test]
    fn reports_missing_key_attribute() {
        let input = "{\"created_by\":\"seed\"}\n";
        let err = parse_seed_lines(input.as_bytes(), "state_form").expect_err("no key");
        assert!(matches!(
            err,
            SeedError::MissingKey { line: 1, ref attribute } if attribute == "state_form"
        ));
    }
}
