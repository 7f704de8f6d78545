//! Form and answer records.
//!
//! # Invariants
//! - `FormRecord::id` is the identity of a form within the primary collection.
//! - `AnswerRecord::form_id` is a reference only; it may point at a form that
//!   does not exist (a dangling reference).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Raw JSON object document as stored in a collection.
pub type Document = serde_json::Map<String, Value>;

/// Attribute holding the form identifier in both collections.
pub const FORM_KEY_ATTRIBUTE: &str = "state_form";

/// Primary collection record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormRecord {
    #[serde(rename = "state_form")]
    pub id: String,
    /// Empty when the store item carries no creator or a null one.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub created_by: String,
}

impl FormRecord {
    pub fn new(id: impl Into<String>, created_by: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_by: created_by.into(),
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Secondary collection record. Only the referenced form id matters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    #[serde(rename = "state_form")]
    pub form_id: String,
}

impl AnswerRecord {
    pub fn new(form_id: impl Into<String>) -> Self {
        Self {
            form_id: form_id.into(),
        }
    }
}

/// Error for documents that cannot be read as the expected record type.
#[derive(Debug)]
pub struct RecordDecodeError {
    pub record_kind: &'static str,
    /// Form key of the offending document, when it had a readable one.
    pub key: Option<String>,
    pub source: serde_json::Error,
}

impl Display for RecordDecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.key {
            Some(key) => write!(
                f,
                "invalid {} document `{key}`: {}",
                self.record_kind, self.source
            ),
            None => write!(f, "invalid {} document: {}", self.record_kind, self.source),
        }
    }
}

impl Error for RecordDecodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

/// Typed record decoded from a collection document.
pub trait Record: DeserializeOwned {
    /// Short name used in diagnostics.
    const KIND: &'static str;

    fn from_document(document: Document) -> Result<Self, RecordDecodeError> {
        let key = document
            .get(FORM_KEY_ATTRIBUTE)
            .and_then(Value::as_str)
            .map(str::to_string);
        serde_json::from_value(Value::Object(document)).map_err(|source| RecordDecodeError {
            record_kind: Self::KIND,
            key,
            source,
        })
    }
}

impl Record for FormRecord {
    const KIND: &'static str = "form";
}

impl Record for AnswerRecord {
    const KIND: &'static str = "answer";
}
