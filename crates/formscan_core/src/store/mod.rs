//! Paged collection contracts and store implementations.
//!
//! # Responsibility
//! - Define the single page-fetch contract every backend implements.
//! - Keep backend query details (SQL, offsets) behind that contract.
//!
//! # Invariants
//! - A page without `next_token` is the last page of its collection.
//! - Continuation tokens are opaque to callers; only the issuing collection
//!   interprets them.

use crate::db::DbError;
use crate::model::record::Document;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryCollection;
pub use sqlite::{put_documents, SqliteCollection};

pub type StoreResult<T> = Result<T, StoreError>;

/// Backend-level failure while fetching or writing a collection.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    /// Backend answered but the payload is unusable (bad body, bad token).
    InvalidData(String),
    /// Backend could not be reached or refused the request.
    Unavailable(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid store data: {message}"),
            Self::Unavailable(message) => write!(f, "store unavailable: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
            Self::Unavailable(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Opaque cursor returned by a collection to resume after the last page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContinuationToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One bounded slice of a collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Document>,
    pub next_token: Option<ContinuationToken>,
}

/// A named collection that can only be read one page at a time.
pub trait PagedCollection {
    /// Collection name used in diagnostics and errors.
    fn name(&self) -> &str;

    /// Fetches the page starting after `token`, or the first page for `None`.
    fn fetch_page(&self, token: Option<&ContinuationToken>) -> StoreResult<Page>;
}

impl<C: PagedCollection + ?Sized> PagedCollection for &C {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch_page(&self, token: Option<&ContinuationToken>) -> StoreResult<Page> {
        (**self).fetch_page(token)
    }
}
