//! SQLite-backed paged collections.
//!
//! # Responsibility
//! - Serve keyset-paginated reads over the `items` document table.
//! - Provide the seeding write path for local stores.
//!
//! # Invariants
//! - Pages are ordered by `item_key ASC`; the token is the last key of a full
//!   page, so every key is returned exactly once.
//! - Stored bodies must be JSON objects; anything else is reported, never
//!   skipped.

use super::{ContinuationToken, Page, PagedCollection, StoreError, StoreResult};
use crate::model::record::Document;
use rusqlite::{params, Connection};
use serde_json::Value;
use std::num::NonZeroU32;

const PAGE_SQL: &str = "SELECT item_key, body
FROM items
WHERE collection = ?1
  AND (?2 IS NULL OR item_key > ?2)
ORDER BY item_key ASC
LIMIT ?3;";

/// One named collection inside a SQLite document store.
pub struct SqliteCollection<'conn> {
    conn: &'conn Connection,
    name: String,
    page_size: NonZeroU32,
}

impl<'conn> SqliteCollection<'conn> {
    pub fn new(conn: &'conn Connection, name: impl Into<String>, page_size: NonZeroU32) -> Self {
        Self {
            conn,
            name: name.into(),
            page_size,
        }
    }
}

impl PagedCollection for SqliteCollection<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch_page(&self, token: Option<&ContinuationToken>) -> StoreResult<Page> {
        let mut stmt = self.conn.prepare_cached(PAGE_SQL)?;
        let mut rows = stmt.query(params![
            self.name.as_str(),
            token.map(ContinuationToken::as_str),
            i64::from(self.page_size.get()),
        ])?;

        let mut items = Vec::new();
        let mut last_key: Option<String> = None;
        while let Some(row) = rows.next()? {
            let key: String = row.get("item_key")?;
            let body: String = row.get("body")?;
            items.push(parse_body(&self.name, &key, &body)?);
            last_key = Some(key);
        }

        let page_is_full = items.len() == self.page_size.get() as usize;
        Ok(Page {
            items,
            next_token: last_key
                .filter(|_| page_is_full)
                .map(ContinuationToken::new),
        })
    }
}

/// Upserts keyed documents into one collection inside a single transaction.
///
/// A later document with an already stored key replaces the earlier one.
/// Returns the number of documents written.
pub fn put_documents(
    conn: &mut Connection,
    collection: &str,
    documents: &[(String, Document)],
) -> StoreResult<usize> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO items (collection, item_key, body)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(collection, item_key) DO UPDATE SET body = excluded.body;",
        )?;
        for (key, document) in documents {
            let body = serde_json::to_string(document).map_err(|err| {
                StoreError::InvalidData(format!("cannot encode item `{key}`: {err}"))
            })?;
            stmt.execute(params![collection, key, body])?;
        }
    }
    tx.commit()?;
    Ok(documents.len())
}

fn parse_body(collection: &str, key: &str, body: &str) -> StoreResult<Document> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(document)) => Ok(document),
        Ok(_) => Err(StoreError::InvalidData(format!(
            "item `{key}` in `{collection}` is not a JSON object"
        ))),
        Err(err) => Err(StoreError::InvalidData(format!(
            "item `{key}` in `{collection}` has malformed body: {err}"
        ))),
    }
}
