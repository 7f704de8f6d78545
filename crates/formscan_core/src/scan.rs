//! Exhaustive scan over a paged collection.
//!
//! # Responsibility
//! - Hide pagination: callers iterate "the complete collection".
//! - Turn page-level failures into scan errors naming the collection and the
//!   continuation token that was in flight.
//!
//! # Invariants
//! - The first fetch is unconditional; fetching stops at the first page
//!   without a continuation token.
//! - Item order is page order, then in-page order.
//! - After the first error the scan yields nothing more.

use crate::model::record::{Document, Record, RecordDecodeError};
use crate::store::{ContinuationToken, PagedCollection, StoreError};
use log::{debug, error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::marker::PhantomData;

/// Failure while exhausting a collection. Both variants abort a run.
#[derive(Debug)]
pub enum ScanError {
    /// A page fetch could not complete.
    SourceUnavailable {
        collection: String,
        /// `None` means the failing fetch was the first one.
        token: Option<ContinuationToken>,
        source: StoreError,
    },
    /// A fetched document is not a valid record of the expected kind.
    InvalidRecord {
        collection: String,
        source: RecordDecodeError,
    },
}

impl Display for ScanError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SourceUnavailable {
                collection,
                token: Some(token),
                source,
            } => write!(
                f,
                "scan of `{collection}` failed after token `{token}`: {source}"
            ),
            Self::SourceUnavailable {
                collection,
                token: None,
                source,
            } => write!(f, "scan of `{collection}` failed on first page: {source}"),
            Self::InvalidRecord { collection, source } => {
                write!(f, "scan of `{collection}` read {source}")
            }
        }
    }
}

impl Error for ScanError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::SourceUnavailable { source, .. } => Some(source),
            Self::InvalidRecord { source, .. } => Some(source),
        }
    }
}

/// Counters describing a finished (or aborted) scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub pages: u64,
    pub items: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Cursor {
    Start,
    Next(ContinuationToken),
    Exhausted,
}

/// Iterator over every document of a collection, page by page.
pub struct ExhaustiveScan<C: PagedCollection> {
    collection: C,
    buffer: std::vec::IntoIter<Document>,
    cursor: Cursor,
    stats: ScanStats,
}

impl<C: PagedCollection> ExhaustiveScan<C> {
    pub fn new(collection: C) -> Self {
        Self {
            collection,
            buffer: Vec::new().into_iter(),
            cursor: Cursor::Start,
            stats: ScanStats::default(),
        }
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    /// Adapts the scan to decode each document as `T`.
    pub fn records<T: Record>(self) -> RecordScan<C, T> {
        RecordScan {
            inner: self,
            _record: PhantomData,
        }
    }

    fn fetch_next_page(&mut self) -> Result<bool, ScanError> {
        let token = match std::mem::replace(&mut self.cursor, Cursor::Exhausted) {
            Cursor::Exhausted => return Ok(false),
            Cursor::Start => None,
            Cursor::Next(token) => Some(token),
        };

        let page = self
            .collection
            .fetch_page(token.as_ref())
            .map_err(|source| {
                error!(
                    "event=scan_collection module=scan status=error collection={} pages={} items={} token={} error={source}",
                    self.collection.name(),
                    self.stats.pages,
                    self.stats.items,
                    token.as_ref().map_or("-", ContinuationToken::as_str),
                );
                ScanError::SourceUnavailable {
                    collection: self.collection.name().to_string(),
                    token,
                    source,
                }
            })?;

        self.stats.pages += 1;
        self.stats.items += page.items.len() as u64;
        debug!(
            "event=scan_page module=scan status=ok collection={} page={} page_items={}",
            self.collection.name(),
            self.stats.pages,
            page.items.len()
        );

        match page.next_token {
            Some(next) => self.cursor = Cursor::Next(next),
            None => info!(
                "event=scan_collection module=scan status=ok collection={} pages={} items={}",
                self.collection.name(),
                self.stats.pages,
                self.stats.items
            ),
        }
        self.buffer = page.items.into_iter();
        Ok(true)
    }
}

impl<C: PagedCollection> Iterator for ExhaustiveScan<C> {
    type Item = Result<Document, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(document) = self.buffer.next() {
                return Some(Ok(document));
            }
            // Empty intermediate pages are legal; keep following the token.
            match self.fetch_next_page() {
                Ok(true) => continue,
                Ok(false) => return None,
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

/// [`ExhaustiveScan`] decoding each document into a typed record.
pub struct RecordScan<C: PagedCollection, T> {
    inner: ExhaustiveScan<C>,
    _record: PhantomData<fn() -> T>,
}

impl<C: PagedCollection, T> RecordScan<C, T> {
    pub fn stats(&self) -> ScanStats {
        self.inner.stats()
    }
}

impl<C: PagedCollection, T: Record> Iterator for RecordScan<C, T> {
    type Item = Result<T, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        let document = match self.inner.next()? {
            Ok(document) => document,
            Err(err) => return Some(Err(err)),
        };
        Some(T::from_document(document).map_err(|source| {
            // Poison the scan: a bad record aborts the run like a failed fetch.
            self.inner.cursor = Cursor::Exhausted;
            self.inner.buffer = Vec::new().into_iter();
            ScanError::InvalidRecord {
                collection: self.inner.collection.name().to_string(),
                source,
            }
        }))
    }
}

/// Reads a whole collection into memory as typed records.
pub fn scan_all<T: Record, C: PagedCollection>(
    collection: C,
) -> Result<(Vec<T>, ScanStats), ScanError> {
    let mut scan = ExhaustiveScan::new(collection).records::<T>();
    let mut records = Vec::new();
    for record in scan.by_ref() {
        records.push(record?);
    }
    Ok((records, scan.stats()))
}
