//! In-memory paged collection.
//!
//! Serves fixtures and tests with an explicit page layout, so pagination
//! behavior can be exercised independently of any storage engine.

use super::{ContinuationToken, Page, PagedCollection, StoreError, StoreResult};
use crate::model::record::Document;
use std::num::NonZeroUsize;

/// Collection whose pages are fixed at construction time.
#[derive(Debug, Clone)]
pub struct MemoryCollection {
    name: String,
    pages: Vec<Vec<Document>>,
}

impl MemoryCollection {
    /// Splits `items` into consecutive pages of at most `page_size` items.
    pub fn paged(name: impl Into<String>, items: Vec<Document>, page_size: NonZeroUsize) -> Self {
        let pages = items
            .chunks(page_size.get())
            .map(<[Document]>::to_vec)
            .collect();
        Self::from_pages(name, pages)
    }

    /// Uses the given page layout verbatim.
    ///
    /// An empty layout behaves like a single empty page.
    pub fn from_pages(name: impl Into<String>, pages: Vec<Vec<Document>>) -> Self {
        let pages = if pages.is_empty() {
            vec![Vec::new()]
        } else {
            pages
        };
        Self {
            name: name.into(),
            pages,
        }
    }
}

impl PagedCollection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch_page(&self, token: Option<&ContinuationToken>) -> StoreResult<Page> {
        let index = match token {
            None => 0,
            Some(token) => token
                .as_str()
                .parse::<usize>()
                .ok()
                .filter(|index| *index < self.pages.len())
                .ok_or_else(|| {
                    StoreError::InvalidData(format!(
                        "unknown continuation token `{token}` for collection `{}`",
                        self.name
                    ))
                })?,
        };

        let next = index + 1;
        Ok(Page {
            items: self.pages[index].clone(),
            next_token: (next < self.pages.len()).then(|| ContinuationToken::new(next.to_string())),
        })
    }
}
