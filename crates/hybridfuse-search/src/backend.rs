//! The seam between hybrid search and the engine that owns the indexes.
//!
//! Index construction, ANN search, and BM25 scoring all live behind
//! [`SearchBackend`]. The orchestrator only relies on the ordering of what
//! comes back: best match first.

use anyhow::Result;
use hybridfuse_core::ResultList;
use std::fmt;

/// Which column(s) a text search runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextColumns {
    Single(String),
    Multi(Vec<String>),
}

impl TextColumns {
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        match self {
            Self::Single(column) => std::slice::from_ref(column),
            Self::Multi(columns) => columns,
        }
    }
}

impl fmt::Display for TextColumns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_slice().join(","))
    }
}

/// External search engine consumed by [`crate::fusion::hybrid_search`].
///
/// Errors are reported as-is to the caller of hybrid search; implementations
/// should fail (not return an empty list) when a column has no usable index.
pub trait SearchBackend: Send + Sync {
    /// Up to `limit` documents nearest to `query`, closest first.
    ///
    /// # Errors
    ///
    /// Returns an error if `column` is unknown or has no vector index.
    fn vector_search(&self, column: &str, query: &[f32], limit: usize) -> Result<ResultList>;

    /// Up to `limit` documents matching `query`, most relevant first.
    ///
    /// # Errors
    ///
    /// Returns an error if any column is unknown or has no text index.
    fn text_search(&self, columns: &TextColumns, query: &str, limit: usize) -> Result<ResultList>;
}

impl<B: SearchBackend + ?Sized> SearchBackend for &B {
    fn vector_search(&self, column: &str, query: &[f32], limit: usize) -> Result<ResultList> {
        (**self).vector_search(column, query, limit)
    }

    fn text_search(&self, columns: &TextColumns, query: &str, limit: usize) -> Result<ResultList> {
        (**self).text_search(columns, query, limit)
    }
}
