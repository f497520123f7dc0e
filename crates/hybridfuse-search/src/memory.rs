//! In-memory dataset implementing [`SearchBackend`].
//!
//! Exact (brute-force) nearest-neighbor search and a plain token matcher.
//! Good enough for tests, small corpora, and the CLI; it makes no attempt at
//! ANN structures or BM25 scoring.
//!
//! Searches require the column to be indexed first, mirroring engines that
//! refuse to search unindexed columns.

use crate::backend::{SearchBackend, TextColumns};
use anyhow::{Context, Result, bail};
use hybridfuse_core::{Document, ResultList, Value};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info};

/// Metadata field attached to vector search hits (squared L2 distance).
pub const DISTANCE_FIELD: &str = "_distance";

/// Metadata field attached to text search hits.
pub const TEXT_SCORE_FIELD: &str = "_score";

#[derive(Debug, Clone, Default)]
pub struct MemoryDataset {
    rows: Vec<Document>,
    vector_indexes: BTreeSet<String>,
    text_indexes: BTreeSet<String>,
}

impl MemoryDataset {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_documents(rows: Vec<Document>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    /// Load documents from a JSON array file or a JSON Lines file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// contains a row that is not an object.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let raw_rows: Vec<serde_json::Value> = if content.trim_start().starts_with('[') {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            content
                .lines()
                .enumerate()
                .filter(|(_, line)| !line.trim().is_empty())
                .map(|(line_no, line)| {
                    serde_json::from_str::<serde_json::Value>(line).with_context(|| {
                        format!("Failed to parse {} line {}", path.display(), line_no + 1)
                    })
                })
                .collect::<Result<Vec<_>>>()?
        };

        let rows = raw_rows
            .into_iter()
            .enumerate()
            .map(|(row, value)| match value {
                serde_json::Value::Object(map) => Ok(Document::from(map)),
                _ => bail!("row {row} of {} is not a JSON object", path.display()),
            })
            .collect::<Result<Vec<_>>>()?;

        info!(rows = rows.len(), path = %path.display(), "loaded dataset");
        Ok(Self::from_documents(rows))
    }

    pub fn add_documents(&mut self, docs: impl IntoIterator<Item = Document>) {
        self.rows.extend(docs);
    }

    #[must_use]
    pub fn count_rows(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn scan_all(&self) -> &[Document] {
        &self.rows
    }

    #[must_use]
    pub fn scan_limit(&self, limit: usize) -> &[Document] {
        &self.rows[..limit.min(self.rows.len())]
    }

    /// Mark `column` as searchable by vector queries.
    ///
    /// # Errors
    ///
    /// Returns an error if no row has a vector in `column`, or some row holds
    /// a non-null value that is not a vector.
    pub fn create_vector_index(&mut self, column: &str) -> Result<()> {
        self.check_column(column, "vector", |v| v.as_vector().is_some())?;
        self.vector_indexes.insert(column.to_string());
        debug!(column, "created vector index");
        Ok(())
    }

    /// Mark `column` as searchable by text queries.
    ///
    /// # Errors
    ///
    /// Returns an error if no row has a string in `column`, or some row holds
    /// a non-null value that is not a string.
    pub fn create_text_index(&mut self, column: &str) -> Result<()> {
        self.check_column(column, "string", |v| v.as_str().is_some())?;
        self.text_indexes.insert(column.to_string());
        debug!(column, "created text index");
        Ok(())
    }

    #[must_use]
    pub fn has_vector_index(&self, column: &str) -> bool {
        self.vector_indexes.contains(column)
    }

    #[must_use]
    pub fn has_text_index(&self, column: &str) -> bool {
        self.text_indexes.contains(column)
    }

    fn check_column(&self, column: &str, expected: &str, accepts: fn(&Value) -> bool) -> Result<()> {
        let mut present = false;
        for (row, doc) in self.rows.iter().enumerate() {
            match doc.get(column) {
                None | Some(Value::Null) => {}
                Some(value) if accepts(value) => present = true,
                Some(value) => bail!(
                    "column `{column}` holds a {} at row {row}, expected {expected}",
                    value.kind()
                ),
            }
        }
        if !present {
            bail!("column `{column}` has no {expected} values to index");
        }
        Ok(())
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = f64::from(*x) - f64::from(*y);
            d * d
        })
        .sum()
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

impl SearchBackend for MemoryDataset {
    fn vector_search(&self, column: &str, query: &[f32], limit: usize) -> Result<ResultList> {
        if !self.has_vector_index(column) {
            bail!("no vector index on column `{column}`");
        }

        let mut scored: Vec<(f64, &Document)> = self
            .rows
            .iter()
            .filter_map(|doc| {
                let embedding = doc.get(column)?.as_vector()?;
                if embedding.len() == query.len() {
                    Some((squared_l2(query, &embedding), doc))
                } else {
                    debug!(
                        column,
                        expected = query.len(),
                        actual = embedding.len(),
                        "skipping row with mismatched dimension"
                    );
                    None
                }
            })
            .collect();

        scored.sort_by(|a, b| a.0.total_cmp(&b.0));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(distance, doc)| doc.clone().with(DISTANCE_FIELD, distance))
            .collect())
    }

    #[allow(clippy::cast_precision_loss)]
    fn text_search(&self, columns: &TextColumns, query: &str, limit: usize) -> Result<ResultList> {
        for column in columns.as_slice() {
            if !self.has_text_index(column) {
                bail!("no text index on column `{column}`");
            }
        }

        let terms: BTreeSet<String> = tokenize(query).collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, &Document)> = self
            .rows
            .iter()
            .filter_map(|doc| {
                let matches: usize = columns
                    .as_slice()
                    .iter()
                    .filter_map(|column| doc.get(column).and_then(Value::as_str))
                    .map(|text| tokenize(text).filter(|t| terms.contains(t)).count())
                    .sum();
                (matches > 0).then_some((matches, doc))
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(matches, doc)| doc.clone().with(TEXT_SCORE_FIELD, matches as f64))
            .collect())
    }
}
