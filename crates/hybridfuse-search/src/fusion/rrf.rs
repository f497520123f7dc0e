//! Reciprocal Rank Fusion over ranked document lists.
//!
//! # Algorithm Overview
//!
//! **Reciprocal Rank Fusion (RRF)** combines multiple ranked lists by scoring
//! each document based on its position in each list:
//!
//! ```text
//! RRF score = sum over all lists of: 1 / (k + rank_in_list)
//! ```
//!
//! Where:
//! - `k` is a constant (default 60) that reduces the impact of high ranks.
//! - Ranks are 1-indexed; documents absent from a list contribute 0.
//! - Documents are identified by their [`DocumentKey`], so the same record
//!   returned by two modalities with different metadata (`_distance`,
//!   `_score`) is counted once with both ranks.
//! - Results are sorted by fused score descending. Equal scores keep
//!   first-seen order: lowest list index, then lowest position.
//!
//! # Example
//!
//! ```
//! use hybridfuse_core::Document;
//! use hybridfuse_search::fusion::rrf::fuse;
//!
//! let vector_hits = vec![Document::new().with("id", 1), Document::new().with("id", 2)];
//! let text_hits = vec![Document::new().with("id", 2)];
//!
//! let fused = fuse(&[vector_hits, text_hits], 60.0).expect("k is valid");
//! assert_eq!(fused[0].document.get("id").and_then(|v| v.as_f64()), Some(2.0));
//! ```

use hybridfuse_core::error::validate_fusion_k;
use hybridfuse_core::{Document, DocumentKey, FUSION_SCORE_FIELD, FusionError, ResultList};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::trace;

/// A fused document with its RRF score.
///
/// Serializes as the document's fields plus `rrf_score`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedResult {
    /// The first-seen occurrence of this document, all fields intact.
    #[serde(flatten)]
    pub document: Document,

    /// Sum of `1 / (k + rank)` over the lists the document appeared in.
    pub rrf_score: f64,

    /// 1-indexed rank per input list index, for explainability.
    #[serde(skip)]
    pub ranks: BTreeMap<usize, usize>,
}

impl FusedResult {
    /// Rank of this document in list `list_index`, if it appeared there.
    #[must_use]
    pub fn rank_in(&self, list_index: usize) -> Option<usize> {
        self.ranks.get(&list_index).copied()
    }

    /// The document with `rrf_score` attached as a regular field.
    #[must_use]
    pub fn into_document(self) -> Document {
        let mut document = self.document;
        document.insert(FUSION_SCORE_FIELD, self.rrf_score);
        document
    }
}

/// Per-call aggregation state for one distinct document.
struct FusionRecord<'a> {
    representative: &'a Document,
    ranks: BTreeMap<usize, usize>,
}

/// Contribution of a single 1-indexed rank to the fused score.
#[must_use]
pub fn rank_contribution(rank: usize, k: f64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let rank = rank as f64;
    1.0 / (k + rank)
}

/// Reciprocal Rank Fusion: merge ranked lists into one deduplicated ranking.
///
/// # Parameters
///
/// - `result_lists`: ranked lists, best first. May overlap arbitrarily.
/// - `k`: RRF constant (e.g., 60). Must be positive and finite.
///
/// # Returns
///
/// One [`FusedResult`] per distinct [`DocumentKey`], sorted by score
/// descending. Empty input (or only empty lists) yields an empty vector.
/// A document repeated inside one list is scored at its best rank there.
///
/// # Errors
///
/// Returns [`FusionError::InvalidFusionConstant`] if `k` is not positive and
/// finite.
pub fn fuse<L: AsRef<[Document]>>(
    result_lists: &[L],
    k: f64,
) -> Result<Vec<FusedResult>, FusionError> {
    validate_fusion_k(k)?;

    let mut index: HashMap<DocumentKey, usize> = HashMap::new();
    let mut records: Vec<FusionRecord<'_>> = Vec::new();

    for (list_index, list) in result_lists.iter().enumerate() {
        for (position, document) in list.as_ref().iter().enumerate() {
            let slot = *index.entry(document.key()).or_insert_with(|| {
                records.push(FusionRecord {
                    representative: document,
                    ranks: BTreeMap::new(),
                });
                records.len() - 1
            });
            // Positions only grow within a list, so the first rank kept is the best.
            records[slot].ranks.entry(list_index).or_insert(position + 1);
        }
    }

    let mut fused: Vec<FusedResult> = records
        .into_iter()
        .map(|record| {
            let rrf_score = record
                .ranks
                .values()
                .map(|rank| rank_contribution(*rank, k))
                .sum();
            let mut document = record.representative.clone();
            document.remove(FUSION_SCORE_FIELD);
            FusedResult {
                document,
                rrf_score,
                ranks: record.ranks,
            }
        })
        .collect();

    // Stable: records are already in first-seen order, which breaks ties.
    fused.sort_by(|a, b| b.rrf_score.total_cmp(&a.rrf_score));

    trace!(
        lists = result_lists.len(),
        distinct = fused.len(),
        "fused ranked lists"
    );
    Ok(fused)
}

/// Fuse result lists supplied as untyped JSON.
///
/// Accepts `null` (no lists) or an array whose elements are arrays of
/// objects. A bare non-array value is reported as a malformed list at index 0.
/// The whole input is checked before any scoring happens.
///
/// # Errors
///
/// - [`FusionError::InvalidInputKind`] for the first element that is not an array.
/// - [`FusionError::InvalidDocumentKind`] for the first array entry that is not an object.
/// - [`FusionError::InvalidFusionConstant`] if `k` is not positive and finite.
pub fn fuse_json(
    result_lists: &serde_json::Value,
    k: f64,
) -> Result<Vec<FusedResult>, FusionError> {
    validate_fusion_k(k)?;
    let lists = result_lists_from_json(result_lists)?;
    fuse(&lists, k)
}

/// Convert untyped JSON into typed result lists, reporting the first malformation.
///
/// # Errors
///
/// See [`fuse_json`].
pub fn result_lists_from_json(
    result_lists: &serde_json::Value,
) -> Result<Vec<ResultList>, FusionError> {
    let lists = match result_lists {
        serde_json::Value::Null => return Ok(Vec::new()),
        serde_json::Value::Array(lists) => lists,
        other => {
            return Err(FusionError::InvalidInputKind {
                list_index: 0,
                found: json_kind(other),
            });
        }
    };

    lists
        .iter()
        .enumerate()
        .map(|(list_index, list)| {
            let serde_json::Value::Array(entries) = list else {
                return Err(FusionError::InvalidInputKind {
                    list_index,
                    found: json_kind(list),
                });
            };
            entries
                .iter()
                .enumerate()
                .map(|(position, entry)| match entry {
                    serde_json::Value::Object(map) => Ok(Document::from(map.clone())),
                    other => Err(FusionError::InvalidDocumentKind {
                        list_index,
                        position,
                        found: json_kind(other),
                    }),
                })
                .collect()
        })
        .collect()
}

pub(crate) const fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
