//! Hybrid search orchestration across vector and full-text modalities.
//!
//! The orchestrator decides which searches to run, over-fetches each one, and
//! only fuses when both modalities produced candidates:
//! - no non-empty result list: empty output
//! - one non-empty list: its first `limit` documents, unscored
//! - two non-empty lists: RRF-fused, first `limit` results with `rrf_score`
//!
//! Arguments are validated before the backend is touched. Backend errors are
//! returned unchanged inside [`FusionError::UpstreamSearchFailure`].

use crate::backend::{SearchBackend, TextColumns};
use crate::fusion::rrf::{FusedResult, fuse, json_kind};
use hybridfuse_core::config::FusionConfig;
use hybridfuse_core::error::validate_fusion_k;
use hybridfuse_core::{Document, FusionError, ResultList};
use serde::Serialize;
use tracing::{debug, instrument};

/// One hybrid search hit.
///
/// `rrf_score` is only set when the hit came out of fusion; pass-through hits
/// are the backend's documents unchanged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub document: Document,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rrf_score: Option<f64>,
}

impl SearchHit {
    #[must_use]
    pub const fn passthrough(document: Document) -> Self {
        Self {
            document,
            rrf_score: None,
        }
    }

    #[must_use]
    pub const fn is_fused(&self) -> bool {
        self.rrf_score.is_some()
    }
}

impl From<FusedResult> for SearchHit {
    fn from(result: FusedResult) -> Self {
        Self {
            document: result.document,
            rrf_score: Some(result.rrf_score),
        }
    }
}

/// Parameters for [`hybrid_search`].
#[derive(Debug, Clone, PartialEq)]
pub struct HybridQuery {
    pub text_query: Option<String>,
    pub vector_query: Option<Vec<f32>>,
    pub vector_column: String,
    pub text_column: Option<String>,
    pub text_columns: Option<Vec<String>>,
    pub limit: usize,
    pub fusion_k: f64,
    /// Candidates requested per modality, as a multiple of `limit`.
    pub overfetch_factor: usize,
    /// Column searched when neither `text_column` nor `text_columns` is set.
    pub default_text_column: String,
}

impl HybridQuery {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self::from_config(&FusionConfig::default(), limit)
    }

    /// Query seeded with the configured columns, `k`, and over-fetch factor.
    #[must_use]
    pub fn from_config(config: &FusionConfig, limit: usize) -> Self {
        Self {
            text_query: None,
            vector_query: None,
            vector_column: config.vector_column.clone(),
            text_column: None,
            text_columns: None,
            limit,
            fusion_k: config.rrf_k,
            overfetch_factor: config.overfetch_factor,
            default_text_column: config.text_column.clone(),
        }
    }

    #[must_use]
    pub fn with_text(mut self, query: impl Into<String>) -> Self {
        self.text_query = Some(query.into());
        self
    }

    #[must_use]
    pub fn with_vector(mut self, query: Vec<f32>) -> Self {
        self.vector_query = Some(query);
        self
    }

    #[must_use]
    pub fn with_vector_column(mut self, column: impl Into<String>) -> Self {
        self.vector_column = column.into();
        self
    }

    #[must_use]
    pub fn with_text_column(mut self, column: impl Into<String>) -> Self {
        self.text_column = Some(column.into());
        self
    }

    #[must_use]
    pub fn with_text_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.text_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub const fn with_fusion_k(mut self, k: f64) -> Self {
        self.fusion_k = k;
        self
    }

    /// Number of candidates requested from each modality.
    #[must_use]
    pub fn candidate_limit(&self) -> usize {
        self.limit.saturating_mul(self.overfetch_factor.max(1))
    }

    fn plan(&self) -> Result<SearchPlan<'_>, FusionError> {
        let columns = self.text_selection()?;
        if self.limit == 0 {
            return Err(FusionError::InvalidLimit);
        }
        validate_fusion_k(self.fusion_k)?;

        let vector = match &self.vector_query {
            Some(vector) => {
                validate_vector(vector)?;
                Some(vector.as_slice())
            }
            None => None,
        };

        let text = self
            .text_query
            .as_deref()
            .filter(|q| !q.trim().is_empty())
            .map(|q| (columns, q));

        Ok(SearchPlan { vector, text })
    }

    fn text_selection(&self) -> Result<TextColumns, FusionError> {
        match (&self.text_column, &self.text_columns) {
            (Some(_), Some(_)) => Err(FusionError::AmbiguousColumnSelection {
                reason: "both text_column and text_columns were given",
            }),
            (None, Some(columns)) if columns.is_empty() => {
                Err(FusionError::AmbiguousColumnSelection {
                    reason: "text_columns is empty",
                })
            }
            (None, Some(columns)) => Ok(TextColumns::Multi(columns.clone())),
            (Some(column), None) => Ok(TextColumns::Single(column.clone())),
            (None, None) => Ok(TextColumns::Single(self.default_text_column.clone())),
        }
    }
}

impl Default for HybridQuery {
    fn default() -> Self {
        Self::new(10)
    }
}

struct SearchPlan<'q> {
    vector: Option<&'q [f32]>,
    text: Option<(TextColumns, &'q str)>,
}

fn validate_vector(vector: &[f32]) -> Result<(), FusionError> {
    if vector.is_empty() {
        return Err(FusionError::InvalidVectorKind {
            reason: "vector is empty".into(),
        });
    }
    if let Some(pos) = vector.iter().position(|x| !x.is_finite()) {
        return Err(FusionError::InvalidVectorKind {
            reason: format!("component {pos} is not a finite number"),
        });
    }
    Ok(())
}

/// Parse an untyped JSON vector query.
///
/// # Errors
///
/// Returns [`FusionError::InvalidVectorKind`] unless `value` is a non-empty
/// array of finite numbers.
#[allow(clippy::cast_possible_truncation)]
pub fn vector_from_json(value: &serde_json::Value) -> Result<Vec<f32>, FusionError> {
    let serde_json::Value::Array(items) = value else {
        return Err(FusionError::InvalidVectorKind {
            reason: format!("expected an array, found {}", json_kind(value)),
        });
    };
    let vector = items
        .iter()
        .enumerate()
        .map(|(pos, item)| {
            item.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| FusionError::InvalidVectorKind {
                    reason: format!("component {pos} is a {}", json_kind(item)),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    validate_vector(&vector)?;
    Ok(vector)
}

/// Run vector and/or text search and fuse the results with RRF.
///
/// Each modality is asked for `limit × overfetch_factor` candidates; results
/// are truncated to `limit` only after fusion or pass-through.
///
/// # Errors
///
/// Validation errors ([`FusionError::AmbiguousColumnSelection`],
/// [`FusionError::InvalidLimit`], [`FusionError::InvalidFusionConstant`],
/// [`FusionError::InvalidVectorKind`]) are returned before any backend call.
/// Backend failures are returned as [`FusionError::UpstreamSearchFailure`].
#[instrument(skip_all, fields(limit = query.limit))]
pub fn hybrid_search<B: SearchBackend + ?Sized>(
    backend: &B,
    query: &HybridQuery,
) -> Result<Vec<SearchHit>, FusionError> {
    let plan = query.plan()?;
    let candidates = query.candidate_limit();
    let mut lists: Vec<ResultList> = Vec::with_capacity(2);

    if let Some(vector) = plan.vector {
        let hits = backend
            .vector_search(&query.vector_column, vector, candidates)
            .map_err(FusionError::UpstreamSearchFailure)?;
        debug!(column = %query.vector_column, hits = hits.len(), "vector search");
        if !hits.is_empty() {
            lists.push(hits);
        }
    }

    if let Some((columns, text)) = &plan.text {
        let hits = backend
            .text_search(columns, text, candidates)
            .map_err(FusionError::UpstreamSearchFailure)?;
        debug!(columns = %columns, hits = hits.len(), "text search");
        if !hits.is_empty() {
            lists.push(hits);
        }
    }

    match lists.len() {
        0 => {
            debug!("no candidates from any modality");
            Ok(Vec::new())
        }
        1 => {
            debug!("single modality, skipping fusion");
            Ok(lists
                .into_iter()
                .flatten()
                .take(query.limit)
                .map(SearchHit::passthrough)
                .collect())
        }
        _ => {
            let fused = fuse(&lists, query.fusion_k)?;
            debug!(distinct = fused.len(), "fused vector and text results");
            Ok(fused
                .into_iter()
                .take(query.limit)
                .map(SearchHit::from)
                .collect())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use serde_json::json;
    use std::sync::Mutex;

    /// Backend returning canned lists and recording every call.
    #[derive(Default)]
    struct ScriptedBackend {
        vector_hits: ResultList,
        text_hits: ResultList,
        fail_text: bool,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("lock").clone()
        }
    }

    impl SearchBackend for ScriptedBackend {
        fn vector_search(
            &self,
            column: &str,
            _query: &[f32],
            limit: usize,
        ) -> anyhow::Result<ResultList> {
            self.calls
                .lock()
                .expect("lock")
                .push(format!("vector:{column}:{limit}"));
            Ok(self.vector_hits.iter().take(limit).cloned().collect())
        }

        fn text_search(
            &self,
            columns: &TextColumns,
            _query: &str,
            limit: usize,
        ) -> anyhow::Result<ResultList> {
            self.calls
                .lock()
                .expect("lock")
                .push(format!("text:{columns}:{limit}"));
            if self.fail_text {
                bail!("column `{columns}` has no inverted index");
            }
            Ok(self.text_hits.iter().take(limit).cloned().collect())
        }
    }

    fn doc(id: i64) -> Document {
        Document::new().with("id", id)
    }

    fn ids(hits: &[SearchHit]) -> Vec<i64> {
        hits.iter()
            .filter_map(|h| h.document.get("id").and_then(hybridfuse_core::Value::as_f64))
            .map(|f| f as i64)
            .collect()
    }

    #[test]
    fn ambiguous_columns_fail_before_any_call() {
        let backend = ScriptedBackend::default();
        let query = HybridQuery::new(5)
            .with_text("auth")
            .with_text_column("title")
            .with_text_columns(["title", "body"]);

        let err = hybrid_search(&backend, &query).expect_err("ambiguous");
        assert!(matches!(err, FusionError::AmbiguousColumnSelection { .. }));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn empty_text_columns_is_ambiguous() {
        let backend = ScriptedBackend::default();
        let query = HybridQuery::new(5)
            .with_text("auth")
            .with_text_columns(Vec::<String>::new());
        assert!(matches!(
            hybrid_search(&backend, &query),
            Err(FusionError::AmbiguousColumnSelection { .. })
        ));
    }

    #[test]
    fn invalid_vector_fails_before_any_call() {
        let backend = ScriptedBackend::default();
        let query = HybridQuery::new(5)
            .with_text("auth")
            .with_vector(vec![0.1, f32::NAN]);

        let err = hybrid_search(&backend, &query).expect_err("nan component");
        assert!(matches!(err, FusionError::InvalidVectorKind { .. }));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn zero_limit_is_rejected() {
        let backend = ScriptedBackend::default();
        let query = HybridQuery::new(0).with_text("auth");
        assert!(matches!(
            hybrid_search(&backend, &query),
            Err(FusionError::InvalidLimit)
        ));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn invalid_fusion_constant_fails_before_any_call() {
        for k in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let backend = ScriptedBackend {
                vector_hits: vec![doc(1)],
                text_hits: vec![doc(2)],
                ..ScriptedBackend::default()
            };
            let query = HybridQuery::new(5)
                .with_text("auth")
                .with_vector(vec![1.0, 0.0])
                .with_fusion_k(k);

            let err = hybrid_search(&backend, &query).expect_err("bad k");
            assert!(
                matches!(err, FusionError::InvalidFusionConstant(_)),
                "k={k}: {err:?}"
            );
            assert!(backend.calls().is_empty(), "k={k}");
        }
    }

    #[test]
    fn no_queries_return_empty_without_calls() {
        let backend = ScriptedBackend::default();
        let hits = hybrid_search(&backend, &HybridQuery::new(5)).expect("search");
        assert!(hits.is_empty());
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn blank_text_query_is_skipped() {
        let backend = ScriptedBackend {
            text_hits: vec![doc(1)],
            ..ScriptedBackend::default()
        };
        let hits = hybrid_search(&backend, &HybridQuery::new(5).with_text("  ")).expect("search");
        assert!(hits.is_empty());
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn each_modality_is_overfetched() {
        let backend = ScriptedBackend::default();
        let query = HybridQuery::new(4)
            .with_text("auth")
            .with_vector(vec![0.1, 0.2])
            .with_vector_column("embedding")
            .with_text_columns(["title", "body"]);

        let hits = hybrid_search(&backend, &query).expect("search");
        assert!(hits.is_empty());
        assert_eq!(
            backend.calls(),
            vec!["vector:embedding:8".to_string(), "text:title,body:8".to_string()]
        );
    }

    #[test]
    fn text_defaults_to_configured_column() {
        let backend = ScriptedBackend::default();
        let _ = hybrid_search(&backend, &HybridQuery::new(3).with_text("auth")).expect("search");
        assert_eq!(backend.calls(), vec!["text:text:6".to_string()]);
    }

    #[test]
    fn single_modality_passes_through_unscored() {
        let backend = ScriptedBackend {
            vector_hits: (1..=10).map(doc).collect(),
            ..ScriptedBackend::default()
        };
        let query = HybridQuery::new(3).with_vector(vec![1.0, 0.0]);

        let hits = hybrid_search(&backend, &query).expect("search");
        assert_eq!(ids(&hits), vec![1, 2, 3]);
        assert!(hits.iter().all(|h| !h.is_fused()));
    }

    #[test]
    fn empty_modality_does_not_trigger_fusion() {
        let backend = ScriptedBackend {
            text_hits: vec![doc(4), doc(2)],
            ..ScriptedBackend::default()
        };
        let query = HybridQuery::new(5)
            .with_text("auth")
            .with_vector(vec![1.0]);

        let hits = hybrid_search(&backend, &query).expect("search");
        assert_eq!(ids(&hits), vec![4, 2]);
        assert!(hits.iter().all(|h| h.rrf_score.is_none()));
    }

    #[test]
    fn both_modalities_are_fused_and_truncated_after_fusion() {
        // Doc 3 is last in both lists (within the over-fetch window) and would
        // be lost if each list were cut to `limit` before fusing.
        let backend = ScriptedBackend {
            vector_hits: vec![doc(1), doc(3)],
            text_hits: vec![doc(2), doc(3)],
            ..ScriptedBackend::default()
        };
        let query = HybridQuery::new(1).with_text("auth").with_vector(vec![1.0]);

        let hits = hybrid_search(&backend, &query).expect("search");
        assert_eq!(ids(&hits), vec![3]);
        let score = hits[0].rrf_score.expect("fused");
        assert!((score - 2.0 / 62.0).abs() < 1e-12);
    }

    #[test]
    fn fused_hits_have_no_duplicates_and_descend() {
        let backend = ScriptedBackend {
            vector_hits: vec![
                doc(1).with("_distance", 0.1),
                doc(2).with("_distance", 0.2),
                doc(3).with("_distance", 0.3),
            ],
            text_hits: vec![doc(3).with("_score", 5.0), doc(4).with("_score", 1.0)],
            ..ScriptedBackend::default()
        };
        let query = HybridQuery::new(10).with_text("auth").with_vector(vec![1.0]);

        let hits = hybrid_search(&backend, &query).expect("search");
        assert_eq!(hits.len(), 4);
        let mut seen = ids(&hits);
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 4);
        assert!(hits.windows(2).all(|w| w[0].rrf_score >= w[1].rrf_score));
        assert!(hits.iter().all(SearchHit::is_fused));
    }

    #[test]
    fn custom_fusion_k_is_used() {
        let backend = ScriptedBackend {
            vector_hits: vec![doc(1)],
            text_hits: vec![doc(1)],
            ..ScriptedBackend::default()
        };
        let query = HybridQuery::new(1)
            .with_text("auth")
            .with_vector(vec![1.0])
            .with_fusion_k(1.0);

        let hits = hybrid_search(&backend, &query).expect("search");
        assert!((hits[0].rrf_score.expect("fused") - 1.0).abs() < 1e-12);
    }

    #[test]
    fn backend_errors_propagate_unmodified() {
        let backend = ScriptedBackend {
            vector_hits: vec![doc(1)],
            fail_text: true,
            ..ScriptedBackend::default()
        };
        let query = HybridQuery::new(2)
            .with_text("auth")
            .with_text_column("summary")
            .with_vector(vec![1.0]);

        let err = hybrid_search(&backend, &query).expect_err("text side fails");
        assert!(matches!(err, FusionError::UpstreamSearchFailure(_)));
        assert_eq!(err.to_string(), "column `summary` has no inverted index");
    }

    #[test]
    fn search_hit_serialization_omits_missing_score() {
        let plain = serde_json::to_value(SearchHit::passthrough(doc(1))).expect("serialize");
        assert_eq!(plain, json!({"id": 1}));

        let fused = SearchHit {
            document: doc(1),
            rrf_score: Some(0.5),
        };
        let value = serde_json::to_value(fused).expect("serialize");
        assert_eq!(value, json!({"id": 1, "rrf_score": 0.5}));
    }

    #[test]
    fn vector_from_json_validates_shape() {
        assert_eq!(
            vector_from_json(&json!([1, 0.5, -2])).expect("numeric"),
            vec![1.0, 0.5, -2.0]
        );
        for bad in [json!("0.1,0.2"), json!([]), json!([0.1, "x"]), json!({"v": [1]})] {
            assert!(matches!(
                vector_from_json(&bad),
                Err(FusionError::InvalidVectorKind { .. })
            ));
        }
    }
}
