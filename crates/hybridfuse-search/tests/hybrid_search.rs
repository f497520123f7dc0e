//! End-to-end hybrid search over the in-memory dataset.
//!
//! # Scenarios covered
//!
//! 1. **Text query with no matches** returns an empty list, not an error.
//! 2. **Vector-only search** passes results through with no fusion score.
//! 3. **Vector + text search** fuses, respects the limit, descends by score,
//!    and never repeats a document matched by both modalities.
//! 4. **Missing index** errors from the dataset reach the caller unchanged.
//! 5. **Multi-column text search** is selected with `text_columns`.

use hybridfuse_core::config::FusionConfig;
use hybridfuse_core::{Document, FusionError, Value};
use hybridfuse_search::fusion::{HybridQuery, SearchHit, hybrid_search};
use hybridfuse_search::MemoryDataset;
use std::collections::HashSet;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn build_dataset() -> MemoryDataset {
    let rows = [
        (1, "Fix authentication timeout", "OAuth service fails after 30 seconds under load", [1.0_f32, 0.0, 0.0]),
        (2, "Database connection pool exhaustion", "Pool exhausts under sustained write load", [0.0, 1.0, 0.0]),
        (3, "README cleanup and typo fixes", "Documentation improvements and spelling corrections", [0.0, 0.0, 1.0]),
        (4, "Authentication token refresh race", "Refresh fails when two requests overlap", [0.8, 0.2, 0.0]),
        (5, "Slow authentication under load", "Login latency spikes during peak load", [0.7, 0.3, 0.0]),
    ];

    let mut dataset = MemoryDataset::new();
    dataset.add_documents(rows.iter().map(|(id, title, body, vector)| {
        Document::new()
            .with("id", *id)
            .with("title", *title)
            .with("body", *body)
            .with("vector", vector.to_vec())
    }));
    dataset.create_vector_index("vector").expect("vector index");
    dataset.create_text_index("title").expect("title index");
    dataset.create_text_index("body").expect("body index");
    dataset
}

fn ids(hits: &[SearchHit]) -> Vec<i64> {
    hits.iter()
        .map(|hit| match hit.document.get("id") {
            Some(Value::Int(id)) => *id,
            other => panic!("hit without integer id: {other:?}"),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn text_query_without_matches_is_empty() {
    let dataset = build_dataset();
    let query = HybridQuery::new(10)
        .with_text("NonexistentTerm")
        .with_text_column("title");

    let hits = hybrid_search(&dataset, &query).expect("no error for zero matches");
    assert!(hits.is_empty());
}

#[test]
fn vector_only_search_is_not_fused() {
    let dataset = build_dataset();
    let query = HybridQuery::new(3).with_vector(vec![1.0, 0.0, 0.0]);

    let hits = hybrid_search(&dataset, &query).expect("search");
    assert_eq!(ids(&hits), vec![1, 4, 5]);
    assert!(hits.iter().all(|hit| hit.rrf_score.is_none()));
    assert!(hits.iter().all(|hit| !hit.document.contains_field("rrf_score")));
    assert!(hits.iter().all(|hit| hit.document.contains_field("_distance")));
}

#[test]
fn text_only_search_is_not_fused() {
    let dataset = build_dataset();
    let query = HybridQuery::new(2)
        .with_text("authentication")
        .with_text_column("title");

    let hits = hybrid_search(&dataset, &query).expect("search");
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|hit| !hit.is_fused()));
}

#[test]
fn vector_and_text_are_fused_without_duplicates() {
    let dataset = build_dataset();
    let query = HybridQuery::new(3)
        .with_text("authentication load")
        .with_text_columns(["title", "body"])
        .with_vector(vec![1.0, 0.0, 0.0]);

    let hits = hybrid_search(&dataset, &query).expect("search");
    assert!(hits.len() <= 3);
    assert!(!hits.is_empty());
    assert!(hits.iter().all(SearchHit::is_fused));

    let unique: HashSet<i64> = ids(&hits).into_iter().collect();
    assert_eq!(unique.len(), hits.len());

    for pair in hits.windows(2) {
        assert!(pair[0].rrf_score >= pair[1].rrf_score);
    }

    // Full original fields survive fusion.
    for hit in &hits {
        assert!(hit.document.contains_field("title"));
        assert!(hit.document.contains_field("body"));
        assert!(hit.document.contains_field("vector"));
    }
}

#[test]
fn documents_matched_by_both_modalities_rank_first() {
    let dataset = build_dataset();
    let query = HybridQuery::new(5)
        .with_text("authentication")
        .with_text_column("title")
        .with_vector(vec![0.0, 0.0, 1.0]);

    // Text hits: 1, 4, 5. Vector hits (nearest first): 3, ... Every text hit
    // also appears in the over-fetched vector list, so all of them outrank
    // the vector-only document 2.
    let hits = hybrid_search(&dataset, &query).expect("search");
    let order = ids(&hits);
    let pos = |id: i64| order.iter().position(|x| *x == id).expect("present");
    assert!(pos(1) < pos(2));
    assert!(pos(4) < pos(2));
    assert!(pos(5) < pos(2));
}

#[test]
fn missing_index_error_reaches_caller() {
    let dataset = build_dataset();
    let query = HybridQuery::new(5)
        .with_text("authentication")
        .with_text_column("summary");

    let err = hybrid_search(&dataset, &query).expect_err("no index on summary");
    assert!(matches!(err, FusionError::UpstreamSearchFailure(_)));
    assert!(err.to_string().contains("summary"));
}

#[test]
fn configured_columns_are_used_by_default() {
    let mut dataset = MemoryDataset::new();
    dataset.add_documents([
        Document::new().with("id", 1).with("content", "rust fusion").with("emb", vec![1.0_f32]),
        Document::new().with("id", 2).with("content", "python").with("emb", vec![0.0_f32]),
    ]);
    dataset.create_vector_index("emb").expect("vector index");
    dataset.create_text_index("content").expect("text index");

    let config = FusionConfig {
        vector_column: "emb".into(),
        text_column: "content".into(),
        ..FusionConfig::default()
    };
    let query = HybridQuery::from_config(&config, 1)
        .with_text("fusion")
        .with_vector(vec![1.0]);

    let hits = hybrid_search(&dataset, &query).expect("search");
    assert_eq!(ids(&hits), vec![1]);
    assert!(hits[0].is_fused());
}
