//! Fusion of vector and full-text result lists into one ranking.
//!
//! [`rrf`] implements Reciprocal Rank Fusion over any number of ranked
//! document lists; [`hybrid`] decides which searches to run and when fusion
//! is worth doing at all.

pub mod hybrid;
pub mod rrf;

pub use hybrid::{HybridQuery, SearchHit, hybrid_search, vector_from_json};
pub use rrf::{FusedResult, fuse, fuse_json, rank_contribution, result_lists_from_json};
