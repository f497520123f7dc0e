#![forbid(unsafe_code)]
//! hybridfuse-search library.
//!
//! # Conventions
//!
//! - **Errors**: `FusionError` for fusion and orchestration; `anyhow::Result`
//!   at the [`backend::SearchBackend`] seam and for dataset loading.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod backend;
pub mod fusion;
pub mod memory;

pub use backend::{SearchBackend, TextColumns};
pub use fusion::{FusedResult, HybridQuery, SearchHit, fuse, fuse_json, hybrid_search};
pub use memory::MemoryDataset;
