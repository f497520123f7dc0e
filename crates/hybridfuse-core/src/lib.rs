#![forbid(unsafe_code)]
//! hybridfuse-core library.
//!
//! # Conventions
//!
//! - **Errors**: `FusionError` (thiserror) for library failures callers match
//!   on; `anyhow::Result` for config loading and application code.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod config;
pub mod document;
pub mod error;

pub use document::{Document, DocumentKey, FUSION_SCORE_FIELD, METADATA_PREFIX, Value};
pub use error::{ErrorCode, FusionError};

/// An ordered list of documents from one search modality; rank is position + 1.
pub type ResultList = Vec<Document>;
