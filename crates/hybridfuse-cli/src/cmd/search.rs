//! `hf search`: hybrid vector + full-text search over a JSON dataset.
//!
//! The dataset is loaded into memory, the selected columns are indexed, and
//! the query runs through the same orchestrator library callers use: each
//! modality is over-fetched, and results are RRF-fused only when both
//! produced candidates.

use crate::cmd::effective_limit;
use crate::output::{OutputMode, compact_document, pretty_kv, pretty_rule, render_mode};
use clap::Args;
use hybridfuse_core::FusionError;
use hybridfuse_core::config::load_project_config;
use hybridfuse_search::MemoryDataset;
use hybridfuse_search::fusion::{HybridQuery, SearchHit, hybrid_search, vector_from_json};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Args, Debug)]
#[command(
    about = "Hybrid vector + full-text search over a JSON dataset",
    long_about = "Run vector and/or full-text search over a JSON dataset and fuse the results \
                  with Reciprocal Rank Fusion.\n\n\
                  With only one query (or only one modality returning hits) results are passed \
                  through unscored. The dataset is a JSON array of objects or a JSON Lines file.",
    after_help = "EXAMPLES:\n    # Full-text search on the configured text column\n    hf search --data docs.json --text \"authentication timeout\"\n\n\
                  # Vector search\n    hf search --data docs.json --vector '[0.1, 0.9, 0.0]'\n\n\
                  # Hybrid search over two text columns\n    hf search --data docs.json --text auth --vector '[1, 0, 0]' --text-columns title,body\n\n\
                  # Machine-readable output\n    hf search --data docs.json --text auth --format json"
)]
pub struct SearchArgs {
    /// Dataset file: JSON array of objects, or JSON Lines.
    #[arg(long, value_name = "FILE")]
    pub data: PathBuf,

    /// Full-text query.
    #[arg(long)]
    pub text: Option<String>,

    /// Vector query as a JSON array of numbers.
    #[arg(long, value_name = "JSON")]
    pub vector: Option<String>,

    /// Column holding embeddings. Defaults to `fusion.vector_column` (vector).
    #[arg(long, value_name = "COLUMN")]
    pub vector_column: Option<String>,

    /// Single column for text search. Defaults to `fusion.text_column` (text).
    #[arg(long, value_name = "COLUMN")]
    pub text_column: Option<String>,

    /// Several columns searched together by the text query.
    #[arg(long, value_name = "COLUMNS", value_delimiter = ',')]
    pub text_columns: Option<Vec<String>>,

    /// Maximum number of results to return.
    #[arg(short = 'n', long, default_value = "10")]
    pub limit: usize,

    /// RRF constant. Defaults to `fusion.rrf_k` from config (60).
    #[arg(short = 'k', long = "k")]
    pub k: Option<f64>,
}

/// JSON envelope for search output.
#[derive(Debug, Serialize)]
pub struct SearchOutput {
    /// The text query, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Whether a vector query was given.
    pub vector: bool,
    /// Whether the results came out of fusion.
    pub fused: bool,
    /// Total number of results returned.
    pub count: usize,
    /// Ordered list of results (best match first).
    pub results: Vec<SearchHit>,
}

/// Execute `hf search --data <FILE>`.
///
/// # Errors
///
/// Returns an error if the config or dataset cannot be loaded, the query is
/// invalid, the backend search fails, or output rendering fails.
pub fn run_search(
    args: &SearchArgs,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let cfg = load_project_config(project_root)?.fusion;
    let limit = effective_limit(args.limit, cfg.max_limit)?;

    let mut query = HybridQuery::from_config(&cfg, limit);
    if let Some(text) = &args.text {
        query = query.with_text(text.clone());
    }
    if let Some(raw) = &args.vector {
        query = query.with_vector(parse_vector(raw)?);
    }
    if let Some(column) = &args.vector_column {
        query = query.with_vector_column(column.clone());
    }
    if let Some(column) = &args.text_column {
        query = query.with_text_column(column.clone());
    }
    if let Some(columns) = &args.text_columns {
        query = query.with_text_columns(columns.iter().cloned());
    }
    if let Some(k) = args.k {
        query = query.with_fusion_k(k);
    }

    let mut dataset = MemoryDataset::load_json(&args.data)?;
    index_query_columns(&mut dataset, &query);

    let hits = hybrid_search(&dataset, &query)?;
    let search_output = SearchOutput {
        text: args.text.clone(),
        vector: args.vector.is_some(),
        fused: hits.iter().any(SearchHit::is_fused),
        count: hits.len(),
        results: hits,
    };

    render_mode(
        output,
        &search_output,
        |out, w| render_search_text(out, w),
        |out, w| render_search_human(out, w),
    )
}

fn parse_vector(raw: &str) -> Result<Vec<f32>, FusionError> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| FusionError::InvalidVectorKind {
            reason: format!("not valid JSON ({e})"),
        })?;
    vector_from_json(&value)
}

/// Index the columns the query will search.
///
/// Failures are left for the search itself to report, so a column that cannot
/// be indexed surfaces as a backend error naming that column.
fn index_query_columns(dataset: &mut MemoryDataset, query: &HybridQuery) {
    if query.vector_query.is_some()
        && let Err(err) = dataset.create_vector_index(&query.vector_column)
    {
        debug!(column = %query.vector_column, "vector index not created: {err:#}");
    }

    if query.text_query.as_deref().is_some_and(|q| !q.trim().is_empty()) {
        let explicit: Vec<&String> = query
            .text_column
            .iter()
            .chain(query.text_columns.iter().flatten())
            .collect();
        let columns = if explicit.is_empty() {
            vec![&query.default_text_column]
        } else {
            explicit
        };
        for column in columns {
            if let Err(err) = dataset.create_text_index(column) {
                debug!(column = %column, "text index not created: {err:#}");
            }
        }
    }
}

fn score_label(hit: &SearchHit) -> String {
    hit.rrf_score
        .map_or_else(|| "-".to_string(), |score| format!("{score:.6}"))
}

/// Render search results in human-readable format.
fn render_search_human(out: &SearchOutput, w: &mut dyn Write) -> std::io::Result<()> {
    if let Some(text) = &out.text {
        pretty_kv(w, "Text", text)?;
    }
    pretty_kv(w, "Vector", if out.vector { "yes" } else { "no" })?;
    pretty_kv(w, "Fused", if out.fused { "yes" } else { "no" })?;

    if out.results.is_empty() {
        writeln!(w, "No results")?;
        return Ok(());
    }

    writeln!(w, "{} result(s):", out.count)?;
    pretty_rule(w)?;
    writeln!(w, "{:>4}  {:>10}  DOCUMENT", "#", "RRF")?;
    pretty_rule(w)?;
    for (pos, hit) in out.results.iter().enumerate() {
        writeln!(
            w,
            "{:>4}  {:>10}  {}",
            pos + 1,
            score_label(hit),
            compact_document(&hit.document)
        )?;
    }
    Ok(())
}

fn render_search_text(out: &SearchOutput, w: &mut dyn Write) -> std::io::Result<()> {
    if out.results.is_empty() {
        writeln!(w, "advice  no-results")?;
        return Ok(());
    }

    for hit in &out.results {
        writeln!(
            w,
            "score={}  {}",
            score_label(hit),
            compact_document(&hit.document)
        )?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
