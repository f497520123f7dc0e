//! `hf fuse`: Reciprocal Rank Fusion over ranked lists stored as JSON files.
//!
//! Each input file holds one ranked list (a JSON array of objects, best first).
//! With `--nested`, each file instead holds an array of ranked lists.

use crate::cmd::effective_limit;
use crate::output::{OutputMode, compact_document, pretty_kv, pretty_rule, render_mode};
use anyhow::Context;
use clap::Args;
use hybridfuse_core::config::load_project_config;
use hybridfuse_search::fusion::{FusedResult, fuse_json};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Args, Debug)]
#[command(
    about = "Fuse ranked result lists with Reciprocal Rank Fusion",
    long_about = "Fuse ranked result lists with Reciprocal Rank Fusion.\n\n\
                  Each document scores sum(1 / (k + rank)) over the lists it appears in. \
                  Documents are matched on all fields except `_`-prefixed metadata and `rrf_score`.",
    after_help = "EXAMPLES:\n    # Fuse a vector and a text result list\n    hf fuse vector.json text.json\n\n\
                  # Use a smaller k and keep the top 5\n    hf fuse vector.json text.json -k 10 -n 5\n\n\
                  # One file holding an array of lists\n    hf fuse lists.json --nested\n\n\
                  # Machine-readable output\n    hf fuse vector.json text.json --format json"
)]
pub struct FuseArgs {
    /// JSON files, one ranked list each (or arrays of lists with `--nested`).
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// RRF constant. Defaults to `fusion.rrf_k` from config (60).
    #[arg(short = 'k', long = "k")]
    pub k: Option<f64>,

    /// Maximum number of results to print. All results when omitted.
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Treat each file as an array of ranked lists.
    #[arg(long)]
    pub nested: bool,
}

/// JSON envelope for fusion output.
#[derive(Debug, Serialize)]
pub struct FuseOutput {
    /// RRF constant used.
    pub k: f64,
    /// Number of ranked lists fused.
    pub lists: usize,
    /// Number of results returned.
    pub count: usize,
    /// Fused documents, best first, each carrying `rrf_score`.
    pub results: Vec<FusedResult>,
}

/// Execute `hf fuse <FILE>...`.
///
/// # Errors
///
/// Returns an error if a file cannot be read or parsed, a list is malformed,
/// `k` or the limit is invalid, or output rendering fails.
pub fn run_fuse(args: &FuseArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let cfg = load_project_config(project_root)?.fusion;
    let k = args.k.unwrap_or(cfg.rrf_k);
    let limit = args
        .limit
        .map(|n| effective_limit(n, cfg.max_limit))
        .transpose()?;

    let mut lists = Vec::new();
    for path in &args.files {
        let value = read_json(path)?;
        match value {
            serde_json::Value::Array(inner) if args.nested => lists.extend(inner),
            other => lists.push(other),
        }
    }
    debug!(files = args.files.len(), lists = lists.len(), k, "fusing result lists");

    let list_count = lists.len();
    let mut results = fuse_json(&serde_json::Value::Array(lists), k)?;
    if let Some(limit) = limit {
        results.truncate(limit);
    }

    let fuse_output = FuseOutput {
        k,
        lists: list_count,
        count: results.len(),
        results,
    };

    render_mode(
        output,
        &fuse_output,
        |out, w| render_fuse_text(out, w),
        |out, w| render_fuse_human(out, w),
    )
}

fn read_json(path: &Path) -> anyhow::Result<serde_json::Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn ranks_label(result: &FusedResult) -> String {
    result
        .ranks
        .iter()
        .map(|(list, rank)| format!("{list}:{rank}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn render_fuse_human(out: &FuseOutput, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_kv(w, "Lists", out.lists.to_string())?;
    pretty_kv(w, "k", out.k.to_string())?;
    pretty_kv(w, "Results", out.count.to_string())?;
    if out.results.is_empty() {
        return Ok(());
    }

    pretty_rule(w)?;
    writeln!(w, "{:>4}  {:>10}  {:<12}  DOCUMENT", "#", "SCORE", "RANKS")?;
    pretty_rule(w)?;
    for (pos, result) in out.results.iter().enumerate() {
        writeln!(
            w,
            "{:>4}  {:>10.6}  {:<12}  {}",
            pos + 1,
            result.rrf_score,
            ranks_label(result),
            compact_document(&result.document)
        )?;
    }
    Ok(())
}

fn render_fuse_text(out: &FuseOutput, w: &mut dyn Write) -> std::io::Result<()> {
    if out.results.is_empty() {
        writeln!(w, "advice  no-results  lists={}", out.lists)?;
        return Ok(());
    }

    for result in &out.results {
        writeln!(
            w,
            "score={:.6}  ranks={}  {}",
            result.rrf_score,
            ranks_label(result),
            compact_document(&result.document)
        )?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
