#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::{CliError, OutputMode, render_error, resolve_output_mode};
use std::env;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "hf: reciprocal rank fusion and hybrid search",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (defaults to pretty on a TTY, text when piped).
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true, hide = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        resolve_output_mode(self.format, self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    Fuse(cmd::fuse::FuseArgs),

    Search(cmd::search::SearchArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("HYBRIDFUSE_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "hybridfuse=debug,info"
        } else {
            "hybridfuse=info,warn"
        })
    });

    let format = env::var("HYBRIDFUSE_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let output = cli.output_mode();
    let command_result = env::current_dir()
        .map_err(anyhow::Error::from)
        .and_then(|project_root| match &cli.command {
            Commands::Fuse(args) => cmd::fuse::run_fuse(args, output, &project_root),
            Commands::Search(args) => cmd::search::run_search(args, output, &project_root),
        });

    match command_result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Err(render_err) = render_error(output, &CliError::from(&err)) {
                eprintln!("error: {err:#} (while rendering: {render_err})");
            }
            ExitCode::FAILURE
        }
    }
}
