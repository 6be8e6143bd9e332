//! PDN CLI: batch front end for the declaration and procurement pipeline.
//!
//! Extracts per-jurisdiction JSON dumps into CSV relations, classifies the
//! income relation into clean and audit outputs, and profiles or probes the
//! data along the way.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// PDN: declaration and procurement extraction pipeline
#[derive(Parser, Debug)]
#[command(name = "pdn", version, about, long_about = None)]
struct Cli {
    /// Workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print summaries as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Extract declaration relations (one directory per jurisdiction)
    Extract(ExtractArgs),
    /// Extract procurement relations from `<jurisdiction>_releases.json` files
    Procurement(ExtractArgs),
    /// Classify the extracted income relation into clean and audit outputs
    Clean(CleanArgs),
    /// Extract declarations, then classify income
    Run {
        #[command(flatten)]
        extract: ExtractArgs,
        /// Directory receiving the clean dataset and audit log
        #[arg(long)]
        clean_output: Option<PathBuf>,
    },
    /// Exploratory statistics over the extracted income relation
    Profile {
        /// Extraction output root
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Number of highest annual incomes to list
        #[arg(long)]
        top: Option<usize>,
        /// Multiplier k in the Q3 + k*IQR bound
        #[arg(long)]
        iqr_multiplier: Option<f64>,
    },
    /// List the key paths found in the first records of a source file
    Probe {
        /// Source JSON file
        file: PathBuf,
        /// Number of records to inspect
        #[arg(long, default_value = "1")]
        sample: usize,
        /// Only print paths starting with this prefix
        #[arg(long, default_value = "declaracion")]
        prefix: String,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug, Default, Clone)]
struct ExtractArgs {
    /// Input root holding one source per jurisdiction
    #[arg(short, long)]
    input: Option<PathBuf>,
    /// Output root receiving one directory per jurisdiction
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Reprocess this jurisdiction even if its output exists (repeatable)
    #[arg(long = "force", value_name = "JURISDICTION")]
    force: Vec<String>,
    /// Concurrent jurisdictions (0 = available cores)
    #[arg(long)]
    workers: Option<usize>,
}

#[derive(clap::Args, Debug, Default, Clone)]
struct CleanArgs {
    /// Extraction output root
    #[arg(short, long)]
    input: Option<PathBuf>,
    /// Directory receiving the clean dataset and audit log
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Show the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = pdn_core::config::log_dir().unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "pdn.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let context = commands::Context {
        workspace,
        config_file: cli.config,
        json: cli.json,
    };
    commands::handle_command(cli.command, &context).await
}
