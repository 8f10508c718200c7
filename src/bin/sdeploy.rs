//! CLI entry point for the `sdeploy` command-line tool.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use search_deploy::cli::commands;
use search_deploy::config::resolve_config;
use search_deploy::engine::FailurePolicy;
use search_deploy::search::SearchRequest;

#[derive(Parser)]
#[command(
    name = "sdeploy",
    about = "Deploy versioned search indices and search statuses"
)]
struct Cli {
    /// Output format: "text" (default) or "json"
    #[arg(long, default_value = "text")]
    format: String,

    /// Enable debug logging
    #[arg(long)]
    verbose: bool,

    /// Config file (defaults to $SEARCH_DEPLOY_CONFIG, then ./search-deploy.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Dataset file standing in for the relational store
    #[arg(long, global = true)]
    dataset: Option<PathBuf>,

    /// Local engine state file
    #[arg(long, global = true)]
    engine: Option<PathBuf>,

    /// Live fingerprint file
    #[arg(long, global = true)]
    fingerprints: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade indices and import every record
    Deploy {
        /// Worker pool size
        #[arg(short = 'c', long)]
        concurrency: Option<usize>,
        /// Records fetched per source page
        #[arg(short = 'b', long)]
        batch_size: Option<usize>,
        /// Comma-separated index names (accounts, tags, statuses)
        #[arg(long, value_delimiter = ',')]
        only: Vec<String>,
        /// Pause after each accepted bulk write, in milliseconds
        #[arg(long)]
        backoff_ms: Option<u64>,
        /// Abort on the first rejected batch instead of skipping it
        #[arg(long)]
        fail_fast: bool,
    },
    /// Search statuses as a viewer
    Search {
        /// Query text, with optional from:/after:/before:/has:/is:/language: operators
        query: String,
        /// Account searching; omit to see public statuses only
        #[arg(long)]
        viewer: Option<u64>,
        /// Maximum results
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Results to skip
        #[arg(long, default_value = "0")]
        offset: usize,
        /// Only statuses by this account
        #[arg(long)]
        account_id: Option<u64>,
        /// Only statuses newer than this id
        #[arg(long)]
        min_id: Option<u64>,
        /// Only statuses older than this id
        #[arg(long)]
        max_id: Option<u64>,
        /// Scan the dataset instead of querying the engine
        #[arg(long)]
        no_engine: bool,
    },
    /// Show alias bindings and schema drift for every index
    Status,
}

fn main() {
    let cli = Cli::parse();
    let json = cli.format == "json";

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new().filter_level(level).init();

    let result = resolve_config(cli.config.as_deref()).and_then(|mut config| {
        if let Some(path) = cli.dataset {
            config.dataset_path = path;
        }
        if let Some(path) = cli.engine {
            config.engine_path = path;
        }
        if let Some(path) = cli.fingerprints {
            config.fingerprints_path = path;
        }

        match cli.command {
            Commands::Deploy {
                concurrency,
                batch_size,
                only,
                backoff_ms,
                fail_fast,
            } => {
                if let Some(c) = concurrency {
                    config.concurrency = c;
                }
                if let Some(b) = batch_size {
                    config.batch_size = b;
                }
                if let Some(ms) = backoff_ms {
                    config.backoff_ms = ms;
                }
                if fail_fast {
                    config.failure_policy = FailurePolicy::FailFast;
                }
                let only: Vec<String> = only
                    .into_iter()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                commands::cmd_deploy(&config, &only, json)
            }
            Commands::Search {
                query,
                viewer,
                limit,
                offset,
                account_id,
                min_id,
                max_id,
                no_engine,
            } => {
                let request = SearchRequest {
                    raw_query: query,
                    viewer,
                    limit,
                    offset,
                    account_id,
                    min_id,
                    max_id,
                };
                commands::cmd_search(&config, &request, !no_engine, json)
            }
            Commands::Status => commands::cmd_status(&config, json),
        }
    });

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}
