//! Deep Researcher CLI: the main entry point.
//!
//! Commands:
//! - `serve`          Start the HTTP API
//! - `status`         Show resolved configuration and model cache state
//! - `prepare-model`  Download the embedding model ahead of first use

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "deepresearch",
    about = "Deep Researcher API: lazy, memory-bounded research service",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Config file (default: ~/.deepresearch/config.toml)
    #[arg(short, long, global = true, env = "DEEPRESEARCH_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show configuration and model cache status
    Status,

    /// Download the embedding model into the local cache
    PrepareModel,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_json);

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { port } => commands::serve::run(config, port).await?,
        Commands::Status => commands::status::run(&config)?,
        Commands::PrepareModel => commands::prepare_model::run(&config).await?,
    }

    Ok(())
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
