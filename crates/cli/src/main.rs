//! coalesce CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;
mod util;

/// coalesce - Delay presets and debounced call simulation
#[derive(Parser)]
#[command(name = "coalesce")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: $COALESCE_CONFIG or <config dir>/coalesce/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the effective delay presets
    Presets,
    /// View or edit the delay configuration
    Config {
        /// List every key with its effective value (default)
        #[arg(long)]
        list: bool,
        /// Print the effective value of a key (e.g. delays.search)
        #[arg(long, value_name = "KEY")]
        get: Option<String>,
        /// Set a key to a value in milliseconds
        #[arg(long, num_args = 2, value_names = ["KEY", "VALUE"])]
        set: Option<Vec<String>>,
        /// Print the config file path
        #[arg(long)]
        path: bool,
        /// With --path: create the file if it does not exist
        #[arg(long, requires = "path")]
        create: bool,
        /// Print an example config
        #[arg(long)]
        example: bool,
    },
    /// Feed timed input events through a debounced value and lookup
    Simulate {
        /// Delay preset to use (e.g. search, auto_save)
        #[arg(long, conflicts_with = "delay_ms")]
        preset: Option<String>,
        /// Explicit delay in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,
        /// Simulated lookup latency in milliseconds
        #[arg(long, default_value = "0")]
        latency_ms: u64,
        /// Make the lookup fail with this message
        #[arg(long)]
        fail: Option<String>,
        /// Flush right after the last event instead of waiting out the delay
        #[arg(long)]
        flush: bool,
        /// Events as VALUE@OFFSET_MS (e.g. h@0 he@120 hel@250)
        #[arg(required = true)]
        events: Vec<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize tracing (stderr, so command output stays clean)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config_path = util::config_path(cli.config)?;

    match cli.command {
        Commands::Presets => cmd::presets::run(&config_path).await,
        Commands::Config { list: _, get, set, path, create, example } => {
            if let Some(key) = get {
                cmd::config::run_get(&config_path, &key).await
            } else if let Some(pair) = set {
                cmd::config::run_set(&config_path, &pair[0], &pair[1]).await
            } else if path {
                cmd::config::run_path(&config_path, create).await
            } else if example {
                cmd::config::run_example().await
            } else {
                cmd::config::run_list(&config_path).await
            }
        }
        Commands::Simulate { preset, delay_ms, latency_ms, fail, flush, events } => {
            let options = cmd::simulate::Options::resolve(
                &config_path,
                preset.as_deref(),
                delay_ms,
                latency_ms,
                fail,
                flush,
            )?;
            cmd::simulate::run(options, &events).await
        }
    }
}
