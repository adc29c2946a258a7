//! Strata demo — runs hook chains against an in-memory collection.
//!
//! Loads configuration, initializes logging, and walks through the hook
//! scenarios a model definition typically relies on.

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use strata_core::config::AppConfig;

mod store;
mod walkthrough;

/// Strata hook engine walkthrough
#[derive(Debug, Parser)]
#[command(name = "strata-demo", version, about, long_about = None)]
struct Cli {
    /// Directory holding `default.toml` and per-environment overlays
    #[arg(short, long, default_value = "config")]
    config: String,

    /// Environment overlay to merge on top of the defaults
    #[arg(short, long, default_value = "development")]
    env: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::load(&cli.config, &cli.env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!(config_dir = %cli.config, env = %cli.env, "Configuration loaded");

    if let Err(e) = walkthrough::run(&config).await {
        tracing::error!("Walkthrough failed: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}
