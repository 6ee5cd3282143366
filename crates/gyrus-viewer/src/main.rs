//! Gyrus - Anatomy model viewer
//!
//! Converts patient scans through the remote backend, renders the resulting
//! model, and lets the user mark a point of interest for analysis.

mod app;
mod config;
mod interact;
mod marker;
mod model;
mod scene;
mod speech;
mod tasks;
mod ui;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "gyrus")]
#[command(about = "Anatomy scan conversion viewer with point annotation")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "gyrus.toml")]
    config: PathBuf,

    /// Conversion backend base URL
    #[arg(short, long)]
    backend: Option<String>,

    /// Load a local GLB file instead of converting a scan
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Gyrus v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = config::load_config(&args.config)?;

    // Override backend URL if specified
    if let Some(backend) = args.backend {
        config.backend.base_url = backend;
    }

    info!(
        backend = %config.backend.base_url,
        cache = %config.viewer.cache_dir,
        "Configuration loaded"
    );

    app::run(config, args.model)
}
