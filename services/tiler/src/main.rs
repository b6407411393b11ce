//! Radar tiler.
//!
//! Decodes one NEXRAD Level III file, renders it into a tile pyramid and
//! stores one document per tile in the site's collection.

mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use storage::{MemoryTileStore, PostgresTileStore, TileStore};
use tiling::{decode_file, Level3Decoder, PolarTileRenderer, RunReport, TilePipeline};

use config::TilerConfig;

/// Exit status when tiles failed but the run completed.
const EXIT_TILES_FAILED: u8 = 2;

/// Exit status after Ctrl-C.
const EXIT_CANCELLED: u8 = 130;

#[derive(Parser, Debug)]
#[command(name = "tiler")]
#[command(about = "Render a Level III radar file into map tiles")]
struct Args {
    /// Level III file to tile
    file: PathBuf,

    /// Configuration file path
    #[arg(short, long, env = "TILER_CONFIG")]
    config: Option<PathBuf>,

    /// Site identifier, overriding the one in the file header
    #[arg(short, long)]
    site: Option<String>,

    /// Keep tiles in memory instead of writing to the database
    #[arg(long)]
    dry_run: bool,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = TilerConfig::load(args.config.as_deref())?;
    info!(
        config = ?args.config,
        zooms = ?config.tiling.zoom_sizes,
        max_concurrency = config.tiling.max_concurrency,
        dry_run = args.dry_run,
        "Loaded configuration"
    );

    let scan = decode_file(&Level3Decoder, &args.file, args.site.as_deref())
        .await
        .with_context(|| format!("Failed to decode {}", args.file.display()))?;

    let memory_store = Arc::new(MemoryTileStore::new());
    let store: Arc<dyn TileStore> = if args.dry_run {
        memory_store.clone()
    } else {
        let url = config
            .database
            .url
            .as_deref()
            .context("No database URL configured (set DATABASE_URL or use --dry-run)")?;
        Arc::new(PostgresTileStore::connect(url, config.database.max_connections).await?)
    };

    let pipeline = TilePipeline::new(
        config.tiling.clone(),
        Arc::new(config.catalog()?),
        Arc::new(PolarTileRenderer),
        store,
    )?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling outstanding tiles");
            ctrl_c.cancel();
        }
    });

    let report = pipeline.run(scan, &cancel).await?;

    if args.dry_run {
        info!(
            collection = %report.collection,
            documents = memory_store.count(&report.collection).await,
            "Dry run complete, nothing written to the database"
        );
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(exit_code(&report))
}

fn exit_code(report: &RunReport) -> ExitCode {
    if report.cancelled {
        ExitCode::from(EXIT_CANCELLED)
    } else if report.failed() > 0 {
        ExitCode::from(EXIT_TILES_FAILED)
    } else {
        ExitCode::SUCCESS
    }
}
