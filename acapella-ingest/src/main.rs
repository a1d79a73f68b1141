//! acapella-fetch - build discography snapshots
//!
//! Resolves each artist name against MusicBrainz, enriches it, and writes
//! one `<Artist>_<timestamp>.json` snapshot per artist into the output
//! directory. Artists run one after another; a failed artist is reported
//! and the batch moves on.

use std::path::{Path, PathBuf};

use acapella_common::config::{ConfigOverrides, IngestConfig, TomlConfig};
use acapella_ingest::ArtistAggregator;
use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;

/// Command-line arguments for acapella-fetch
#[derive(Parser, Debug)]
#[command(name = "acapella-fetch")]
#[command(about = "Fetch artist discographies into snapshot files")]
#[command(version)]
struct Args {
    /// Artist names to fetch
    names: Vec<String>,

    /// JSON file holding an array of artist names
    #[arg(long)]
    artists_file: Option<PathBuf>,

    /// Only process the first N names
    #[arg(long)]
    limit: Option<usize>,

    /// Directory snapshots are written to
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Also search platform links for every track
    #[arg(long)]
    enrich_track_links: bool,

    /// Config file (default: <config dir>/acapella/config.toml)
    #[arg(long, env = "ACAPELLA_CONFIG")]
    config: Option<PathBuf>,
}

fn load_names_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read artists file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Artists file {} is not a JSON array of names", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    acapella_ingest::init_tracing();

    let args = Args::parse();

    let mut names = args.names.clone();
    if let Some(path) = &args.artists_file {
        names.extend(load_names_file(path)?);
    }
    names.retain(|name| !name.trim().is_empty());
    if let Some(limit) = args.limit {
        names.truncate(limit);
    }
    if names.is_empty() {
        bail!("No artist names given (pass names or --artists-file)");
    }

    let toml = TomlConfig::load_or_default(args.config.as_deref());
    let overrides = ConfigOverrides {
        output_dir: args.output_dir.clone(),
        enrich_track_links: args.enrich_track_links.then_some(true),
        ..Default::default()
    };
    let config = IngestConfig::resolve(&overrides, &toml);

    info!("Starting acapella-fetch {}", env!("CARGO_PKG_VERSION"));
    info!("Output directory: {}", config.output_dir.display());
    info!("Artists: {}", names.len());

    let aggregator =
        ArtistAggregator::from_config(&config).context("Failed to initialize HTTP client")?;

    let outcomes = aggregator.run_batch(&names).await;

    let written = outcomes.iter().filter(|o| o.result.is_ok()).count();
    info!("=== Summary: {} written, {} failed ===", written, outcomes.len() - written);
    for outcome in &outcomes {
        match &outcome.result {
            Ok(path) => info!("  [OK]   {} -> {}", outcome.name, path.display()),
            Err(e) => info!("  [FAIL] {}: {}", outcome.name, e),
        }
    }

    if written == 0 {
        bail!("No snapshots written");
    }

    Ok(())
}
