//! acapella-upload - import snapshots into the SQLite catalog
//!
//! Imports one snapshot file or every `*.json` file in a directory.
//! Imports are idempotent: re-running on the same files rewrites the same
//! values and leaves review/like counters alone.

use std::path::PathBuf;

use acapella_common::config::{ConfigOverrides, IngestConfig, TomlConfig};
use acapella_common::db::init_database;
use acapella_ingest::db::{catalog_stats, check_connection, RelationalUpserter};
use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Parser};
use tracing::{info, warn};

/// Artists listed by --verify
const TOP_ARTISTS: i64 = 5;

/// Command-line arguments for acapella-upload
#[derive(Parser, Debug)]
#[command(name = "acapella-upload")]
#[command(about = "Import discography snapshots into the catalog database")]
#[command(version)]
#[command(group(ArgGroup::new("source").args(["file", "dir"])))]
struct Args {
    /// Single snapshot file
    #[arg(long)]
    file: Option<PathBuf>,

    /// Directory of snapshot files
    #[arg(long)]
    dir: Option<PathBuf>,

    /// SQLite database path
    #[arg(long)]
    database: Option<PathBuf>,

    /// Snapshot files imported at the same time
    #[arg(long)]
    concurrency: Option<usize>,

    /// Print row counts and top artists after importing
    #[arg(long)]
    verify: bool,

    /// Only check that the database opens
    #[arg(long)]
    test: bool,

    /// Config file (default: <config dir>/acapella/config.toml)
    #[arg(long, env = "ACAPELLA_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    acapella_ingest::init_tracing();

    let args = Args::parse();

    if args.file.is_none() && args.dir.is_none() && !args.verify && !args.test {
        bail!("Nothing to do: pass --file, --dir, --verify or --test");
    }

    let toml = TomlConfig::load_or_default(args.config.as_deref());
    let overrides = ConfigOverrides {
        database_path: args.database.clone(),
        import_concurrency: args.concurrency,
        ..Default::default()
    };
    let config = IngestConfig::resolve(&overrides, &toml);

    info!("Database: {}", config.database_path.display());
    let pool = init_database(&config.database_path)
        .await
        .context("Failed to open database")?;

    if args.test {
        let version = check_connection(&pool)
            .await
            .context("Database connection check failed")?;
        info!("Database connection OK (SQLite {})", version);
        if args.file.is_none() && args.dir.is_none() && !args.verify {
            return Ok(());
        }
    }

    let upserter = RelationalUpserter::new(pool.clone());
    let mut failed_files = 0;

    if let Some(file) = &args.file {
        let result = upserter
            .import_file(file)
            .await
            .with_context(|| format!("Failed to import {}", file.display()))?;
        info!(
            "{}: artist {}, albums {}/{}, tracks {}/{}",
            file.display(),
            if result.artist_written() { "ok" } else { "FAILED" },
            result.albums.succeeded,
            result.albums.total(),
            result.tracks.succeeded,
            result.tracks.total()
        );
        if !result.artist_written() {
            failed_files += 1;
        }
    }

    if let Some(dir) = &args.dir {
        let (outcomes, summary) = upserter
            .import_dir(dir, config.import_concurrency)
            .await
            .with_context(|| format!("Failed to list {}", dir.display()))?;

        for outcome in outcomes.iter().filter(|o| !o.succeeded()) {
            match &outcome.result {
                Ok(_) => warn!("  [FAIL] {}: artist row not written", outcome.path.display()),
                Err(e) => warn!("  [FAIL] {}: {}", outcome.path.display(), e),
            }
        }

        info!("=== Import summary ===");
        info!("Files: {} total, {} succeeded, {} failed", summary.files, summary.succeeded, summary.failed);
        info!("Albums: {} written, {} failed", summary.albums.succeeded, summary.albums.failed);
        info!("Tracks: {} written, {} failed", summary.tracks.succeeded, summary.tracks.failed);
        failed_files += summary.failed;
    }

    if args.verify {
        let stats = catalog_stats(&pool, TOP_ARTISTS)
            .await
            .context("Failed to read catalog counts")?;
        println!("Artists: {}", stats.artists);
        println!("Albums:  {}", stats.albums);
        println!("Songs:   {}", stats.songs);
        println!("Top artists by song count:");
        for artist in &stats.top_artists {
            println!("  {:<40} {:>4} albums {:>6} songs", artist.name, artist.albums, artist.songs);
        }
    }

    pool.close().await;

    if failed_files > 0 {
        bail!("{} snapshot file(s) failed to import", failed_files);
    }

    Ok(())
}
