//! `build-indexes <index_dir> <num_procs>`: precomputes the per-artist fuzzy
//! index cache for every artist in `<index_dir>/mapping.db`.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use fuzzy_mapping_index::bulk::{bulk_build, DEFAULT_BATCH_SIZE};
use fuzzy_mapping_index::cache_store::SqliteCacheStore;
use fuzzy_mapping_index::mapping_store::SqliteMappingStore;
use fuzzy_mapping_index::progress::set_log_only;

/// Precompute the per-artist fuzzy index cache for an entire mapping corpus.
#[derive(Parser)]
#[command(name = "build-indexes")]
#[command(about = "Build per-artist fuzzy search indexes into the cache store")]
struct Args {
    /// Directory containing `mapping.db`.
    index_dir: PathBuf,

    /// Number of worker threads to use for index construction.
    num_procs: usize,

    /// Hide the progress bar and log periodic progress lines instead
    /// (useful when output is redirected to a file).
    #[arg(long)]
    log_only: bool,

    /// Number of artists to build before a cache store batch commit.
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,
}

fn run(args: Args) -> Result<()> {
    set_log_only(args.log_only);

    let db_path = args.index_dir.join("mapping.db");
    let mapping_store = Arc::new(
        SqliteMappingStore::open(&db_path)
            .with_context(|| format!("opening mapping store at {}", db_path.display()))?,
    );
    let cache_store = Arc::new(
        SqliteCacheStore::open(&db_path)
            .with_context(|| format!("opening cache store at {}", db_path.display()))?,
    );

    let stats = bulk_build(mapping_store, cache_store, args.num_procs, args.batch_size)
        .map_err(anyhow::Error::from)
        .context("bulk index build failed")?;

    stats.log();
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("build-indexes: fatal: {err:#}");
            ExitCode::FAILURE
        }
    }
}
