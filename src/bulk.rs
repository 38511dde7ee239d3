//! Parallel bulk builder: precomputes cache entries for every artist missing
//! one. Workers are `rayon` threads rather than OS processes (see
//! DESIGN.md); each worker owns its own [`ArtistIndexBuilder`] and touches
//! no shared mutable state besides the cache store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;

use crate::builder::ArtistIndexBuilder;
use crate::cache_store::CacheStore;
use crate::error::{BuildError, WorkerFatal};
use crate::mapping_store::MappingStore;
use crate::progress::{create_progress_bar, log_progress};

/// Artists are dispatched to workers in chunks of this size, and cache
/// writes within a chunk are batched into a single transaction.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// JSON-serializable summary emitted on stderr at the end of a bulk build,
/// in the style of this codebase's existing `*Stats` structs.
#[derive(Debug, Default, Serialize)]
pub struct BulkBuildStats {
    pub artists_total: u64,
    pub artists_processed: u64,
    pub cache_entries_written: u64,
    pub empty_sentinels: u64,
    pub elapsed_secs: f64,
}

impl BulkBuildStats {
    pub fn log(&self) {
        match serde_json::to_string_pretty(self) {
            Ok(json) => eprintln!("[STATS:bulk_build]\n{json}"),
            Err(e) => eprintln!("[STATS:bulk_build] failed to serialize stats: {e}"),
        }
    }
}

/// Runs the bulk builder to completion, or returns the first
/// [`WorkerFatal`] encountered (fail-fast).
pub fn bulk_build<M, C>(
    mapping_store: Arc<M>,
    cache_store: Arc<C>,
    num_workers: usize,
    batch_size: usize,
) -> Result<BulkBuildStats, WorkerFatal>
where
    M: MappingStore + 'static,
    C: CacheStore + 'static,
{
    let start = Instant::now();

    let missing = mapping_store
        .artists_missing_cache()
        .map_err(|e| WorkerFatal { artist_credit_id: 0, source: BuildError::Store(e) })?;

    let artists_total = missing.len() as u64;
    let ids: Vec<u32> = missing.into_iter().map(|(id, _)| id).collect();
    let chunks: Vec<&[u32]> = ids.chunks(batch_size.max(1)).collect();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_workers.max(1))
        .build()
        .expect("failed to build worker thread pool");

    let artists_processed = AtomicU64::new(0);
    let cache_entries_written = AtomicU64::new(0);
    let empty_sentinels = AtomicU64::new(0);
    let chunks_done = AtomicU64::new(0);
    let total_chunks = chunks.len() as u64;

    let progress = create_progress_bar(total_chunks, "building artist caches");

    let result = pool.install(|| {
        chunks.par_iter().try_for_each(|chunk| -> Result<(), WorkerFatal> {
            let mut builder = ArtistIndexBuilder::new(Arc::clone(&mapping_store), Arc::clone(&cache_store));
            let mut batch: Vec<(u32, Vec<u8>)> = Vec::with_capacity(chunk.len());

            for &artist_credit_id in *chunk {
                let bundle = builder.build_bundle(artist_credit_id).map_err(|source| WorkerFatal {
                    artist_credit_id,
                    source,
                })?;
                if bundle.is_empty_sentinel() {
                    empty_sentinels.fetch_add(1, Ordering::Relaxed);
                }
                let blob = bundle.serialize().map_err(|e| WorkerFatal {
                    artist_credit_id,
                    source: BuildError::Index(e),
                })?;
                batch.push((artist_credit_id, blob));
                artists_processed.fetch_add(1, Ordering::Relaxed);
            }

            cache_store.put_batch(&batch).map_err(|e| WorkerFatal {
                artist_credit_id: chunk.first().copied().unwrap_or(0),
                source: BuildError::Store(e),
            })?;
            cache_entries_written.fetch_add(batch.len() as u64, Ordering::Relaxed);

            let done = chunks_done.fetch_add(1, Ordering::Relaxed) + 1;
            progress.inc(1);
            log_progress("bulk_build", done, total_chunks, 10);

            Ok(())
        })
    });

    progress.finish_and_clear();
    result?;

    Ok(BulkBuildStats {
        artists_total,
        artists_processed: artists_processed.load(Ordering::Relaxed),
        cache_entries_written: cache_entries_written.load(Ordering::Relaxed),
        empty_sentinels: empty_sentinels.load(Ordering::Relaxed),
        elapsed_secs: start.elapsed().as_secs_f64(),
    })
}
