//! Per-artist bundle construction and the worker-local load path.
//! Each [`ArtistIndexBuilder`] is owned by exactly one worker and holds its
//! own in-memory cache — in-memory caches are never shared between
//! workers, only the on-disk cache store is.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::cache_store::CacheStore;
use crate::error::{BuildError, IndexError};
use crate::mapping_store::MappingStore;
use crate::models::{Bundle, RecordingEntry, RecordingIndex, RecordingPayload, ReleaseIndex, ReleasePayload};
use crate::normalize;

/// Builds and caches per-artist bundles on behalf of one worker.
pub struct ArtistIndexBuilder<M: MappingStore, C: CacheStore> {
    mapping_store: Arc<M>,
    cache_store: Arc<C>,
    local_cache: FxHashMap<u32, Arc<Bundle>>,
}

impl<M: MappingStore, C: CacheStore> ArtistIndexBuilder<M, C> {
    pub fn new(mapping_store: Arc<M>, cache_store: Arc<C>) -> Self {
        Self { mapping_store, cache_store, local_cache: FxHashMap::default() }
    }

    /// Reads raw rows for `artist_credit_id` and assembles a fresh bundle.
    /// Does not touch the cache; callers that want caching should use
    /// [`Self::load`].
    pub fn build_bundle(&self, artist_credit_id: u32) -> Result<Bundle, BuildError> {
        let rows = self.mapping_store.rows_for_artist(artist_credit_id)?;

        let mut recording_order: Vec<String> = Vec::new();
        let mut recording_groups: FxHashMap<String, Vec<RecordingEntry>> = FxHashMap::default();
        let mut recording_releases: FxHashMap<u32, Vec<u32>> = FxHashMap::default();

        for row in &rows {
            let Some(encoded) = normalize::encode(&row.recording_name) else { continue };
            if !recording_groups.contains_key(&encoded) {
                recording_order.push(encoded.clone());
            }
            recording_groups.entry(encoded).or_default().push(RecordingEntry {
                recording_id: row.recording_id,
                release_id: row.release_id,
                score: row.score,
            });
            recording_releases.entry(row.recording_id).or_default().push(row.release_id);
        }

        // Key = (release_id, encoded_release_name); value = score, last write wins.
        let mut release_scores: FxHashMap<(u32, String), i32> = FxHashMap::default();
        for row in &rows {
            let Some(encoded) = normalize::encode(&row.release_name) else { continue };
            release_scores.insert((row.release_id, encoded), row.score);
        }

        let mut release_order: Vec<String> = Vec::new();
        let mut release_groups: FxHashMap<String, Vec<(u32, i32)>> = FxHashMap::default();
        for ((release_id, encoded), score) in release_scores {
            if !release_groups.contains_key(&encoded) {
                release_order.push(encoded.clone());
            }
            release_groups.entry(encoded).or_default().push((release_id, score));
        }

        let recording_index = build_optional_index::<RecordingIndex, _>(
            recording_order,
            recording_groups,
            |mut entries| {
                entries.sort_unstable_by_key(|e| (e.recording_id, e.release_id));
                RecordingPayload(entries)
            },
        )?;

        let release_index = build_optional_index::<ReleaseIndex, _>(
            release_order,
            release_groups,
            |mut entries| {
                entries.sort_unstable_by_key(|(release_id, _)| *release_id);
                ReleasePayload(entries)
            },
        )?;

        if recording_index.is_none() || release_index.is_none() {
            return Ok(Bundle::empty_sentinel());
        }

        Ok(Bundle { recording_index, release_index, recording_releases })
    }

    /// Worker-local cache -> on-disk cache -> fresh build, in that order
    /// (worker-local cache, then the shared cache store, then a fresh build).
    pub fn load(&mut self, artist_credit_id: u32) -> Result<Arc<Bundle>, BuildError> {
        if let Some(bundle) = self.local_cache.get(&artist_credit_id) {
            return Ok(Arc::clone(bundle));
        }

        if let Some(blob) = self.cache_store.get(artist_credit_id)? {
            let bundle = Arc::new(Bundle::deserialize(&blob).map_err(IndexError::from)?);
            self.local_cache.insert(artist_credit_id, Arc::clone(&bundle));
            return Ok(bundle);
        }

        let bundle = self.build_bundle(artist_credit_id)?;
        let blob = bundle.serialize().map_err(IndexError::from)?;
        self.cache_store.put(artist_credit_id, &blob)?;
        let bundle = Arc::new(bundle);
        self.local_cache.insert(artist_credit_id, Arc::clone(&bundle));
        Ok(bundle)
    }
}

/// Builds a fuzzy index from ordered `(text, grouped-values)` pairs, turning
/// an `EmptyInput`/`EmptyVocabulary` failure into `Ok(None)` rather than
/// propagating it.
fn build_optional_index<Idx, V>(
    order: Vec<String>,
    mut groups: FxHashMap<String, Vec<V>>,
    to_payload: impl Fn(Vec<V>) -> Idx::Payload,
) -> Result<Option<Idx>, BuildError>
where
    Idx: IndexBuild,
{
    let documents: Vec<(String, Idx::Payload)> = order
        .into_iter()
        .map(|text| {
            let values = groups.remove(&text).unwrap_or_default();
            let payload = to_payload(values);
            (text, payload)
        })
        .collect();

    match Idx::build(documents) {
        Ok(idx) => Ok(Some(idx)),
        Err(IndexError::EmptyInput) | Err(IndexError::EmptyVocabulary) => Ok(None),
        Err(e) => Err(BuildError::Index(e)),
    }
}

/// Thin trait so `build_optional_index` can be generic over
/// [`RecordingIndex`]/[`ReleaseIndex`] without repeating itself.
trait IndexBuild: Sized {
    type Payload;
    fn build(documents: Vec<(String, Self::Payload)>) -> Result<Self, IndexError>;
}

impl IndexBuild for RecordingIndex {
    type Payload = RecordingPayload;
    fn build(documents: Vec<(String, Self::Payload)>) -> Result<Self, IndexError> {
        RecordingIndex::build(documents)
    }
}

impl IndexBuild for ReleaseIndex {
    type Payload = ReleasePayload;
    fn build(documents: Vec<(String, Self::Payload)>) -> Result<Self, IndexError> {
        ReleaseIndex::build(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache_store::SqliteCacheStore;
    use crate::mapping_store::SqliteMappingStore;
    use rusqlite::Connection;
    use tempfile::tempdir;

    fn seeded_mapping_store(dir: &std::path::Path) -> Arc<SqliteMappingStore> {
        let db_path = dir.join("mapping.db");
        let conn = Connection::open(&db_path).unwrap();
        conn.execute_batch(
            "CREATE TABLE mapping (
                artist_credit_id INTEGER, artist_credit_name TEXT, artist_credit_sortname TEXT,
                release_id INTEGER, release_name TEXT, recording_id INTEGER, recording_name TEXT, score INTEGER
             );
             INSERT INTO mapping VALUES
                (1, 'The Beatles', 'Beatles, The', 100, 'Abbey Road', 10, 'Come Together', 90),
                (1, 'The Beatles', 'Beatles, The', 100, 'Abbey Road', 11, 'Come Together (Remastered)', 80);",
        )
        .unwrap();
        Arc::new(SqliteMappingStore::open(&db_path).unwrap())
    }

    #[test]
    fn builds_bundle_with_matching_recording_and_release() {
        let dir = tempdir().unwrap();
        let mapping_store = seeded_mapping_store(dir.path());
        let cache_store = Arc::new(SqliteCacheStore::open(&dir.path().join("cache.db")).unwrap());
        let builder = ArtistIndexBuilder::new(mapping_store, cache_store);

        let bundle = builder.build_bundle(1).unwrap();
        assert!(!bundle.is_empty_sentinel());
        let hits = bundle.recording_index.as_ref().unwrap().search("cometogether", 0.5);
        assert!(!hits.is_empty());
        assert_eq!(bundle.recording_releases.get(&10), Some(&vec![100u32]));
    }

    #[test]
    fn artist_with_no_usable_text_is_empty_sentinel() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("mapping.db");
        let conn = Connection::open(&db_path).unwrap();
        conn.execute_batch(
            "CREATE TABLE mapping (
                artist_credit_id INTEGER, artist_credit_name TEXT, artist_credit_sortname TEXT,
                release_id INTEGER, release_name TEXT, recording_id INTEGER, recording_name TEXT, score INTEGER
             );
             INSERT INTO mapping VALUES (9, '', '', 1, '', 1, '', 0);",
        )
        .unwrap();
        let mapping_store = Arc::new(SqliteMappingStore::open(&db_path).unwrap());
        let cache_store = Arc::new(SqliteCacheStore::open(&dir.path().join("cache.db")).unwrap());
        let builder = ArtistIndexBuilder::new(mapping_store, cache_store);

        let bundle = builder.build_bundle(9).unwrap();
        assert!(bundle.is_empty_sentinel());
    }

    #[test]
    fn load_is_served_from_cache_on_second_call() {
        let dir = tempdir().unwrap();
        let mapping_store = seeded_mapping_store(dir.path());
        let cache_store = Arc::new(SqliteCacheStore::open(&dir.path().join("cache.db")).unwrap());
        let mut builder = ArtistIndexBuilder::new(Arc::clone(&mapping_store), Arc::clone(&cache_store));

        let first = builder.load(1).unwrap();
        assert!(!first.is_empty_sentinel());
        assert_eq!(cache_store.keys().unwrap(), vec![1]);

        // A fresh builder (simulating a new worker) must be served from the
        // on-disk cache store, not rebuild.
        let mut other_builder = ArtistIndexBuilder::new(mapping_store, cache_store);
        let second = other_builder.load(1).unwrap();
        assert!(!second.is_empty_sentinel());
    }
}
