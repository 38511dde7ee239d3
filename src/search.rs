//! Query resolution: combines recording and release fuzzy matches
//! into a single best `(release_id, recording_id, confidence)` hit.

use crate::builder::ArtistIndexBuilder;
use crate::cache_store::CacheStore;
use crate::error::BuildError;
use crate::mapping_store::MappingStore;
use crate::normalize;

const RECORDING_CONFIDENCE: f32 = 0.5;
const RELEASE_CONFIDENCE: f32 = 0.5;

/// Candidate artists plus free-text fields to resolve against them.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub artist_ids: Vec<u32>,
    pub artist_name: String,
    pub release_name: String,
    pub recording_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub release_id: u32,
    pub recording_id: u32,
    pub confidence: f32,
}

struct ExpandedHit {
    id: u32,
    release_id: u32,
    confidence: f32,
    score: i32,
}

/// Sorts by `(-confidence, score)` ascending: highest confidence first,
/// lowest score breaks ties.
fn sort_expanded(hits: &mut [ExpandedHit]) {
    hits.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.score.cmp(&b.score))
    });
}

/// Resolves one query against `request.artist_ids` in order, returning the
/// first candidate artist that yields a hit.
pub fn search<M: MappingStore, C: CacheStore>(
    builder: &mut ArtistIndexBuilder<M, C>,
    request: &SearchRequest,
) -> Result<Option<SearchResult>, BuildError> {
    let encoded_artist = normalize::encode(&request.artist_name);
    let _ = encoded_artist; // carried through the request but not used to gate matching itself
    let encoded_release = normalize::encode(&request.release_name);
    let encoded_recording = normalize::encode(&request.recording_name);

    for &artist_id in &request.artist_ids {
        let bundle = builder.load(artist_id)?;
        let Some(recording_index) = bundle.recording_index.as_ref() else { continue };

        let query = encoded_recording.as_deref().unwrap_or("");
        let mut rec_hits: Vec<ExpandedHit> = recording_index
            .search(query, RECORDING_CONFIDENCE)
            .into_iter()
            .flat_map(|hit| {
                hit.payload.0.into_iter().map(move |entry| ExpandedHit {
                    id: entry.recording_id,
                    release_id: entry.release_id,
                    confidence: hit.confidence,
                    score: entry.score,
                })
            })
            .collect();
        sort_expanded(&mut rec_hits);

        let Some(encoded_release) = encoded_release.as_deref().filter(|s| !s.is_empty()) else {
            if let Some(top) = rec_hits.first() {
                return Ok(Some(SearchResult {
                    release_id: top.release_id,
                    recording_id: top.id,
                    confidence: top.confidence,
                }));
            }
            continue;
        };

        let Some(release_index) = bundle.release_index.as_ref() else { continue };
        let mut rel_hits: Vec<ExpandedHit> = release_index
            .search(encoded_release, RELEASE_CONFIDENCE)
            .into_iter()
            .flat_map(|hit| {
                hit.payload.0.into_iter().map(move |(release_id, score)| ExpandedHit {
                    id: release_id,
                    release_id,
                    confidence: hit.confidence,
                    score,
                })
            })
            .collect();
        sort_expanded(&mut rel_hits);

        let mut found = None;
        'outer: for rec in rec_hits.iter().take(3) {
            for rel in rel_hits.iter().take(3) {
                if bundle.recording_releases.contains_key(&rec.id) {
                    found = Some(SearchResult {
                        release_id: rel.release_id,
                        recording_id: rec.id,
                        confidence: (rec.confidence + rel.confidence) / 2.0,
                    });
                    break 'outer;
                }
            }
        }

        if found.is_some() {
            return Ok(found);
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache_store::SqliteCacheStore;
    use crate::mapping_store::SqliteMappingStore;
    use rusqlite::Connection;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn setup(dir: &std::path::Path) -> ArtistIndexBuilder<SqliteMappingStore, SqliteCacheStore> {
        let db_path = dir.join("mapping.db");
        let conn = Connection::open(&db_path).unwrap();
        conn.execute_batch(
            "CREATE TABLE mapping (
                artist_credit_id INTEGER, artist_credit_name TEXT, artist_credit_sortname TEXT,
                release_id INTEGER, release_name TEXT, recording_id INTEGER, recording_name TEXT, score INTEGER
             );
             INSERT INTO mapping VALUES
                (1, 'The Beatles', 'Beatles, The', 100, 'Abbey Road', 10, 'Come Together', 90);",
        )
        .unwrap();
        let mapping_store = Arc::new(SqliteMappingStore::open(&db_path).unwrap());
        let cache_store = Arc::new(SqliteCacheStore::open(&dir.join("cache.db")).unwrap());
        ArtistIndexBuilder::new(mapping_store, cache_store)
    }

    #[test]
    fn s1_exact_match_resolves_with_high_confidence() {
        let dir = tempdir().unwrap();
        let mut builder = setup(dir.path());

        let request = SearchRequest {
            artist_ids: vec![1],
            artist_name: "beatles".to_string(),
            release_name: "abbey road".to_string(),
            recording_name: "come together".to_string(),
        };

        let result = search(&mut builder, &request).unwrap().expect("expected a hit");
        assert_eq!(result.release_id, 100);
        assert_eq!(result.recording_id, 10);
        assert!(result.confidence >= 0.95);
    }

    #[test]
    fn empty_release_name_returns_top_recording_hit_directly() {
        let dir = tempdir().unwrap();
        let mut builder = setup(dir.path());

        let request = SearchRequest {
            artist_ids: vec![1],
            artist_name: "beatles".to_string(),
            release_name: String::new(),
            recording_name: "come together".to_string(),
        };

        let result = search(&mut builder, &request).unwrap().expect("expected a hit");
        assert_eq!(result.recording_id, 10);
        assert_eq!(result.release_id, 100);
    }

    #[test]
    fn unknown_artist_yields_no_hit() {
        let dir = tempdir().unwrap();
        let mut builder = setup(dir.path());

        let request = SearchRequest {
            artist_ids: vec![999],
            artist_name: String::new(),
            release_name: "abbey road".to_string(),
            recording_name: "come together".to_string(),
        };

        assert_eq!(search(&mut builder, &request).unwrap(), None);
    }
}
