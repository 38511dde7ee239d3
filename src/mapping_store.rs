//! Read-only access to the `mapping` table. Backed
//! by SQLite through a pooled connection so many worker threads can read
//! concurrently without serializing on a single connection.

use std::path::Path;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::error::StoreError;
use crate::models::MappingRow;
use crate::retry::{retry_busy, MAPPING_BACKOFF};

/// Read-only source of mapping rows, and the bulk-build enumeration query.
pub trait MappingStore: Send + Sync {
    fn rows_for_artist(&self, artist_credit_id: u32) -> Result<Vec<MappingRow>, StoreError>;

    /// All `artist_credit_id`s not yet present in the cache, paired with
    /// their row count, ordered by row count descending (biggest artists first).
    fn artists_missing_cache(&self) -> Result<Vec<(u32, u64)>, StoreError>;
}

fn read_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA query_only = 1;
         PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA temp_store = MEMORY;
         PRAGMA cache_size = -64000;",
    )
}

pub struct SqliteMappingStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteMappingStore {
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::file(db_path).with_init(read_pragmas);
        let pool = Pool::builder().max_size(16).build(manager)?;
        Ok(Self { pool })
    }

    fn conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>, StoreError> {
        Ok(self.pool.get()?)
    }
}

impl MappingStore for SqliteMappingStore {
    fn rows_for_artist(&self, artist_credit_id: u32) -> Result<Vec<MappingRow>, StoreError> {
        let conn = self.conn()?;
        retry_busy(MAPPING_BACKOFF, move || {
            let mut stmt = conn.prepare_cached(
                "SELECT artist_credit_id, artist_credit_name, artist_credit_sortname,
                        release_id, release_name, recording_id, recording_name, score
                   FROM mapping
                  WHERE artist_credit_id = ?1",
            )?;
            let rows = stmt
                .query_map([artist_credit_id], |row| {
                    Ok(MappingRow {
                        artist_credit_id: row.get(0)?,
                        artist_credit_name: row.get(1)?,
                        artist_credit_sortname: row.get(2)?,
                        release_id: row.get(3)?,
                        release_name: row.get(4)?,
                        recording_id: row.get(5)?,
                        recording_name: row.get(6)?,
                        score: row.get(7)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    fn artists_missing_cache(&self) -> Result<Vec<(u32, u64)>, StoreError> {
        let conn = self.conn()?;
        retry_busy(MAPPING_BACKOFF, move || {
            let mut stmt = conn.prepare_cached(
                "WITH artist_ids AS (
                     SELECT DISTINCT mapping.artist_credit_id
                       FROM mapping
                  LEFT JOIN index_cache
                         ON mapping.artist_credit_id = index_cache.artist_credit_id
                      WHERE index_cache.artist_credit_id IS NULL
                 )
                 SELECT mapping.artist_credit_id, COUNT(*) AS cnt
                   FROM mapping
                   JOIN artist_ids ON artist_ids.artist_credit_id = mapping.artist_credit_id
               GROUP BY mapping.artist_credit_id
               ORDER BY cnt DESC",
            )?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, u32>(0)?, row.get::<_, i64>(1)? as u64)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn seed(db_path: &Path) {
        let conn = Connection::open(db_path).unwrap();
        conn.execute_batch(
            "CREATE TABLE mapping (
                artist_credit_id INTEGER, artist_credit_name TEXT, artist_credit_sortname TEXT,
                release_id INTEGER, release_name TEXT, recording_id INTEGER, recording_name TEXT, score INTEGER
             );
             CREATE TABLE index_cache (artist_credit_id INTEGER PRIMARY KEY, artist_data BLOB NOT NULL);
             INSERT INTO mapping VALUES
                (1, 'The Beatles', 'Beatles, The', 100, 'Abbey Road', 10, 'Come Together', 90),
                (1, 'The Beatles', 'Beatles, The', 100, 'Abbey Road', 11, 'Something', 80),
                (2, 'Nobody', 'Nobody', 200, 'EP', 20, 'Track', 5);",
        )
        .unwrap();
    }

    #[test]
    fn reads_rows_for_artist() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("mapping.db");
        seed(&db_path);

        let store = SqliteMappingStore::open(&db_path).unwrap();
        let rows = store.rows_for_artist(1).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.artist_credit_id == 1));
    }

    #[test]
    fn orders_missing_artists_by_row_count_desc() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("mapping.db");
        seed(&db_path);

        let store = SqliteMappingStore::open(&db_path).unwrap();
        let missing = store.artists_missing_cache().unwrap();
        assert_eq!(missing, vec![(1, 2), (2, 1)]);
    }
}
