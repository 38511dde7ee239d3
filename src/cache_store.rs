//! Content-addressed cache store: `artist_credit_id -> blob`, atomic
//! replace-on-write, shared across worker threads via a connection pool.

use std::path::Path;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::error::StoreError;
use crate::retry::{retry_busy, CACHE_BACKOFF};

pub trait CacheStore: Send + Sync {
    fn get(&self, artist_credit_id: u32) -> Result<Option<Vec<u8>>, StoreError>;

    fn put(&self, artist_credit_id: u32, blob: &[u8]) -> Result<(), StoreError>;

    /// Writes all `entries` atomically replacing any prior blob for the same
    /// key, batched in a single transaction (the bulk builder expects this to be
    /// called with up to 500 entries at a time).
    fn put_batch(&self, entries: &[(u32, Vec<u8>)]) -> Result<(), StoreError>;

    fn keys(&self) -> Result<Vec<u32>, StoreError>;
}

fn write_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA temp_store = MEMORY;
         CREATE TABLE IF NOT EXISTS index_cache (
             artist_credit_id INTEGER PRIMARY KEY,
             artist_data BLOB NOT NULL
         );",
    )
}

pub struct SqliteCacheStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteCacheStore {
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::file(db_path).with_init(write_pragmas);
        let pool = Pool::builder().max_size(16).build(manager)?;
        Ok(Self { pool })
    }

    fn conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>, StoreError> {
        Ok(self.pool.get()?)
    }
}

impl CacheStore for SqliteCacheStore {
    fn get(&self, artist_credit_id: u32) -> Result<Option<Vec<u8>>, StoreError> {
        let conn = self.conn()?;
        retry_busy(CACHE_BACKOFF, move || {
            conn.query_row(
                "SELECT artist_data FROM index_cache WHERE artist_credit_id = ?1",
                [artist_credit_id],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .map(Some)
            .or_else(|e| if e == rusqlite::Error::QueryReturnedNoRows { Ok(None) } else { Err(e) })
        })
    }

    fn put(&self, artist_credit_id: u32, blob: &[u8]) -> Result<(), StoreError> {
        self.put_batch(&[(artist_credit_id, blob.to_vec())])
    }

    fn put_batch(&self, entries: &[(u32, Vec<u8>)]) -> Result<(), StoreError> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn()?;
        retry_busy(CACHE_BACKOFF, move || {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO index_cache (artist_credit_id, artist_data) VALUES (?1, ?2)
                     ON CONFLICT(artist_credit_id) DO UPDATE SET artist_data = excluded.artist_data",
                )?;
                for (artist_credit_id, blob) in entries {
                    stmt.execute(rusqlite::params![artist_credit_id, blob])?;
                }
            }
            tx.commit()
        })
    }

    fn keys(&self) -> Result<Vec<u32>, StoreError> {
        let conn = self.conn()?;
        retry_busy(CACHE_BACKOFF, move || {
            let mut stmt = conn.prepare_cached("SELECT artist_credit_id FROM index_cache")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, u32>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(ids)
        })
    }
}
