//! Busy-retry helper shared by the mapping store and cache store:
//! unbounded retries with a short, kind-specific backoff.

use std::thread::sleep;
use std::time::Duration;

use rusqlite::ErrorCode;

use crate::error::StoreError;

/// Retries `f` while it reports SQLite contention (`SQLITE_BUSY` /
/// `SQLITE_LOCKED`), sleeping `backoff` between attempts. Any other error is
/// propagated immediately.
pub fn retry_busy<T>(
    backoff: Duration,
    mut f: impl FnMut() -> rusqlite::Result<T>,
) -> Result<T, StoreError> {
    loop {
        match f() {
            Ok(v) => return Ok(v),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) =>
            {
                sleep(backoff);
                continue;
            }
            Err(e) => return Err(StoreError::Backend(e)),
        }
    }
}

/// Backoff used for cache-store writes.
pub const CACHE_BACKOFF: Duration = Duration::from_millis(100);

/// Backoff used for mapping-store reads.
pub const MAPPING_BACKOFF: Duration = Duration::from_millis(10);
