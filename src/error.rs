//! Typed error kinds shared across the normalizer, vectorizer, fuzzy index,
//! builder/cache, and search/bulk-build components.

use thiserror::Error;

/// Errors that can arise while fitting a vectorizer or building a fuzzy index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// `fit` was called on a corpus with no documents, or one whose documents
    /// produce no trigrams at all.
    #[error("vectorizer fit on a corpus with no usable trigrams")]
    EmptyVocabulary,

    /// `build` was called with zero documents.
    #[error("fuzzy index build invoked with no documents")]
    EmptyInput,

    /// A serialized blob was truncated or otherwise structurally invalid.
    #[error("blob cannot be decoded: {0}")]
    Unserializable(String),
}

/// Errors surfaced by the mapping store or cache store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transient contention (e.g. `SQLITE_BUSY`). Callers retry with backoff;
    /// this variant should never escape a retry loop into user-visible code.
    #[error("store busy, retry")]
    Busy,

    /// An operation other than contention failed (corrupt file, I/O error,
    /// malformed schema, ...).
    #[error("store error: {0}")]
    Backend(#[from] rusqlite::Error),

    /// A decode failure while reading back a stored blob.
    #[error(transparent)]
    Index(#[from] IndexError),

    /// Failure acquiring a pooled connection.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

/// Errors from building or loading a per-artist bundle.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// A fatal, non-retryable error raised inside a bulk-build worker. Any
/// [`BuildError`] reaching the dispatcher is wrapped in this and aborts the
/// whole run.
#[derive(Debug, Error)]
#[error("worker failed on artist_credit_id={artist_credit_id}: {source}")]
pub struct WorkerFatal {
    pub artist_credit_id: u32,
    #[source]
    pub source: BuildError,
}
