//! Per-artist fuzzy search index over a music-metadata mapping corpus:
//! trigram TF-IDF vectorizer, sparse nearest-neighbor fuzzy index, per-artist
//! builder/cache, and the search/bulk-build pipeline on top of them.

pub mod builder;
pub mod bulk;
pub mod cache_store;
pub mod codec;
pub mod error;
pub mod fuzzy_index;
pub mod mapping_store;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod retry;
pub mod search;
pub mod vectorizer;
