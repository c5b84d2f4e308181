//! Web search abstraction.
//!
//! This module provides a `Searcher` trait for search-engine backends
//! (Serper), the `RetrievalAdapter` that scopes and normalizes retrievals, and
//! the per-run `ResultSet` used for deduplication.

mod adapter;
mod dedup;
mod serper;
mod types;

pub use adapter::{normalize_hits, RetrievalAdapter};
pub use dedup::{result_identity, ResultSet};
pub use serper::SerperSearcher;
pub use types::*;
