// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod normalize;
pub mod store;
pub mod transport;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::error::{ConfigError, ExtractError, FetchError, NormalizeError, StoreError};
pub use crate::ingest::{EventRecord, IngestStats, NewsRecord, Pipeline};
