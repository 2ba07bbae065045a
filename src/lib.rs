// src/lib.rs
// Public library surface for the CLI and integration tests.

pub mod artifact;
pub mod config;
pub mod geocode;
pub mod ingest;
pub mod merge;

// ---- Re-exports for stable public API ----
pub use crate::config::AppConfig;
pub use crate::geocode::{Coordinates, GeocodeResolver, Geocoder};
pub use crate::ingest::types::{GeocodedEvent, NormalizedEvent, RawEvent, SourceAdapter};
pub use crate::merge::MergedDataset;
