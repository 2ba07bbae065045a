// src/ingest/types.rs
use anyhow::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::geocode::Coordinates;
use crate::ingest::{bound_text, normalize_text, DESCRIPTION_MAX_CHARS};

/// Source-specific record produced by an adapter before geocoding.
///
/// `title` is never empty: construct through [`RawEvent::titled`], which
/// rejects records whose title normalizes to nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub title: String,
    pub venue_name: Option<String>,
    pub venue_address: Option<String>,
    pub category: Option<String>,
    pub date: Option<String>,      // verbatim, format varies per source
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    /// Per-source extras, e.g. "artists", "attending".
    #[serde(default)]
    pub extra: IndexMap<String, String>,
}

impl RawEvent {
    /// Start a record from a raw title; `None` when the title is blank.
    pub fn titled(raw_title: &str) -> Option<Self> {
        let title = normalize_text(raw_title);
        if title.is_empty() {
            return None;
        }
        Some(Self {
            title,
            ..Self::default()
        })
    }

    /// Store a description, normalized and capped at 500 characters.
    pub fn set_description(&mut self, raw: Option<&str>) {
        self.description = raw
            .map(|s| bound_text(&normalize_text(s), DESCRIPTION_MAX_CHARS))
            .filter(|s| !s.is_empty());
    }

    pub fn set_extra(&mut self, key: &str, value: Option<String>) {
        if let Some(v) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            self.extra.insert(key.to_string(), v);
        }
    }
}

/// Trim and drop empty strings; the common cleanup for optional fields.
pub fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|s| normalize_text(&s))
        .filter(|s| !s.is_empty())
}

/// A raw event with resolved coordinates, ready to be written to an artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedEvent {
    pub event: RawEvent,
    pub coords: Coordinates,
}

/// Post-merge record: event fields plus coordinates and presentation hints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    #[serde(flatten)]
    pub event: RawEvent,
    pub lat: f64,
    pub lon: f64,
    pub source: String,
    pub color: String,
    pub icon: String,
}

/// One external source. Variants are distinct types built from configuration.
///
/// Implementations recover from per-unit failures themselves (logging and
/// skipping the page/event); an `Err` means the whole source was unreachable.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn fetch_raw(&self) -> Result<Vec<RawEvent>>;
    fn name(&self) -> &str;
}
