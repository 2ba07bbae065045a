// src/artifact.rs
//! Per-source artifact files (CSV with a header row).
//!
//! Two header layouts:
//! - `canonical`: `title,category,venue,address,date,start_time,end_time,url,description,<extras>,lat,lon`
//! - `event_listing`: the API listing layout (`Event name`, `Venue Latitude`, ...)
//!
//! Only geocoded events can be written, so every row carries both coordinates.

use anyhow::{Context, Result};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::ingest::types::GeocodedEvent;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactLayout {
    #[default]
    Canonical,
    EventListing,
}

pub const CANONICAL_HEAD: [&str; 9] = [
    "title",
    "category",
    "venue",
    "address",
    "date",
    "start_time",
    "end_time",
    "url",
    "description",
];

pub const EVENT_LISTING_HEADER: [&str; 11] = [
    "Event name",
    "Date",
    "Start Time",
    "End Time",
    "Artists",
    "Venue",
    "Venue Address",
    "Venue Latitude",
    "Venue Longitude",
    "Event URL",
    "Number of guests attending",
];

fn opt(v: &Option<String>) -> &str {
    v.as_deref().unwrap_or("")
}

impl ArtifactLayout {
    pub fn header(&self, events: &[GeocodedEvent]) -> Vec<String> {
        match self {
            ArtifactLayout::Canonical => {
                let extras: IndexSet<String> = events
                    .iter()
                    .flat_map(|g| g.event.extra.keys().cloned())
                    .collect();
                let mut header: Vec<String> = CANONICAL_HEAD.iter().map(|s| s.to_string()).collect();
                header.extend(extras);
                header.push("lat".to_string());
                header.push("lon".to_string());
                header
            }
            ArtifactLayout::EventListing => {
                EVENT_LISTING_HEADER.iter().map(|s| s.to_string()).collect()
            }
        }
    }

    fn row(&self, header: &[String], g: &GeocodedEvent) -> Vec<String> {
        let e = &g.event;
        match self {
            ArtifactLayout::Canonical => header
                .iter()
                .map(|col| match col.as_str() {
                    "title" => e.title.clone(),
                    "category" => opt(&e.category).to_string(),
                    "venue" => opt(&e.venue_name).to_string(),
                    "address" => opt(&e.venue_address).to_string(),
                    "date" => opt(&e.date).to_string(),
                    "start_time" => opt(&e.start_time).to_string(),
                    "end_time" => opt(&e.end_time).to_string(),
                    "url" => opt(&e.url).to_string(),
                    "description" => opt(&e.description).to_string(),
                    "lat" => g.coords.lat.to_string(),
                    "lon" => g.coords.lon.to_string(),
                    extra => e.extra.get(extra).cloned().unwrap_or_default(),
                })
                .collect(),
            ArtifactLayout::EventListing => vec![
                e.title.clone(),
                opt(&e.date).to_string(),
                opt(&e.start_time).to_string(),
                opt(&e.end_time).to_string(),
                e.extra.get("artists").cloned().unwrap_or_default(),
                opt(&e.venue_name).to_string(),
                opt(&e.venue_address).to_string(),
                g.coords.lat.to_string(),
                g.coords.lon.to_string(),
                opt(&e.url).to_string(),
                e.extra.get("attending").cloned().unwrap_or_default(),
            ],
        }
    }
}

/// Write `events` to `path` (parent dirs are created). Returns rows written.
pub fn write_artifact(path: &Path, layout: ArtifactLayout, events: &[GeocodedEvent]) -> Result<usize> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating artifact folder {}", parent.display()))?;
    }
    let mut w = csv::Writer::from_path(path)
        .with_context(|| format!("creating artifact {}", path.display()))?;
    let header = layout.header(events);
    w.write_record(&header)?;
    for g in events {
        w.write_record(layout.row(&header, g))?;
    }
    w.flush()
        .with_context(|| format!("flushing artifact {}", path.display()))?;
    Ok(events.len())
}

/// Read any artifact as ordered `column → value` rows. Empty cells are omitted.
pub fn read_rows(path: &Path) -> Result<Vec<IndexMap<String, String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening artifact {}", path.display()))?;
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for (idx, rec) in reader.records().enumerate() {
        let rec = rec.with_context(|| format!("reading row {} of {}", idx + 1, path.display()))?;
        let row: IndexMap<String, String> = headers
            .iter()
            .zip(rec.iter())
            .filter(|(_, v)| !v.trim().is_empty())
            .map(|(h, v)| (h.trim().to_string(), v.to_string()))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}
