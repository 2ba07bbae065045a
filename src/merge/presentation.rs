// src/merge/presentation.rs
//! Files handed to the map renderer: the combined CSV and a GeoJSON
//! FeatureCollection with a per-source legend.

use anyhow::{Context, Result};
use indexmap::IndexSet;
use serde_json::{json, Map, Value};
use std::fs;
use std::path::Path;

use super::MergedDataset;
use crate::artifact::CANONICAL_HEAD;
use crate::config::SourceConfig;
use crate::ingest::types::NormalizedEvent;

pub const COMBINED_CSV: &str = "combined_events.csv";
pub const GEOJSON: &str = "events.geojson";

fn canonical_value(e: &NormalizedEvent, col: &str) -> Option<String> {
    let ev = &e.event;
    match col {
        "title" => Some(ev.title.clone()),
        "category" => ev.category.clone(),
        "venue" => ev.venue_name.clone(),
        "address" => ev.venue_address.clone(),
        "date" => ev.date.clone(),
        "start_time" => ev.start_time.clone(),
        "end_time" => ev.end_time.clone(),
        "url" => ev.url.clone(),
        "description" => ev.description.clone(),
        _ => None,
    }
}

fn extra_columns(ds: &MergedDataset) -> IndexSet<String> {
    ds.events
        .iter()
        .flat_map(|e| e.event.extra.keys().cloned())
        .filter(|k| !CANONICAL_HEAD.contains(&k.as_str()))
        .collect()
}

/// Canonical columns, extras, then `lat,lon,source,color,icon`.
pub fn write_combined_csv(ds: &MergedDataset, path: &Path) -> Result<()> {
    let extras = extra_columns(ds);
    let mut w = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;

    let mut header: Vec<&str> = CANONICAL_HEAD.to_vec();
    header.extend(extras.iter().map(String::as_str));
    header.extend(["lat", "lon", "source", "color", "icon"]);
    w.write_record(&header)?;

    for e in &ds.events {
        let mut rec: Vec<String> = CANONICAL_HEAD
            .iter()
            .map(|c| canonical_value(e, c).unwrap_or_default())
            .collect();
        rec.extend(extras.iter().map(|k| e.event.extra.get(k).cloned().unwrap_or_default()));
        rec.push(e.lat.to_string());
        rec.push(e.lon.to_string());
        rec.push(e.source.clone());
        rec.push(e.color.clone());
        rec.push(e.icon.clone());
        w.write_record(&rec)?;
    }
    w.flush().with_context(|| format!("flushing {}", path.display()))?;
    Ok(())
}

fn feature(e: &NormalizedEvent) -> Value {
    let mut props = Map::new();
    for col in CANONICAL_HEAD {
        if let Some(v) = canonical_value(e, col) {
            props.insert(col.to_string(), Value::String(v));
        }
    }
    for (k, v) in &e.event.extra {
        props.entry(k.clone()).or_insert_with(|| Value::String(v.clone()));
    }
    props.insert("source".into(), json!(e.source));
    props.insert("color".into(), json!(e.color));
    props.insert("icon".into(), json!(e.icon));
    json!({
        "type": "Feature",
        "geometry": { "type": "Point", "coordinates": [e.lon, e.lat] },
        "properties": props,
    })
}

/// Legend entries in merge order: name, color, icon, count.
pub fn legend(ds: &MergedDataset, sources: &[SourceConfig]) -> Value {
    let entries: Vec<Value> = ds
        .counts
        .iter()
        .map(|(name, count)| {
            let style = sources.iter().find(|s| &s.name == name);
            json!({
                "name": name,
                "color": style.map(|s| s.color.as_str()).unwrap_or("gray"),
                "icon": style.map(|s| s.icon.as_str()).unwrap_or("info-sign"),
                "count": count,
            })
        })
        .collect();
    json!({ "sources": entries, "total": ds.total() })
}

pub fn to_geojson(ds: &MergedDataset, sources: &[SourceConfig]) -> Value {
    json!({
        "type": "FeatureCollection",
        "features": ds.events.iter().map(feature).collect::<Vec<_>>(),
        "legend": legend(ds, sources),
    })
}

pub fn write_geojson(ds: &MergedDataset, sources: &[SourceConfig], path: &Path) -> Result<()> {
    let body = serde_json::to_string_pretty(&to_geojson(ds, sources))?;
    fs::write(path, body).with_context(|| format!("writing {}", path.display()))
}
