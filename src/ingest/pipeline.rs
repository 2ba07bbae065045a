// src/ingest/pipeline.rs
//! Per-source pipeline: fetch all records, resolve each distinct location once,
//! write the coordinate-complete records to the source's artifact.

use anyhow::Result;
use chrono::NaiveDate;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::artifact::{write_artifact, ArtifactLayout};
use crate::config::{AppConfig, GeocodeStrategy, SourceConfig};
use crate::geocode::{with_locale, Coordinates, GeocodeResolver, KnownVenues, Nominatim};
use crate::ingest::ensure_metrics_described;
use crate::ingest::providers::build_adapter;
use crate::ingest::types::{GeocodedEvent, RawEvent, SourceAdapter};

/// Everything the pipeline needs to know about one source besides the adapter.
#[derive(Debug, Clone)]
pub struct SourcePlan {
    pub name: String,
    pub strategy: GeocodeStrategy,
    /// Appended to queries, e.g. "Berlin, Germany".
    pub locale: String,
    pub known_venues: Option<KnownVenues>,
    pub layout: ArtifactLayout,
    pub artifact: PathBuf,
}

impl SourcePlan {
    pub fn from_config(app: &AppConfig, source: &SourceConfig, day: NaiveDate, out_dir: &Path) -> Self {
        Self {
            name: source.name.clone(),
            strategy: source.geocode,
            locale: app.run.locale(),
            known_venues: source
                .known_venues
                .then(|| app.known_venues())
                .filter(|k| !k.is_empty()),
            layout: source.layout,
            artifact: out_dir.join(artifact_file_name(&source.artifact, day)),
        }
    }
}

/// `{date}` in an artifact name becomes `YYYY-MM-DD`.
pub fn artifact_file_name(pattern: &str, day: NaiveDate) -> String {
    pattern.replace("{date}", &day.format("%Y-%m-%d").to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub source: String,
    pub found: usize,
    pub with_coordinates: usize,
    pub dropped: usize,
    /// `None` when nothing was found and no file was written.
    pub artifact: Option<PathBuf>,
}

/// One unit of geocoding work; equal lookups share one resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Lookup {
    Direct(String),
    WithFallback(String),
}

impl Lookup {
    fn label(&self) -> &str {
        match self {
            Lookup::Direct(q) | Lookup::WithFallback(q) => q,
        }
    }
}

fn lookup_for(ev: &RawEvent, plan: &SourcePlan) -> Option<Lookup> {
    let venue = ev.venue_name.as_deref().filter(|s| !s.trim().is_empty());
    let address = ev.venue_address.as_deref().filter(|s| !s.trim().is_empty());
    let locale = Some(plan.locale.as_str());
    match plan.strategy {
        GeocodeStrategy::VenueAndAddress => {
            let text = match (venue, address) {
                (Some(v), Some(a)) => format!("{}, {}", v.trim(), a.trim()),
                (Some(v), None) => v.trim().to_string(),
                (None, Some(a)) => a.trim().to_string(),
                (None, None) => return None,
            };
            Some(Lookup::Direct(with_locale(&text, locale)))
        }
        GeocodeStrategy::Address => address.map(|a| Lookup::Direct(a.trim().to_string())),
        GeocodeStrategy::AddressOrVenue => {
            let text = address.or(venue)?.trim();
            // a digit means a street address that stands on its own
            if text.chars().any(|c| c.is_ascii_digit()) {
                Some(Lookup::Direct(text.to_string()))
            } else {
                Some(Lookup::Direct(with_locale(text, locale)))
            }
        }
        GeocodeStrategy::AddressWithFallback => {
            address.map(|a| Lookup::WithFallback(a.trim().to_string()))
        }
    }
}

fn known_for(ev: &RawEvent, known: &KnownVenues) -> Option<Coordinates> {
    ev.venue_name
        .as_deref()
        .and_then(|v| known.lookup(v))
        .or_else(|| ev.venue_address.as_deref().and_then(|a| known.lookup(a)))
}

/// Run one source end to end. `Err` only when the adapter reports the source
/// unreachable or the artifact cannot be written.
pub async fn run_source(
    adapter: &dyn SourceAdapter,
    resolver: &GeocodeResolver,
    plan: &SourcePlan,
) -> Result<PipelineReport> {
    ensure_metrics_described();
    info!(target: "ingest", source = adapter.name(), "fetching");
    let raw = adapter.fetch_raw().await?;
    let found = raw.len();
    if raw.is_empty() {
        info!(target: "ingest", source = adapter.name(), "no events found, nothing written");
        return Ok(PipelineReport {
            source: plan.name.clone(),
            found: 0,
            with_coordinates: 0,
            dropped: 0,
            artifact: None,
        });
    }

    // distinct lookups in first-seen order; known venues never reach the resolver
    let mut pinned: Vec<Option<Coordinates>> = Vec::with_capacity(found);
    let mut units: IndexMap<Lookup, Option<Coordinates>> = IndexMap::new();
    let mut per_event: Vec<Option<Lookup>> = Vec::with_capacity(found);
    for ev in &raw {
        let known = plan.known_venues.as_ref().and_then(|k| known_for(ev, k));
        pinned.push(known);
        let lookup = if known.is_some() { None } else { lookup_for(ev, plan) };
        if let Some(l) = &lookup {
            units.entry(l.clone()).or_insert(None);
        }
        per_event.push(lookup);
    }
    let known_hits = pinned.iter().filter(|k| k.is_some()).count();
    info!(target: "ingest", source = %plan.name, events = found, lookups = units.len(), known = known_hits, "geocoding");

    let total = units.len();
    for (i, (lookup, slot)) in units.iter_mut().enumerate() {
        *slot = match lookup {
            Lookup::Direct(q) => resolver.resolve(q).await,
            Lookup::WithFallback(a) => resolver.resolve_with_fallback(a, Some(&plan.locale)).await,
        };
        match slot {
            Some(c) => info!(target: "geocode", "[{}/{}] {} ✓ ({:.4}, {:.4})", i + 1, total, lookup.label(), c.lat, c.lon),
            None => info!(target: "geocode", "[{}/{}] {} ✗", i + 1, total, lookup.label()),
        }
    }

    let geocoded: Vec<GeocodedEvent> = raw
        .into_iter()
        .zip(pinned)
        .zip(per_event)
        .filter_map(|((event, known), lookup)| {
            let coords = known.or_else(|| lookup.and_then(|l| units.get(&l).copied().flatten()));
            match coords {
                Some(coords) => Some(GeocodedEvent { event, coords }),
                None => {
                    debug!(target: "ingest", title = %event.title, "dropped: no coordinates");
                    None
                }
            }
        })
        .collect();

    let with_coordinates = write_artifact(&plan.artifact, plan.layout, &geocoded)?;
    let report = PipelineReport {
        source: plan.name.clone(),
        found,
        with_coordinates,
        dropped: found - with_coordinates,
        artifact: Some(plan.artifact.clone()),
    };
    info!(
        target: "ingest",
        source = %report.source,
        found = report.found,
        with_coordinates = report.with_coordinates,
        dropped = report.dropped,
        artifact = %plan.artifact.display(),
        "✓ {}/{} events with coordinates", report.with_coordinates, report.found
    );
    Ok(report)
}

/// Build the adapter and a fresh resolver for `source`, then run it.
pub async fn run_configured_source(
    app: &AppConfig,
    source: &SourceConfig,
    day: NaiveDate,
    out_dir: &Path,
) -> Result<PipelineReport> {
    let adapter = build_adapter(source, app, day)?;
    let resolver = GeocodeResolver::new(
        Box::new(Nominatim::new(&app.geocoder)?),
        Duration::from_millis(app.geocoder.min_delay_ms),
    );
    let plan = SourcePlan::from_config(app, source, day, out_dir);
    run_source(adapter.as_ref(), &resolver, &plan).await
}
