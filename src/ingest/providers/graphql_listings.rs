// src/ingest/providers/graphql_listings.rs
//! Paginated GraphQL event-listings API.
//!
//! Pages are requested from 1 upward until a page comes back empty or fails;
//! whatever was accumulated up to that point is kept. Listings are deduplicated
//! by event id within one run.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use metrics::{counter, histogram};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

use crate::config::GraphqlListingsConfig;
use crate::ingest::html::absolutize;
use crate::ingest::http::Transport;
use crate::ingest::types::{clean, RawEvent, SourceAdapter};

const AREA_PATH: &str = "/variables/filters/areas/eq";
const GTE_PATH: &str = "/variables/filters/listingDate/gte";
const LTE_PATH: &str = "/variables/filters/listingDate/lte";

/// Area + inclusive listing-date window, as sent in `variables.filters`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingFilter {
    pub area: i64,
    pub gte: String,
    pub lte: String,
}

impl ListingFilter {
    pub fn for_day(area: i64, day: NaiveDate) -> Self {
        Self {
            area,
            gte: format!("{}T00:00:00.000Z", day.format("%Y-%m-%d")),
            lte: format!("{}T23:59:59.999Z", day.format("%Y-%m-%d")),
        }
    }
}

/// Read the query template (`query` + `variables`) from disk.
pub fn load_template(path: &Path) -> Result<Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading query template {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing query template {}", path.display()))
}

/// Fill the filter fields of `template`. Every path must already exist.
pub fn build_payload(mut template: Value, filter: &ListingFilter) -> Result<Value> {
    let fields = [
        (AREA_PATH, Value::from(filter.area)),
        (GTE_PATH, Value::from(filter.gte.clone())),
        (LTE_PATH, Value::from(filter.lte.clone())),
    ];
    for (path, value) in fields {
        let slot = template
            .pointer_mut(path)
            .ok_or_else(|| anyhow!("query template has no `{path}`"))?;
        *slot = value;
    }
    if !template
        .get("variables")
        .map(Value::is_object)
        .unwrap_or(false)
    {
        bail!("query template `variables` is not an object");
    }
    Ok(template)
}

fn with_page(payload: &Value, page: u32) -> Value {
    let mut body = payload.clone();
    if let Some(vars) = body.get_mut("variables").and_then(Value::as_object_mut) {
        vars.insert("page".to_string(), Value::from(page));
    }
    body
}

/// `data.eventListings.data` of a response; `Err` describes why the page is unusable.
fn extract_listings(resp: &Value) -> std::result::Result<&Vec<Value>, String> {
    if let Some(errs) = resp.get("errors").and_then(Value::as_array) {
        if !errs.is_empty() {
            let first = errs[0]
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(format!("graphql error: {first}"));
        }
    }
    resp.pointer("/data/eventListings/data")
        .and_then(Value::as_array)
        .ok_or_else(|| "missing data.eventListings.data".to_string())
}

/// String or number field as text.
fn text_at(v: &Value, key: &str) -> Option<String> {
    match v.get(key)? {
        Value::String(s) => clean(Some(s.clone())),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub struct GraphqlListings {
    name: String,
    endpoint: String,
    payload: Value,
    site_base: Option<Url>,
    page_delay: Duration,
    transport: Arc<dyn Transport>,
}

impl GraphqlListings {
    /// Load the template named in `cfg` and fill it for `day`. Fails before any
    /// network activity when the template is missing or malformed.
    pub fn new(
        name: &str,
        cfg: &GraphqlListingsConfig,
        day: NaiveDate,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let template = load_template(Path::new(&cfg.query_template))?;
        Self::with_template(name, cfg, template, ListingFilter::for_day(cfg.area, day), transport)
    }

    pub fn with_template(
        name: &str,
        cfg: &GraphqlListingsConfig,
        template: Value,
        filter: ListingFilter,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let payload = build_payload(template, &filter)?;
        let site_base = cfg
            .site_base
            .as_deref()
            .map(Url::parse)
            .transpose()
            .with_context(|| format!("invalid site_base for {name}"))?;
        Ok(Self {
            name: name.to_string(),
            endpoint: cfg.endpoint.clone(),
            payload,
            site_base,
            page_delay: Duration::from_millis(cfg.page_delay_ms),
            transport,
        })
    }

    /// One page of listings; `None` when the page failed.
    async fn fetch_page(&self, page: u32) -> Option<Vec<Value>> {
        let body = with_page(&self.payload, page);
        let resp = match self.transport.post_json(&self.endpoint, &body).await {
            Ok(v) => v,
            Err(e) => {
                counter!("ingest_provider_errors_total").increment(1);
                warn!(target: "ingest", source = %self.name, page, error = %e, "page fetch failed, stopping");
                return None;
            }
        };
        match extract_listings(&resp) {
            Ok(listings) => Some(listings.clone()),
            Err(reason) => {
                counter!("ingest_provider_errors_total").increment(1);
                warn!(target: "ingest", source = %self.name, page, %reason, "unexpected page shape, stopping");
                None
            }
        }
    }

    /// Map one listing to a record; `None` when it has no usable title.
    fn parse_listing(&self, listing: &Value) -> Option<(Option<String>, RawEvent)> {
        let ev = listing.get("event")?;
        let mut out = RawEvent::titled(ev.get("title")?.as_str()?)?;
        out.date = text_at(ev, "date");
        out.start_time = text_at(ev, "startTime");
        out.end_time = text_at(ev, "endTime");
        if let Some(venue) = ev.get("venue") {
            out.venue_name = text_at(venue, "name");
            out.venue_address = text_at(venue, "address");
        }
        out.url = ev
            .get("contentUrl")
            .and_then(Value::as_str)
            .and_then(|href| absolutize(self.site_base.as_ref(), href).or_else(|| clean(Some(href.to_string()))));

        let artists = ev
            .get("artists")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|a| text_at(a, "name"))
                    .collect::<Vec<_>>()
                    .join(", ")
            });
        out.set_extra("artists", artists);
        out.set_extra("attending", text_at(ev, "attending"));

        Some((text_at(ev, "id"), out))
    }
}

#[async_trait]
impl SourceAdapter for GraphqlListings {
    async fn fetch_raw(&self) -> Result<Vec<RawEvent>> {
        let t0 = std::time::Instant::now();
        let mut out = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut page: u32 = 1;

        while let Some(listings) = self.fetch_page(page).await {
            if listings.is_empty() {
                break;
            }
            counter!("ingest_pages_total").increment(1);
            let before = out.len();
            for listing in &listings {
                let Some((id, ev)) = self.parse_listing(listing) else {
                    continue;
                };
                // without an id we cannot dedupe, keep it
                if id.map_or(true, |id| seen.insert(id)) {
                    out.push(ev);
                }
            }
            info!(target: "ingest", source = %self.name, page, listings = listings.len(), kept = out.len() - before, "page fetched");
            page += 1;
            tokio::time::sleep(self.page_delay).await;
        }

        histogram!("ingest_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("ingest_events_total").increment(out.len() as u64);
        Ok(out)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
