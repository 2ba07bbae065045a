// src/ingest/providers/list_detail.rs
//! Static listing page plus one detail page per event.
//!
//! Detail pages are fetched on a bounded worker pool; results arrive through a
//! completion channel in whatever order they finish. A failed detail page costs
//! only its own event.

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ListDetailConfig;
use crate::ingest::html::{absolutize, compile, compile_opt, first_text, text_of};
use crate::ingest::http::{FetchError, Transport};
use crate::ingest::types::{RawEvent, SourceAdapter};

#[derive(Debug, Error)]
pub enum DetailFailure {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("no address on detail page")]
    MissingAddress,
}

#[derive(Debug, Default, PartialEq)]
pub struct DetailFields {
    pub address: String,
    pub description: Option<String>,
    pub date: Option<String>,
}

struct DetailSelectors {
    address: Selector,
    description: Option<Selector>,
    date: Option<Selector>,
    address_cut: Option<String>,
}

pub struct ListDetail {
    name: String,
    listing_url: Url,
    item_link: Selector,
    detail: Arc<DetailSelectors>,
    workers: usize,
    transport: Arc<dyn Transport>,
}

impl ListDetail {
    pub fn new(name: &str, cfg: &ListDetailConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let listing_url = Url::parse(&cfg.listing_url)
            .with_context(|| format!("invalid listing_url for {name}"))?;
        Ok(Self {
            name: name.to_string(),
            listing_url,
            item_link: compile(&cfg.item_link)?,
            detail: Arc::new(DetailSelectors {
                address: compile(&cfg.address)?,
                description: compile_opt(cfg.description.as_deref())?,
                date: compile_opt(cfg.date.as_deref())?,
                address_cut: cfg.address_cut.clone().filter(|s| !s.is_empty()),
            }),
            workers: cfg.workers.max(1),
            transport,
        })
    }

    /// `(title, absolute detail url)` pairs, first occurrence of each url.
    fn parse_listing(&self, html: &str) -> Vec<(String, String)> {
        let doc = Html::parse_document(html);
        let mut seen = HashSet::new();
        doc.select(&self.item_link)
            .filter_map(|a| {
                let title = text_of(a);
                let url = absolutize(Some(&self.listing_url), a.value().attr("href")?)?;
                (!title.is_empty()).then_some((title, url))
            })
            .filter(|(_, url)| seen.insert(url.clone()))
            .collect()
    }
}

fn parse_detail(html: &str, sels: &DetailSelectors) -> Result<DetailFields, DetailFailure> {
    let doc = Html::parse_document(html);
    let root = doc.root_element();

    let mut address = first_text(root, &sels.address).ok_or(DetailFailure::MissingAddress)?;
    if let Some(cut) = &sels.address_cut {
        address = address
            .split(cut.as_str())
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
    }
    if address.is_empty() {
        return Err(DetailFailure::MissingAddress);
    }

    Ok(DetailFields {
        address,
        description: sels.description.as_ref().and_then(|s| first_text(root, s)),
        date: sels.date.as_ref().and_then(|s| first_text(root, s)),
    })
}

#[async_trait]
impl SourceAdapter for ListDetail {
    async fn fetch_raw(&self) -> Result<Vec<RawEvent>> {
        let t0 = std::time::Instant::now();
        let listing = match self.transport.get_text(self.listing_url.as_str()).await {
            Ok(html) => html,
            Err(e) => {
                counter!("ingest_provider_errors_total").increment(1);
                warn!(target: "ingest", source = %self.name, error = %e, "listing page failed");
                return Ok(Vec::new());
            }
        };
        let items = self.parse_listing(&listing);
        let total = items.len();
        info!(target: "ingest", source = %self.name, found = total, workers = self.workers, "listing parsed");
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let (tx, mut rx) = mpsc::channel(total);

        for (title, url) in items {
            let sem = semaphore.clone();
            let transport = self.transport.clone();
            let sels = self.detail.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let Ok(_permit) = sem.acquire_owned().await else {
                    return;
                };
                debug!(target: "ingest", url = %url, "fetching detail");
                let result = match transport.get_text(&url).await {
                    Ok(html) => parse_detail(&html, &sels),
                    Err(e) => Err(DetailFailure::from(e)),
                };
                let _ = tx.send((title, url, result)).await;
            });
        }
        drop(tx);

        let mut out = Vec::with_capacity(total);
        let mut done = 0usize;
        while let Some((title, url, result)) = rx.recv().await {
            done += 1;
            match result {
                Ok(fields) => {
                    let Some(mut ev) = RawEvent::titled(&title) else {
                        continue;
                    };
                    ev.url = Some(url);
                    ev.venue_address = Some(fields.address);
                    ev.set_description(fields.description.as_deref());
                    ev.date = fields.date;
                    info!(target: "ingest", "[{done}/{total}] ✓ {}", ev.title);
                    out.push(ev);
                }
                Err(e) => {
                    counter!("ingest_detail_failures_total").increment(1);
                    warn!(target: "ingest", url = %url, error = %e, "[{done}/{total}] ✗ {title}");
                }
            }
        }

        info!(target: "ingest", source = %self.name, "{}/{} events scraped", out.len(), total);
        histogram!("ingest_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("ingest_events_total").increment(out.len() as u64);
        Ok(out)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
