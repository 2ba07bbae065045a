// src/ingest/providers/static_list.rs
//! Single listing page where every item already carries all fields.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use metrics::{counter, histogram};
use scraper::{Html, Selector};
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

use crate::config::StaticListConfig;
use crate::ingest::html::{absolutize, compile, compile_all, compile_opt, first_attr, first_text, first_text_any};
use crate::ingest::http::Transport;
use crate::ingest::types::{RawEvent, SourceAdapter};

struct ItemSelectors {
    item: Selector,
    title: Selector,
    date: Option<Selector>,
    time: Option<Selector>,
    address: Vec<Selector>,
    description: Option<Selector>,
    link: Option<Selector>,
}

pub struct StaticList {
    name: String,
    url: Url,
    sels: ItemSelectors,
    transport: Arc<dyn Transport>,
}

impl StaticList {
    /// `{date}` in the listing URL is replaced with `day` (YYYY-MM-DD).
    pub fn new(
        name: &str,
        cfg: &StaticListConfig,
        day: NaiveDate,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let raw = cfg
            .listing_url
            .replace("{date}", &day.format("%Y-%m-%d").to_string());
        let url = Url::parse(&raw).with_context(|| format!("invalid listing_url for {name}"))?;
        Ok(Self {
            name: name.to_string(),
            url,
            sels: ItemSelectors {
                item: compile(&cfg.item)?,
                title: compile(&cfg.title)?,
                date: compile_opt(cfg.date.as_deref())?,
                time: compile_opt(cfg.time.as_deref())?,
                address: compile_all(&cfg.address)?,
                description: compile_opt(cfg.description.as_deref())?,
                link: compile_opt(cfg.link.as_deref())?,
            },
            transport,
        })
    }

    fn parse(&self, html: &str) -> Vec<RawEvent> {
        let doc = Html::parse_document(html);
        let s = &self.sels;
        let mut out = Vec::new();
        for item in doc.select(&s.item) {
            let Some(mut ev) = first_text(item, &s.title).and_then(|t| RawEvent::titled(&t)) else {
                continue;
            };
            ev.date = s.date.as_ref().and_then(|sel| first_text(item, sel));
            ev.start_time = s.time.as_ref().and_then(|sel| first_text(item, sel));
            ev.venue_address = first_text_any(item, &s.address);
            let desc = s.description.as_ref().and_then(|sel| first_text(item, sel));
            ev.set_description(desc.as_deref());
            ev.url = s
                .link
                .as_ref()
                .and_then(|sel| first_attr(item, sel, "href"))
                .and_then(|href| absolutize(Some(&self.url), &href));
            out.push(ev);
        }
        out
    }
}

#[async_trait]
impl SourceAdapter for StaticList {
    async fn fetch_raw(&self) -> Result<Vec<RawEvent>> {
        let t0 = std::time::Instant::now();
        let html = match self.transport.get_text(self.url.as_str()).await {
            Ok(h) => h,
            Err(e) => {
                counter!("ingest_provider_errors_total").increment(1);
                warn!(target: "ingest", source = %self.name, error = %e, "listing page failed");
                return Ok(Vec::new());
            }
        };
        let out = self.parse(&html);
        info!(target: "ingest", source = %self.name, found = out.len(), "listing parsed");
        histogram!("ingest_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("ingest_events_total").increment(out.len() as u64);
        Ok(out)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
