// src/ingest/providers/rendered_list.rs
//! Listing that only exists after JavaScript runs. One browser session per
//! invocation: landing page, overlays, "more" navigation, then the final DOM
//! is parsed like any static page. The session is closed on every path.

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{Locator, RenderedListConfig};
use crate::ingest::html::{absolutize, compile, compile_all, compile_opt, first_attr, first_text, last_text};
use crate::ingest::types::{RawEvent, SourceAdapter};
use crate::ingest::webdriver::{BrowserDriver, BrowserSession};

/// Pause after a successful overlay click.
const OVERLAY_SETTLE: Duration = Duration::from_millis(1_000);

struct BoxSelectors {
    boxes: Vec<Selector>,
    title: Selector,
    link: Option<Selector>,
    category: Option<Selector>,
    venue: Option<Selector>,
    address: Option<Selector>,
    date: Option<Selector>,
}

pub struct RenderedList {
    name: String,
    cfg: RenderedListConfig,
    sels: BoxSelectors,
    driver: Arc<dyn BrowserDriver>,
}

impl RenderedList {
    pub fn new(name: &str, cfg: &RenderedListConfig, driver: Arc<dyn BrowserDriver>) -> Result<Self> {
        if cfg.boxes.is_empty() {
            anyhow::bail!("{name}: at least one box selector is required");
        }
        Ok(Self {
            name: name.to_string(),
            sels: BoxSelectors {
                boxes: compile_all(&cfg.boxes)?,
                title: compile(&cfg.title)?,
                link: compile_opt(cfg.link.as_deref())?,
                category: compile_opt(cfg.category.as_deref())?,
                venue: compile_opt(cfg.venue.as_deref())?,
                address: compile_opt(cfg.address.as_deref())?,
                date: compile_opt(cfg.date.as_deref())?,
            },
            cfg: cfg.clone(),
            driver,
        })
    }

    fn landing_url(&self) -> String {
        self.cfg
            .landing_url
            .replace("{ts}", &chrono::Utc::now().timestamp().to_string())
    }

    /// Click the first displayed match; `true` when something was dismissed.
    async fn dismiss_first(&self, session: &dyn BrowserSession, what: &str, locators: &[Locator]) -> bool {
        for loc in locators {
            match session.find_displayed(loc).await {
                Ok(Some(el)) => match session.click(&el).await {
                    Ok(()) => {
                        info!(target: "ingest", source = %self.name, locator = ?loc, "✓ {what} closed");
                        if let Err(e) = session.wait_settled(OVERLAY_SETTLE).await {
                            debug!(target: "ingest", error = %e, "settle after {what} failed");
                        }
                        return true;
                    }
                    Err(e) => debug!(target: "ingest", locator = ?loc, error = %e, "{what} click failed"),
                },
                Ok(None) => {}
                Err(e) => debug!(target: "ingest", locator = ?loc, error = %e, "{what} lookup failed"),
            }
        }
        debug!(target: "ingest", source = %self.name, "no {what} found");
        false
    }

    /// Everything between session start and page capture.
    async fn drive(&self, session: &dyn BrowserSession) -> Result<(String, String)> {
        let settle = Duration::from_millis(self.cfg.settle_ms);
        let landing = self.landing_url();
        session
            .goto(&landing)
            .await
            .with_context(|| format!("opening {landing}"))?;
        session.wait_settled(settle).await?;

        self.dismiss_first(session, "consent banner", &self.cfg.consent).await;
        self.dismiss_first(session, "popup", &self.cfg.popups).await;

        let clicked = match session.find_displayed(&self.cfg.more).await {
            Ok(Some(el)) => session.click(&el).await.map_err(|e| {
                warn!(target: "ingest", source = %self.name, error = %e, "✗ more click failed");
            }),
            Ok(None) => Err(()),
            Err(e) => {
                warn!(target: "ingest", source = %self.name, error = %e, "✗ more lookup failed");
                Err(())
            }
        };
        if clicked.is_err() {
            info!(target: "ingest", source = %self.name, url = %self.cfg.fallback_url, "navigating to listing directly");
            session
                .goto(&self.cfg.fallback_url)
                .await
                .with_context(|| format!("opening {}", self.cfg.fallback_url))?;
        }
        session.wait_settled(settle).await?;

        let url = session.current_url().await.unwrap_or_else(|_| self.cfg.fallback_url.clone());
        info!(target: "ingest", source = %self.name, url = %url, "listing reached");
        let html = session.page_source().await?;
        Ok((url, html))
    }

    fn parse(&self, page_url: &str, html: &str) -> Vec<RawEvent> {
        let doc = Html::parse_document(html);
        let s = &self.sels;
        let base = Url::parse(page_url).ok();

        // first box selector that matches anything
        let boxes: Vec<_> = s
            .boxes
            .iter()
            .map(|sel| doc.select(sel).collect::<Vec<_>>())
            .find(|found| !found.is_empty())
            .unwrap_or_default();
        debug!(target: "ingest", source = %self.name, boxes = boxes.len(), "event boxes");

        let pick = |el, sel: &Option<Selector>| sel.as_ref().and_then(|sel| first_text(el, sel));
        let mut out = Vec::new();
        for b in boxes {
            let Some(mut ev) = first_text(b, &s.title).and_then(|t| RawEvent::titled(&t)) else {
                continue;
            };
            ev.venue_name = pick(b, &s.venue);
            ev.venue_address = pick(b, &s.address);
            if ev.venue_name.is_none() && ev.venue_address.is_none() {
                debug!(target: "ingest", title = %ev.title, "✗ no venue or address");
                continue;
            }
            ev.category = pick(b, &s.category);
            ev.date = s.date.as_ref().and_then(|sel| last_text(b, sel));
            ev.url = s
                .link
                .as_ref()
                .and_then(|sel| first_attr(b, sel, "href"))
                .and_then(|href| absolutize(base.as_ref(), &href));
            out.push(ev);
        }
        out
    }
}

#[async_trait]
impl SourceAdapter for RenderedList {
    async fn fetch_raw(&self) -> Result<Vec<RawEvent>> {
        let t0 = std::time::Instant::now();
        let session = self
            .driver
            .new_session()
            .await
            .with_context(|| format!("{}: starting browser session", self.name))?;

        let captured = self.drive(session.as_ref()).await;
        if let Err(e) = session.close().await {
            warn!(target: "ingest", source = %self.name, error = %e, "closing browser session failed");
        }
        let (url, html) = captured.inspect_err(|_| {
            counter!("ingest_provider_errors_total").increment(1);
        })?;

        let out = self.parse(&url, &html);
        info!(target: "ingest", source = %self.name, found = out.len(), "events parsed");
        histogram!("ingest_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("ingest_events_total").increment(out.len() as u64);
        Ok(out)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
