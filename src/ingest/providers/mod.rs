// src/ingest/providers/mod.rs
pub mod graphql_listings;
pub mod list_detail;
pub mod rendered_list;
pub mod static_list;

use anyhow::Result;
use chrono::NaiveDate;
use std::sync::Arc;

use crate::config::{AppConfig, SourceConfig, SourceKind};
use crate::ingest::http::HttpTransport;
use crate::ingest::types::SourceAdapter;
use crate::ingest::webdriver::WebDriver;

pub use graphql_listings::{GraphqlListings, ListingFilter};
pub use list_detail::ListDetail;
pub use rendered_list::RenderedList;
pub use static_list::StaticList;

/// Construct the adapter a source's `kind` names, wired to production transports.
/// Configuration problems (template, selectors, URLs) fail here, before any request.
pub fn build_adapter(
    source: &SourceConfig,
    app: &AppConfig,
    day: NaiveDate,
) -> Result<Box<dyn SourceAdapter>> {
    let name = source.name.as_str();
    let adapter: Box<dyn SourceAdapter> = match &source.kind {
        SourceKind::GraphqlListings(cfg) => {
            let transport = Arc::new(HttpTransport::new(&app.http, &source.headers)?);
            Box::new(GraphqlListings::new(name, cfg, day, transport)?)
        }
        SourceKind::ListDetail(cfg) => {
            let transport = Arc::new(HttpTransport::new(&app.http, &source.headers)?);
            Box::new(ListDetail::new(name, cfg, transport)?)
        }
        SourceKind::StaticList(cfg) => {
            let transport = Arc::new(HttpTransport::new(&app.http, &source.headers)?);
            Box::new(StaticList::new(name, cfg, day, transport)?)
        }
        SourceKind::RenderedList(cfg) => {
            let driver = Arc::new(WebDriver::new(&cfg.webdriver_url, &app.http.user_agent)?);
            Box::new(RenderedList::new(name, cfg, driver)?)
        }
    };
    Ok(adapter)
}
