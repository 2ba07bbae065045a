// src/config/sources.rs
//! Per-source configuration. The `kind` tag selects the adapter type; every
//! site-specific detail (endpoint, selectors, overlay locators) lives here,
//! not in code.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactLayout;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Short handle for the CLI, e.g. "ra".
    pub id: String,
    /// Display name, also the `source` tag in the merged dataset.
    pub name: String,
    /// Artifact file name; may contain `{date}`.
    pub artifact: String,
    pub color: String,
    pub icon: String,
    #[serde(default)]
    pub geocode: GeocodeStrategy,
    #[serde(default)]
    pub layout: ArtifactLayout,
    /// Consult the known-venue table before geocoding.
    #[serde(default)]
    pub known_venues: bool,
    /// Extra request headers (e.g. `Referer`).
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    #[serde(flatten)]
    pub kind: SourceKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceKind {
    GraphqlListings(GraphqlListingsConfig),
    ListDetail(ListDetailConfig),
    StaticList(StaticListConfig),
    RenderedList(RenderedListConfig),
}

impl SourceKind {
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::GraphqlListings(_) => "graphql_listings",
            SourceKind::ListDetail(_) => "list_detail",
            SourceKind::StaticList(_) => "static_list",
            SourceKind::RenderedList(_) => "rendered_list",
        }
    }
}

/// How the per-source pipeline turns a record into a geocoder query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeocodeStrategy {
    /// "{venue}, {address}, {locale}" (address optional); keyed by (venue, address).
    #[default]
    VenueAndAddress,
    /// The address verbatim.
    Address,
    /// Address, else venue; locale appended only when the text has no digit.
    AddressOrVenue,
    /// Address with locale, retried truncated at the first separator.
    AddressWithFallback,
}

fn default_page_delay_ms() -> u64 {
    1_000
}
fn default_workers() -> usize {
    10
}
fn default_settle_ms() -> u64 {
    3_000
}
fn default_webdriver_url() -> String {
    "http://127.0.0.1:9515".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphqlListingsConfig {
    pub endpoint: String,
    /// JSON file with `query` + `variables.filters.{areas.eq, listingDate.gte, listingDate.lte}`.
    pub query_template: String,
    pub area: i64,
    /// Base for relative `contentUrl`s.
    #[serde(default)]
    pub site_base: Option<String>,
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListDetailConfig {
    pub listing_url: String,
    /// Link elements on the listing page; text = title, href = detail page.
    pub item_link: String,
    /// Required marker on the detail page.
    pub address: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    /// Keep only the part of the address before this separator.
    #[serde(default)]
    pub address_cut: Option<String>,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticListConfig {
    /// May contain `{date}` (YYYY-MM-DD).
    pub listing_url: String,
    pub item: String,
    pub title: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    /// Ordered candidates; first non-empty wins.
    #[serde(default)]
    pub address: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
}

/// Element locator for a browser session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locator {
    Css(String),
    Xpath(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedListConfig {
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,
    /// Landing page; `{ts}` is replaced by a unix timestamp cache-buster.
    pub landing_url: String,
    /// Consent-banner buttons, in priority order.
    #[serde(default)]
    pub consent: Vec<Locator>,
    /// Ad/popup close buttons, in priority order.
    #[serde(default)]
    pub popups: Vec<Locator>,
    /// "More" control leading to the full listing.
    pub more: Locator,
    /// Direct listing URL used when the control is missing or the click fails.
    pub fallback_url: String,
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Event container selectors, tried in order until one matches.
    pub boxes: Vec<String>,
    pub title: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    /// The last match is the date line.
    #[serde(default)]
    pub date: Option<String>,
}
