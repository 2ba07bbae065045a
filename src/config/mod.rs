// src/config/mod.rs
//! Run configuration: geocoder, HTTP client, known venues, and the source list.
//!
//! Lookup order (first hit wins):
//! 1) `$EVENTS_SOURCES_PATH` (must exist)
//! 2) `config/sources.toml`
//! 3) `config/sources.json`
//! 4) built-in [`AppConfig::default_seed`]

pub mod defaults;
pub mod sources;

use anyhow::{anyhow, bail, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::geocode::KnownVenues;
pub use sources::{
    GeocodeStrategy, GraphqlListingsConfig, ListDetailConfig, Locator, RenderedListConfig,
    SourceConfig, SourceKind, StaticListConfig,
};

pub const ENV_SOURCES_PATH: &str = "EVENTS_SOURCES_PATH";
pub const ENV_GEOCODER_ENDPOINT: &str = "GEOCODER_ENDPOINT";
pub const ENV_WEBDRIVER_URL: &str = "WEBDRIVER_URL";

pub const DEFAULT_SOURCES_TOML: &str = "config/sources.toml";
pub const DEFAULT_SOURCES_JSON: &str = "config/sources.json";

/// Lowest accepted spacing between geocoder calls.
pub const MIN_GEOCODER_DELAY_MS: u64 = 1_500;
/// Lowest accepted pause between API listing pages.
pub const MIN_PAGE_DELAY_MS: u64 = 1_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub city: String,
    pub country: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            city: "Berlin".to_string(),
            country: "Germany".to_string(),
        }
    }
}

impl RunConfig {
    /// Locale suffix appended to geocoder queries, e.g. "Berlin, Germany".
    pub fn locale(&self) -> String {
        [self.city.trim(), self.country.trim()]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}
fn default_http_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_http_timeout(),
        }
    }
}

fn default_geocoder_endpoint() -> String {
    "https://nominatim.openstreetmap.org/search".to_string()
}
fn default_geocoder_agent() -> String {
    "city-event-map/0.1 (+github.com/lumlich/city-event-map)".to_string()
}
fn default_min_delay_ms() -> u64 {
    1_500
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocoderConfig {
    #[serde(default = "default_geocoder_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_geocoder_agent")]
    pub user_agent: String,
    /// Minimum spacing between external calls.
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            endpoint: default_geocoder_endpoint(),
            user_agent: default_geocoder_agent(),
            min_delay_ms: default_min_delay_ms(),
            timeout_secs: default_http_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub geocoder: GeocoderConfig,
    /// `name = [lat, lon]`; absent → built-in seed.
    #[serde(default)]
    pub known_venues: Option<IndexMap<String, [f64; 2]>>,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

impl AppConfig {
    /// Load from an explicit path. Supports TOML or JSON (by extension).
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading sources config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = parse_config(&content, ext.as_str())
            .with_context(|| format!("parsing {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse and validate an inline TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: AppConfig = toml::from_str(s).context("invalid TOML sources config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Env var, then `config/sources.{toml,json}`, then the built-in seed.
    /// Env overrides for the geocoder and WebDriver endpoints are applied last.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_SOURCES_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_SOURCES_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else if Path::new(DEFAULT_SOURCES_TOML).exists() {
            Self::load_from(Path::new(DEFAULT_SOURCES_TOML))?
        } else if Path::new(DEFAULT_SOURCES_JSON).exists() {
            Self::load_from(Path::new(DEFAULT_SOURCES_JSON))?
        } else {
            info!("no sources config found, using built-in defaults");
            Self::default_seed()
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(ep) = std::env::var(ENV_GEOCODER_ENDPOINT) {
            if !ep.trim().is_empty() {
                self.geocoder.endpoint = ep.trim().to_string();
            }
        }
        if let Ok(wd) = std::env::var(ENV_WEBDRIVER_URL) {
            if !wd.trim().is_empty() {
                for s in &mut self.sources {
                    if let SourceKind::RenderedList(r) = &mut s.kind {
                        r.webdriver_url = wd.trim().to_string();
                    }
                }
            }
        }
    }

    /// Ids must be unique and non-empty; at least one source; rate limits not below the floors.
    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            bail!("no sources configured");
        }
        if self.geocoder.min_delay_ms < MIN_GEOCODER_DELAY_MS {
            bail!(
                "geocoder.min_delay_ms = {} is below the {MIN_GEOCODER_DELAY_MS} ms floor",
                self.geocoder.min_delay_ms
            );
        }
        let mut seen = std::collections::HashSet::new();
        for s in &self.sources {
            if s.id.trim().is_empty() || s.name.trim().is_empty() {
                bail!("source with empty id or name");
            }
            if !seen.insert(s.id.to_ascii_lowercase()) {
                bail!("duplicate source id `{}`", s.id);
            }
            if let SourceKind::GraphqlListings(g) = &s.kind {
                if g.page_delay_ms < MIN_PAGE_DELAY_MS {
                    bail!(
                        "source `{}`: page_delay_ms = {} is below the {MIN_PAGE_DELAY_MS} ms floor",
                        s.id,
                        g.page_delay_ms
                    );
                }
            }
        }
        Ok(())
    }

    pub fn known_venues(&self) -> KnownVenues {
        match &self.known_venues {
            Some(table) => KnownVenues::from_table(table),
            None => KnownVenues::default_seed(),
        }
    }

    /// Find a source by id or display name (case-insensitive).
    pub fn source(&self, key: &str) -> Option<&SourceConfig> {
        self.sources
            .iter()
            .find(|s| s.id.eq_ignore_ascii_case(key) || s.name.eq_ignore_ascii_case(key))
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<AppConfig> {
    if hint_ext == "json" {
        return serde_json::from_str(s).context("invalid JSON sources config");
    }
    match toml::from_str::<AppConfig>(s) {
        Ok(cfg) => Ok(cfg),
        Err(toml_err) => serde_json::from_str(s)
            .map_err(|_| anyhow!("invalid TOML sources config: {toml_err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locale_joins_non_empty_parts() {
        let r = RunConfig {
            city: "Berlin".into(),
            country: " ".into(),
        };
        assert_eq!(r.locale(), "Berlin");
        assert_eq!(RunConfig::default().locale(), "Berlin, Germany");
    }

    #[test]
    fn seed_is_valid_and_survives_json() {
        let seed = AppConfig::default_seed();
        seed.validate().unwrap();
        let text = serde_json::to_string(&seed).unwrap();
        let back = parse_config(&text, "json").unwrap();
        assert_eq!(back.sources.len(), seed.sources.len());
        assert_eq!(back.source("ra").map(|s| s.kind.label()), Some("graphql_listings"));
    }

    #[test]
    fn shipped_toml_matches_seed_shape() {
        let shipped = parse_config(include_str!("../../config/sources.toml"), "toml").unwrap();
        shipped.validate().unwrap();
        let seed = AppConfig::default_seed();
        let ids = |c: &AppConfig| c.sources.iter().map(|s| (s.id.clone(), s.kind.label())).collect::<Vec<_>>();
        assert_eq!(ids(&shipped), ids(&seed));
        assert_eq!(shipped.geocoder.min_delay_ms, 1_500);
        assert!(shipped.known_venues().lookup("Berghain").is_some());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut cfg = AppConfig::default_seed();
        let dup = cfg.sources[0].clone();
        cfg.sources.push(dup);
        assert!(cfg.validate().is_err());
    }
}
