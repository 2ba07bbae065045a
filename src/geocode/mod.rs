// src/geocode/mod.rs
//! Geocoding resolver: free-text place query → coordinates.
//!
//! - One `GeocodeResolver` per pipeline run; its cache is never shared across
//!   adapters or runs.
//! - External calls are paced by a [`Throttle`] and happen at most once per
//!   distinct query; repeats are answered from cache with no delay.
//! - Service errors and timeouts resolve to `None` (logged), never abort.

pub mod known_venues;
pub mod nominatim;
pub mod throttle;

use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

pub use known_venues::KnownVenues;
pub use nominatim::Nominatim;
pub use throttle::Throttle;

/// Separators tried (earliest occurrence wins) when truncating an address
/// for the fallback lookup.
pub const FALLBACK_SEPARATORS: [char; 4] = ['-', '\u{2013}', ':', '/'];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    /// `None` for non-finite or out-of-range values.
    pub fn new(lat: f64, lon: f64) -> Option<Self> {
        let ok = lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);
        ok.then_some(Self { lat, lon })
    }
}

pub type GeocodeResult = Option<Coordinates>;

/// The external geocoding service.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// `Ok(None)` = the service answered but found nothing.
    async fn lookup(&self, query: &str) -> anyhow::Result<Option<Coordinates>>;
    fn name(&self) -> &'static str;
}

pub struct GeocodeResolver {
    geocoder: Box<dyn Geocoder>,
    cache: Mutex<HashMap<String, GeocodeResult>>,
    // held across the external call so concurrent callers of one key
    // still produce a single lookup
    throttle: tokio::sync::Mutex<Throttle>,
    lookups: AtomicUsize,
}

impl GeocodeResolver {
    pub fn new(geocoder: Box<dyn Geocoder>, min_delay: Duration) -> Self {
        Self {
            geocoder,
            cache: Mutex::new(HashMap::new()),
            throttle: tokio::sync::Mutex::new(Throttle::new(min_delay)),
            lookups: AtomicUsize::new(0),
        }
    }

    fn cached(&self, key: &str) -> Option<GeocodeResult> {
        let cache = self.cache.lock().expect("geocode cache mutex poisoned");
        cache.get(key).copied()
    }

    /// Resolve one query. Repeats within this resolver's lifetime hit the cache.
    pub async fn resolve(&self, query: &str) -> GeocodeResult {
        let key = query.trim();
        if key.is_empty() {
            return None;
        }
        if let Some(hit) = self.cached(key) {
            counter!("geocode_cache_hits_total").increment(1);
            debug!(target: "geocode", query = key, "cache hit");
            return hit;
        }

        let mut throttle = self.throttle.lock().await;
        // another caller may have filled it while we waited for the lock
        if let Some(hit) = self.cached(key) {
            counter!("geocode_cache_hits_total").increment(1);
            return hit;
        }
        throttle.acquire().await;

        self.lookups.fetch_add(1, Ordering::Relaxed);
        counter!("geocode_requests_total").increment(1);
        let result = match self.geocoder.lookup(key).await {
            Ok(r) => r,
            Err(e) => {
                warn!(target: "geocode", error = %e, query = key, geocoder = self.geocoder.name(), "geocoding failed");
                None
            }
        };
        if result.is_none() {
            counter!("geocode_misses_total").increment(1);
        }

        self.cache
            .lock()
            .expect("geocode cache mutex poisoned")
            .entry(key.to_string())
            .or_insert(result);
        drop(throttle);
        result
    }

    /// Full string first, then the part before the earliest separator
    /// (`- – : /`). `locale` (e.g. "Berlin, Germany") is appended to each attempt.
    pub async fn resolve_with_fallback(&self, address: &str, locale: Option<&str>) -> GeocodeResult {
        if let Some(c) = self.resolve(&with_locale(address, locale)).await {
            return Some(c);
        }
        let head = truncate_at_separator(address)?;
        debug!(target: "geocode", address, head, "retrying with truncated address");
        self.resolve(&with_locale(head, locale)).await
    }

    /// Number of external lookups issued so far.
    pub fn external_lookups(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }

    /// Number of distinct queries seen (hits and misses).
    pub fn distinct_queries(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }
}

/// Append locale context unless it is empty.
pub fn with_locale(text: &str, locale: Option<&str>) -> String {
    let text = text.trim();
    match locale.map(str::trim).filter(|l| !l.is_empty()) {
        Some(l) => format!("{text}, {l}"),
        None => text.to_string(),
    }
}

/// Prefix before the earliest fallback separator, trimmed. `None` when there
/// is no separator or the prefix is empty.
pub fn truncate_at_separator(address: &str) -> Option<&str> {
    let idx = address.find(|c: char| FALLBACK_SEPARATORS.contains(&c))?;
    let head = address[..idx].trim();
    (!head.is_empty() && head != address.trim()).then_some(head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_uses_earliest_separator() {
        assert_eq!(
            truncate_at_separator("Hauptstraße 10 - Keller, Berlin"),
            Some("Hauptstraße 10")
        );
        assert_eq!(
            truncate_at_separator("Philharmonie: Kammermusiksaal / Foyer"),
            Some("Philharmonie")
        );
        assert_eq!(truncate_at_separator("Volksbühne \u{2013} Roter Salon"), Some("Volksbühne"));
        assert_eq!(truncate_at_separator("No separator here"), None);
        assert_eq!(truncate_at_separator("- leading"), None);
    }

    #[test]
    fn locale_is_appended_when_present() {
        assert_eq!(with_locale(" Tresor ", Some("Berlin, Germany")), "Tresor, Berlin, Germany");
        assert_eq!(with_locale("Tresor", Some("  ")), "Tresor");
        assert_eq!(with_locale("Tresor", None), "Tresor");
    }

    #[test]
    fn coordinates_reject_out_of_range() {
        assert!(Coordinates::new(52.5, 13.4).is_some());
        assert!(Coordinates::new(95.0, 13.4).is_none());
        assert!(Coordinates::new(f64::NAN, 13.4).is_none());
    }
}
