// src/ingest/mod.rs
pub mod html;
pub mod http;
pub mod pipeline;
pub mod providers;
pub mod types;
pub mod webdriver;

use metrics::{describe_counter, describe_histogram};
use once_cell::sync::OnceCell;

pub use crate::ingest::pipeline::{run_configured_source, run_source, PipelineReport, SourcePlan};
pub use crate::ingest::providers::build_adapter;

/// Descriptions are capped at this many characters.
pub const DESCRIPTION_MAX_CHARS: usize = 500;

/// One-time metrics registration (so series show up once a recorder exists).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_events_total", "Raw events extracted by adapters.");
        describe_counter!("ingest_pages_total", "Listing pages fetched with records.");
        describe_counter!(
            "ingest_detail_failures_total",
            "Detail pages that failed to fetch or lacked the address marker."
        );
        describe_counter!(
            "ingest_provider_errors_total",
            "Adapter-level fetch/parse errors."
        );
        describe_counter!("geocode_requests_total", "External geocoder calls.");
        describe_counter!("geocode_cache_hits_total", "Geocode queries served from cache.");
        describe_counter!("geocode_misses_total", "Geocode queries without a result.");
        describe_counter!("merge_rows_total", "Rows kept by the merge stage.");
        describe_histogram!("ingest_fetch_ms", "Adapter fetch time in milliseconds.");
    });
}

/// Normalize scraped text: decode entities, strip tags, collapse whitespace, trim.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace (including nbsp)
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"[\s\u{00A0}]+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out.trim().to_string()
}

/// Cap a string at `max` characters (not bytes).
pub fn bound_text(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        s.chars().take(max).collect()
    } else {
        s.to_string()
    }
}
