// src/merge/columns.rs
//! Column reconciliation: artifact headers differ per source, so every
//! canonical field has an ordered list of accepted column names.

use indexmap::IndexMap;

use crate::geocode::Coordinates;
use crate::ingest::types::{clean, RawEvent};

pub const TITLE: &[&str] = &["title", "Event name", "name"];
pub const LAT: &[&str] = &["lat", "Venue Latitude", "latitude"];
pub const LON: &[&str] = &["lon", "Venue Longitude", "longitude", "lng"];
pub const VENUE: &[&str] = &["venue", "Venue"];
pub const ADDRESS: &[&str] = &["address", "Venue Address"];
pub const DATE: &[&str] = &["date", "Date", "detailed_date"];
pub const URL: &[&str] = &["url", "Event URL"];
pub const CATEGORY: &[&str] = &["category"];
pub const START_TIME: &[&str] = &["Start Time", "start_time", "time"];
pub const END_TIME: &[&str] = &["End Time", "end_time"];
pub const DESCRIPTION: &[&str] = &["description"];

/// Columns a source artifact may carry that merge re-derives itself.
const PRESENTATION: &[&str] = &["source", "color", "icon"];

fn all_candidates() -> impl Iterator<Item = &'static str> {
    [
        TITLE, LAT, LON, VENUE, ADDRESS, DATE, URL, CATEGORY, START_TIME, END_TIME, DESCRIPTION,
    ]
    .into_iter()
    .flatten()
    .copied()
}

/// First present, non-empty value among `candidates`.
pub fn pick(row: &IndexMap<String, String>, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .find_map(|c| row.get(*c).and_then(|v| clean(Some(v.clone()))))
}

fn coordinate(row: &IndexMap<String, String>, candidates: &[&str]) -> Option<f64> {
    pick(row, candidates)?.parse::<f64>().ok()
}

/// Canonical record plus coordinates; `None` when the title or either
/// coordinate is missing or unparsable.
pub fn reconcile_row(row: &IndexMap<String, String>) -> Option<(RawEvent, Coordinates)> {
    let mut ev = RawEvent::titled(&pick(row, TITLE)?)?;
    let coords = Coordinates::new(coordinate(row, LAT)?, coordinate(row, LON)?)?;

    ev.venue_name = pick(row, VENUE);
    ev.venue_address = pick(row, ADDRESS);
    ev.date = pick(row, DATE);
    ev.url = pick(row, URL);
    ev.category = pick(row, CATEGORY);
    ev.start_time = pick(row, START_TIME);
    ev.end_time = pick(row, END_TIME);
    ev.description = pick(row, DESCRIPTION);

    // anything else travels along as an extra under its original name
    for (col, value) in row {
        if all_candidates().any(|c| c == col.as_str()) || PRESENTATION.contains(&col.as_str()) {
            continue;
        }
        ev.set_extra(col, Some(value.clone()));
    }
    Some((ev, coords))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn first_candidate_wins_and_blanks_are_skipped() {
        let r = row(&[("date", " "), ("Date", "2025-12-19"), ("detailed_date", "Fr")]);
        assert_eq!(pick(&r, DATE).as_deref(), Some("2025-12-19"));
    }

    #[test]
    fn unparsable_coordinates_drop_the_row() {
        assert!(reconcile_row(&row(&[("title", "A"), ("lat", "n/a"), ("lon", "13.4")])).is_none());
        assert!(reconcile_row(&row(&[("title", "A"), ("lat", "52.5")])).is_none());
        assert!(reconcile_row(&row(&[("lat", "52.5"), ("lon", "13.4")])).is_none());
    }

    #[test]
    fn unknown_columns_become_extras() {
        let (ev, c) = reconcile_row(&row(&[
            ("Event name", "Night"),
            ("Venue Latitude", "52.5"),
            ("Venue Longitude", "13.4"),
            ("Artists", "DJ One"),
            ("source", "stale"),
        ]))
        .unwrap();
        assert_eq!(ev.title, "Night");
        assert_eq!(c.lon, 13.4);
        assert_eq!(ev.extra.get("Artists").map(String::as_str), Some("DJ One"));
        assert!(!ev.extra.contains_key("source"));
    }
}
