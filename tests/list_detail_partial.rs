// tests/list_detail_partial.rs
mod common;

use city_event_map::config::ListDetailConfig;
use city_event_map::ingest::providers::ListDetail;
use city_event_map::SourceAdapter;
use common::{fixture, FakeTransport};
use std::sync::Arc;

const LISTING: &str = "https://gratis.example/heute";

fn cfg(workers: usize) -> ListDetailConfig {
    ListDetailConfig {
        listing_url: LISTING.into(),
        item_link: "h2.overviewcontentheading a.singletip".into(),
        address: "div.mapTipp".into(),
        description: Some("div.overview-text".into()),
        date: Some("div.dateTipp".into()),
        address_cut: Some(" - ".into()),
        workers,
    }
}

fn detail(slug: &str) -> String {
    format!("https://gratis.example/tipp/{slug}")
}

#[tokio::test]
async fn two_failing_details_leave_three_records() {
    let ok = fixture("gratis_detail.html");
    let t = Arc::new(
        FakeTransport::new()
            .page(LISTING, &fixture("gratis_listing.html"))
            .page(&detail("101-lesung"), &ok)
            .status(&detail("102-konzert"), 503)
            .page(&detail("103-fuehrung"), &ok)
            .page(&detail("104-kino"), &fixture("gratis_detail_no_address.html"))
            .page(&detail("105-markt"), &ok),
    );
    let adapter = ListDetail::new("Gratis in Berlin", &cfg(2), t.clone()).unwrap();
    let mut out = adapter.fetch_raw().await.unwrap();
    out.sort_by(|a, b| a.title.cmp(&b.title));

    let titles: Vec<_> = out.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, ["Führung durchs Rathaus", "Lesung im Park", "Wochenmarkt"]);
    // listing + one request per distinct detail url
    assert_eq!(t.get_count(), 6);

    let ev = &out[1];
    assert_eq!(ev.venue_address.as_deref(), Some("Rathausstraße 15"));
    assert_eq!(ev.url.as_deref(), Some("https://gratis.example/tipp/101-lesung"));
    assert_eq!(ev.date.as_deref(), Some("Freitag, 19.12.2025 18:00 Uhr"));
    assert!(ev
        .description
        .as_deref()
        .unwrap()
        .starts_with("Eintritt frei."));
}

#[tokio::test]
async fn listing_failure_is_an_empty_run() {
    let t = Arc::new(FakeTransport::new().status(LISTING, 500));
    let adapter = ListDetail::new("Gratis in Berlin", &cfg(10), t.clone()).unwrap();
    assert!(adapter.fetch_raw().await.unwrap().is_empty());
    assert_eq!(t.get_count(), 1);
}

#[tokio::test]
async fn single_worker_still_completes_everything() {
    let ok = fixture("gratis_detail.html");
    let mut t = FakeTransport::new().page(LISTING, &fixture("gratis_listing.html"));
    for slug in ["101-lesung", "102-konzert", "103-fuehrung", "104-kino", "105-markt"] {
        t = t.page(&detail(slug), &ok);
    }
    let adapter = ListDetail::new("Gratis in Berlin", &cfg(1), Arc::new(t)).unwrap();
    assert_eq!(adapter.fetch_raw().await.unwrap().len(), 5);
}

#[test]
fn invalid_selector_is_a_construction_error() {
    let mut c = cfg(4);
    c.address = "div[".into();
    assert!(ListDetail::new("x", &c, Arc::new(FakeTransport::new())).is_err());
}
