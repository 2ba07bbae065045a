// tests/rendered_list.rs
mod common;

use city_event_map::config::{Locator, RenderedListConfig};
use city_event_map::ingest::providers::RenderedList;
use city_event_map::SourceAdapter;
use common::{fixture, FakeBrowser};
use std::collections::HashMap;
use std::sync::Arc;

const LANDING: &str = "https://www.tip.example/highlights/";
const LISTING: &str = "https://www.tip.example/event/";

fn consent() -> Locator {
    Locator::Xpath("//button[contains(normalize-space(.), 'Akzeptieren')]".into())
}
fn consent_alt() -> Locator {
    Locator::Css(".sp_choice_type_11".into())
}
fn popup() -> Locator {
    Locator::Css(".modal-close".into())
}
fn more() -> Locator {
    Locator::Css("a.tip-recommended-posts__more-link".into())
}

fn cfg() -> RenderedListConfig {
    RenderedListConfig {
        webdriver_url: "http://127.0.0.1:9515".into(),
        landing_url: LANDING.into(),
        consent: vec![consent(), consent_alt()],
        popups: vec![popup()],
        more: more(),
        fallback_url: LISTING.into(),
        settle_ms: 0,
        boxes: vec!["div.collections__box--event".into(), "div.collections__box".into()],
        title: "h2.collections__box__title".into(),
        link: Some("a.collections__box__link".into()),
        category: Some("p.collections__box__event-category".into()),
        venue: Some("span.-mobile-v".into()),
        address: Some("span.-desktop-v".into()),
        date: Some("h3.collections__box__title".into()),
    }
}

fn browser(displayed: Vec<Locator>) -> FakeBrowser {
    let mut html = HashMap::new();
    html.insert(LISTING.to_string(), fixture("tip_events.html"));
    FakeBrowser {
        displayed,
        click_targets: vec![(more(), LISTING.to_string())],
        html,
        ..FakeBrowser::default()
    }
}

fn clicks(b: &FakeBrowser) -> Vec<String> {
    b.commands().into_iter().filter(|c| c.starts_with("click")).collect()
}

#[tokio::test]
async fn overlays_then_more_click_then_parse() {
    let b = browser(vec![consent(), consent_alt(), popup(), more()]);
    let adapter = RenderedList::new("tip Berlin", &cfg(), Arc::new(b.clone())).unwrap();
    let out = adapter.fetch_raw().await.unwrap();

    // first matching consent locator only, then popup, then "more"
    assert_eq!(
        clicks(&b),
        [
            "click xpath://button[contains(normalize-space(.), 'Akzeptieren')]",
            "click css:.modal-close",
            "click css:a.tip-recommended-posts__more-link",
        ]
    );
    assert!(!b.commands().contains(&format!("goto {LISTING}")));
    assert_eq!(b.sessions_closed(), 1);

    assert_eq!(out.len(), 2, "box without venue or address is dropped");
    let jazz = &out[0];
    assert_eq!(jazz.title, "Jazz im A-Trane");
    assert_eq!(jazz.category.as_deref(), Some("Konzert"));
    assert_eq!(jazz.venue_name.as_deref(), Some("A-Trane"));
    assert_eq!(jazz.venue_address.as_deref(), Some("Pestalozzistraße 105"));
    assert_eq!(jazz.date.as_deref(), Some("19.12.2025, 21:00"));
    assert_eq!(jazz.url.as_deref(), Some("https://www.tip.example/event/jazz-im-a-trane/"));

    let theater = &out[1];
    assert!(theater.venue_address.is_none());
    assert_eq!(theater.url.as_deref(), Some("https://www.tip.example/event/theater/"));
}

#[tokio::test]
async fn missing_more_control_falls_back_to_direct_url() {
    let b = browser(vec![]);
    let adapter = RenderedList::new("tip Berlin", &cfg(), Arc::new(b.clone())).unwrap();
    let out = adapter.fetch_raw().await.unwrap();

    assert!(clicks(&b).is_empty());
    assert_eq!(
        b.commands().iter().filter(|c| c.starts_with("goto")).cloned().collect::<Vec<_>>(),
        [format!("goto {LANDING}"), format!("goto {LISTING}")]
    );
    assert_eq!(out.len(), 2);
    assert_eq!(b.sessions_closed(), 1);
}

#[tokio::test]
async fn failed_more_click_falls_back_too() {
    let mut b = browser(vec![more()]);
    b.failing_clicks = vec![more()];
    let adapter = RenderedList::new("tip Berlin", &cfg(), Arc::new(b.clone())).unwrap();
    let out = adapter.fetch_raw().await.unwrap();
    assert!(b.commands().contains(&format!("goto {LISTING}")));
    assert_eq!(out.len(), 2);
}

#[tokio::test]
async fn session_is_closed_when_capture_fails() {
    let mut b = browser(vec![more()]);
    b.source_fails = true;
    let adapter = RenderedList::new("tip Berlin", &cfg(), Arc::new(b.clone())).unwrap();
    assert!(adapter.fetch_raw().await.is_err());
    assert_eq!(b.sessions_closed(), 1);
    assert_eq!(b.commands().last().map(String::as_str), Some("close"));
}

#[tokio::test]
async fn falls_back_to_generic_box_selector() {
    let mut b = browser(vec![]);
    b.html.insert(LISTING.to_string(), fixture("tip_events_plain_boxes.html"));
    let adapter = RenderedList::new("tip Berlin", &cfg(), Arc::new(b)).unwrap();
    let out = adapter.fetch_raw().await.unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].venue_address.as_deref(), Some("Bernauer Straße 63-64"));
}
