// src/config/defaults.rs
//! Built-in source list used when no `config/sources.{toml,json}` exists.
//! Mirrors the shipped `config/sources.toml`.

use indexmap::IndexMap;

use super::{
    AppConfig, GeocodeStrategy, GeocoderConfig, GraphqlListingsConfig, HttpConfig,
    ListDetailConfig, Locator, RenderedListConfig, RunConfig, SourceConfig, SourceKind,
    StaticListConfig,
};
use crate::artifact::ArtifactLayout;

fn css(s: &str) -> Locator {
    Locator::Css(s.to_string())
}

/// Button whose visible text contains `label`.
fn button_text(label: &str) -> Locator {
    Locator::Xpath(format!("//button[contains(normalize-space(.), '{label}')]"))
}

impl AppConfig {
    pub fn default_seed() -> Self {
        let tip = SourceConfig {
            id: "tip".into(),
            name: "tip Berlin".into(),
            artifact: "tip_berlin_events.csv".into(),
            color: "blue".into(),
            icon: "star".into(),
            geocode: GeocodeStrategy::AddressOrVenue,
            layout: ArtifactLayout::Canonical,
            known_venues: false,
            headers: IndexMap::new(),
            kind: SourceKind::RenderedList(RenderedListConfig {
                webdriver_url: "http://127.0.0.1:9515".into(),
                landing_url: "https://www.tip-berlin.de/event-tageshighlights/?t={ts}".into(),
                consent: vec![
                    button_text("Akzeptieren"),
                    button_text("Alle akzeptieren"),
                    button_text("Accept"),
                    css("[title=\"Akzeptieren\"]"),
                    css(".sp_choice_type_11"),
                    css("button[title=\"Zustimmen\"]"),
                ],
                popups: vec![
                    button_text("Schließen"),
                    button_text("×"),
                    css("[aria-label=\"Close\"]"),
                    css(".close"),
                    css(".modal-close"),
                ],
                more: css("a.tip-recommended-posts__more-link"),
                fallback_url: "https://www.tip-berlin.de/event/".into(),
                settle_ms: 3_000,
                boxes: vec![
                    "div.collections__box--event".into(),
                    "div.collections__box".into(),
                ],
                title: "h2.collections__box__title".into(),
                link: Some("a.collections__box__link".into()),
                category: Some("p.collections__box__event-category".into()),
                venue: Some("span.-mobile-v".into()),
                address: Some("span.-desktop-v".into()),
                date: Some("h3.collections__box__title".into()),
            }),
        };

        let gratis = SourceConfig {
            id: "gratis".into(),
            name: "Gratis in Berlin".into(),
            artifact: "gratis_berlin_events.csv".into(),
            color: "green".into(),
            icon: "gift".into(),
            geocode: GeocodeStrategy::Address,
            layout: ArtifactLayout::Canonical,
            known_venues: false,
            headers: IndexMap::new(),
            kind: SourceKind::ListDetail(ListDetailConfig {
                listing_url: "https://www.gratis-in-berlin.de/heute".into(),
                item_link: "h2.overviewcontentheading a.singletip".into(),
                address: "div.mapTipp".into(),
                description: Some("div.overview-text".into()),
                date: Some("div.dateTipp".into()),
                address_cut: Some(" - ".into()),
                workers: 10,
            }),
        };

        let visit = SourceConfig {
            id: "visit".into(),
            name: "visit Berlin".into(),
            artifact: "visitberlin_events.csv".into(),
            color: "purple".into(),
            icon: "info-sign".into(),
            geocode: GeocodeStrategy::AddressWithFallback,
            layout: ArtifactLayout::Canonical,
            known_venues: false,
            headers: IndexMap::new(),
            kind: SourceKind::StaticList(StaticListConfig {
                listing_url: "https://www.visitberlin.de/de/tagestipps-veranstaltungen-berlin?keys=&date_between[min]={date}&date_between[max]={date}&district=All&items_per_page=max".into(),
                item: "article.teaser-search--event".into(),
                title: "h2.teaser-search__heading".into(),
                date: Some("time".into()),
                time: Some("p.teaser-search__time span.me__content".into()),
                address: vec![
                    "p.teaser-search__location span.nopr".into(),
                    "p.teaser-search__location span.me__content".into(),
                ],
                description: Some("div.teaser-search__text > div".into()),
                link: Some("a.teaser-search__mainlink".into()),
            }),
        };

        let mut ra_headers = IndexMap::new();
        ra_headers.insert("Referer".to_string(), "https://ra.co/events/de/berlin".to_string());
        let ra = SourceConfig {
            id: "ra".into(),
            name: "Resident Advisor".into(),
            artifact: "RA_{date}_events.csv".into(),
            color: "red".into(),
            icon: "music".into(),
            geocode: GeocodeStrategy::VenueAndAddress,
            layout: ArtifactLayout::EventListing,
            known_venues: true,
            headers: ra_headers,
            kind: SourceKind::GraphqlListings(GraphqlListingsConfig {
                endpoint: "https://ra.co/graphql".into(),
                query_template: "config/graphql_query_template.json".into(),
                area: 34,
                site_base: Some("https://ra.co".into()),
                page_delay_ms: 1_000,
            }),
        };

        Self {
            run: RunConfig::default(),
            http: HttpConfig::default(),
            geocoder: GeocoderConfig::default(),
            known_venues: None,
            sources: vec![tip, gratis, visit, ra],
        }
    }
}
