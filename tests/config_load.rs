// tests/config_load.rs
use city_event_map::config::{
    AppConfig, GeocodeStrategy, Locator, SourceKind, ENV_GEOCODER_ENDPOINT, ENV_SOURCES_PATH,
    ENV_WEBDRIVER_URL,
};
use std::{env, fs};

const MINIMAL: &str = r#"
[run]
city = "Hamburg"
country = "Germany"

[geocoder]
min_delay_ms = 2000

[[sources]]
id = "clubs"
name = "Clubs"
kind = "static_list"
artifact = "clubs_{date}.csv"
color = "orange"
icon = "music"
geocode = "address_with_fallback"
listing_url = "https://clubs.example/?d={date}"
item = "li.event"
title = "h3"
address = ["span.addr", "span.place"]

[[sources]]
id = "live"
name = "Live"
kind = "rendered_list"
artifact = "live.csv"
color = "blue"
icon = "star"
landing_url = "https://live.example/?t={ts}"
consent = [{ xpath = "//button[contains(., 'OK')]" }]
more = { css = "a.more" }
fallback_url = "https://live.example/all"
boxes = ["div.box"]
title = "h2"
"#;

#[test]
fn toml_sources_are_tagged_by_kind() {
    let cfg = AppConfig::from_toml_str(MINIMAL).unwrap();
    assert_eq!(cfg.run.locale(), "Hamburg, Germany");
    assert_eq!(cfg.geocoder.min_delay_ms, 2000);
    assert_eq!(cfg.geocoder.timeout_secs, 10);

    let clubs = cfg.source("clubs").unwrap();
    assert_eq!(clubs.geocode, GeocodeStrategy::AddressWithFallback);
    match &clubs.kind {
        SourceKind::StaticList(s) => assert_eq!(s.address.len(), 2),
        other => panic!("unexpected kind {}", other.label()),
    }

    let live = cfg.source("LIVE").unwrap();
    match &live.kind {
        SourceKind::RenderedList(r) => {
            assert_eq!(r.webdriver_url, "http://127.0.0.1:9515");
            assert_eq!(r.settle_ms, 3000);
            assert_eq!(r.more, Locator::Css("a.more".into()));
            assert!(matches!(r.consent[0], Locator::Xpath(_)));
        }
        other => panic!("unexpected kind {}", other.label()),
    }
    // no [known_venues] table → built-in seed
    assert!(!cfg.known_venues().is_empty());
}

#[test]
fn unknown_kind_is_rejected() {
    let bad = MINIMAL.replace("kind = \"static_list\"", "kind = \"ftp_dump\"");
    assert!(AppConfig::from_toml_str(&bad).is_err());
}

#[test]
fn geocoder_delay_below_floor_is_refused() {
    let fast = MINIMAL.replace("min_delay_ms = 2000", "min_delay_ms = 0");
    let err = AppConfig::from_toml_str(&fast).unwrap_err();
    assert!(err.to_string().contains("min_delay_ms"), "{err}");

    let edge = MINIMAL.replace("min_delay_ms = 2000", "min_delay_ms = 1499");
    assert!(AppConfig::from_toml_str(&edge).is_err());
    let ok = MINIMAL.replace("min_delay_ms = 2000", "min_delay_ms = 1500");
    assert!(AppConfig::from_toml_str(&ok).is_ok());
}

#[test]
fn api_page_delay_below_floor_is_refused() {
    let shipped = include_str!("../config/sources.toml");
    assert!(shipped.contains("page_delay_ms = 1000"));
    assert!(AppConfig::from_toml_str(shipped).is_ok());

    let fast = shipped.replace("page_delay_ms = 1000", "page_delay_ms = 0");
    let err = AppConfig::from_toml_str(&fast).unwrap_err();
    assert!(err.to_string().contains("page_delay_ms"), "{err}");

    // the same floor applies to configs built in code
    let mut seed = AppConfig::default_seed();
    for s in &mut seed.sources {
        if let SourceKind::GraphqlListings(g) = &mut s.kind {
            g.page_delay_ms = 10;
        }
    }
    assert!(seed.validate().is_err());
}

#[test]
fn load_from_reads_json_by_extension() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("sources.json");
    let json = serde_json::to_string(&AppConfig::default_seed()).unwrap();
    fs::write(&p, json).unwrap();
    let cfg = AppConfig::load_from(&p).unwrap();
    assert_eq!(cfg.sources.len(), 4);
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_files_then_seed() {
    // isolated CWD so the repo's config/ is not picked up
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    env::remove_var(ENV_SOURCES_PATH);
    env::remove_var(ENV_GEOCODER_ENDPOINT);
    env::remove_var(ENV_WEBDRIVER_URL);

    // 1) nothing on disk → built-in seed
    let seed = AppConfig::load_default().unwrap();
    assert_eq!(seed.sources.len(), 4);

    // 2) ./config/sources.toml
    fs::create_dir_all(tmp.path().join("config")).unwrap();
    fs::write(tmp.path().join("config/sources.toml"), MINIMAL).unwrap();
    let from_file = AppConfig::load_default().unwrap();
    assert_eq!(from_file.run.city, "Hamburg");

    // 3) env path wins
    let p_env = tmp.path().join("other.json");
    fs::write(&p_env, serde_json::to_string(&AppConfig::default_seed()).unwrap()).unwrap();
    env::set_var(ENV_SOURCES_PATH, p_env.display().to_string());
    assert_eq!(AppConfig::load_default().unwrap().run.city, "Berlin");

    // 4) env path to nowhere is an error
    env::set_var(ENV_SOURCES_PATH, tmp.path().join("missing.toml").display().to_string());
    assert!(AppConfig::load_default().is_err());
    env::remove_var(ENV_SOURCES_PATH);

    env::set_current_dir(&old).unwrap();
}

#[serial_test::serial]
#[test]
fn endpoint_overrides_come_from_env() {
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    env::remove_var(ENV_SOURCES_PATH);
    env::set_var(ENV_GEOCODER_ENDPOINT, "http://localhost:8088/search");
    env::set_var(ENV_WEBDRIVER_URL, "http://localhost:4444");

    let cfg = AppConfig::load_default().unwrap();
    assert_eq!(cfg.geocoder.endpoint, "http://localhost:8088/search");
    let tip = cfg.source("tip").unwrap();
    match &tip.kind {
        SourceKind::RenderedList(r) => assert_eq!(r.webdriver_url, "http://localhost:4444"),
        other => panic!("unexpected kind {}", other.label()),
    }

    env::remove_var(ENV_GEOCODER_ENDPOINT);
    env::remove_var(ENV_WEBDRIVER_URL);
    env::set_current_dir(&old).unwrap();
}
