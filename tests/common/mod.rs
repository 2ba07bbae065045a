// tests/common/mod.rs
// Shared fakes for the transport, geocoder and browser seams.
#![allow(dead_code)]

use async_trait::async_trait;
use city_event_map::config::Locator;
use city_event_map::geocode::{Coordinates, Geocoder};
use city_event_map::ingest::http::{FetchError, Transport};
use city_event_map::ingest::webdriver::{BrowserDriver, BrowserSession, ElementHandle, WebDriverError};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

pub fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{name}")).expect("fixture")
}

pub fn coords(lat: f64, lon: f64) -> Coordinates {
    Coordinates::new(lat, lon).expect("valid coordinates")
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

enum Canned {
    Body(String),
    Status(u16),
}

/// GET answers by URL; POST answers in order (anything past the script is a 500).
#[derive(Default)]
pub struct FakeTransport {
    pages: Mutex<HashMap<String, Canned>>,
    posts: Mutex<VecDeque<Value>>,
    pub gets: Mutex<Vec<String>>,
    pub post_bodies: Mutex<Vec<Value>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: &str, body: &str) -> Self {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), Canned::Body(body.to_string()));
        self
    }

    pub fn status(self, url: &str, status: u16) -> Self {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), Canned::Status(status));
        self
    }

    pub fn post_script(self, responses: Vec<Value>) -> Self {
        self.posts.lock().unwrap().extend(responses);
        self
    }

    pub fn get_count(&self) -> usize {
        self.gets.lock().unwrap().len()
    }

    pub fn post_count(&self) -> usize {
        self.post_bodies.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        self.gets.lock().unwrap().push(url.to_string());
        match self.pages.lock().unwrap().get(url) {
            Some(Canned::Body(b)) => Ok(b.clone()),
            Some(Canned::Status(s)) => Err(FetchError::Status {
                status: *s,
                url: url.to_string(),
            }),
            None => Err(FetchError::Status {
                status: 404,
                url: url.to_string(),
            }),
        }
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, FetchError> {
        self.post_bodies.lock().unwrap().push(body.clone());
        self.posts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| FetchError::Status {
                status: 500,
                url: url.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Geocoder
// ---------------------------------------------------------------------------

/// Answers from a table; records every query it receives.
#[derive(Clone, Default)]
pub struct CountingGeocoder {
    answers: HashMap<String, Coordinates>,
    failing: Vec<String>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl CountingGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, query: &str, c: Coordinates) -> Self {
        self.answers.insert(query.to_string(), c);
        self
    }

    /// Queries that make the service error out.
    pub fn failing(mut self, query: &str) -> Self {
        self.failing.push(query.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Geocoder for CountingGeocoder {
    async fn lookup(&self, query: &str) -> anyhow::Result<Option<Coordinates>> {
        self.calls.lock().unwrap().push(query.to_string());
        if self.failing.iter().any(|f| f == query) {
            anyhow::bail!("service unavailable");
        }
        Ok(self.answers.get(query).copied())
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

// ---------------------------------------------------------------------------
// Browser
// ---------------------------------------------------------------------------

/// Scripted browser: which locators are "displayed", which clicks fail,
/// the HTML served per URL. Every command is logged.
#[derive(Clone, Default)]
pub struct FakeBrowser {
    pub displayed: Vec<Locator>,
    pub failing_clicks: Vec<Locator>,
    /// URL the browser lands on after clicking a locator.
    pub click_targets: Vec<(Locator, String)>,
    pub html: HashMap<String, String>,
    pub source_fails: bool,
    pub log: Arc<Mutex<Vec<String>>>,
}

impl FakeBrowser {
    pub fn commands(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn sessions_closed(&self) -> usize {
        self.commands().iter().filter(|c| *c == "close").count()
    }
}

struct FakeSession {
    browser: FakeBrowser,
    url: Mutex<String>,
}

impl FakeSession {
    fn record(&self, cmd: String) {
        self.browser.log.lock().unwrap().push(cmd);
    }
}

fn describe(loc: &Locator) -> String {
    match loc {
        Locator::Css(s) => format!("css:{s}"),
        Locator::Xpath(s) => format!("xpath:{s}"),
    }
}

#[async_trait]
impl BrowserDriver for FakeBrowser {
    async fn new_session(&self) -> Result<Box<dyn BrowserSession>, WebDriverError> {
        self.log.lock().unwrap().push("new_session".into());
        Ok(Box::new(FakeSession {
            browser: self.clone(),
            url: Mutex::new("about:blank".into()),
        }))
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn goto(&self, url: &str) -> Result<(), WebDriverError> {
        self.record(format!("goto {url}"));
        *self.url.lock().unwrap() = url.to_string();
        Ok(())
    }

    async fn wait_settled(&self, _settle: std::time::Duration) -> Result<(), WebDriverError> {
        Ok(())
    }

    async fn find_displayed(&self, loc: &Locator) -> Result<Option<ElementHandle>, WebDriverError> {
        Ok(self
            .browser
            .displayed
            .iter()
            .any(|d| d == loc)
            .then(|| ElementHandle(describe(loc))))
    }

    async fn click(&self, el: &ElementHandle) -> Result<(), WebDriverError> {
        self.record(format!("click {}", el.0));
        if self.browser.failing_clicks.iter().any(|l| describe(l) == el.0) {
            return Err(WebDriverError::Command {
                command: "click".into(),
                error: "element click intercepted".into(),
                message: "overlay".into(),
            });
        }
        if let Some((_, target)) = self
            .browser
            .click_targets
            .iter()
            .find(|(l, _)| describe(l) == el.0)
        {
            *self.url.lock().unwrap() = target.clone();
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<String, WebDriverError> {
        Ok(self.url.lock().unwrap().clone())
    }

    async fn page_source(&self) -> Result<String, WebDriverError> {
        if self.browser.source_fails {
            return Err(WebDriverError::Protocol("renderer crashed".into()));
        }
        let url = self.url.lock().unwrap().clone();
        Ok(self.browser.html.get(&url).cloned().unwrap_or_default())
    }

    async fn close(self: Box<Self>) -> Result<(), WebDriverError> {
        self.record("close".into());
        Ok(())
    }
}
