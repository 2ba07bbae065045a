// src/ingest/webdriver.rs
//! Minimal W3C WebDriver client (chromedriver / geckodriver) for pages that only
//! render with JavaScript. Only the handful of commands the rendered-list adapter
//! needs: new session, navigate, find, displayed, click, url, source, script, delete.
//!
//! `BrowserDriver`/`BrowserSession` are the seam tests fake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::Locator;

/// Key under which W3C drivers return element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

#[derive(Debug, Error)]
pub enum WebDriverError {
    #[error("no such element")]
    NoSuchElement,

    #[error("webdriver `{command}` failed: {error}: {message}")]
    Command {
        command: String,
        error: String,
        message: String,
    },

    #[error("webdriver transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webdriver protocol error: {0}")]
    Protocol(String),
}

/// Opaque element reference handed out by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle(pub String);

#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn new_session(&self) -> Result<Box<dyn BrowserSession>, WebDriverError>;
}

#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn goto(&self, url: &str) -> Result<(), WebDriverError>;

    /// Wait for `document.readyState == "complete"`, then `settle` more.
    async fn wait_settled(&self, settle: Duration) -> Result<(), WebDriverError>;

    /// First match of `loc` that is currently displayed.
    async fn find_displayed(&self, loc: &Locator) -> Result<Option<ElementHandle>, WebDriverError>;

    async fn click(&self, el: &ElementHandle) -> Result<(), WebDriverError>;

    async fn current_url(&self) -> Result<String, WebDriverError>;

    async fn page_source(&self) -> Result<String, WebDriverError>;

    /// End the session and release the browser.
    async fn close(self: Box<Self>) -> Result<(), WebDriverError>;
}

/// HTTP client for a running WebDriver server.
pub struct WebDriver {
    http: reqwest::Client,
    base: String,
    user_agent: String,
}

impl WebDriver {
    pub fn new(base_url: &str, user_agent: &str) -> Result<Self, WebDriverError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            base: base_url.trim_end_matches('/').to_string(),
            user_agent: user_agent.to_string(),
        })
    }
}

#[derive(Deserialize)]
struct Envelope {
    value: Value,
}

/// Decode the `{"value": ...}` envelope; map W3C error payloads to `WebDriverError`.
async fn unwrap_value(command: &str, resp: reqwest::Response) -> Result<Value, WebDriverError> {
    let status = resp.status();
    let body: Envelope = resp
        .json()
        .await
        .map_err(|e| WebDriverError::Protocol(format!("{command}: {e}")))?;
    if status.is_success() {
        return Ok(body.value);
    }
    let error = body
        .value
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();
    if error == "no such element" {
        return Err(WebDriverError::NoSuchElement);
    }
    let message = body
        .value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Err(WebDriverError::Command {
        command: command.to_string(),
        error,
        message,
    })
}

#[async_trait]
impl BrowserDriver for WebDriver {
    async fn new_session(&self) -> Result<Box<dyn BrowserSession>, WebDriverError> {
        let caps = json!({
            "capabilities": {
                "alwaysMatch": {
                    "goog:chromeOptions": {
                        "args": [
                            "--headless=new",
                            "--disable-gpu",
                            "--window-size=1366,900",
                            format!("--user-agent={}", self.user_agent),
                        ]
                    },
                    "moz:firefoxOptions": { "args": ["-headless"] }
                }
            }
        });
        let resp = self
            .http
            .post(format!("{}/session", self.base))
            .json(&caps)
            .send()
            .await?;
        let value = unwrap_value("new session", resp).await?;
        let id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| WebDriverError::Protocol("new session: missing sessionId".into()))?;
        debug!(target: "ingest", session = id, "webdriver session started");
        Ok(Box::new(WebDriverSession {
            http: self.http.clone(),
            url: format!("{}/session/{}", self.base, id),
        }))
    }
}

struct WebDriverSession {
    http: reqwest::Client,
    url: String, // {base}/session/{id}
}

impl WebDriverSession {
    async fn get(&self, command: &str, path: &str) -> Result<Value, WebDriverError> {
        let resp = self.http.get(format!("{}{}", self.url, path)).send().await?;
        unwrap_value(command, resp).await
    }

    async fn post(&self, command: &str, path: &str, body: Value) -> Result<Value, WebDriverError> {
        let resp = self
            .http
            .post(format!("{}{}", self.url, path))
            .json(&body)
            .send()
            .await?;
        unwrap_value(command, resp).await
    }

    async fn ready_state(&self) -> Result<String, WebDriverError> {
        let v = self
            .post(
                "execute",
                "/execute/sync",
                json!({ "script": "return document.readyState", "args": [] }),
            )
            .await?;
        Ok(v.as_str().unwrap_or_default().to_string())
    }
}

#[derive(Serialize)]
struct FindReq<'a> {
    using: &'a str,
    value: &'a str,
}

fn strategy(loc: &Locator) -> FindReq<'_> {
    match loc {
        Locator::Css(s) => FindReq {
            using: "css selector",
            value: s,
        },
        Locator::Xpath(s) => FindReq {
            using: "xpath",
            value: s,
        },
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn goto(&self, url: &str) -> Result<(), WebDriverError> {
        self.post("navigate", "/url", json!({ "url": url })).await?;
        Ok(())
    }

    async fn wait_settled(&self, settle: Duration) -> Result<(), WebDriverError> {
        for _ in 0..40 {
            if self.ready_state().await? == "complete" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
        tokio::time::sleep(settle).await;
        Ok(())
    }

    async fn find_displayed(&self, loc: &Locator) -> Result<Option<ElementHandle>, WebDriverError> {
        let body = serde_json::to_value(strategy(loc))
            .map_err(|e| WebDriverError::Protocol(e.to_string()))?;
        let found = match self.post("find elements", "/elements", body).await {
            Ok(v) => v,
            Err(WebDriverError::NoSuchElement) => return Ok(None),
            Err(e) => return Err(e),
        };
        let ids: Vec<String> = found
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|el| el.get(ELEMENT_KEY).and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        for id in ids {
            let shown = self
                .get("is displayed", &format!("/element/{id}/displayed"))
                .await?;
            if shown.as_bool().unwrap_or(false) {
                return Ok(Some(ElementHandle(id)));
            }
        }
        Ok(None)
    }

    async fn click(&self, el: &ElementHandle) -> Result<(), WebDriverError> {
        self.post("click", &format!("/element/{}/click", el.0), json!({}))
            .await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, WebDriverError> {
        let v = self.get("get url", "/url").await?;
        v.as_str()
            .map(str::to_string)
            .ok_or_else(|| WebDriverError::Protocol("get url: not a string".into()))
    }

    async fn page_source(&self) -> Result<String, WebDriverError> {
        let v = self.get("get source", "/source").await?;
        v.as_str()
            .map(str::to_string)
            .ok_or_else(|| WebDriverError::Protocol("get source: not a string".into()))
    }

    async fn close(self: Box<Self>) -> Result<(), WebDriverError> {
        let resp = self.http.delete(&self.url).send().await?;
        unwrap_value("delete session", resp).await?;
        Ok(())
    }
}
