// src/ingest/html.rs
//! Structural matching helpers over `scraper`. Everything here is synchronous:
//! `scraper::Html` is not `Send`, so documents are parsed and dropped without
//! crossing an `.await`.

use anyhow::{anyhow, Result};
use scraper::{ElementRef, Selector};
use url::Url;

use crate::ingest::normalize_text;

/// Compile a CSS selector; invalid selectors are configuration errors.
pub fn compile(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector `{css}`: {e}"))
}

pub fn compile_opt(css: Option<&str>) -> Result<Option<Selector>> {
    css.map(compile).transpose()
}

pub fn compile_all(list: &[String]) -> Result<Vec<Selector>> {
    list.iter().map(|s| compile(s)).collect()
}

/// Normalized text content of an element.
pub fn text_of(el: ElementRef<'_>) -> String {
    normalize_text(&el.text().collect::<Vec<_>>().join(" "))
}

/// Text of the first match under `scope`, if any and non-empty.
pub fn first_text(scope: ElementRef<'_>, sel: &Selector) -> Option<String> {
    scope
        .select(sel)
        .next()
        .map(text_of)
        .filter(|t| !t.is_empty())
}

/// First non-empty text among ordered candidate selectors.
pub fn first_text_any(scope: ElementRef<'_>, sels: &[Selector]) -> Option<String> {
    sels.iter().find_map(|s| first_text(scope, s))
}

/// Text of the last match under `scope`.
pub fn last_text(scope: ElementRef<'_>, sel: &Selector) -> Option<String> {
    scope
        .select(sel)
        .last()
        .map(text_of)
        .filter(|t| !t.is_empty())
}

pub fn first_attr(scope: ElementRef<'_>, sel: &Selector, attr: &str) -> Option<String> {
    scope
        .select(sel)
        .find_map(|el| el.value().attr(attr))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Resolve `href` against `base`; absolute links pass through unchanged.
pub fn absolutize(base: Option<&Url>, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    match Url::parse(href) {
        Ok(u) => Some(u.to_string()),
        Err(_) => base.and_then(|b| b.join(href).ok()).map(|u| u.to_string()),
    }
}
