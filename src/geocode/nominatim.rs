// src/geocode/nominatim.rs
//! OpenStreetMap Nominatim search client (`/search?format=json&limit=1`).

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::{Coordinates, Geocoder};
use crate::config::GeocoderConfig;

pub struct Nominatim {
    http: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

impl Nominatim {
    pub fn new(cfg: &GeocoderConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("building geocoder client")?;
        Ok(Self {
            http,
            endpoint: cfg.endpoint.clone(),
        })
    }
}

fn parse_places(places: &[Place]) -> Option<Coordinates> {
    let p = places.first()?;
    let lat = p.lat.trim().parse::<f64>().ok()?;
    let lon = p.lon.trim().parse::<f64>().ok()?;
    Coordinates::new(lat, lon)
}

#[async_trait]
impl Geocoder for Nominatim {
    async fn lookup(&self, query: &str) -> Result<Option<Coordinates>> {
        let resp = self
            .http
            .get(&self.endpoint)
            .query(&[("q", query), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .context("nominatim request")?;
        let status = resp.status();
        if !status.is_success() {
            bail!("nominatim returned HTTP {status}");
        }
        let places: Vec<Place> = resp.json().await.context("nominatim payload")?;
        Ok(parse_places(&places))
    }

    fn name(&self) -> &'static str {
        "nominatim"
    }
}
