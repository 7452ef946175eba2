use crate::domain::model::{Coord, Portfolio};
use crate::domain::ports::GeocodeProvider;
use crate::utils::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const DEFAULT_USER_AGENT: &str = "geoscreen/0.1";
const ARCGIS_URL: &str = "https://geocode.arcgis.com/arcgis/rest/services/World/GeocodeServer";
const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";

/// ArcGIS world geocoder (lenient matching, generous rate).
pub struct ArcGis {
    client: Client,
    base_url: String,
}

impl ArcGis {
    pub fn new() -> Self {
        Self::with_base_url(ARCGIS_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl Default for ArcGis {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GeocodeProvider for ArcGis {
    fn name(&self) -> &str {
        "arcgis"
    }

    async fn geocode(&self, query: &str) -> Result<Option<Coord>> {
        let url = format!("{}/findAddressCandidates", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("f", "json"), ("singleLine", query), ("maxLocations", "1")])
            .timeout(Duration::from_secs(10))
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::debug!("arcgis returned status {}", response.status());
            return Ok(None);
        }

        let body: Value = response.json().await?;
        let location = body
            .get("candidates")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|c| c.get("location"));

        Ok(location.and_then(|loc| {
            match (loc.get("x").and_then(|v| v.as_f64()), loc.get("y").and_then(|v| v.as_f64())) {
                (Some(lon), Some(lat)) => Some(Coord::new(lon, lat)),
                _ => None,
            }
        }))
    }
}

/// Nominatim (OpenStreetMap). Community usage rules require a descriptive
/// User-Agent and throttled requests; the service handles the throttling.
pub struct Nominatim {
    client: Client,
    base_url: String,
    user_agent: String,
}

impl Nominatim {
    pub fn new(user_agent: &str) -> Self {
        Self::with_base_url(NOMINATIM_URL, user_agent)
    }

    pub fn with_base_url(base_url: &str, user_agent: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agent: user_agent.to_string(),
        }
    }
}

#[async_trait]
impl GeocodeProvider for Nominatim {
    fn name(&self) -> &str {
        "nominatim"
    }

    async fn geocode(&self, query: &str) -> Result<Option<Coord>> {
        let url = format!("{}/search", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("format", "json"), ("limit", "1"), ("q", query)])
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .timeout(Duration::from_secs(10))
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::debug!("nominatim returned status {}", response.status());
            return Ok(None);
        }

        // Nominatim returns coordinates as strings.
        let body: Value = response.json().await?;
        let first = body.as_array().and_then(|a| a.first());
        Ok(first.and_then(|item| {
            let lon = item.get("lon").and_then(as_loose_f64)?;
            let lat = item.get("lat").and_then(as_loose_f64)?;
            Some(Coord::new(lon, lat))
        }))
    }
}

fn as_loose_f64(v: &Value) -> Option<f64> {
    v.as_f64().or_else(|| v.as_str().and_then(|s| s.parse().ok()))
}

/// Geocoding with ordered provider fallback. Provider failures are logged and
/// swallowed; a row that no provider can resolve simply stays unlocated.
pub struct GeocoderService {
    providers: Vec<Box<dyn GeocodeProvider>>,
    min_delay: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl GeocoderService {
    pub fn new(user_agent: Option<&str>, min_delay_seconds: f64) -> Self {
        let ua = user_agent.unwrap_or(DEFAULT_USER_AGENT);
        Self::with_providers(
            vec![Box::new(ArcGis::new()), Box::new(Nominatim::new(ua))],
            min_delay_seconds,
        )
    }

    pub fn with_providers(
        providers: Vec<Box<dyn GeocodeProvider>>,
        min_delay_seconds: f64,
    ) -> Self {
        Self {
            providers,
            min_delay: Duration::from_secs_f64(min_delay_seconds.max(0.0)),
            last_call: Mutex::new(None),
        }
    }

    /// Provider terms of service require spacing out requests.
    async fn throttle(&self) {
        if self.min_delay.is_zero() {
            return;
        }
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_delay {
                tokio::time::sleep(self.min_delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    pub async fn geocode_one(&self, query: &str) -> Option<Coord> {
        for provider in &self.providers {
            self.throttle().await;
            match provider.geocode(query).await {
                Ok(Some(coord)) if coord.is_valid() => {
                    tracing::debug!("{} resolved '{}'", provider.name(), query);
                    return Some(coord);
                }
                Ok(_) => {
                    tracing::debug!("{} had no match for '{}'", provider.name(), query);
                }
                Err(e) => {
                    tracing::warn!("{} failed for '{}': {}", provider.name(), query, e);
                }
            }
        }
        None
    }

    /// Fill missing locations by concatenating the address columns into a
    /// single query. Resolved rows get `lon`/`lat` attributes written back.
    pub async fn geocode_portfolio(
        &self,
        mut portfolio: Portfolio,
        address_cols: &[String],
    ) -> Result<Portfolio> {
        portfolio.push_column("lon");
        portfolio.push_column("lat");

        let mut resolved = 0usize;
        let mut unresolved = 0usize;

        for record in &mut portfolio.records {
            if record.location.is_some() {
                continue;
            }

            let query = address_cols
                .iter()
                .filter_map(|col| record.get(col).and_then(value_as_text))
                .collect::<Vec<_>>()
                .join(", ");

            if query.is_empty() {
                unresolved += 1;
                continue;
            }

            match self.geocode_one(&query).await {
                Some(coord) => {
                    record.set("lon", json_number(coord.lon));
                    record.set("lat", json_number(coord.lat));
                    record.location = Some(coord);
                    resolved += 1;
                }
                None => {
                    record.set_null("lon");
                    record.set_null("lat");
                    unresolved += 1;
                }
            }
        }

        tracing::info!("🌍 Geocoding done: {} resolved, {} unresolved", resolved, unresolved);
        Ok(portfolio)
    }
}

fn value_as_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn json_number(v: f64) -> Value {
    serde_json::Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}
