// src/acquire.rs
//! Forecast acquisition from the avalanche.org public API.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use std::time::{Duration, Instant};

use crate::error::PipelineError;
use crate::forecast::ForecastRecord;
use crate::registry::ZoneRef;

pub const DEFAULT_API_BASE: &str = "https://api.avalanche.org/v2/public";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[async_trait]
pub trait ForecastSource: Send + Sync {
    /// Fetch today's forecast for one zone.
    async fn acquire(&self, zone: ZoneRef<'_>) -> Result<ForecastRecord, PipelineError>;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone)]
pub struct AvalancheApiClient {
    base: String,
    client: Client,
}

impl AvalancheApiClient {
    pub fn new(base: impl Into<String>, timeout: Duration) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("avalanche-feeds/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base: base.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn with_defaults() -> Result<Self, PipelineError> {
        Self::new(DEFAULT_API_BASE, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value, PipelineError> {
        let body: Value = self
            .client
            .get(url)
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body)
    }

    /// Map-layer document listing every center and zone (GeoJSON features).
    pub async fn fetch_map_layer(&self) -> Result<Value, PipelineError> {
        let url = format!("{}/products/map-layer", self.base);
        self.get_json(&url, &[]).await
    }
}

#[async_trait]
impl ForecastSource for AvalancheApiClient {
    async fn acquire(&self, zone: ZoneRef<'_>) -> Result<ForecastRecord, PipelineError> {
        let retrieved_at = Utc::now();
        let t0 = Instant::now();
        let url = format!("{}/product", self.base);

        let result = self
            .get_json(
                &url,
                &[
                    ("type", "forecast"),
                    ("center_id", zone.center.id.as_str()),
                    ("zone_id", zone.zone.id.as_str()),
                ],
            )
            .await;
        let elapsed_ms = u64::try_from(t0.elapsed().as_millis()).unwrap_or(u64::MAX);
        metrics::histogram!("acquire_duration_ms").record(elapsed_ms as f64);

        let payload = result.inspect_err(|e| {
            tracing::warn!(zone = %zone.key(), error = %e, "forecast request failed");
        })?;
        if payload.is_null() {
            return Err(PipelineError::Acquisition(format!(
                "empty forecast for {}",
                zone.key()
            )));
        }

        tracing::debug!(zone = %zone.key(), elapsed_ms, "forecast fetched");
        Ok(ForecastRecord::new(retrieved_at, elapsed_ms, payload))
    }

    fn name(&self) -> &'static str {
        "avalanche.org"
    }
}
