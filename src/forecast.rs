//! A single archived forecast and the rule that decides which day it is filed under.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One successful fetch of one zone's forecast.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRecord {
    pub retrieved_at: DateTime<Utc>,
    pub retrieval_duration_ms: u64,
    /// `published_time` reported by the upstream document, if it parses.
    pub published_at: Option<DateTime<Utc>>,
    /// The forecast document exactly as received.
    pub payload: Value,
}

/// On-disk shape. Key names match archives written by earlier deployments.
#[derive(Debug, Serialize, Deserialize)]
struct StoredForecast {
    #[serde(deserialize_with = "lenient_timestamp")]
    request_time: DateTime<Utc>,
    #[serde(default)]
    request_duration_ms: u64,
    #[serde(default)]
    forecast: Value,
}

impl ForecastRecord {
    pub fn new(retrieved_at: DateTime<Utc>, retrieval_duration_ms: u64, payload: Value) -> Self {
        let published_at = payload
            .get("published_time")
            .and_then(Value::as_str)
            .and_then(parse_timestamp);
        Self {
            retrieved_at,
            retrieval_duration_ms,
            published_at,
            payload,
        }
    }

    /// Instant used for chronological placement.
    pub fn effective_at(&self) -> DateTime<Utc> {
        self.published_at.unwrap_or(self.retrieved_at)
    }

    pub fn effective_date(&self) -> NaiveDate {
        self.effective_at().date_naive()
    }

    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(&StoredForecast {
            request_time: self.retrieved_at,
            request_duration_ms: self.retrieval_duration_ms,
            forecast: self.payload.clone(),
        })
    }

    pub fn from_json_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        let stored: StoredForecast = serde_json::from_slice(bytes)?;
        Ok(Self::new(
            stored.request_time,
            stored.request_duration_ms,
            stored.forecast,
        ))
    }
}

fn lenient_timestamp<'de, D>(d: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(d)?;
    parse_timestamp(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp '{raw}'")))
}

/// Accepts RFC 3339 and offset-less ISO timestamps (taken as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}
