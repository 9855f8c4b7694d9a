// src/feed/extract.rs
//! Defensive reads over the forecast payload. The payload is whatever the API
//! returned; every field here is optional and a missing or oddly-typed field
//! simply comes back as `None` / empty.

use serde_json::Value;

/// avalanche.org danger scale. Anything outside 1..=5 is "no rating".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DangerLevel(pub Option<u8>);

impl DangerLevel {
    fn from_value(v: Option<&Value>) -> Self {
        let n = v.and_then(|v| match v {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        });
        Self(n.filter(|n| (1..=5).contains(n)).map(|n| n as u8))
    }

    pub fn label(self) -> &'static str {
        match self.0 {
            Some(1) => "Low",
            Some(2) => "Moderate",
            Some(3) => "Considerable",
            Some(4) => "High",
            Some(5) => "Extreme",
            _ => "No Rating",
        }
    }

    pub fn color(self) -> &'static str {
        match self.0 {
            Some(1) => "#4CAF50",
            Some(2) => "#FFEB3B",
            Some(3) => "#FF9800",
            Some(4) => "#F44336",
            Some(5) => "#000000",
            _ => "#999999",
        }
    }
}

/// Ratings for one day, by elevation band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DangerRating {
    pub upper: DangerLevel,
    pub middle: DangerLevel,
    pub lower: DangerLevel,
}

impl DangerRating {
    fn from_value(v: &Value) -> Self {
        Self {
            upper: DangerLevel::from_value(v.get("upper")),
            middle: DangerLevel::from_value(v.get("middle")),
            lower: DangerLevel::from_value(v.get("lower")),
        }
    }

    /// Highest rated band, if any band is rated.
    pub fn overall(&self) -> Option<DangerLevel> {
        [self.upper, self.middle, self.lower]
            .into_iter()
            .filter(|l| l.0.is_some())
            .max()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub name: Option<String>,
    pub likelihood: Option<String>,
    pub size: Vec<String>,
}

impl Problem {
    /// "D1", "D1-D2", or `None` when no size is given.
    pub fn size_range(&self) -> Option<String> {
        match self.size.as_slice() {
            [] => None,
            [only] => Some(format!("D{only}")),
            [first, .., last] => Some(format!("D{first}-D{last}")),
        }
    }
}

/// Everything the feed shows from one forecast payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForecastDigest {
    pub author: Option<String>,
    pub bottom_line: Option<String>,
    pub today: Option<DangerRating>,
    pub tomorrow: Option<DangerRating>,
    pub problems: Vec<Problem>,
}

pub fn digest(payload: &Value) -> ForecastDigest {
    let mut today = None;
    let mut tomorrow = None;
    for entry in array(payload, "danger") {
        match entry.get("valid_day").and_then(Value::as_str) {
            Some("current") if today.is_none() => today = Some(DangerRating::from_value(entry)),
            Some("tomorrow") if tomorrow.is_none() => {
                tomorrow = Some(DangerRating::from_value(entry))
            }
            _ => {}
        }
    }

    let problems = array(payload, "forecast_avalanche_problems")
        .map(|p| Problem {
            name: text(p, "name"),
            likelihood: text(p, "likelihood"),
            size: p
                .get("size")
                .and_then(Value::as_array)
                .map(|xs| xs.iter().filter_map(scalar_text).collect())
                .unwrap_or_default(),
        })
        .collect();

    ForecastDigest {
        author: text(payload, "author"),
        bottom_line: text(payload, "bottom_line"),
        today,
        tomorrow,
        problems,
    }
}

/// Non-empty trimmed string field.
fn text(v: &Value, key: &str) -> Option<String> {
    v.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn array<'a>(v: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    v.get(key)
        .and_then(Value::as_array)
        .map(|xs| xs.iter())
        .into_iter()
        .flatten()
}

fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
