// src/config/generate.rs
//! Builds a registry from the API's map-layer document.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::registry::{Center, Registry, Zone};

/// Centers that publish daily forecasts.
pub const SUPPORTED_CENTERS: &[&str] = &[
    "Northwest Avalanche Center",
    "Central Oregon Avalanche Center",
    "Sawtooth Avalanche Center",
    "Bridger-Teton Avalanche Center",
    "Mount Washington Avalanche Center",
    "Sierra Avalanche Center",
    "Flathead Avalanche Center",
    "Idaho Panhandle Avalanche Center",
    "Payette Avalanche Center",
    "Colorado Avalanche Information Center",
    "Utah Avalanche Center",
    "Gallatin National Forest Avalanche Center",
    "Valdez Avalanche Center",
    "Hatcher Pass Avalanche Center",
    "Chugach National Forest Avalanche Center",
];

/// Lowercase, drop punctuation and non-ASCII letters, join words with '-'.
pub fn slugify(text: &str) -> String {
    static RE_STRIP: OnceCell<Regex> = OnceCell::new();
    static RE_SEP: OnceCell<Regex> = OnceCell::new();
    let re_strip = RE_STRIP.get_or_init(|| Regex::new(r"[^a-z0-9_\s-]").expect("slug strip regex"));
    let re_sep = RE_SEP.get_or_init(|| Regex::new(r"[-\s]+").expect("slug sep regex"));

    let lower = text.to_lowercase();
    let stripped = re_strip.replace_all(&lower, "");
    let joined = re_sep.replace_all(&stripped, "-");
    joined.trim_matches(|c| c == '-' || c == '_').to_string()
}

fn scalar(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Group map-layer features by center, keep `supported` centers only, and
/// sort centers and zones by name. Features missing an id or a name are
/// skipped.
pub fn registry_from_map_layer(doc: &Value, supported: &[&str]) -> Registry {
    let features = doc
        .get("features")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    // center name -> center
    let mut centers: BTreeMap<String, Center> = BTreeMap::new();
    for f in features {
        let props = f.get("properties");
        let (Some(zone_id), Some(center_id), Some(center_name), Some(zone_name)) = (
            scalar(f.get("id")),
            scalar(props.and_then(|p| p.get("center_id"))),
            scalar(props.and_then(|p| p.get("center"))),
            scalar(props.and_then(|p| p.get("name"))),
        ) else {
            tracing::debug!(feature = %f, "skipping incomplete map-layer feature");
            continue;
        };
        if !supported.iter().any(|s| *s == center_name) {
            continue;
        }

        let center = centers.entry(center_name.clone()).or_insert_with(|| Center {
            slug: slugify(&center_name),
            name: center_name.clone(),
            id: center_id,
            forecast_url: None,
            zones: Vec::new(),
        });
        center.zones.push(Zone {
            slug: slugify(&zone_name),
            name: zone_name,
            id: zone_id,
            external_id: None,
        });
    }

    let mut out: Vec<Center> = centers.into_values().collect();
    for c in &mut out {
        c.zones.sort_by(|a, b| a.name.cmp(&b.name));
    }

    let found: Vec<&str> = out.iter().map(|c| c.name.as_str()).collect();
    for missing in supported.iter().filter(|s| !found.contains(*s)) {
        tracing::warn!(center = %missing, "supported center not present in map layer");
    }

    Registry::new(out)
}
