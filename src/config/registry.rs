// src/config/registry.rs
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::registry::Registry;
use crate::store::local::write_atomic;

pub const ENV_REGISTRY_PATH: &str = "AVY_REGISTRY_PATH";
pub const DEFAULT_REGISTRY_TOML: &str = "config/avalanche_centers.toml";
pub const DEFAULT_REGISTRY_JSON: &str = "config/avalanche_centers.json";

/// Load the registry from an explicit path. Supports TOML or JSON formats.
pub fn load_registry_from(path: &Path) -> Result<Registry> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading registry from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let registry = parse_registry(&content, ext.as_str())
        .with_context(|| format!("parsing registry {}", path.display()))?;
    registry.validate().map_err(|e| anyhow!(e))?;
    tracing::debug!(
        path = %path.display(),
        centers = registry.centers.len(),
        zones = registry.zone_count(),
        "registry loaded"
    );
    Ok(registry)
}

/// Resolve the registry location:
/// 1) $AVY_REGISTRY_PATH
/// 2) config/avalanche_centers.toml
/// 3) config/avalanche_centers.json
pub fn load_registry_default() -> Result<Registry> {
    if let Ok(p) = std::env::var(ENV_REGISTRY_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_registry_from(&pb);
        }
        return Err(anyhow!("{ENV_REGISTRY_PATH} points to non-existent path"));
    }
    let toml_p = PathBuf::from(DEFAULT_REGISTRY_TOML);
    if toml_p.exists() {
        return load_registry_from(&toml_p);
    }
    let json_p = PathBuf::from(DEFAULT_REGISTRY_JSON);
    if json_p.exists() {
        return load_registry_from(&json_p);
    }
    Err(anyhow!(
        "no registry found (set {ENV_REGISTRY_PATH} or create {DEFAULT_REGISTRY_TOML})"
    ))
}

/// `explicit` wins over the default resolution order.
pub fn load_registry(explicit: Option<&Path>) -> Result<Registry> {
    match explicit {
        Some(p) => load_registry_from(p),
        None => load_registry_default(),
    }
}

fn parse_registry(s: &str, hint_ext: &str) -> Result<Registry> {
    match hint_ext {
        "toml" => Ok(toml::from_str(s)?),
        "json" => Ok(serde_json::from_str(s)?),
        _ => {
            // No usable extension: JSON documents start with '{'.
            if s.trim_start().starts_with('{') {
                Ok(serde_json::from_str(s)?)
            } else {
                Ok(toml::from_str(s)?)
            }
        }
    }
}

pub fn registry_to_toml(registry: &Registry) -> Result<String> {
    toml::to_string_pretty(registry).context("serializing registry as TOML")
}

/// Validate, then write `registry` as TOML. Nothing is written for a registry
/// that [`load_registry_from`] would reject.
pub async fn write_registry(path: &Path, registry: &Registry) -> Result<()> {
    registry
        .validate()
        .map_err(|e| anyhow!(e))
        .context("refusing to write invalid registry")?;
    let toml = registry_to_toml(registry)?;
    write_atomic(path, toml.as_bytes())
        .await
        .with_context(|| format!("writing registry to {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        centers = registry.centers.len(),
        zones = registry.zone_count(),
        "wrote registry"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOML_DOC: &str = r#"
[[centers]]
slug = "demo-center"
name = "Demo Center"
id = "DEMO"

[[centers.zones]]
slug = "demo-zone"
name = "Demo Zone"
id = 101
"#;

    #[test]
    fn toml_ids_may_be_numbers() {
        let reg = parse_registry(TOML_DOC, "toml").unwrap();
        assert_eq!(reg.centers[0].zones[0].id, "101");
        assert_eq!(reg.centers[0].forecast_url, None);
    }

    #[test]
    fn sniffs_format_without_extension() {
        let json = r#"{"centers":[{"slug":"c","name":"C","id":"C1","zones":[]}]}"#;
        assert_eq!(parse_registry(json, "").unwrap().centers[0].id, "C1");
        assert_eq!(parse_registry(TOML_DOC, "").unwrap().centers.len(), 1);
    }

    #[test]
    fn toml_round_trip_keeps_order() {
        let reg = parse_registry(TOML_DOC, "toml").unwrap();
        let out = registry_to_toml(&reg).unwrap();
        let back = parse_registry(&out, "toml").unwrap();
        assert_eq!(back, reg);
    }
}
