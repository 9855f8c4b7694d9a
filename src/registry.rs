//! Zone registry: avalanche centers, their zones, and the identifiers the
//! forecast API and the centers' own websites know them by.
//!
//! The registry is built once at startup (see [`crate::config`]) and handed to
//! the pipeline, builder and listing page as an immutable value.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Used when a center does not declare its own `forecast_url` pattern.
pub const DEFAULT_FORECAST_URL: &str = "https://avalanche.org/forecasts/#/{center_id}/{zone_id}";

static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").expect("valid slug regex"));

/// Slugs become path segments and URL segments, so only ASCII letters,
/// digits, '-' and '_' are allowed, starting with a letter or digit.
pub fn is_url_safe_slug(slug: &str) -> bool {
    SLUG_RE.is_match(slug)
}

/// `(center slug, zone slug)`, the join key between registry, store and feeds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZoneKey {
    pub center: String,
    pub zone: String,
}

impl ZoneKey {
    pub fn new(center: impl Into<String>, zone: impl Into<String>) -> Self {
        Self {
            center: center.into(),
            zone: zone.into(),
        }
    }
}

impl fmt::Display for ZoneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.center, self.zone)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub slug: String,
    pub name: String,
    /// Zone id used by the forecast API.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Id used by the center's website, when it differs from the API id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Center {
    pub slug: String,
    pub name: String,
    /// Center id used by the forecast API (e.g. "NWAC").
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// URL pattern for a zone's full forecast; `{center_id}` and `{zone_id}`
    /// are substituted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast_url: Option<String>,
    #[serde(default)]
    pub zones: Vec<Zone>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub centers: Vec<Center>,
}

/// A zone together with the center it belongs to.
#[derive(Debug, Clone, Copy)]
pub struct ZoneRef<'a> {
    pub center: &'a Center,
    pub zone: &'a Zone,
}

impl<'a> ZoneRef<'a> {
    pub fn key(&self) -> ZoneKey {
        ZoneKey::new(&self.center.slug, &self.zone.slug)
    }

    pub fn display_name(&self) -> String {
        format!("{} - {}", self.center.name, self.zone.name)
    }

    pub fn external_id(&self) -> &'a str {
        self.zone.external_id.as_deref().unwrap_or(&self.zone.id)
    }

    /// Link to the full forecast on the center's website.
    pub fn source_link(&self) -> String {
        let pattern = self
            .center
            .forecast_url
            .as_deref()
            .unwrap_or(DEFAULT_FORECAST_URL);
        pattern
            .replace("{center_id}", &self.center.id)
            .replace("{zone_id}", self.external_id())
    }
}

impl Registry {
    pub fn new(centers: Vec<Center>) -> Self {
        Self { centers }
    }

    /// All zones in declaration order.
    pub fn zones(&self) -> impl Iterator<Item = ZoneRef<'_>> {
        self.centers
            .iter()
            .flat_map(|center| center.zones.iter().map(move |zone| ZoneRef { center, zone }))
    }

    pub fn lookup(&self, key: &ZoneKey) -> Option<ZoneRef<'_>> {
        let center = self.centers.iter().find(|c| c.slug == key.center)?;
        let zone = center.zones.iter().find(|z| z.slug == key.zone)?;
        Some(ZoneRef { center, zone })
    }

    pub fn zone_count(&self) -> usize {
        self.centers.iter().map(|c| c.zones.len()).sum()
    }

    /// Rejects slugs that are not URL-safe, duplicate center slugs and
    /// duplicate zone slugs within a center.
    pub fn validate(&self) -> Result<(), String> {
        let mut centers = HashSet::new();
        for c in &self.centers {
            if !is_url_safe_slug(&c.slug) {
                return Err(format!("center slug '{}' is not URL-safe", c.slug));
            }
            if !centers.insert(c.slug.as_str()) {
                return Err(format!("duplicate center slug '{}'", c.slug));
            }
            let mut zones = HashSet::new();
            for z in &c.zones {
                if !is_url_safe_slug(&z.slug) {
                    return Err(format!("zone slug '{}/{}' is not URL-safe", c.slug, z.slug));
                }
                if !zones.insert(z.slug.as_str()) {
                    return Err(format!("duplicate zone slug '{}/{}'", c.slug, z.slug));
                }
            }
        }
        Ok(())
    }
}

// The API hands out numeric zone ids; hand-written files may quote them.
fn string_or_number<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
    }
    Ok(match Raw::deserialize(de)? {
        Raw::Str(s) => s,
        Raw::Int(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Registry {
        Registry::new(vec![
            Center {
                slug: "northwest-avalanche-center".into(),
                name: "Northwest Avalanche Center".into(),
                id: "NWAC".into(),
                forecast_url: Some("https://nwac.us/avalanche-forecast/#/{zone_id}".into()),
                zones: vec![
                    Zone {
                        slug: "mt-hood".into(),
                        name: "Mt Hood".into(),
                        id: "1646".into(),
                        external_id: Some("mt-hood".into()),
                    },
                    Zone {
                        slug: "snoqualmie-pass".into(),
                        name: "Snoqualmie Pass".into(),
                        id: "1653".into(),
                        external_id: None,
                    },
                ],
            },
            Center {
                slug: "sierra-avalanche-center".into(),
                name: "Sierra Avalanche Center".into(),
                id: "SAC".into(),
                forecast_url: None,
                zones: vec![Zone {
                    slug: "central-sierra-nevada".into(),
                    name: "Central Sierra Nevada".into(),
                    id: "2130".into(),
                    external_id: None,
                }],
            },
        ])
    }

    #[test]
    fn zones_follow_declaration_order() {
        let reg = sample();
        let keys: Vec<String> = reg.zones().map(|z| z.key().to_string()).collect();
        assert_eq!(
            keys,
            vec![
                "northwest-avalanche-center/mt-hood",
                "northwest-avalanche-center/snoqualmie-pass",
                "sierra-avalanche-center/central-sierra-nevada",
            ]
        );
        assert_eq!(reg.zone_count(), 3);
    }

    #[test]
    fn source_link_uses_external_id_not_slug() {
        let reg = sample();
        let hood = reg
            .lookup(&ZoneKey::new("northwest-avalanche-center", "mt-hood"))
            .unwrap();
        assert_eq!(hood.source_link(), "https://nwac.us/avalanche-forecast/#/mt-hood");

        let snoq = reg
            .lookup(&ZoneKey::new("northwest-avalanche-center", "snoqualmie-pass"))
            .unwrap();
        assert_eq!(snoq.source_link(), "https://nwac.us/avalanche-forecast/#/1653");

        let sierra = reg
            .lookup(&ZoneKey::new("sierra-avalanche-center", "central-sierra-nevada"))
            .unwrap();
        assert_eq!(
            sierra.source_link(),
            "https://avalanche.org/forecasts/#/SAC/2130"
        );
    }

    #[test]
    fn lookup_misses_unknown_zone() {
        let reg = sample();
        assert!(reg
            .lookup(&ZoneKey::new("northwest-avalanche-center", "nope"))
            .is_none());
        assert!(reg.lookup(&ZoneKey::new("nope", "mt-hood")).is_none());
    }

    #[test]
    fn validate_rejects_duplicate_zone_slugs() {
        let mut reg = sample();
        assert!(reg.validate().is_ok());
        let dup = reg.centers[0].zones[0].clone();
        reg.centers[0].zones.push(dup);
        let err = reg.validate().unwrap_err();
        assert!(err.contains("mt-hood"), "{err}");
    }

    #[test]
    fn validate_rejects_unsafe_slugs() {
        for bad in ["mt.hood", "../../escape", "", "-lead", "zone one", "häme"] {
            let mut reg = sample();
            reg.centers[1].zones[0].slug = bad.into();
            let err = reg.validate().unwrap_err();
            assert!(err.contains("not URL-safe"), "{bad}: {err}");
        }

        let mut reg = sample();
        reg.centers[0].slug = "nwac/west".into();
        assert!(reg.validate().unwrap_err().starts_with("center slug"));

        assert!(is_url_safe_slug("zone_2"));
        assert!(is_url_safe_slug("Mt-Hood"));
    }
}
