// src/feed/mod.rs
//! Feed builder: turns a zone's most recent archived forecasts into one RSS
//! document. Building never fails on payload content; missing fields become
//! placeholders in the entry summary.

pub mod extract;
pub mod rss;
pub mod summary;

use chrono::{DateTime, NaiveDate, Utc};
use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::forecast::ForecastRecord;
use crate::registry::{ZoneKey, ZoneRef};
use crate::store::local::write_atomic;

/// Maximum number of entries in a feed.
pub const FEED_ENTRY_CAP: usize = 10;

pub const FEED_EXT: &str = "xml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: String,
    pub publication_date: NaiveDate,
    pub published_at: DateTime<Utc>,
    pub summary_html: String,
    pub source_link: String,
    pub guid: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedDocument {
    pub zone: ZoneKey,
    pub title: String,
    pub link: String,
    pub description: String,
    /// Newest first.
    pub entries: Vec<FeedEntry>,
}

impl FeedDocument {
    pub fn to_rss(&self) -> Result<String, PipelineError> {
        rss::render(self)
    }
}

/// Public URL of a zone's feed as served by [`crate::serve`].
pub fn feed_url(base_url: &str, zone: &ZoneKey) -> String {
    format!(
        "{}/feed/{}/{}",
        base_url.trim_end_matches('/'),
        zone.center,
        zone.zone
    )
}

/// `records` are expected newest first, as returned by the store.
pub fn build(zone: ZoneRef<'_>, records: &[ForecastRecord], base_url: &str) -> FeedDocument {
    let key = zone.key();
    let link = feed_url(base_url, &key);
    let source_link = zone.source_link();

    let entries = records
        .iter()
        .take(FEED_ENTRY_CAP)
        .map(|rec| {
            let date = rec.effective_date();
            let digest = extract::digest(&rec.payload);
            FeedEntry {
                title: format!(
                    "{} Avalanche Forecast for {}",
                    zone.zone.name,
                    date.format("%Y-%m-%d")
                ),
                publication_date: date,
                published_at: rec.effective_at(),
                summary_html: summary::render(&digest, &source_link),
                source_link: source_link.clone(),
                guid: format!("{link}/{}", date.format("%Y-%m-%d")),
            }
        })
        .collect();

    FeedDocument {
        title: format!("{} - Avalanche Forecast", zone.display_name()),
        description: format!(
            "Avalanche forecasts from {}, {} zone",
            zone.center.name, zone.zone.name
        ),
        link,
        zone: key,
        entries,
    }
}

pub fn feed_path(feeds_dir: &Path, zone: &ZoneKey) -> PathBuf {
    feeds_dir
        .join(&zone.center)
        .join(format!("{}.{FEED_EXT}", zone.zone))
}

/// Write a rendered feed to `{feeds_dir}/{center}/{zone}.xml`.
pub async fn write_feed(feeds_dir: &Path, zone: &ZoneKey, xml: &str) -> Result<PathBuf, PipelineError> {
    let path = feed_path(feeds_dir, zone);
    write_atomic(&path, xml.as_bytes())
        .await
        .map_err(|e| PipelineError::storage_write(path.display(), e))?;
    tracing::info!(zone = %zone, path = %path.display(), "wrote feed");
    Ok(path)
}
