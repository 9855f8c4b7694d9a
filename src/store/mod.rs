// src/store/mod.rs
//! Forecast archive.
//!
//! Layout: `{center}/{zone}/{YYYY}/{YYYY-MM-DD}.json`. Year partitions keep
//! directories small as history grows, and within a partition filename order
//! is date order, so the newest N records are found by walking partitions
//! newest-first and stopping early.

pub mod local;
pub mod object;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use std::sync::Arc;

use crate::error::PipelineError;
use crate::forecast::ForecastRecord;
use crate::registry::ZoneKey;

pub use local::LocalFsStore;
pub use object::ObjectStoreBackend;

pub const RECORD_EXT: &str = "json";

#[async_trait]
pub trait ForecastStore: Send + Sync {
    /// Persist `record` under its effective date, replacing any record already
    /// filed for that day. Returns where it landed (path or object key).
    async fn save(&self, zone: &ZoneKey, record: &ForecastRecord) -> Result<String, PipelineError>;

    /// Up to `limit` records, newest effective date first.
    async fn query_recent(
        &self,
        zone: &ZoneKey,
        limit: usize,
    ) -> Result<Vec<ForecastRecord>, PipelineError>;

    /// Every `(center, zone)` holding at least a zone directory or prefix,
    /// sorted. Entries whose names are not URL-safe slugs are ignored.
    async fn list_zones(&self) -> Result<Vec<ZoneKey>, PipelineError>;

    fn name(&self) -> &'static str;
}

/// Open an archive from a location string: `s3://bucket/prefix` or
/// `memory://` select an object store, anything else is a local directory.
pub fn open(location: &str) -> AnyResult<Arc<dyn ForecastStore>> {
    if location.contains("://") {
        Ok(Arc::new(ObjectStoreBackend::from_url(location)?))
    } else {
        Ok(Arc::new(LocalFsStore::new(location)))
    }
}

/// Relative location of a record: `[center, zone, year, file name]`.
pub fn record_segments(zone: &ZoneKey, date: NaiveDate) -> [String; 4] {
    [
        zone.center.clone(),
        zone.zone.clone(),
        format!("{:04}", date.year()),
        record_file_name(date),
    ]
}

pub fn record_file_name(date: NaiveDate) -> String {
    format!("{}.{RECORD_EXT}", date.format("%Y-%m-%d"))
}

/// Year partition name, or `None` for anything that is not four digits.
pub fn parse_partition(name: &str) -> Option<i32> {
    if name.len() == 4 && name.bytes().all(|b| b.is_ascii_digit()) {
        name.parse().ok()
    } else {
        None
    }
}

/// Date encoded in a record file name (`YYYY-MM-DD.json`).
pub fn parse_record_file_name(name: &str) -> Option<NaiveDate> {
    let stem = name.strip_suffix(RECORD_EXT)?.strip_suffix('.')?;
    if stem.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok()
}

/// Newest effective date first, later retrieval first within a day.
pub(crate) fn sort_newest_first(records: &mut [ForecastRecord]) {
    records.sort_by(|a, b| {
        b.effective_date()
            .cmp(&a.effective_date())
            .then_with(|| b.retrieved_at.cmp(&a.retrieved_at))
    });
}
