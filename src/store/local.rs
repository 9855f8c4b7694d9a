// src/store/local.rs
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::{parse_partition, parse_record_file_name, record_segments, sort_newest_first, ForecastStore};
use crate::error::PipelineError;
use crate::forecast::ForecastRecord;
use crate::registry::{is_url_safe_slug, ZoneKey};

/// Archive rooted at a local directory (`forecasts/` by default).
#[derive(Debug, Clone)]
pub struct LocalFsStore {
    root: PathBuf,
}

impl LocalFsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn zone_dir(&self, zone: &ZoneKey) -> PathBuf {
        self.root.join(&zone.center).join(&zone.zone)
    }

    pub fn record_path(&self, zone: &ZoneKey, date: NaiveDate) -> PathBuf {
        record_segments(zone, date)
            .iter()
            .fold(self.root.clone(), |p, seg| p.join(seg))
    }

    /// Newest-first partition walk. `on_partition` sees each year just
    /// before its directory is listed; older years are never touched once
    /// `limit` records are collected.
    pub async fn collect_recent<F>(
        &self,
        zone: &ZoneKey,
        limit: usize,
        mut on_partition: F,
    ) -> Result<Vec<ForecastRecord>, PipelineError>
    where
        F: FnMut(i32) + Send,
    {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let zone_dir = self.zone_dir(zone);
        let names = match list_names(&zone_dir, EntryKind::Dir).await {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(zone = %zone, "no archived forecasts yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(PipelineError::storage_read(zone_dir.display(), e)),
        };

        let mut years: Vec<(i32, String)> = names
            .into_iter()
            .filter_map(|n| parse_partition(&n).map(|y| (y, n)))
            .collect();
        years.sort_by(|a, b| b.0.cmp(&a.0));

        let mut out = Vec::new();
        for (year, name) in years {
            if out.len() >= limit {
                break;
            }
            on_partition(year);
            let dir = zone_dir.join(&name);
            let files = list_names(&dir, EntryKind::File)
                .await
                .map_err(|e| PipelineError::storage_read(dir.display(), e))?;
            let mut dated: Vec<(NaiveDate, String)> = files
                .into_iter()
                .filter_map(|n| {
                    parse_record_file_name(&n)
                        .filter(|d| d.year() == year)
                        .map(|d| (d, n))
                })
                .collect();
            dated.sort_by(|a, b| b.0.cmp(&a.0));

            for (_, file) in dated {
                if out.len() >= limit {
                    break;
                }
                let path = dir.join(&file);
                match read_record(&path).await {
                    Ok(rec) => out.push(rec),
                    Err(e) => {
                        tracing::warn!(zone = %zone, error = %e, "skipping unreadable forecast");
                    }
                }
            }
        }

        sort_newest_first(&mut out);
        Ok(out)
    }
}

#[async_trait]
impl ForecastStore for LocalFsStore {
    async fn save(&self, zone: &ZoneKey, record: &ForecastRecord) -> Result<String, PipelineError> {
        let path = self.record_path(zone, record.effective_date());
        let bytes = record
            .to_json_bytes()
            .map_err(|e| PipelineError::storage_write(path.display(), e))?;
        write_atomic(&path, &bytes)
            .await
            .map_err(|e| PipelineError::storage_write(path.display(), e))?;
        tracing::info!(zone = %zone, path = %path.display(), "saved forecast");
        Ok(path.display().to_string())
    }

    async fn query_recent(
        &self,
        zone: &ZoneKey,
        limit: usize,
    ) -> Result<Vec<ForecastRecord>, PipelineError> {
        self.collect_recent(zone, limit, |year| {
            tracing::trace!(zone = %zone, year, "opening partition");
        })
        .await
    }

    async fn list_zones(&self) -> Result<Vec<ZoneKey>, PipelineError> {
        let centers = match list_names(&self.root, EntryKind::Dir).await {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PipelineError::storage_read(self.root.display(), e)),
        };
        let mut out = Vec::new();
        for center in centers.into_iter().filter(|c| is_url_safe_slug(c)) {
            let dir = self.root.join(&center);
            let zones = list_names(&dir, EntryKind::Dir)
                .await
                .map_err(|e| PipelineError::storage_read(dir.display(), e))?;
            out.extend(
                zones
                    .into_iter()
                    .filter(|z| is_url_safe_slug(z))
                    .map(|z| ZoneKey::new(&center, z)),
            );
        }
        out.sort();
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "local-fs"
    }
}

async fn read_record(path: &Path) -> Result<ForecastRecord, PipelineError> {
    let bytes = fs::read(path)
        .await
        .map_err(|e| PipelineError::storage_read(path.display(), e))?;
    ForecastRecord::from_json_slice(&bytes).map_err(|e| PipelineError::storage_read(path.display(), e))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Dir,
    File,
}

async fn list_names(dir: &Path, kind: EntryKind) -> io::Result<Vec<String>> {
    let mut rd = fs::read_dir(dir).await?;
    let mut out = Vec::new();
    while let Some(entry) = rd.next_entry().await? {
        let ft = entry.file_type().await?;
        let wanted = match kind {
            EntryKind::Dir => ft.is_dir(),
            EntryKind::File => ft.is_file(),
        };
        if !wanted {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            out.push(name.to_string());
        }
    }
    Ok(out)
}

/// Write via a sibling `.tmp` file and rename, creating parent directories.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[tokio::test]
    async fn save_writes_under_year_partition() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalFsStore::new(tmp.path());
        let key = ZoneKey::new("demo-center", "demo-zone");
        let rec = ForecastRecord::new(
            Utc.with_ymd_and_hms(2025, 1, 3, 15, 0, 0).unwrap(),
            10,
            json!({ "published_time": "2025-01-03T01:00:00+00:00" }),
        );

        let loc = store.save(&key, &rec).await.unwrap();
        let expected = tmp
            .path()
            .join("demo-center/demo-zone/2025/2025-01-03.json");
        assert_eq!(loc, expected.display().to_string());
        assert!(expected.is_file());
        assert!(!tmp
            .path()
            .join("demo-center/demo-zone/2025/2025-01-03.json.tmp")
            .exists());
    }

    #[tokio::test]
    async fn save_into_unwritable_root_is_a_write_error() {
        let tmp = tempfile::tempdir().unwrap();
        // a regular file where the root directory should be
        let blocker = tmp.path().join("forecasts");
        std::fs::write(&blocker, b"not a dir").unwrap();
        let store = LocalFsStore::new(&blocker);
        let rec = ForecastRecord::new(Utc::now(), 0, json!({}));

        let err = store
            .save(&ZoneKey::new("c", "z"), &rec)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "StorageWriteError");
    }

    fn published(date: &str) -> ForecastRecord {
        ForecastRecord::new(
            Utc::now(),
            1,
            json!({ "published_time": format!("{date}T12:00:00Z") }),
        )
    }

    #[tokio::test]
    async fn walk_stops_before_older_partitions() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalFsStore::new(tmp.path());
        let key = ZoneKey::new("c", "z");
        for d in ["2023-06-01", "2024-02-01", "2024-03-01", "2025-01-01", "2025-01-02"] {
            store.save(&key, &published(d)).await.unwrap();
        }

        let mut opened = Vec::new();
        let got = store
            .collect_recent(&key, 2, |y| opened.push(y))
            .await
            .unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(opened, vec![2025]);

        let mut opened = Vec::new();
        let got = store
            .collect_recent(&key, 3, |y| opened.push(y))
            .await
            .unwrap();
        assert_eq!(got.len(), 3);
        assert_eq!(opened, vec![2025, 2024]);
    }

    #[tokio::test]
    async fn list_zones_skips_unsafe_names() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalFsStore::new(tmp.path());
        assert!(store.list_zones().await.unwrap().is_empty());

        store.save(&ZoneKey::new("b", "z2"), &published("2025-01-01")).await.unwrap();
        store.save(&ZoneKey::new("a", "z1"), &published("2025-01-01")).await.unwrap();
        std::fs::create_dir_all(tmp.path().join(".cache").join("x")).unwrap();
        std::fs::write(tmp.path().join("README.txt"), b"hi").unwrap();

        assert_eq!(
            store.list_zones().await.unwrap(),
            vec![ZoneKey::new("a", "z1"), ZoneKey::new("b", "z2")]
        );
    }
}
