// src/store/object.rs
//! Archive on an object store (S3 bucket prefix, or in memory for tests).
//! Keys are the same relative paths [`super::LocalFsStore`] uses, so a local
//! tree copied under a bucket prefix is readable as-is.

use anyhow::{bail, Context, Result as AnyResult};
use async_trait::async_trait;
use chrono::Datelike;
use object_store::aws::AmazonS3Builder;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use reqwest::Url;
use std::sync::Arc;

use super::{parse_partition, parse_record_file_name, record_segments, sort_newest_first, ForecastStore};
use crate::error::PipelineError;
use crate::forecast::ForecastRecord;
use crate::registry::{is_url_safe_slug, ZoneKey};

#[derive(Debug, Clone)]
pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
    prefix: ObjectPath,
    label: String,
}

impl ObjectStoreBackend {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            store,
            prefix: ObjectPath::from(prefix.into().as_str()),
            label: label.into(),
        }
    }

    /// Empty in-process bucket.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()), "", "memory://")
    }

    /// `s3://bucket/prefix` (credentials and region from the usual `AWS_*`
    /// variables) or `memory://prefix`.
    pub fn from_url(raw: &str) -> AnyResult<Self> {
        let url = Url::parse(raw).with_context(|| format!("parsing store url '{raw}'"))?;
        let store: Arc<dyn ObjectStore> = match url.scheme() {
            "s3" => Arc::new(
                AmazonS3Builder::from_env()
                    .with_url(raw)
                    .build()
                    .with_context(|| format!("configuring S3 store for '{raw}'"))?,
            ),
            "memory" => Arc::new(InMemory::new()),
            other => bail!("unsupported store scheme '{other}' (expected s3:// or memory://)"),
        };
        Ok(Self::new(store, url.path(), raw))
    }

    fn location<S: AsRef<str>>(&self, segments: &[S]) -> ObjectPath {
        segments
            .iter()
            .fold(self.prefix.clone(), |p, s| p.child(s.as_ref()))
    }

    /// Put raw bytes at `key`, relative to the prefix. Used to seed fixtures.
    pub async fn put_raw(&self, key: &str, bytes: Vec<u8>) -> Result<(), PipelineError> {
        let loc = self.location(&key.split('/').collect::<Vec<_>>());
        self.store
            .put(&loc, PutPayload::from(bytes))
            .await
            .map(|_| ())
            .map_err(|e| PipelineError::storage_write(&loc, e))
    }

    /// All object keys under the prefix, relative to it, sorted.
    pub async fn keys(&self) -> Result<Vec<String>, PipelineError> {
        let mut out = Vec::new();
        let mut pending = vec![self.prefix.clone()];
        while let Some(dir) = pending.pop() {
            let listing = self.list_dir(&dir).await?;
            pending.extend(listing.common_prefixes);
            for meta in listing.objects {
                let key = meta
                    .location
                    .prefix_match(&self.prefix)
                    .map(|parts| parts.map(|p| p.as_ref().to_string()).collect::<Vec<_>>().join("/"))
                    .unwrap_or_else(|| meta.location.to_string());
                out.push(key);
            }
        }
        out.sort();
        Ok(out)
    }

    async fn list_dir(&self, dir: &ObjectPath) -> Result<object_store::ListResult, PipelineError> {
        let prefix = (!dir.as_ref().is_empty()).then_some(dir);
        self.store
            .list_with_delimiter(prefix)
            .await
            .map_err(|e| PipelineError::storage_read(dir, e))
    }

    /// Last segment of each child prefix of `dir`.
    async fn child_names(&self, dir: &ObjectPath) -> Result<Vec<String>, PipelineError> {
        Ok(self
            .list_dir(dir)
            .await?
            .common_prefixes
            .iter()
            .filter_map(|p| p.filename().map(str::to_string))
            .collect())
    }

    async fn read_record(&self, loc: &ObjectPath) -> Result<ForecastRecord, PipelineError> {
        let bytes = self
            .store
            .get(loc)
            .await
            .map_err(|e| PipelineError::storage_read(loc, e))?
            .bytes()
            .await
            .map_err(|e| PipelineError::storage_read(loc, e))?;
        ForecastRecord::from_json_slice(&bytes).map_err(|e| PipelineError::storage_read(loc, e))
    }
}

#[async_trait]
impl ForecastStore for ObjectStoreBackend {
    async fn save(&self, zone: &ZoneKey, record: &ForecastRecord) -> Result<String, PipelineError> {
        let loc = self.location(&record_segments(zone, record.effective_date()));
        let bytes = record
            .to_json_bytes()
            .map_err(|e| PipelineError::storage_write(&loc, e))?;
        // Single PUT, so readers never observe a partial object.
        self.store
            .put(&loc, PutPayload::from(bytes))
            .await
            .map_err(|e| PipelineError::storage_write(&loc, e))?;
        tracing::info!(zone = %zone, key = %loc, "saved forecast");
        Ok(loc.to_string())
    }

    async fn query_recent(
        &self,
        zone: &ZoneKey,
        limit: usize,
    ) -> Result<Vec<ForecastRecord>, PipelineError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let zone_prefix = self.location(&[&zone.center, &zone.zone]);
        let mut years: Vec<i32> = self
            .child_names(&zone_prefix)
            .await?
            .iter()
            .filter_map(|n| parse_partition(n))
            .collect();
        years.sort_unstable_by(|a, b| b.cmp(a));

        let mut out = Vec::new();
        for year in years {
            if out.len() >= limit {
                break;
            }
            let partition = zone_prefix.child(format!("{year:04}"));
            let mut dated: Vec<_> = self
                .list_dir(&partition)
                .await?
                .objects
                .into_iter()
                .filter_map(|meta| {
                    let date = parse_record_file_name(meta.location.filename()?)?;
                    (date.year() == year).then_some((date, meta.location))
                })
                .collect();
            dated.sort_by(|a, b| b.0.cmp(&a.0));

            for (_, loc) in dated {
                if out.len() >= limit {
                    break;
                }
                match self.read_record(&loc).await {
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

    async fn list_zones(&self) -> Result<Vec<ZoneKey>, PipelineError> {
        let mut out = Vec::new();
        for center in self.child_names(&self.prefix).await? {
            if !is_url_safe_slug(&center) {
                continue;
            }
            let zones = self.child_names(&self.prefix.child(center.as_str())).await?;
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
        "object-store"
    }
}

impl std::fmt::Display for ObjectStoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn rec(y: i32, m: u32, d: u32) -> ForecastRecord {
        ForecastRecord::new(
            Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap(),
            5,
            json!({ "day": format!("{y}-{m}-{d}") }),
        )
    }

    #[tokio::test]
    async fn keys_mirror_the_local_layout() {
        let store = ObjectStoreBackend::in_memory();
        let key = ZoneKey::new("demo-center", "demo-zone");
        let loc = store.save(&key, &rec(2025, 1, 3)).await.unwrap();
        assert_eq!(loc, "demo-center/demo-zone/2025/2025-01-03.json");
        assert_eq!(store.keys().await.unwrap(), vec![loc]);
    }

    #[tokio::test]
    async fn prefix_is_applied_to_every_key() {
        let store = ObjectStoreBackend::from_url("memory:///archive/forecasts").unwrap();
        let key = ZoneKey::new("c", "z");
        let loc = store.save(&key, &rec(2025, 1, 3)).await.unwrap();
        assert_eq!(loc, "archive/forecasts/c/z/2025/2025-01-03.json");
        assert_eq!(store.keys().await.unwrap(), vec!["c/z/2025/2025-01-03.json"]);
        assert_eq!(store.list_zones().await.unwrap(), vec![key.clone()]);
        assert_eq!(store.query_recent(&key, 5).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn neighbouring_zone_prefixes_do_not_bleed() {
        let store = ObjectStoreBackend::in_memory();
        let a = ZoneKey::new("c", "zone");
        let b = ZoneKey::new("c", "zone-east");
        store.save(&a, &rec(2025, 1, 1)).await.unwrap();
        store.save(&b, &rec(2025, 1, 2)).await.unwrap();

        let got = store.query_recent(&a, 10).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].payload["day"], "2025-1-1");
    }

    #[tokio::test]
    async fn corrupt_and_foreign_objects_are_skipped() {
        let store = ObjectStoreBackend::in_memory();
        let key = ZoneKey::new("c", "z");
        store.save(&key, &rec(2025, 1, 1)).await.unwrap();
        store.put_raw("c/z/2025/2025-01-05.json", b"{ nope".to_vec()).await.unwrap();
        store.put_raw("c/z/2025/readme.txt", b"hello".to_vec()).await.unwrap();
        store
            .put_raw("c/z/2024/2025-01-04.json", rec(2025, 1, 4).to_json_bytes().unwrap())
            .await
            .unwrap();

        let got = store.query_recent(&key, 10).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].payload["day"], "2025-1-1");
    }

    #[test]
    fn rejects_unknown_schemes() {
        assert!(ObjectStoreBackend::from_url("ftp://host/x").is_err());
        assert!(ObjectStoreBackend::from_url("not a url").is_err());
    }
}
