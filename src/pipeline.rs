// src/pipeline.rs
//! Batch orchestration: fetch → archive → rebuild feed, zone by zone.
//!
//! Zones are processed one after another in registry order. A failing zone is
//! logged and recorded in the [`RunSummary`]; it never stops the run. There
//! is no retry inside a run, the next scheduled run picks the zone up again.

use chrono::NaiveDate;
use metrics::{counter, describe_counter, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::acquire::ForecastSource;
use crate::error::PipelineError;
use crate::feed::{self, FEED_ENTRY_CAP};
use crate::registry::{Registry, ZoneKey, ZoneRef};
use crate::store::ForecastStore;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_zone_success_total", "Zones processed without error.");
        describe_counter!(
            "pipeline_zone_failure_total",
            "Zones that failed, labelled by the stage they had reached."
        );
        describe_histogram!("acquire_duration_ms", "Forecast fetch time in milliseconds.");
    });
}

/// Where a zone is in one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneStage {
    Pending,
    Acquiring,
    Stored,
    FeedBuilt,
    Done,
}

impl ZoneStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Acquiring => "acquiring",
            Self::Stored => "stored",
            Self::FeedBuilt => "feed_built",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for ZoneStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct ZoneFailure {
    pub zone: ZoneKey,
    /// Stage the zone had reached when the error happened.
    pub stage: ZoneStage,
    pub error: PipelineError,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: Vec<ZoneKey>,
    pub failed: Vec<ZoneFailure>,
}

impl RunSummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, zone: ZoneKey, outcome: Result<(), (ZoneStage, PipelineError)>) {
        self.total += 1;
        match outcome {
            Ok(()) => {
                counter!("pipeline_zone_success_total").increment(1);
                self.succeeded.push(zone);
            }
            Err((stage, error)) => {
                tracing::error!(
                    zone = %zone,
                    stage = %stage,
                    kind = error.kind(),
                    error = %error,
                    "zone failed"
                );
                counter!("pipeline_zone_failure_total", "stage" => stage.as_str()).increment(1);
                self.failed.push(ZoneFailure { zone, stage, error });
            }
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} of {} zones succeeded, {} failed",
            self.succeeded.len(),
            self.total,
            self.failed.len()
        )?;
        for failure in &self.failed {
            writeln!(
                f,
                "  ✗ {} [{}] {}: {}",
                failure.zone,
                failure.stage,
                failure.error.kind(),
                failure.error
            )?;
        }
        Ok(())
    }
}

/// Result of a single-zone download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedForecast {
    pub location: String,
    pub effective_date: NaiveDate,
}

/// Where feeds are written and the public URL they are served under.
#[derive(Debug, Clone)]
pub struct FeedOutput {
    pub dir: PathBuf,
    pub base_url: String,
}

pub struct Pipeline {
    registry: Arc<Registry>,
    store: Arc<dyn ForecastStore>,
    source: Arc<dyn ForecastSource>,
    feeds: FeedOutput,
}

impl Pipeline {
    pub fn new(
        registry: Arc<Registry>,
        store: Arc<dyn ForecastStore>,
        source: Arc<dyn ForecastSource>,
        feeds: FeedOutput,
    ) -> Self {
        ensure_metrics_described();
        Self {
            registry,
            store,
            source,
            feeds,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Fetch, archive and publish every zone in the registry.
    pub async fn full_update(&self) -> RunSummary {
        tracing::info!(
            zones = self.registry.zone_count(),
            store = self.store.name(),
            source = self.source.name(),
            "full update started"
        );
        let mut summary = RunSummary::default();
        for zone in self.registry.zones() {
            let mut stage = ZoneStage::Pending;
            let outcome = self.update_zone(zone, &mut stage).await;
            summary.record(zone.key(), outcome.map(|_| ()).map_err(|e| (stage, e)));
        }
        self.finish("full update", &summary);
        summary
    }

    /// Rebuild every feed from the archive without fetching.
    pub async fn regenerate_feeds(&self) -> RunSummary {
        tracing::info!(zones = self.registry.zone_count(), "feed regeneration started");
        let mut summary = RunSummary::default();
        for zone in self.registry.zones() {
            let mut stage = ZoneStage::Stored;
            let outcome = self.publish_feed(zone, &mut stage).await;
            summary.record(zone.key(), outcome.map(|_| ()).map_err(|e| (stage, e)));
        }
        self.finish("feed regeneration", &summary);
        summary
    }

    /// Fetch and archive one zone's forecast. The feed is left untouched.
    pub async fn download_forecast(&self, key: &ZoneKey) -> Result<SavedForecast, PipelineError> {
        let zone = self.lookup(key)?;
        let record = self.source.acquire(zone).await?;
        let location = self.store.save(key, &record).await?;
        Ok(SavedForecast {
            location,
            effective_date: record.effective_date(),
        })
    }

    /// Rebuild one zone's feed from the archive.
    pub async fn generate_feed(&self, key: &ZoneKey) -> Result<PathBuf, PipelineError> {
        let zone = self.lookup(key)?;
        let mut stage = ZoneStage::Stored;
        self.publish_feed(zone, &mut stage).await
    }

    fn lookup(&self, key: &ZoneKey) -> Result<ZoneRef<'_>, PipelineError> {
        self.registry
            .lookup(key)
            .ok_or_else(|| PipelineError::UnknownZone(key.clone()))
    }

    async fn update_zone(&self, zone: ZoneRef<'_>, stage: &mut ZoneStage) -> Result<PathBuf, PipelineError> {
        let key = zone.key();
        *stage = ZoneStage::Acquiring;
        let record = self.source.acquire(zone).await?;
        self.store.save(&key, &record).await?;
        *stage = ZoneStage::Stored;
        self.publish_feed(zone, stage).await
    }

    async fn publish_feed(&self, zone: ZoneRef<'_>, stage: &mut ZoneStage) -> Result<PathBuf, PipelineError> {
        let key = zone.key();
        let recent = self.store.query_recent(&key, FEED_ENTRY_CAP).await?;
        let xml = feed::build(zone, &recent, &self.feeds.base_url).to_rss()?;
        *stage = ZoneStage::FeedBuilt;
        let path = feed::write_feed(&self.feeds.dir, &key, &xml).await?;
        *stage = ZoneStage::Done;
        tracing::debug!(zone = %key, entries = recent.len(), "zone done");
        Ok(path)
    }

    fn finish(&self, what: &str, summary: &RunSummary) {
        gauge!("pipeline_last_run_ts").set(chrono::Utc::now().timestamp() as f64);
        tracing::info!(
            run = what,
            succeeded = summary.succeeded.len(),
            failed = summary.failed.len(),
            total = summary.total,
            "run complete"
        );
    }
}
