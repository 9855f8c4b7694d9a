// src/migrate.rs
//! Copy an archive between backends, e.g. a local tree into an S3 bucket.

use chrono::NaiveDate;
use std::fmt;

use crate::error::PipelineError;
use crate::registry::ZoneKey;
use crate::store::ForecastStore;

#[derive(Debug)]
pub struct MigrationFailure {
    pub zone: ZoneKey,
    /// `None` when the zone itself could not be read.
    pub date: Option<NaiveDate>,
    pub error: PipelineError,
}

#[derive(Debug, Default)]
pub struct MigrationSummary {
    pub dry_run: bool,
    pub zones: usize,
    /// Records found in the source.
    pub total: usize,
    /// Records written to the destination (would be written, on a dry run).
    pub copied: usize,
    pub failed: Vec<MigrationFailure>,
}

impl MigrationSummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

impl fmt::Display for MigrationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = if self.dry_run { "would copy" } else { "copied" };
        writeln!(
            f,
            "{verb} {} of {} records across {} zones, {} failed",
            self.copied,
            self.total,
            self.zones,
            self.failed.len()
        )?;
        for failure in &self.failed {
            write!(f, "  ✗ {}", failure.zone)?;
            if let Some(date) = failure.date {
                write!(f, " {date}")?;
            }
            writeln!(f, " {}: {}", failure.error.kind(), failure.error)?;
        }
        Ok(())
    }
}

/// Copy every record in `from` into `to` under the same zone and date.
///
/// Unreadable zones and failed writes are recorded and skipped. Records the
/// source itself cannot decode are skipped by its `query_recent` and do not
/// count toward `total`. Only failing to list the source is fatal.
pub async fn migrate(
    from: &dyn ForecastStore,
    to: &dyn ForecastStore,
    dry_run: bool,
) -> Result<MigrationSummary, PipelineError> {
    let zones = from.list_zones().await?;
    tracing::info!(
        from = from.name(),
        to = to.name(),
        zones = zones.len(),
        dry_run,
        "migration started"
    );

    let mut summary = MigrationSummary {
        dry_run,
        zones: zones.len(),
        ..Default::default()
    };

    for zone in zones {
        let records = match from.query_recent(&zone, usize::MAX).await {
            Ok(records) => records,
            Err(error) => {
                tracing::error!(zone = %zone, error = %error, "cannot read zone");
                summary.failed.push(MigrationFailure { zone, date: None, error });
                continue;
            }
        };
        summary.total += records.len();

        for record in &records {
            let date = record.effective_date();
            if dry_run {
                tracing::info!(zone = %zone, %date, "would copy");
                summary.copied += 1;
                continue;
            }
            match to.save(&zone, record).await {
                Ok(_) => summary.copied += 1,
                Err(error) => {
                    tracing::error!(zone = %zone, %date, error = %error, "copy failed");
                    summary.failed.push(MigrationFailure {
                        zone: zone.clone(),
                        date: Some(date),
                        error,
                    });
                }
            }
        }
    }

    tracing::info!(
        total = summary.total,
        copied = summary.copied,
        failed = summary.failed.len(),
        dry_run,
        "migration finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_lists_failures() {
        let summary = MigrationSummary {
            dry_run: false,
            zones: 2,
            total: 3,
            copied: 2,
            failed: vec![MigrationFailure {
                zone: ZoneKey::new("c", "z"),
                date: NaiveDate::from_ymd_opt(2025, 1, 2),
                error: PipelineError::storage_write("c/z/2025/2025-01-02.json", "denied"),
            }],
        };
        let text = summary.to_string();
        assert!(text.starts_with("copied 2 of 3 records across 2 zones, 1 failed"));
        assert!(text.contains("c/z 2025-01-02 StorageWriteError"));
        assert!(!summary.is_clean());
    }
}
