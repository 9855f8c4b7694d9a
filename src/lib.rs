// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod acquire;
pub mod config;
pub mod error;
pub mod feed;
pub mod forecast;
pub mod listing;
pub mod metrics;
pub mod migrate;
pub mod pipeline;
pub mod registry;
pub mod serve;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::acquire::{AvalancheApiClient, ForecastSource};
pub use crate::error::PipelineError;
pub use crate::forecast::ForecastRecord;
pub use crate::migrate::MigrationSummary;
pub use crate::pipeline::{FeedOutput, Pipeline, RunSummary, SavedForecast, ZoneFailure, ZoneStage};
pub use crate::registry::{Registry, ZoneKey, ZoneRef};
pub use crate::store::{ForecastStore, LocalFsStore, ObjectStoreBackend};
