//! Error kinds raised while processing a zone.

use thiserror::Error;

use crate::registry::ZoneKey;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Remote fetch failed, timed out, or returned something unusable.
    #[error("acquisition failed: {0}")]
    Acquisition(String),

    #[error("cannot write {path}: {reason}")]
    StorageWrite { path: String, reason: String },

    /// A persisted record could not be listed, read or decoded.
    #[error("cannot read {path}: {reason}")]
    StorageRead { path: String, reason: String },

    /// Writing the feed XML into memory failed.
    #[error("feed rendering failed: {0}")]
    Build(String),

    #[error("zone not found in registry: {0}")]
    UnknownZone(ZoneKey),
}

impl PipelineError {
    pub fn storage_write(path: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        Self::StorageWrite {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn storage_read(path: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        Self::StorageRead {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Kind name shown to operators next to the message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Acquisition(_) => "AcquisitionError",
            Self::StorageWrite { .. } => "StorageWriteError",
            Self::StorageRead { .. } => "StorageReadError",
            Self::Build(_) => "BuildError",
            Self::UnknownZone(_) => "UnknownZone",
        }
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Acquisition(format!("request timed out: {e}"))
        } else {
            Self::Acquisition(e.to_string())
        }
    }
}
