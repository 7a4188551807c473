use crate::features::file_acceptance::FileMetadata;
use crate::location::{LocationKind, LocationResult};
use crate::upload::error::SessionFailure;
use crate::upload::progress::UploadProgress;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type SessionOutcome = Result<LocationResult, SessionFailure>;

/// Where a single upload session is in its lifecycle.
///
/// `Completed` and `Failed` are terminal: a session never leaves them.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Validating,
    Transferring(UploadProgress),
    Completed(LocationResult),
    Failed(SessionFailure),
}

impl SessionState {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_))
    }

    pub fn outcome(&self) -> Option<SessionOutcome> {
        match self {
            Self::Completed(result) => Some(Ok(result.clone())),
            Self::Failed(failure) => Some(Err(failure.clone())),
            Self::Validating | Self::Transferring(_) => None,
        }
    }
}

/// Notification pushed to a session's observer.
///
/// Progress events may be coalesced by a slow observer without harm; exactly one
/// terminal event (`Completed` or `Failed`) ends every stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Progress(UploadProgress),
    Completed(LocationResult),
    Failed(SessionFailure),
}

impl SessionEvent {
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress(_))
    }
}

impl From<SessionOutcome> for SessionEvent {
    fn from(outcome: SessionOutcome) -> Self {
        match outcome {
            Ok(result) => Self::Completed(result),
            Err(failure) => Self::Failed(failure),
        }
    }
}

/// Summary of a completed upload, suitable for keeping a history of results.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecord {
    pub created_at: DateTime<Utc>,
    pub file_name: String,
    pub file_size: u64,
    pub result_type: LocationKind,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub confidence: Option<f64>,
    pub exif_data: Option<Map<String, Value>>,
}

impl UploadRecord {
    pub fn new(file: &FileMetadata, result: &LocationResult, created_at: DateTime<Utc>) -> Self {
        let (accuracy, confidence, exif_data) = match result {
            LocationResult::Exif(exif) => (exif.accuracy(), None, exif.raw_metadata().cloned()),
            LocationResult::Estimate(estimate) => (None, estimate.confidence(), None),
        };
        Self {
            created_at,
            file_name: file.name.clone(),
            file_size: file.size_bytes,
            result_type: result.kind(),
            latitude: result.latitude(),
            longitude: result.longitude(),
            accuracy,
            confidence,
            exif_data,
        }
    }
}
