use std::time::Duration;

use thiserror::Error;

use crate::geohash::GeohashError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid event structure (event {})", .event_id.as_deref().unwrap_or("<unknown>"))]
    InvalidEvent { event_id: Option<String> },
    #[error("geohash error: {0}")]
    Geohash(#[from] GeohashError),
    #[error("serde json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("classifier failed for event {event_id}: {message}")]
    Classifier { event_id: String, message: String },
    #[error("worker pool fault for event {event_id}: {reason}")]
    PoolFault { event_id: String, reason: String },
    #[error("event {event_id} timed out after {after:?}")]
    Timeout { event_id: String, after: Duration },
    #[error("worker pool unavailable: {0}")]
    PoolUnavailable(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("mutex poisoned")]
    MutexPoisoned,
}

impl Error {
    /// Event id attached to the failure, when one is known.
    pub fn event_id(&self) -> Option<&str> {
        match self {
            Error::InvalidEvent { event_id } => event_id.as_deref(),
            Error::Classifier { event_id, .. }
            | Error::PoolFault { event_id, .. }
            | Error::Timeout { event_id, .. } => Some(event_id),
            _ => None,
        }
    }
}
