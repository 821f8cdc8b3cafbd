//! Unified error handling for place inference.
//!
//! Every fallible operation in the crate returns [`Result<T>`]. Errors are
//! per-user: a failing user never aborts a batch (see [`crate::batch`]).

use chrono::FixedOffset;
use thiserror::Error;

use crate::ClusterId;

/// Errors raised while loading, linking or inferring a user's places.
#[derive(Debug, Error)]
pub enum PlaceMatchError {
    /// Home cannot be computed without at least one stop.
    #[error("stop table is empty, home location cannot be computed")]
    NoStops,

    /// Samples and stops share no UTC offset (normalized to different zones).
    #[error("sample at {timestamp} uses offset {sample_offset}, stops use {stop_offsets:?}")]
    TimezoneMismatch {
        timestamp: String,
        sample_offset: FixedOffset,
        stop_offsets: Vec<FixedOffset>,
    },

    /// A timestamp was naive or could not be parsed.
    #[error("invalid timestamp '{value}': {reason}")]
    InvalidTimestamp { value: String, reason: String },

    /// A stop record violates the stop table contract.
    #[error("invalid stop (cluster {cluster_id}): {reason}")]
    InvalidStop { cluster_id: i64, reason: String },

    /// The projected coordinate is out of bounds and no sample is linked to the cluster.
    #[error("stop of cluster {cluster_id} has out-of-bounds UTM ({x}, {y}) and no linked sample")]
    UnresolvableStop { cluster_id: ClusterId, x: f64, y: f64 },

    /// Configuration values outside their valid domain.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Reverse geocoding failed (network, timeout, malformed response).
    #[error("geocoding failed: {0}")]
    Geocoding(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "persistence")]
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, PlaceMatchError>;

/// Convenience conversions from `Option` into crate errors.
pub trait OptionExt<T> {
    /// Convert `None` into [`PlaceMatchError::NoStops`].
    fn ok_or_no_stops(self) -> Result<T>;

    /// Convert `None` into [`PlaceMatchError::InvalidStop`] with the given reason.
    fn ok_or_invalid_stop(self, cluster_id: i64, reason: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_no_stops(self) -> Result<T> {
        self.ok_or(PlaceMatchError::NoStops)
    }

    fn ok_or_invalid_stop(self, cluster_id: i64, reason: &str) -> Result<T> {
        self.ok_or_else(|| PlaceMatchError::InvalidStop {
            cluster_id,
            reason: reason.to_string(),
        })
    }
}
