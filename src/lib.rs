//! # Place Matcher
//!
//! Home and workplace inference from GPS trajectories and detected stops.
//!
//! This library provides:
//! - UTM to geodetic coordinate reconciliation with a linked-sample fallback
//! - Sample to stop linking by inclusive interval containment (R-tree indexed)
//! - Per-cluster dwell time aggregation with deterministic argmax
//! - Home and work location inference, including a day-grouped fallback
//! - Reverse geocoding behind a capability trait
//! - CSV table I/O and batch processing for many users
//!
//! ## Features
//!
//! - **`parallel`** - Process users in parallel with rayon
//! - **`persistence`** - Store home/work records in SQLite
//! - **`http`** - Network reverse geocoder (Nominatim)
//! - **`synthetic`** - Seeded synthetic user weeks for tests and benchmarks
//! - **`cli`** - The `placematch-cli` binary
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::DateTime;
//! use placematch::{InferenceConfig, Sample, Stop, infer};
//!
//! let at = |s: &str| DateTime::parse_from_rfc3339(s).unwrap();
//!
//! let stops = vec![
//!     Stop::new(0, at("2021-10-25T00:00:00+02:00"), at("2021-10-25T07:30:00+02:00"), 389_900.0, 5_819_700.0).unwrap(),
//!     Stop::new(1, at("2021-10-25T09:00:00+02:00"), at("2021-10-25T17:00:00+02:00"), 392_100.0, 5_820_400.0).unwrap(),
//! ];
//! let samples = vec![Sample::new(at("2021-10-25T10:00:00+02:00"), 52.52, 13.41)];
//!
//! let inference = infer(&samples, &stops, &InferenceConfig::default()).unwrap();
//! assert_eq!(inference.home.cluster_id, 1);
//! assert_eq!(inference.samples[0].stop_id, Some(1));
//! ```

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Weekday};
use geo::Coord;
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, PlaceMatchError, Result};

// UTM <-> geodetic projection and stop coordinate reconciliation
pub mod projection;
pub use projection::{UtmZone, reconcile_stops};

// Sample to stop linking (interval containment)
pub mod linking;
pub use linking::{LinkedSamples, StopIndex, link_samples};

// Per-cluster dwell time tables
pub mod aggregation;
pub use aggregation::{DurationTable, aggregate_durations};

// Calendar walks over stops (workday counting, day grouping)
pub mod calendar;

// Home and work inference and the per-user pipeline
pub mod inference;
pub use inference::{
    HomeLocation, Inference, InferenceStats, PrimaryCandidate, WorkCandidate, WorkEstimate,
    WorkPhase, infer, locate_home, locate_work,
};

// Reverse geocoding capability and address annotation
pub mod geocoding;
pub use geocoding::{ReverseGeocoder, StaticGeocoder, annotate_addresses};

// CSV sample/stop tables and per-user directories
pub mod tables;

// Multi-user batch runner
pub mod batch;
pub use batch::{UserInput, UserReport, process_users};

// SQLite store for home/work records
#[cfg(feature = "persistence")]
pub mod persistence;
#[cfg(feature = "persistence")]
pub use persistence::LocationStore;

// Seeded synthetic user weeks
#[cfg(feature = "synthetic")]
pub mod synthetic;

// ============================================================================
// Core Types
// ============================================================================

/// Identifier shared by all stops at the same physical place.
pub type ClusterId = u32;

/// `stop_id` written for samples that fall outside every stop interval.
pub const UNLINKED_STOP_ID: i64 = -1;

/// Largest tolerated difference between a stop's recorded duration and `stop - start`.
pub const DURATION_TOLERANCE_SECS: f64 = 1.0;

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use placematch::GpsPoint;
/// let point = GpsPoint::new(52.5163, 13.3777); // Berlin
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Elevation in meters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
}

impl GpsPoint {
    /// Create a new GPS point without elevation.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            elevation: None,
        }
    }

    /// Create a new GPS point with elevation.
    pub fn with_elevation(latitude: f64, longitude: f64, elevation: f64) -> Self {
        Self {
            latitude,
            longitude,
            elevation: Some(elevation),
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// One raw trajectory point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub ts: DateTime<FixedOffset>,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    /// Horizontal accuracy in meters
    pub accuracy: f64,
    pub motion_score: f64,
}

impl Sample {
    /// Create a sample with only a timestamp and position.
    pub fn new(ts: DateTime<FixedOffset>, latitude: f64, longitude: f64) -> Self {
        Self {
            ts,
            latitude,
            longitude,
            altitude: 0.0,
            accuracy: 0.0,
            motion_score: 0.0,
        }
    }

    pub fn position(&self) -> GpsPoint {
        GpsPoint::with_elevation(self.latitude, self.longitude, self.altitude)
    }
}

/// A sample after linking: `stop_id` is the containing stop's cluster, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedSample {
    pub sample: Sample,
    pub stop_id: Option<ClusterId>,
}

impl TaggedSample {
    /// The `stop_id` column value, with [`UNLINKED_STOP_ID`] for unlinked samples.
    pub fn stop_id_column(&self) -> i64 {
        self.stop_id.map_or(UNLINKED_STOP_ID, i64::from)
    }
}

/// One detected dwell interval.
///
/// `duration` is in seconds and always equals `stop - start` (within
/// [`DURATION_TOLERANCE_SECS`]); the constructors enforce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub cluster_id: ClusterId,
    pub start: DateTime<FixedOffset>,
    pub stop: DateTime<FixedOffset>,
    pub duration: f64,
    /// UTM easting
    pub x: f64,
    /// UTM northing
    pub y: f64,
}

impl Stop {
    /// Create a stop, deriving its duration from the interval.
    pub fn new(
        cluster_id: ClusterId,
        start: DateTime<FixedOffset>,
        stop: DateTime<FixedOffset>,
        x: f64,
        y: f64,
    ) -> Result<Self> {
        let duration = interval_seconds(&start, &stop);
        Self::with_duration(cluster_id, start, stop, duration, x, y)
    }

    /// Create a stop with a recorded duration, checking it against the interval.
    pub fn with_duration(
        cluster_id: ClusterId,
        start: DateTime<FixedOffset>,
        stop: DateTime<FixedOffset>,
        duration: f64,
        x: f64,
        y: f64,
    ) -> Result<Self> {
        if stop < start {
            return Err(PlaceMatchError::InvalidStop {
                cluster_id: i64::from(cluster_id),
                reason: format!("stop {} precedes start {}", stop, start),
            });
        }
        let derived = interval_seconds(&start, &stop);
        if !duration.is_finite() || (duration - derived).abs() > DURATION_TOLERANCE_SECS {
            return Err(PlaceMatchError::InvalidStop {
                cluster_id: i64::from(cluster_id),
                reason: format!("duration {}s does not match interval of {}s", duration, derived),
            });
        }
        Ok(Self {
            cluster_id,
            start,
            stop,
            duration,
            x,
            y,
        })
    }

    /// Projected coordinate as (easting, northing).
    pub fn projected(&self) -> Coord<f64> {
        Coord {
            x: self.x,
            y: self.y,
        }
    }

    /// Inclusive containment of a timestamp in `[start, stop]`.
    pub fn contains(&self, ts: &DateTime<FixedOffset>) -> bool {
        self.start <= *ts && *ts <= self.stop
    }

    /// Calendar date of `start` in the stop's own offset.
    pub fn start_date(&self) -> NaiveDate {
        self.start.date_naive()
    }

    pub fn start_weekday(&self) -> Weekday {
        self.start.weekday()
    }
}

impl AsRef<Stop> for Stop {
    fn as_ref(&self) -> &Stop {
        self
    }
}

fn interval_seconds(start: &DateTime<FixedOffset>, stop: &DateTime<FixedOffset>) -> f64 {
    (*stop - *start).num_milliseconds() as f64 / 1000.0
}

/// Where a resolved stop's geodetic coordinate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSource {
    /// Converted from the stop's UTM coordinate.
    Projected,
    /// Taken from the first sample linked to the stop's cluster.
    LinkedSample,
}

/// A stop with its reconciled geodetic coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedStop {
    pub stop: Stop,
    pub position: GpsPoint,
    pub source: CoordinateSource,
}

impl AsRef<Stop> for ResolvedStop {
    fn as_ref(&self) -> &Stop {
        &self.stop
    }
}

/// Semantic role of a significant location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationRole {
    Home,
    Work,
}

impl std::fmt::Display for LocationRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LocationRole::Home => f.pad("home"),
            LocationRole::Work => f.pad("work"),
        }
    }
}

/// Output record for a home or work place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignificantLocation {
    pub role: LocationRole,
    pub cluster_id: ClusterId,
    pub latitude: f64,
    pub longitude: f64,
    /// Start of the contributing stop
    pub timestamp: DateTime<FixedOffset>,
    /// Reverse-geocoded address, absent when lookup failed or was skipped
    pub address: Option<String>,
    /// Set on work records when the user has more than one workplace
    #[serde(default)]
    pub has_multiple_workplaces: bool,
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for place inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// UTM zone number of the stop table's projected coordinates.
    /// Default: 33
    pub utm_zone: u8,

    /// UTM latitude band letter. Bands `N` and above are northern.
    /// Default: 'U'
    pub utm_band: char,

    /// Plausible easting range (inclusive). Default: [100000, 999999]
    pub easting_range: (f64, f64),

    /// Plausible northing range (inclusive). Default: [0, 10000000]
    pub northing_range: (f64, f64),

    /// Days counted as workdays. Default: Monday to Friday
    pub workdays: Vec<Weekday>,

    /// Average daily hours below which the primary work candidate is rejected.
    /// Default: 3.0
    pub min_work_hours_per_day: f64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            utm_zone: 33,
            utm_band: 'U',
            easting_range: (100_000.0, 999_999.0),
            northing_range: (0.0, 10_000_000.0),
            workdays: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
            min_work_hours_per_day: 3.0,
        }
    }
}

impl InferenceConfig {
    /// Check value domains; returns the parsed UTM zone.
    pub fn validate(&self) -> Result<UtmZone> {
        if !(self.min_work_hours_per_day.is_finite() && self.min_work_hours_per_day >= 0.0) {
            return Err(PlaceMatchError::InvalidConfig(format!(
                "min_work_hours_per_day must be a non-negative number, got {}",
                self.min_work_hours_per_day
            )));
        }
        if self.easting_range.0 > self.easting_range.1
            || self.northing_range.0 > self.northing_range.1
        {
            return Err(PlaceMatchError::InvalidConfig(
                "coordinate ranges must be (min, max)".to_string(),
            ));
        }
        UtmZone::new(self.utm_zone, self.utm_band)
    }

    pub fn is_workday(&self, date: NaiveDate) -> bool {
        self.workdays.contains(&date.weekday())
    }

    /// Whether a projected coordinate lies inside the plausibility bounds.
    pub fn in_projected_bounds(&self, coord: Coord<f64>) -> bool {
        coord.x >= self.easting_range.0
            && coord.x <= self.easting_range.1
            && coord.y >= self.northing_range.0
            && coord.y <= self.northing_range.1
    }
}
