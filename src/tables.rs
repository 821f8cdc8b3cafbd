//! Sample and stop tables.
//!
//! Tables are CSV with a header row; column names are the contract:
//!
//! - samples: `ts, latitude, longitude, altitude, accuracy, motion_score`
//! - stops: `unique_id, start, stop, duration, x, y`
//!
//! Extra columns are ignored, so tables written by a previous run (with
//! `stop_id`, `latitude`, `longitude`) load unchanged.
//!
//! A user's data lives in one directory:
//!
//! ```text
//! <data>/<user>/gps_samples_and_motion_score.csv   (or legacy source.csv)
//! <data>/<user>/stops.csv
//! <data>/<user>/significant_locations.json         (written)
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::inference::Inference;
use crate::{
    ClusterId, CoordinateSource, OptionExt, PlaceMatchError, ResolvedStop, Result, Sample,
    SignificantLocation, Stop, TaggedSample,
};

pub const SAMPLES_FILE: &str = "gps_samples_and_motion_score.csv";
pub const LEGACY_SAMPLES_FILE: &str = "source.csv";
pub const STOPS_FILE: &str = "stops.csv";
pub const LOCATIONS_FILE: &str = "significant_locations.json";

/// Offset-aware layouts accepted besides RFC 3339.
const TIMESTAMP_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

/// Parse an ISO-8601 timestamp that carries a UTC offset.
///
/// Naive timestamps are rejected: without an offset they cannot be compared
/// with the other table.
pub fn parse_timestamp(value: &str) -> Result<DateTime<FixedOffset>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts);
    }
    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = DateTime::parse_from_str(value, format) {
            return Ok(ts);
        }
    }

    let naive = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .any(|format| NaiveDateTime::parse_from_str(value, format).is_ok());
    Err(PlaceMatchError::InvalidTimestamp {
        value: value.to_string(),
        reason: if naive {
            "timestamp has no UTC offset".to_string()
        } else {
            "unrecognized timestamp format".to_string()
        },
    })
}

/// Format a timestamp the way tables are written.
pub fn format_timestamp(ts: &DateTime<FixedOffset>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.f%:z").to_string()
}

// ============================================================================
// Rows
// ============================================================================

#[derive(Debug, Deserialize)]
struct SampleRecord {
    ts: String,
    latitude: f64,
    longitude: f64,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    altitude: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    accuracy: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    motion_score: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct StopRecord {
    unique_id: i64,
    start: String,
    stop: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    duration: Option<f64>,
    x: f64,
    y: f64,
}

#[derive(Debug, Serialize)]
struct TaggedSampleRow {
    ts: String,
    latitude: f64,
    longitude: f64,
    altitude: f64,
    accuracy: f64,
    motion_score: f64,
    stop_id: i64,
}

#[derive(Debug, Serialize)]
struct ResolvedStopRow {
    unique_id: ClusterId,
    start: String,
    stop: String,
    duration: f64,
    x: f64,
    y: f64,
    latitude: f64,
    longitude: f64,
    coordinate_source: CoordinateSource,
}

// ============================================================================
// Reading
// ============================================================================

/// Read a sample table.
pub fn read_samples<R: Read>(reader: R) -> Result<Vec<Sample>> {
    let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    csv.deserialize::<SampleRecord>()
        .map(|record| -> Result<Sample> {
            let record = record?;
            Ok(Sample {
                ts: parse_timestamp(&record.ts)?,
                latitude: record.latitude,
                longitude: record.longitude,
                altitude: record.altitude.unwrap_or(0.0),
                accuracy: record.accuracy.unwrap_or(0.0),
                motion_score: record.motion_score.unwrap_or(0.0),
            })
        })
        .collect()
}

/// Read a stop table.
///
/// A missing `duration` is derived from the interval; a present one must
/// match it.
pub fn read_stops<R: Read>(reader: R) -> Result<Vec<Stop>> {
    let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    csv.deserialize::<StopRecord>()
        .map(|record| -> Result<Stop> {
            let record = record?;
            let cluster_id = ClusterId::try_from(record.unique_id).ok().ok_or_invalid_stop(
                record.unique_id,
                "cluster id must be a non-negative 32-bit integer",
            )?;
            let start = parse_timestamp(&record.start)?;
            let stop = parse_timestamp(&record.stop)?;
            match record.duration {
                Some(duration) => {
                    Stop::with_duration(cluster_id, start, stop, duration, record.x, record.y)
                }
                None => Stop::new(cluster_id, start, stop, record.x, record.y),
            }
        })
        .collect()
}

pub fn read_samples_path(path: &Path) -> Result<Vec<Sample>> {
    read_samples(BufReader::new(File::open(path)?))
}

pub fn read_stops_path(path: &Path) -> Result<Vec<Stop>> {
    read_stops(BufReader::new(File::open(path)?))
}

// ============================================================================
// Writing
// ============================================================================

/// Write samples with their `stop_id` column (-1 when unlinked).
pub fn write_tagged_samples<W: Write>(writer: W, samples: &[TaggedSample]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for tagged in samples {
        let s = &tagged.sample;
        csv.serialize(TaggedSampleRow {
            ts: format_timestamp(&s.ts),
            latitude: s.latitude,
            longitude: s.longitude,
            altitude: s.altitude,
            accuracy: s.accuracy,
            motion_score: s.motion_score,
            stop_id: tagged.stop_id_column(),
        })?;
    }
    csv.flush()?;
    Ok(())
}

/// Write stops with their reconciled `latitude`/`longitude`.
pub fn write_resolved_stops<W: Write>(writer: W, stops: &[ResolvedStop]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for resolved in stops {
        let s = &resolved.stop;
        csv.serialize(ResolvedStopRow {
            unique_id: s.cluster_id,
            start: format_timestamp(&s.start),
            stop: format_timestamp(&s.stop),
            duration: s.duration,
            x: s.x,
            y: s.y,
            latitude: resolved.position.latitude,
            longitude: resolved.position.longitude,
            coordinate_source: resolved.source,
        })?;
    }
    csv.flush()?;
    Ok(())
}

// ============================================================================
// User directories
// ============================================================================

/// One user's data directory.
#[derive(Debug, Clone)]
pub struct UserDir {
    root: PathBuf,
}

impl UserDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// User name: the directory's final component.
    pub fn user(&self) -> String {
        self.root
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sample table path, preferring the current name over the legacy one.
    pub fn samples_path(&self) -> PathBuf {
        let current = self.root.join(SAMPLES_FILE);
        let legacy = self.root.join(LEGACY_SAMPLES_FILE);
        if !current.exists() && legacy.exists() {
            legacy
        } else {
            current
        }
    }

    pub fn stops_path(&self) -> PathBuf {
        self.root.join(STOPS_FILE)
    }

    pub fn locations_path(&self) -> PathBuf {
        self.root.join(LOCATIONS_FILE)
    }

    /// Whether the directory holds both input tables.
    pub fn is_complete(&self) -> bool {
        self.samples_path().is_file() && self.stops_path().is_file()
    }

    /// Load both input tables.
    pub fn load(&self) -> Result<(Vec<Sample>, Vec<Stop>)> {
        let samples = read_samples_path(&self.samples_path())?;
        let stops = read_stops_path(&self.stops_path())?;
        debug!(
            "[Tables] {}: {} samples, {} stops",
            self.user(),
            samples.len(),
            stops.len()
        );
        Ok((samples, stops))
    }

    /// Write the tagged sample table, resolved stop table and locations.
    ///
    /// Samples are always written under the current file name.
    pub fn write_outputs(
        &self,
        inference: &Inference,
        locations: &[SignificantLocation],
    ) -> Result<()> {
        let samples = BufWriter::new(File::create(self.root.join(SAMPLES_FILE))?);
        write_tagged_samples(samples, &inference.samples)?;

        let stops = BufWriter::new(File::create(self.stops_path())?);
        write_resolved_stops(stops, &inference.stops)?;

        let mut json = BufWriter::new(File::create(self.locations_path())?);
        serde_json::to_writer_pretty(&mut json, locations)?;
        json.flush()?;
        Ok(())
    }

    /// Read back previously written locations.
    pub fn read_locations(&self) -> Result<Vec<SignificantLocation>> {
        let file = BufReader::new(File::open(self.locations_path())?);
        Ok(serde_json::from_reader(file)?)
    }
}

/// User directories under `data`, sorted by name. Incomplete ones are skipped.
pub fn discover_users(data: &Path) -> Result<Vec<UserDir>> {
    let mut users: Vec<UserDir> = std::fs::read_dir(data)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .map(UserDir::new)
        .filter(|dir| {
            let complete = dir.is_complete();
            if !complete {
                debug!("[Tables] Skipping {}: missing input tables", dir.root().display());
            }
            complete
        })
        .collect();
    users.sort_by(|a, b| a.root.cmp(&b.root));
    Ok(users)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_space_separated() {
        let ts = parse_timestamp("2021-10-27 10:15:00+02:00").unwrap();
        assert_eq!(ts.offset().local_minus_utc(), 7200);
    }

    #[test]
    fn test_parse_fractional_seconds() {
        let ts = parse_timestamp("2021-10-27T10:15:00.250+01:00").unwrap();
        assert_eq!(ts.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn test_naive_rejected() {
        match parse_timestamp("2021-10-27 10:15:00") {
            Err(PlaceMatchError::InvalidTimestamp { reason, .. }) => {
                assert!(reason.contains("offset"))
            }
            other => panic!("expected InvalidTimestamp, got {:?}", other),
        }
    }

    #[test]
    fn test_format_round_trip() {
        let ts = parse_timestamp("2021-10-27 10:15:00+02:00").unwrap();
        assert_eq!(parse_timestamp(&format_timestamp(&ts)).unwrap(), ts);
    }
}
