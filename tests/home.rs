//! Tests for home location inference

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use placematch::{
    InferenceConfig, PlaceMatchError, ResolvedStop, Stop, infer, locate_home, reconcile_stops,
};

fn at(s: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(s).unwrap()
}

fn stop(cluster_id: u32, start: &str, end: &str) -> Stop {
    Stop::new(cluster_id, at(start), at(end), 390_000.0, 5_820_000.0).unwrap()
}

fn resolve(stops: &[Stop]) -> Vec<ResolvedStop> {
    reconcile_stops(stops, &HashMap::new(), &InferenceConfig::default()).unwrap()
}

#[test]
fn test_home_is_longest_cluster() {
    let stops = resolve(&[
        stop(0, "2021-10-25T09:00:00+02:00", "2021-10-25T17:00:00+02:00"),
        stop(1, "2021-10-25T18:00:00+02:00", "2021-10-25T23:00:00+02:00"),
        stop(1, "2021-10-26T00:00:00+02:00", "2021-10-26T07:00:00+02:00"),
    ]);
    let home = locate_home(&stops).unwrap();
    assert_eq!(home.cluster_id, 1);
    assert_eq!(home.total_duration, 12.0 * 3600.0);
}

#[test]
fn test_tie_goes_to_lowest_id() {
    let stops = resolve(&[
        stop(2, "2021-10-25T09:00:00+02:00", "2021-10-25T12:00:00+02:00"),
        stop(1, "2021-10-25T13:00:00+02:00", "2021-10-25T16:00:00+02:00"),
    ]);
    assert_eq!(locate_home(&stops).unwrap().cluster_id, 1);
}

#[test]
fn test_representative_is_latest_stop() {
    let stops = resolve(&[
        stop(0, "2021-10-26T20:00:00+02:00", "2021-10-26T23:00:00+02:00"),
        stop(0, "2021-10-25T20:00:00+02:00", "2021-10-25T23:00:00+02:00"),
        stop(3, "2021-10-26T09:00:00+02:00", "2021-10-26T10:00:00+02:00"),
    ]);
    let home = locate_home(&stops).unwrap();
    assert_eq!(home.cluster_id, 0);
    assert_eq!(home.timestamp, at("2021-10-26T20:00:00+02:00"));
}

#[test]
fn test_all_zero_durations_pick_present_cluster() {
    let stops = resolve(&[
        stop(5, "2021-10-25T09:00:00+02:00", "2021-10-25T09:00:00+02:00"),
        stop(3, "2021-10-25T10:00:00+02:00", "2021-10-25T10:00:00+02:00"),
    ]);
    let home = locate_home(&stops).unwrap();
    assert_eq!(home.cluster_id, 3);
    assert_eq!(home.total_duration, 0.0);
}

#[test]
fn test_empty_stops_is_no_stops() {
    assert!(matches!(locate_home(&[]), Err(PlaceMatchError::NoStops)));

    let result = infer(&[], &[], &InferenceConfig::default());
    assert!(matches!(result, Err(PlaceMatchError::NoStops)));
}
