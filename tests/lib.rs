//! Tests for lib.rs core types and configuration

use chrono::{DateTime, FixedOffset, NaiveDate, Weekday};
use geo::Coord;
use placematch::{
    GpsPoint, InferenceConfig, LocationRole, PlaceMatchError, Sample, Stop, TaggedSample,
    UNLINKED_STOP_ID,
};

fn at(s: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(s).unwrap()
}

#[test]
fn test_gps_point_validation() {
    assert!(GpsPoint::new(52.5163, 13.3777).is_valid());
    assert!(!GpsPoint::new(91.0, 0.0).is_valid());
    assert!(!GpsPoint::new(0.0, 181.0).is_valid());
    assert!(!GpsPoint::new(f64::NAN, 0.0).is_valid());
}

#[test]
fn test_stop_derives_duration() {
    let stop = Stop::new(
        3,
        at("2021-10-27T08:00:00+02:00"),
        at("2021-10-27T09:30:00+02:00"),
        390_000.0,
        5_820_000.0,
    )
    .unwrap();
    assert_eq!(stop.duration, 5400.0);
    assert_eq!(stop.start_weekday(), Weekday::Wed);
    assert_eq!(stop.start_date(), NaiveDate::from_ymd_opt(2021, 10, 27).unwrap());
}

#[test]
fn test_stop_duration_tolerance() {
    let start = at("2021-10-27T08:00:00+02:00");
    let end = at("2021-10-27T09:00:00+02:00");

    assert!(Stop::with_duration(1, start, end, 3600.5, 0.0, 0.0).is_ok());
    assert!(matches!(
        Stop::with_duration(1, start, end, 3700.0, 0.0, 0.0),
        Err(PlaceMatchError::InvalidStop { cluster_id: 1, .. })
    ));
}

#[test]
fn test_stop_before_start_rejected() {
    let result = Stop::new(
        2,
        at("2021-10-27T09:00:00+02:00"),
        at("2021-10-27T08:00:00+02:00"),
        0.0,
        0.0,
    );
    assert!(matches!(result, Err(PlaceMatchError::InvalidStop { .. })));
}

#[test]
fn test_stop_contains_is_inclusive() {
    let stop = Stop::new(
        0,
        at("2021-10-27T08:00:00+02:00"),
        at("2021-10-27T09:00:00+02:00"),
        0.0,
        0.0,
    )
    .unwrap();
    assert!(stop.contains(&at("2021-10-27T08:00:00+02:00")));
    assert!(stop.contains(&at("2021-10-27T09:00:00+02:00")));
    // Same instant written in another offset
    assert!(stop.contains(&at("2021-10-27T06:30:00+00:00")));
    assert!(!stop.contains(&at("2021-10-27T09:00:00.001+02:00")));
}

#[test]
fn test_unlinked_sentinel() {
    let sample = Sample::new(at("2021-10-27T08:00:00+02:00"), 52.5, 13.4);
    let unlinked = TaggedSample {
        sample: sample.clone(),
        stop_id: None,
    };
    let linked = TaggedSample {
        sample,
        stop_id: Some(12),
    };
    assert_eq!(unlinked.stop_id_column(), UNLINKED_STOP_ID);
    assert_eq!(linked.stop_id_column(), 12);
}

#[test]
fn test_default_config() {
    let config = InferenceConfig::default();
    let zone = config.validate().unwrap();
    assert_eq!(zone.number, 33);
    assert!(zone.is_northern());
    assert_eq!(config.min_work_hours_per_day, 3.0);

    // 2021-10-29 is a Friday, 2021-10-30 a Saturday
    assert!(config.is_workday(NaiveDate::from_ymd_opt(2021, 10, 29).unwrap()));
    assert!(!config.is_workday(NaiveDate::from_ymd_opt(2021, 10, 30).unwrap()));
}

#[test]
fn test_config_validation() {
    let config = InferenceConfig {
        min_work_hours_per_day: -1.0,
        ..InferenceConfig::default()
    };
    assert!(matches!(config.validate(), Err(PlaceMatchError::InvalidConfig(_))));

    let config = InferenceConfig {
        easting_range: (900_000.0, 100_000.0),
        ..InferenceConfig::default()
    };
    assert!(config.validate().is_err());

    let config = InferenceConfig {
        utm_band: 'O',
        ..InferenceConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_projected_bounds() {
    let config = InferenceConfig::default();
    assert!(config.in_projected_bounds(Coord { x: 390_000.0, y: 5_820_000.0 }));
    assert!(!config.in_projected_bounds(Coord { x: 50_000.0, y: 5_820_000.0 }));
    assert!(!config.in_projected_bounds(Coord { x: 390_000.0, y: -1.0 }));
    assert!(!config.in_projected_bounds(Coord { x: f64::NAN, y: 5_820_000.0 }));
}

#[test]
fn test_config_from_partial_json() {
    let config: InferenceConfig =
        serde_json::from_str(r#"{ "utm_zone": 32, "workdays": ["Sun", "Mon", "Tue", "Wed", "Thu"] }"#)
            .unwrap();
    assert_eq!(config.utm_zone, 32);
    assert_eq!(config.utm_band, 'U');
    assert!(config.is_workday(NaiveDate::from_ymd_opt(2021, 10, 31).unwrap()));
    assert!(!config.is_workday(NaiveDate::from_ymd_opt(2021, 10, 29).unwrap()));
}

#[test]
fn test_location_role_serde() {
    assert_eq!(serde_json::to_string(&LocationRole::Home).unwrap(), "\"home\"");
    assert_eq!(LocationRole::Work.to_string(), "work");
}
