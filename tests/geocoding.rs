//! Tests for address annotation

use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::DateTime;
use placematch::{
    GpsPoint, LocationRole, PlaceMatchError, Result, ReverseGeocoder, SignificantLocation,
    StaticGeocoder, annotate_addresses,
};

fn location(role: LocationRole, cluster_id: u32, latitude: f64, longitude: f64) -> SignificantLocation {
    SignificantLocation {
        role,
        cluster_id,
        latitude,
        longitude,
        timestamp: DateTime::parse_from_rfc3339("2021-10-27T08:00:00+02:00").unwrap(),
        address: None,
        has_multiple_workplaces: false,
    }
}

/// Fails every other call.
struct FlakyGeocoder {
    calls: AtomicUsize,
}

impl ReverseGeocoder for FlakyGeocoder {
    fn resolve(&self, point: &GpsPoint) -> Result<Option<String>> {
        if self.calls.fetch_add(1, Ordering::Relaxed) % 2 == 0 {
            Err(PlaceMatchError::Geocoding("timeout".to_string()))
        } else {
            Ok(Some(format!("{:.3}, {:.3}", point.latitude, point.longitude)))
        }
    }
}

#[test]
fn test_one_lookup_per_location() {
    let mut geocoder = StaticGeocoder::new();
    geocoder.insert(GpsPoint::new(52.5200, 13.4050), "Alexanderplatz 1, Berlin");
    geocoder.insert(GpsPoint::new(52.5163, 13.3777), "Pariser Platz, Berlin");

    let mut locations = vec![
        location(LocationRole::Home, 0, 52.5200, 13.4050),
        location(LocationRole::Work, 1, 52.5163, 13.3777),
        location(LocationRole::Work, 2, 52.5300, 13.4200),
    ];

    let annotated = annotate_addresses(&mut locations, &geocoder);
    assert_eq!(annotated, 2);
    assert_eq!(geocoder.calls(), 3);
    assert_eq!(locations[0].address.as_deref(), Some("Alexanderplatz 1, Berlin"));
    assert_eq!(locations[2].address, None);
}

#[test]
fn test_shared_coordinate_resolved_once() {
    let mut geocoder = StaticGeocoder::new();
    geocoder.insert(GpsPoint::new(52.5200, 13.4050), "Home and office");

    let mut locations = vec![
        location(LocationRole::Home, 0, 52.5200, 13.4050),
        location(LocationRole::Work, 3, 52.5200, 13.4050),
    ];

    assert_eq!(annotate_addresses(&mut locations, &geocoder), 2);
    assert_eq!(geocoder.calls(), 1);
}

#[test]
fn test_failures_leave_address_empty() {
    let geocoder = FlakyGeocoder {
        calls: AtomicUsize::new(0),
    };
    let mut locations = vec![
        location(LocationRole::Home, 0, 52.5200, 13.4050),
        location(LocationRole::Work, 1, 52.5163, 13.3777),
    ];

    let annotated = annotate_addresses(&mut locations, &geocoder);
    assert_eq!(annotated, 1);
    assert_eq!(locations[0].address, None);
    assert_eq!(locations[1].address.as_deref(), Some("52.516, 13.378"));
    assert_eq!(locations.len(), 2);
}
