//! Reverse geocoding of significant locations.
//!
//! Address lookup sits outside the pure inference core. A geocoder is any
//! [`ReverseGeocoder`]; failures and empty results leave the location without
//! an address and never fail the user's inference.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{GpsPoint, Result, SignificantLocation};

/// Capability: resolve a coordinate to a human-readable address.
pub trait ReverseGeocoder {
    /// `Ok(None)` means the service had no address for the point.
    fn resolve(&self, point: &GpsPoint) -> Result<Option<String>>;
}

/// Fill in `address` for every location, calling the geocoder at most once
/// per distinct coordinate.
///
/// Returns the number of locations that received an address.
pub fn annotate_addresses<G>(locations: &mut [SignificantLocation], geocoder: &G) -> usize
where
    G: ReverseGeocoder + ?Sized,
{
    let mut lookups: HashMap<(u64, u64), Option<String>> = HashMap::new();
    let mut annotated = 0usize;

    for location in locations.iter_mut() {
        let key = (location.latitude.to_bits(), location.longitude.to_bits());
        let address = lookups
            .entry(key)
            .or_insert_with(|| {
                let point = GpsPoint::new(location.latitude, location.longitude);
                match geocoder.resolve(&point) {
                    Ok(address) => address,
                    Err(e) => {
                        warn!(
                            "[Geocoding] {} ({:.5}, {:.5}) kept without address: {}",
                            location.role, location.latitude, location.longitude, e
                        );
                        None
                    }
                }
            })
            .clone();

        if address.is_some() {
            annotated += 1;
        }
        location.address = address;
    }

    debug!(
        "[Geocoding] {} of {} locations annotated with {} lookups",
        annotated,
        locations.len(),
        lookups.len()
    );
    annotated
}

/// In-memory geocoder answering from a fixed table.
///
/// Points are matched after rounding to `precision` decimal places. Every
/// call is counted, so tests can check how often lookups happen.
#[derive(Debug, Default)]
pub struct StaticGeocoder {
    addresses: HashMap<(i64, i64), String>,
    precision: i32,
    calls: AtomicUsize,
}

impl StaticGeocoder {
    /// Empty table matching at 4 decimal places (~11 m).
    pub fn new() -> Self {
        Self::with_precision(4)
    }

    pub fn with_precision(precision: i32) -> Self {
        Self {
            addresses: HashMap::new(),
            precision,
            calls: AtomicUsize::new(0),
        }
    }

    /// Register an address for a point.
    pub fn insert(&mut self, point: GpsPoint, address: impl Into<String>) {
        let key = self.key(&point);
        self.addresses.insert(key, address.into());
    }

    /// Number of `resolve` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    fn key(&self, point: &GpsPoint) -> (i64, i64) {
        let scale = 10f64.powi(self.precision);
        (
            (point.latitude * scale).round() as i64,
            (point.longitude * scale).round() as i64,
        )
    }
}

impl ReverseGeocoder for StaticGeocoder {
    fn resolve(&self, point: &GpsPoint) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.addresses.get(&self.key(point)).cloned())
    }
}

/// Settings for the network geocoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    /// Reverse endpoint of a Nominatim-compatible service.
    pub endpoint: String,
    /// Nominatim's usage policy requires an identifying user agent.
    pub user_agent: String,
    /// Per-request timeout in seconds. Default: 10
    pub timeout_secs: u64,
    /// Preferred address language (`accept-language`), if any.
    pub language: Option<String>,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://nominatim.openstreetmap.org/reverse".to_string(),
            user_agent: concat!("placematch/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 10,
            language: None,
        }
    }
}

#[cfg(feature = "http")]
pub use self::nominatim::NominatimGeocoder;

#[cfg(feature = "http")]
mod nominatim {
    use std::time::Duration;

    use log::debug;
    use serde::Deserialize;

    use super::{GeocoderConfig, ReverseGeocoder};
    use crate::{GpsPoint, PlaceMatchError, Result};

    #[derive(Debug, Deserialize)]
    struct ReverseResponse {
        display_name: Option<String>,
        error: Option<String>,
    }

    /// Blocking reverse geocoder for Nominatim-compatible services.
    pub struct NominatimGeocoder {
        client: reqwest::blocking::Client,
        config: GeocoderConfig,
    }

    impl NominatimGeocoder {
        pub fn new(config: GeocoderConfig) -> Result<Self> {
            let client = reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .user_agent(config.user_agent.clone())
                .build()
                .map_err(|e| PlaceMatchError::Geocoding(e.to_string()))?;
            Ok(Self { client, config })
        }
    }

    impl ReverseGeocoder for NominatimGeocoder {
        fn resolve(&self, point: &GpsPoint) -> Result<Option<String>> {
            let mut query = vec![
                ("format", "jsonv2".to_string()),
                ("lat", point.latitude.to_string()),
                ("lon", point.longitude.to_string()),
            ];
            if let Some(language) = &self.config.language {
                query.push(("accept-language", language.clone()));
            }

            let response: ReverseResponse = self
                .client
                .get(&self.config.endpoint)
                .query(&query)
                .send()
                .and_then(|r| r.error_for_status())
                .and_then(|r| r.json())
                .map_err(|e| PlaceMatchError::Geocoding(e.to_string()))?;

            if let Some(error) = response.error {
                debug!("[Geocoding] No result for {:?}: {}", point, error);
                return Ok(None);
            }
            Ok(response.display_name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PlaceMatchError;

    struct FailingGeocoder;

    impl ReverseGeocoder for FailingGeocoder {
        fn resolve(&self, _point: &GpsPoint) -> Result<Option<String>> {
            Err(PlaceMatchError::Geocoding("timeout".to_string()))
        }
    }

    fn location(lat: f64, lng: f64) -> SignificantLocation {
        SignificantLocation {
            role: crate::LocationRole::Home,
            cluster_id: 0,
            latitude: lat,
            longitude: lng,
            timestamp: chrono::DateTime::parse_from_rfc3339("2021-10-25T08:00:00+02:00").unwrap(),
            address: Some("stale".to_string()),
            has_multiple_workplaces: false,
        }
    }

    #[test]
    fn test_failure_keeps_location() {
        let mut locations = vec![location(52.5, 13.4)];
        assert_eq!(annotate_addresses(&mut locations, &FailingGeocoder), 0);
        assert_eq!(locations[0].address, None);
        assert_eq!(locations[0].latitude, 52.5);
    }

    #[test]
    fn test_static_rounding() {
        let mut geocoder = StaticGeocoder::new();
        geocoder.insert(GpsPoint::new(52.51631, 13.37770), "Pariser Platz");
        let found = geocoder.resolve(&GpsPoint::new(52.516312, 13.377701)).unwrap();
        assert_eq!(found.as_deref(), Some("Pariser Platz"));
        assert_eq!(geocoder.calls(), 1);
    }
}
