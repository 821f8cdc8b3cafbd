//! UTM projection and stop coordinate reconciliation.
//!
//! Stops arrive with projected (UTM) coordinates in one fixed zone. Subjects
//! who travel far from the study region produce coordinates outside that
//! zone's plausible range; those stops take the position of a linked sample
//! instead of a converted one.
//!
//! The projection uses the WGS84 ellipsoid and the series expansions from
//! Snyder, "Map Projections: A Working Manual" (USGS 1395), pp. 61-64.

use std::collections::HashMap;
use std::f64::consts::PI;

use geo::Coord;
use log::{debug, warn};

use crate::{
    ClusterId, CoordinateSource, GpsPoint, InferenceConfig, PlaceMatchError, ResolvedStop, Result,
    Stop,
};

const K0: f64 = 0.9996;
const EQUATORIAL_RADIUS: f64 = 6_378_137.0;
/// First eccentricity squared (WGS84)
const E: f64 = 0.006_694_38;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// A UTM zone number with its latitude band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtmZone {
    pub number: u8,
    pub band: char,
}

impl UtmZone {
    /// Validate zone number (1-60) and band letter (C-X, without I and O).
    pub fn new(number: u8, band: char) -> Result<Self> {
        if !(1..=60).contains(&number) {
            return Err(PlaceMatchError::InvalidConfig(format!(
                "UTM zone must be within 1..=60, got {}",
                number
            )));
        }
        let band = band.to_ascii_uppercase();
        if !('C'..='X').contains(&band) || band == 'I' || band == 'O' {
            return Err(PlaceMatchError::InvalidConfig(format!(
                "invalid UTM latitude band '{}'",
                band
            )));
        }
        Ok(Self { number, band })
    }

    pub fn is_northern(&self) -> bool {
        self.band >= 'N'
    }

    /// Central meridian of the zone in degrees.
    pub fn central_longitude(&self) -> f64 {
        f64::from(self.number) * 6.0 - 183.0
    }
}

/// Convert a UTM coordinate in `zone` to latitude/longitude.
///
/// No bounds are checked here; see [`reconcile_stops`].
///
/// # Example
/// ```
/// use geo::Coord;
/// use placematch::projection::utm_to_latlon;
/// use placematch::UtmZone;
///
/// let zone = UtmZone::new(33, 'U').unwrap();
/// let p = utm_to_latlon(Coord { x: 500_000.0, y: 0.0 }, zone);
/// assert!(p.latitude.abs() < 1e-9);
/// assert!((p.longitude - 15.0).abs() < 1e-9);
/// ```
pub fn utm_to_latlon(coord: Coord<f64>, zone: UtmZone) -> GpsPoint {
    let e2 = E * E;
    let e3 = e2 * E;
    let e_p2 = E / (1.0 - E);

    let sqrt_e = (1.0 - E).sqrt();
    let n1 = (1.0 - sqrt_e) / (1.0 + sqrt_e);
    let n2 = n1 * n1;
    let n3 = n2 * n1;
    let n4 = n3 * n1;
    let n5 = n4 * n1;

    let m1 = 1.0 - E / 4.0 - 3.0 * e2 / 64.0 - 5.0 * e3 / 256.0;
    let p2 = 3.0 / 2.0 * n1 - 27.0 / 32.0 * n3 + 269.0 / 512.0 * n5;
    let p3 = 21.0 / 16.0 * n2 - 55.0 / 32.0 * n4;
    let p4 = 151.0 / 96.0 * n3 - 417.0 / 128.0 * n5;
    let p5 = 1097.0 / 512.0 * n4;

    let x = coord.x - FALSE_EASTING;
    let y = if zone.is_northern() {
        coord.y
    } else {
        coord.y - FALSE_NORTHING_SOUTH
    };

    let m = y / K0;
    let mu = m / (EQUATORIAL_RADIUS * m1);

    // Footpoint latitude
    let p_rad = mu
        + p2 * (2.0 * mu).sin()
        + p3 * (4.0 * mu).sin()
        + p4 * (6.0 * mu).sin()
        + p5 * (8.0 * mu).sin();

    let p_sin = p_rad.sin();
    let p_sin2 = p_sin * p_sin;
    let p_cos = p_rad.cos();
    let p_tan = p_sin / p_cos;
    let p_tan2 = p_tan * p_tan;
    let p_tan4 = p_tan2 * p_tan2;

    let ep_sin = 1.0 - E * p_sin2;
    let n = EQUATORIAL_RADIUS / ep_sin.sqrt();
    let r = (1.0 - E) / ep_sin;

    let c = e_p2 * p_cos * p_cos;
    let c2 = c * c;

    let d = x / (n * K0);
    let d2 = d * d;
    let d3 = d2 * d;
    let d4 = d3 * d;
    let d5 = d4 * d;
    let d6 = d5 * d;

    let latitude = p_rad
        - (p_tan / r)
            * (d2 / 2.0 - d4 / 24.0 * (5.0 + 3.0 * p_tan2 + 10.0 * c - 4.0 * c2 - 9.0 * e_p2)
                + d6 / 720.0
                    * (61.0 + 90.0 * p_tan2 + 298.0 * c + 45.0 * p_tan4 - 252.0 * e_p2 - 3.0 * c2));

    let longitude = (d - d3 / 6.0 * (1.0 + 2.0 * p_tan2 + c)
        + d5 / 120.0 * (5.0 - 2.0 * c + 28.0 * p_tan2 - 3.0 * c2 + 8.0 * e_p2 + 24.0 * p_tan4))
        / p_cos;

    let longitude = wrap_longitude(longitude.to_degrees() + zone.central_longitude());

    GpsPoint::new(latitude.to_degrees(), longitude)
}

/// Project a latitude/longitude into `zone`.
///
/// The point is projected relative to the zone's central meridian even when
/// it lies outside the zone, so far-away points yield implausible eastings.
pub fn latlon_to_utm(point: &GpsPoint, zone: UtmZone) -> Coord<f64> {
    let e2 = E * E;
    let e3 = e2 * E;
    let e_p2 = E / (1.0 - E);

    let m1 = 1.0 - E / 4.0 - 3.0 * e2 / 64.0 - 5.0 * e3 / 256.0;
    let m2 = 3.0 * E / 8.0 + 3.0 * e2 / 32.0 + 45.0 * e3 / 1024.0;
    let m3 = 15.0 * e2 / 256.0 + 45.0 * e3 / 1024.0;
    let m4 = 35.0 * e3 / 3072.0;

    let lat_rad = point.latitude.to_radians();
    let lat_sin = lat_rad.sin();
    let lat_cos = lat_rad.cos();
    let lat_tan = lat_sin / lat_cos;
    let lat_tan2 = lat_tan * lat_tan;
    let lat_tan4 = lat_tan2 * lat_tan2;

    let delta_lon = wrap_longitude(point.longitude - zone.central_longitude()).to_radians();

    let n = EQUATORIAL_RADIUS / (1.0 - E * lat_sin * lat_sin).sqrt();
    let c = e_p2 * lat_cos * lat_cos;

    let a = lat_cos * delta_lon;
    let a2 = a * a;
    let a3 = a2 * a;
    let a4 = a3 * a;
    let a5 = a4 * a;
    let a6 = a5 * a;

    let m = EQUATORIAL_RADIUS
        * (m1 * lat_rad - m2 * (2.0 * lat_rad).sin() + m3 * (4.0 * lat_rad).sin()
            - m4 * (6.0 * lat_rad).sin());

    let easting = K0
        * n
        * (a + a3 / 6.0 * (1.0 - lat_tan2 + c)
            + a5 / 120.0 * (5.0 - 18.0 * lat_tan2 + lat_tan4 + 72.0 * c - 58.0 * e_p2))
        + FALSE_EASTING;

    let mut northing = K0
        * (m + n
            * lat_tan
            * (a2 / 2.0
                + a4 / 24.0 * (5.0 - lat_tan2 + 9.0 * c + 4.0 * c * c)
                + a6 / 720.0 * (61.0 - 58.0 * lat_tan2 + lat_tan4 + 600.0 * c - 330.0 * e_p2)));

    if point.latitude < 0.0 {
        northing += FALSE_NORTHING_SOUTH;
    }

    Coord {
        x: easting,
        y: northing,
    }
}

/// Normalize a longitude in degrees to [-180, 180).
fn wrap_longitude(degrees: f64) -> f64 {
    let radians = degrees.to_radians();
    ((radians + PI).rem_euclid(2.0 * PI) - PI).to_degrees()
}

/// Resolve the geodetic coordinate of every stop.
///
/// Stops whose projected coordinate is inside the configured bounds are
/// converted; all others take the first sample linked to their cluster
/// (`fallbacks`). A stop that is out of bounds and has no fallback makes the
/// whole user unresolvable.
pub fn reconcile_stops(
    stops: &[Stop],
    fallbacks: &HashMap<ClusterId, GpsPoint>,
    config: &InferenceConfig,
) -> Result<Vec<ResolvedStop>> {
    let zone = config.validate()?;
    let mut out_of_bounds = 0usize;

    let resolved = stops
        .iter()
        .map(|stop| -> Result<ResolvedStop> {
            let projected = stop.projected();
            if config.in_projected_bounds(projected) {
                return Ok(ResolvedStop {
                    stop: stop.clone(),
                    position: utm_to_latlon(projected, zone),
                    source: CoordinateSource::Projected,
                });
            }

            out_of_bounds += 1;
            warn!(
                "[Projection] Stop of cluster {} at ({}, {}) is outside zone {}{} bounds, using linked sample",
                stop.cluster_id, stop.x, stop.y, zone.number, zone.band
            );
            let fallback = fallbacks.get(&stop.cluster_id).copied().ok_or(
                PlaceMatchError::UnresolvableStop {
                    cluster_id: stop.cluster_id,
                    x: stop.x,
                    y: stop.y,
                },
            )?;
            Ok(ResolvedStop {
                stop: stop.clone(),
                position: GpsPoint::new(fallback.latitude, fallback.longitude),
                source: CoordinateSource::LinkedSample,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    debug!(
        "[Projection] Resolved {} stops ({} from linked samples)",
        resolved.len(),
        out_of_bounds
    );
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone33u() -> UtmZone {
        UtmZone::new(33, 'U').unwrap()
    }

    #[test]
    fn test_central_meridian() {
        assert_eq!(zone33u().central_longitude(), 15.0);
        assert_eq!(UtmZone::new(1, 'C').unwrap().central_longitude(), -177.0);
        assert_eq!(UtmZone::new(60, 'X').unwrap().central_longitude(), 177.0);
    }

    #[test]
    fn test_invalid_zone() {
        assert!(UtmZone::new(0, 'U').is_err());
        assert!(UtmZone::new(61, 'U').is_err());
        assert!(UtmZone::new(33, 'I').is_err());
        assert!(UtmZone::new(33, 'Z').is_err());
        assert!(UtmZone::new(33, 'u').is_ok());
    }

    #[test]
    fn test_hemisphere() {
        assert!(zone33u().is_northern());
        assert!(UtmZone::new(33, 'N').unwrap().is_northern());
        assert!(!UtmZone::new(33, 'M').unwrap().is_northern());
    }

    #[test]
    fn test_wrap_longitude() {
        assert!((wrap_longitude(190.0) - -170.0).abs() < 1e-9);
        assert!((wrap_longitude(-190.0) - 170.0).abs() < 1e-9);
        assert!((wrap_longitude(13.4) - 13.4).abs() < 1e-9);
    }

    #[test]
    fn test_southern_round_trip() {
        let zone = UtmZone::new(56, 'H').unwrap();
        let sydney = GpsPoint::new(-33.8688, 151.2093);
        let back = utm_to_latlon(latlon_to_utm(&sydney, zone), zone);
        assert!((back.latitude - sydney.latitude).abs() < 1e-6);
        assert!((back.longitude - sydney.longitude).abs() < 1e-6);
    }
}
