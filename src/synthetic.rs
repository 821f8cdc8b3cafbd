//! Synthetic user histories for testing and benchmarking.
//!
//! Generates a user's days with known ground truth: nights and evenings at
//! home, workday stays at one or more workplaces, occasional errands, and
//! GPS samples along every stop plus unlinked travel samples in between.
//!
//! Feature-gated behind `synthetic`; not included in production builds.
//!
//! # Example
//!
//! ```rust
//! use placematch::synthetic::SyntheticScenario;
//! use placematch::{InferenceConfig, WorkPhase, infer};
//!
//! let dataset = SyntheticScenario::default().generate();
//! let inference = infer(&dataset.samples, &dataset.stops, &InferenceConfig::default()).unwrap();
//!
//! assert_eq!(inference.home.cluster_id, dataset.expected_home);
//! assert_eq!(inference.work.phase, WorkPhase::Primary);
//! ```

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, Utc, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

use crate::projection::latlon_to_utm;
use crate::{ClusterId, GpsPoint, Sample, Stop, UtmZone};

const METERS_PER_DEGREE: f64 = 111_320.0;

// ============================================================================
// Types
// ============================================================================

/// Parameters of a synthetic user.
#[derive(Debug, Clone)]
pub struct SyntheticScenario {
    pub home: GpsPoint,
    /// Workplaces, visited in rotation on workdays (one per day).
    pub workplaces: Vec<GpsPoint>,
    /// Places visited for short errands.
    pub errands: Vec<GpsPoint>,
    /// First simulated day.
    pub start: NaiveDate,
    pub days: u32,
    /// Hours spent at the workplace on each workday.
    pub work_hours: f64,
    /// Probability of an evening errand on any day.
    pub errand_probability: f64,
    pub sample_interval_secs: i64,
    pub gps_noise_sigma_meters: f64,
    /// Fraction of stops whose projected coordinate is made implausible.
    pub out_of_zone_fraction: f64,
    pub utc_offset_hours: i32,
    pub zone: UtmZone,
    pub seed: u64,
}

impl Default for SyntheticScenario {
    fn default() -> Self {
        Self {
            home: GpsPoint::new(52.5200, 13.4050),
            workplaces: vec![GpsPoint::new(52.5163, 13.3777)],
            errands: vec![GpsPoint::new(52.5300, 13.4200), GpsPoint::new(52.5100, 13.4400)],
            // A Monday
            start: NaiveDate::from_ymd_opt(2021, 10, 25).unwrap_or_default(),
            days: 14,
            work_hours: 8.0,
            errand_probability: 0.5,
            sample_interval_secs: 300,
            gps_noise_sigma_meters: 5.0,
            out_of_zone_fraction: 0.0,
            utc_offset_hours: 2,
            zone: UtmZone {
                number: 33,
                band: 'U',
            },
            seed: 42,
        }
    }
}

/// A generated history with ground truth.
#[derive(Debug, Clone)]
pub struct SyntheticDataset {
    pub samples: Vec<Sample>,
    pub stops: Vec<Stop>,
    pub expected_home: ClusterId,
    /// Workplace cluster ids in rotation order.
    pub workplace_ids: Vec<ClusterId>,
}

// ============================================================================
// Generation
// ============================================================================

impl SyntheticScenario {
    pub const HOME_ID: ClusterId = 0;

    fn workplace_id(&self, idx: usize) -> ClusterId {
        1 + idx as ClusterId
    }

    fn errand_id(&self, idx: usize) -> ClusterId {
        1 + (self.workplaces.len() + idx) as ClusterId
    }

    /// Generate the dataset. Same scenario and seed, same output.
    pub fn generate(&self) -> SyntheticDataset {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let offset = FixedOffset::east_opt(self.utc_offset_hours * 3600)
            .unwrap_or_else(|| Utc.fix());

        // (cluster, place, start, stop)
        let mut visits: Vec<(ClusterId, GpsPoint, DateTime<FixedOffset>, DateTime<FixedOffset>)> =
            Vec::new();
        let mut workday_index = 0usize;

        for day in 0..self.days {
            let date = self.start + Duration::days(i64::from(day));
            let at = |secs: i64| local_time(date, secs, offset);
            let is_workday = !matches!(date.weekday(), Weekday::Sat | Weekday::Sun);

            if is_workday {
                visits.push((Self::HOME_ID, self.home, at(0), at(7 * 3600 + 1800)));
                if !self.workplaces.is_empty() {
                    let idx = workday_index % self.workplaces.len();
                    let begin = 9 * 3600;
                    let end = begin + (self.work_hours * 3600.0) as i64;
                    visits.push((self.workplace_id(idx), self.workplaces[idx], at(begin), at(end)));
                    workday_index += 1;
                }
            } else {
                visits.push((Self::HOME_ID, self.home, at(0), at(10 * 3600)));
            }

            if !self.errands.is_empty() && rng.gen_bool(self.errand_probability.clamp(0.0, 1.0)) {
                let idx = rng.gen_range(0..self.errands.len());
                visits.push((self.errand_id(idx), self.errands[idx], at(18 * 3600 + 1800), at(19 * 3600 + 900)));
            }

            visits.push((Self::HOME_ID, self.home, at(20 * 3600), at(86_399)));
        }

        let mut stops = Vec::with_capacity(visits.len());
        let mut samples = Vec::new();
        let interval = Duration::seconds(self.sample_interval_secs.max(1));

        for (i, (cluster_id, place, start, end)) in visits.iter().enumerate() {
            let mut coord = latlon_to_utm(place, self.zone);
            if rng.gen_bool(self.out_of_zone_fraction.clamp(0.0, 1.0)) {
                coord.x = 50_000.0;
            }
            stops.push(Stop {
                cluster_id: *cluster_id,
                start: *start,
                stop: *end,
                duration: (*end - *start).num_milliseconds() as f64 / 1000.0,
                x: coord.x,
                y: coord.y,
            });

            let mut ts = *start;
            while ts <= *end {
                let p = self.jitter(place, &mut rng);
                samples.push(Sample {
                    ts,
                    latitude: p.latitude,
                    longitude: p.longitude,
                    altitude: 35.0,
                    accuracy: self.gps_noise_sigma_meters,
                    motion_score: rng.gen_range(0.0..50.0),
                });
                ts += interval;
            }

            // One travel sample halfway to the next stop
            if let Some((_, next_place, next_start, _)) = visits.get(i + 1) {
                let gap = *next_start - *end;
                if gap > Duration::seconds(2) {
                    let mid = GpsPoint::new(
                        (place.latitude + next_place.latitude) / 2.0,
                        (place.longitude + next_place.longitude) / 2.0,
                    );
                    samples.push(Sample {
                        ts: *end + gap / 2,
                        latitude: mid.latitude,
                        longitude: mid.longitude,
                        altitude: 35.0,
                        accuracy: self.gps_noise_sigma_meters,
                        motion_score: rng.gen_range(300.0..900.0),
                    });
                }
            }
        }

        SyntheticDataset {
            samples,
            stops,
            expected_home: Self::HOME_ID,
            workplace_ids: (0..self.workplaces.len())
                .map(|idx| self.workplace_id(idx))
                .collect(),
        }
    }

    /// Gaussian offset of the point (Box-Muller).
    fn jitter(&self, point: &GpsPoint, rng: &mut StdRng) -> GpsPoint {
        if self.gps_noise_sigma_meters <= 0.0 {
            return *point;
        }
        let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
        let u2: f64 = rng.gen::<f64>();
        let radius = (-2.0 * u1.ln()).sqrt() * self.gps_noise_sigma_meters;
        let (north, east) = (radius * (2.0 * PI * u2).cos(), radius * (2.0 * PI * u2).sin());
        GpsPoint::new(
            point.latitude + north / METERS_PER_DEGREE,
            point.longitude + east / (METERS_PER_DEGREE * point.latitude.to_radians().cos()),
        )
    }
}

fn local_time(date: NaiveDate, secs: i64, offset: FixedOffset) -> DateTime<FixedOffset> {
    let naive = date.and_time(NaiveTime::default()) + Duration::seconds(secs)
        - Duration::seconds(i64::from(offset.local_minus_utc()));
    DateTime::from_naive_utc_and_offset(naive, offset)
}
