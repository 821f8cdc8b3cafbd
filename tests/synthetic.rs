//! Inference on generated users with known ground truth

#![cfg(feature = "synthetic")]

use placematch::synthetic::SyntheticScenario;
use placematch::{GpsPoint, InferenceConfig, WorkPhase, infer, link_samples};

#[test]
fn test_single_workplace_user() {
    let dataset = SyntheticScenario::default().generate();
    let inference = infer(&dataset.samples, &dataset.stops, &InferenceConfig::default()).unwrap();

    assert_eq!(inference.home.cluster_id, dataset.expected_home);
    assert_eq!(inference.work.phase, WorkPhase::Primary);
    let ids: Vec<_> = inference.work.candidates.iter().map(|w| w.cluster_id).collect();
    assert_eq!(ids, dataset.workplace_ids);
    assert!(inference.stats.unlinked_samples > 0);
}

#[test]
fn test_rotating_workplaces_fall_back_to_day_grouping() {
    let scenario = SyntheticScenario {
        workplaces: vec![
            GpsPoint::new(52.5163, 13.3777),
            GpsPoint::new(52.4900, 13.3900),
            GpsPoint::new(52.5450, 13.3600),
        ],
        work_hours: 4.0,
        days: 21,
        ..SyntheticScenario::default()
    };
    let dataset = scenario.generate();
    let inference = infer(&dataset.samples, &dataset.stops, &InferenceConfig::default()).unwrap();

    assert_eq!(inference.work.phase, WorkPhase::DayGrouped);
    let ids: Vec<_> = inference.work.candidates.iter().map(|w| w.cluster_id).collect();
    assert_eq!(ids, dataset.workplace_ids);
    assert!(inference.work.has_multiple_workplaces());
}

#[test]
fn test_out_of_zone_stops_use_samples() {
    let scenario = SyntheticScenario {
        out_of_zone_fraction: 0.3,
        ..SyntheticScenario::default()
    };
    let dataset = scenario.generate();
    let inference = infer(&dataset.samples, &dataset.stops, &InferenceConfig::default()).unwrap();

    assert!(inference.stats.fallback_stops > 0);
    assert_eq!(inference.home.cluster_id, dataset.expected_home);
    // Fallback positions are real samples near Berlin, not projected from x = 50000
    assert!(inference.stops.iter().all(|s| (s.position.latitude - 52.5).abs() < 0.1));
}

#[test]
fn test_generation_is_deterministic() {
    let a = SyntheticScenario::default().generate();
    let b = SyntheticScenario::default().generate();
    assert_eq!(a.stops, b.stops);
    assert_eq!(a.samples, b.samples);

    let linked = link_samples(&a.samples, &a.stops).unwrap();
    assert_eq!(linked.fallbacks.len(), {
        let mut ids: Vec<_> = a.stops.iter().map(|s| s.cluster_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    });
}
