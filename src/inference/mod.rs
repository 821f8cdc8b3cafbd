//! # Significant Location Inference
//!
//! The per-user pipeline, a pure function of its inputs:
//!
//! 1. Link samples to stop intervals (`linking`)
//! 2. Resolve stop coordinates, falling back to linked samples (`projection`)
//! 3. Locate home: most total dwell time (`home`)
//! 4. Locate work: most workday dwell time outside home, with a
//!    day-grouped fallback (`work`)
//!
//! Nothing here touches the network or shared state, so users can be
//! processed in parallel without coordination (see [`crate::batch`]).

pub mod home;
pub mod work;

pub use home::{HomeLocation, locate_home};
pub use work::{PrimaryCandidate, WorkCandidate, WorkEstimate, WorkPhase, locate_work};

use log::info;
use serde::{Deserialize, Serialize};

use crate::aggregation::check_cluster_domain;
use crate::linking::link_samples;
use crate::projection::reconcile_stops;
use crate::{
    CoordinateSource, InferenceConfig, LocationRole, ResolvedStop, Result, Sample,
    SignificantLocation, Stop, TaggedSample,
};

/// Counters describing one inference run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceStats {
    pub samples: usize,
    pub linked_samples: usize,
    pub unlinked_samples: usize,
    pub stops: usize,
    pub clusters: usize,
    /// Stops whose coordinates came from a linked sample
    pub fallback_stops: usize,
}

/// Everything derived for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inference {
    pub samples: Vec<TaggedSample>,
    pub stops: Vec<ResolvedStop>,
    pub home: HomeLocation,
    pub work: WorkEstimate,
    pub stats: InferenceStats,
}

impl Inference {
    /// Home followed by every work candidate, without addresses.
    pub fn significant_locations(&self) -> Vec<SignificantLocation> {
        let home = SignificantLocation {
            role: LocationRole::Home,
            cluster_id: self.home.cluster_id,
            latitude: self.home.position.latitude,
            longitude: self.home.position.longitude,
            timestamp: self.home.timestamp,
            address: None,
            has_multiple_workplaces: false,
        };

        std::iter::once(home)
            .chain(self.work.candidates.iter().map(|w| SignificantLocation {
                role: LocationRole::Work,
                cluster_id: w.cluster_id,
                latitude: w.position.latitude,
                longitude: w.position.longitude,
                timestamp: w.timestamp,
                address: None,
                has_multiple_workplaces: w.has_multiple_workplaces,
            }))
            .collect()
    }
}

/// Run the full inference for one user.
///
/// Fails when the configuration is invalid, sample and stop offsets do not
/// match, cluster ids are not dense, a stop cannot be given coordinates, or
/// there are no stops.
pub fn infer(samples: &[Sample], stops: &[Stop], config: &InferenceConfig) -> Result<Inference> {
    config.validate()?;
    check_cluster_domain(stops)?;

    let linked = link_samples(samples, stops)?;
    let resolved = reconcile_stops(stops, &linked.fallbacks, config)?;

    let home = locate_home(&resolved)?;
    let work = locate_work(&resolved, home.cluster_id, config);

    let mut clusters: Vec<_> = stops.iter().map(|s| s.cluster_id).collect();
    clusters.sort_unstable();
    clusters.dedup();

    let stats = InferenceStats {
        samples: samples.len(),
        linked_samples: samples.len() - linked.unlinked,
        unlinked_samples: linked.unlinked,
        stops: stops.len(),
        clusters: clusters.len(),
        fallback_stops: resolved
            .iter()
            .filter(|r| r.source == CoordinateSource::LinkedSample)
            .count(),
    };

    info!(
        "[Inference] home={} work={:?} ({:?}), {} stops in {} clusters",
        home.cluster_id,
        work.candidates.iter().map(|w| w.cluster_id).collect::<Vec<_>>(),
        work.phase,
        stats.stops,
        stats.clusters
    );

    Ok(Inference {
        samples: linked.samples,
        stops: resolved,
        home,
        work,
        stats,
    })
}
