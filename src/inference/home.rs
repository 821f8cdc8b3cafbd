//! Home location: the cluster with the most total dwell time, any day.

use chrono::{DateTime, FixedOffset};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::aggregation::aggregate_durations;
use crate::{ClusterId, GpsPoint, OptionExt, ResolvedStop, Result};

/// The inferred home of a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeLocation {
    pub cluster_id: ClusterId,
    /// Total dwell time at home in seconds
    pub total_duration: f64,
    pub position: GpsPoint,
    /// Start of the most recent home stop
    pub timestamp: DateTime<FixedOffset>,
}

/// Find the home cluster.
///
/// Home is the argmax of the unrestricted duration table; ties go to the
/// lowest cluster id. Fails with [`crate::PlaceMatchError::NoStops`] when
/// there are no stops.
pub fn locate_home(stops: &[ResolvedStop]) -> Result<HomeLocation> {
    let table = aggregate_durations(stops.iter().map(|r| &r.stop), |_| true);
    let (mut cluster_id, mut total_duration) = table.argmax().ok_or_no_stops()?;

    // An all-zero table can elect an id that no stop carries
    if !stops.iter().any(|r| r.stop.cluster_id == cluster_id) {
        let present = stops
            .iter()
            .map(|r| r.stop.cluster_id)
            .min()
            .ok_or_no_stops()?;
        warn!(
            "[Home] Cluster {} has no stops (all durations zero), using cluster {}",
            cluster_id, present
        );
        cluster_id = present;
        total_duration = table.get(present);
    }

    let representative = latest_stop(stops, |r| r.stop.cluster_id == cluster_id).ok_or_no_stops()?;

    info!(
        "[Home] Cluster {} with {:.1}h total dwell",
        cluster_id,
        total_duration / 3600.0
    );

    Ok(HomeLocation {
        cluster_id,
        total_duration,
        position: representative.position,
        timestamp: representative.stop.start,
    })
}

/// Chronologically latest stop accepted by `predicate`; later input wins ties.
pub(crate) fn latest_stop<P>(stops: &[ResolvedStop], predicate: P) -> Option<&ResolvedStop>
where
    P: Fn(&ResolvedStop) -> bool,
{
    stops
        .iter()
        .filter(|r| predicate(r))
        .max_by_key(|r| r.stop.start)
}
