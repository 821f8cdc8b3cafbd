//! Per-cluster dwell time aggregation.
//!
//! A [`DurationTable`] always spans the full cluster id domain of the stop
//! set it was built from (`max id + 1` entries), whatever the predicate
//! selected. A cluster with no qualifying stops therefore reads as zero, which
//! is what the argmax tie-break relies on.

use crate::{ClusterId, PlaceMatchError, Result, Stop};

/// Id slots allowed per stop before a stop set counts as sparse.
pub const MAX_IDS_PER_STOP: usize = 4;

/// Domains up to this size are always accepted.
pub const MIN_DOMAIN_LIMIT: usize = 1024;

/// Summed stop duration (seconds) per cluster id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DurationTable {
    totals: Vec<f64>,
}

impl DurationTable {
    /// Empty table spanning ids `0..len`.
    pub fn with_len(len: usize) -> Self {
        Self {
            totals: vec![0.0; len],
        }
    }

    pub fn add(&mut self, cluster_id: ClusterId, seconds: f64) {
        let idx = cluster_id as usize;
        if idx >= self.totals.len() {
            self.totals.resize(idx + 1, 0.0);
        }
        self.totals[idx] += seconds;
    }

    /// Total for a cluster; ids outside the domain read as zero.
    pub fn get(&self, cluster_id: ClusterId) -> f64 {
        self.totals.get(cluster_id as usize).copied().unwrap_or(0.0)
    }

    /// Number of ids in the domain.
    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    /// `(cluster_id, seconds)` for every id in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (ClusterId, f64)> + '_ {
        self.totals
            .iter()
            .enumerate()
            .map(|(id, &seconds)| (id as ClusterId, seconds))
    }

    /// Cluster with the greatest total.
    ///
    /// Ties go to the lowest cluster id. Returns `None` for an empty domain.
    pub fn argmax(&self) -> Option<(ClusterId, f64)> {
        let mut best: Option<(ClusterId, f64)> = None;
        for (id, seconds) in self.iter() {
            match best {
                Some((_, top)) if seconds <= top => {}
                _ => best = Some((id, seconds)),
            }
        }
        best
    }
}

/// Size of the cluster id domain of a stop set (`max id + 1`, or 0).
pub fn cluster_domain<'a, I>(stops: I) -> usize
where
    I: IntoIterator<Item = &'a Stop>,
{
    stops
        .into_iter()
        .map(|s| s.cluster_id as usize + 1)
        .max()
        .unwrap_or(0)
}

/// Reject stop sets whose id domain is far larger than the stop count.
///
/// Cluster ids are expected to be dense (`0..n`); every table spans
/// `max id + 1` slots, so one stray id would otherwise size every table.
pub fn check_cluster_domain(stops: &[Stop]) -> Result<()> {
    let domain = cluster_domain(stops);
    let limit = (stops.len() * MAX_IDS_PER_STOP).max(MIN_DOMAIN_LIMIT);
    if domain <= limit {
        return Ok(());
    }
    Err(PlaceMatchError::InvalidStop {
        cluster_id: domain as i64 - 1,
        reason: format!(
            "cluster ids are not dense: id domain {} for {} stops (limit {})",
            domain,
            stops.len(),
            limit
        ),
    })
}

/// Sum stop durations per cluster over the stops accepted by `predicate`.
///
/// The table covers every cluster id of `stops`, including clusters whose
/// stops were all rejected.
///
/// # Example
/// ```
/// use chrono::DateTime;
/// use placematch::{Stop, aggregate_durations};
///
/// let at = |s: &str| DateTime::parse_from_rfc3339(s).unwrap();
/// let stops = vec![
///     Stop::new(2, at("2021-10-25T08:00:00+02:00"), at("2021-10-25T09:00:00+02:00"), 0.0, 0.0).unwrap(),
///     Stop::new(0, at("2021-10-30T08:00:00+02:00"), at("2021-10-30T10:00:00+02:00"), 0.0, 0.0).unwrap(),
/// ];
///
/// let monday_only = aggregate_durations(&stops, |s| s.start.format("%a").to_string() == "Mon");
/// assert_eq!(monday_only.len(), 3);
/// assert_eq!(monday_only.get(0), 0.0);
/// assert_eq!(monday_only.get(2), 3600.0);
/// ```
pub fn aggregate_durations<'a, I, P>(stops: I, predicate: P) -> DurationTable
where
    I: IntoIterator<Item = &'a Stop>,
    I::IntoIter: Clone,
    P: Fn(&Stop) -> bool,
{
    let stops = stops.into_iter();
    let mut table = DurationTable::with_len(cluster_domain(stops.clone()));
    for stop in stops.filter(|s| predicate(s)) {
        table.add(stop.cluster_id, stop.duration);
    }
    table
}

/// Unrestricted aggregation over all stops.
pub fn total_durations(stops: &[Stop]) -> DurationTable {
    aggregate_durations(stops, |_| true)
}
