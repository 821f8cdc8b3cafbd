//! Sample to stop linking.
//!
//! Every sample is tagged with the cluster id of the stop whose `[start, stop]`
//! interval (inclusive on both ends) contains its timestamp. A naive pass is
//! O(samples × stops); [`StopIndex`] keeps stop intervals in an R-tree so
//! linking runs in O((samples + stops) · log stops). Candidates from the tree
//! are confirmed with exact timestamp comparison, so the index never changes
//! which stop a sample belongs to.
//!
//! When intervals overlap (invalid upstream data) the stop that appears last
//! in the input wins, as if each stop had overwritten the tags of its samples
//! in order.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use log::{debug, info};
use rstar::{AABB, RTree, RTreeObject};

use crate::{ClusterId, GpsPoint, PlaceMatchError, Result, Sample, Stop, TaggedSample};

/// A stop interval with its position in the input, for R-tree queries.
///
/// Intervals live on the first axis in microseconds since the epoch; the
/// second axis is unused.
#[derive(Debug, Clone, Copy)]
pub struct StopInterval {
    pub idx: usize,
    pub start_us: i64,
    pub stop_us: i64,
}

impl RTreeObject for StopInterval {
    type Envelope = AABB<[i64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners([self.start_us, 0], [self.stop_us, 0])
    }
}

/// Interval index over a user's stops.
pub struct StopIndex<'a> {
    stops: &'a [Stop],
    tree: RTree<StopInterval>,
}

impl<'a> StopIndex<'a> {
    /// Build the index from stops.
    pub fn new(stops: &'a [Stop]) -> Self {
        let intervals: Vec<StopInterval> = stops
            .iter()
            .enumerate()
            .map(|(idx, stop)| StopInterval {
                idx,
                start_us: stop.start.timestamp_micros(),
                stop_us: stop.stop.timestamp_micros(),
            })
            .collect();
        Self {
            stops,
            tree: RTree::bulk_load(intervals),
        }
    }

    /// The stop containing `ts`, preferring the last one in input order.
    pub fn containing(&self, ts: &DateTime<FixedOffset>) -> Option<&'a Stop> {
        let query = AABB::from_point([ts.timestamp_micros(), 0]);
        self.tree
            .locate_in_envelope_intersecting(&query)
            .filter(|interval| self.stops[interval.idx].contains(ts))
            .map(|interval| interval.idx)
            .max()
            .map(|idx| &self.stops[idx])
    }
}

/// Result of linking one user's samples to their stops.
#[derive(Debug, Clone)]
pub struct LinkedSamples {
    /// Samples in input order with their `stop_id`
    pub samples: Vec<TaggedSample>,
    /// First linked sample position per cluster (coordinate fallback)
    pub fallbacks: HashMap<ClusterId, GpsPoint>,
    /// Number of samples outside every stop interval
    pub unlinked: usize,
}

/// Reject sample and stop tables that share no UTC offset at all.
///
/// Tables localized to the same zone share at least one offset even across
/// DST changes, and samples recorded after the last stop may carry an offset
/// the stops never saw. Disjoint offset sets mean the tables were normalized
/// to different zones upstream.
pub fn check_offsets(samples: &[Sample], stops: &[Stop]) -> Result<()> {
    let mut stop_offsets: Vec<FixedOffset> = Vec::new();
    for stop in stops {
        for offset in [*stop.start.offset(), *stop.stop.offset()] {
            if !stop_offsets.contains(&offset) {
                stop_offsets.push(offset);
            }
        }
    }
    let Some(first) = samples.first() else {
        return Ok(());
    };
    if stop_offsets.is_empty() || samples.iter().any(|s| stop_offsets.contains(s.ts.offset())) {
        return Ok(());
    }

    Err(PlaceMatchError::TimezoneMismatch {
        timestamp: first.ts.to_rfc3339(),
        sample_offset: *first.ts.offset(),
        stop_offsets,
    })
}

/// Tag every sample with its containing stop's cluster id.
///
/// # Example
/// ```
/// use chrono::DateTime;
/// use placematch::{Sample, Stop, link_samples};
///
/// let at = |s: &str| DateTime::parse_from_rfc3339(s).unwrap();
/// let stops = vec![Stop::new(4, at("2021-10-27T08:00:00+02:00"), at("2021-10-27T09:00:00+02:00"), 0.0, 0.0).unwrap()];
/// let samples = vec![
///     Sample::new(at("2021-10-27T09:00:00+02:00"), 52.5, 13.4),
///     Sample::new(at("2021-10-27T09:00:01+02:00"), 52.5, 13.4),
/// ];
///
/// let linked = link_samples(&samples, &stops).unwrap();
/// assert_eq!(linked.samples[0].stop_id, Some(4));
/// assert_eq!(linked.samples[1].stop_id, None);
/// ```
pub fn link_samples(samples: &[Sample], stops: &[Stop]) -> Result<LinkedSamples> {
    check_offsets(samples, stops)?;

    let index = StopIndex::new(stops);
    let mut fallbacks: HashMap<ClusterId, GpsPoint> = HashMap::new();
    let mut unlinked = 0usize;

    let tagged: Vec<TaggedSample> = samples
        .iter()
        .map(|sample| {
            let stop_id = index.containing(&sample.ts).map(|stop| stop.cluster_id);
            match stop_id {
                Some(id) => {
                    fallbacks.entry(id).or_insert_with(|| sample.position());
                }
                None => unlinked += 1,
            }
            TaggedSample {
                sample: sample.clone(),
                stop_id,
            }
        })
        .collect();

    info!(
        "[Linking] Linked {} of {} samples to {} stops ({} clusters with samples)",
        tagged.len() - unlinked,
        tagged.len(),
        stops.len(),
        fallbacks.len()
    );
    debug!("[Linking] {} samples outside every stop interval", unlinked);

    Ok(LinkedSamples {
        samples: tagged,
        fallbacks,
        unlinked,
    })
}

/// Reference O(samples × stops) linking, overwriting tags in stop order.
///
/// Kept for verifying [`link_samples`] and for benchmarking.
pub fn link_samples_naive(samples: &[Sample], stops: &[Stop]) -> Vec<Option<ClusterId>> {
    let mut tags = vec![None; samples.len()];
    for stop in stops {
        for (tag, sample) in tags.iter_mut().zip(samples) {
            if stop.contains(&sample.ts) {
                *tag = Some(stop.cluster_id);
            }
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    #[test]
    fn test_overlap_last_stop_wins() {
        let stops = vec![
            Stop::new(1, at("2021-10-27T08:00:00+02:00"), at("2021-10-27T10:00:00+02:00"), 0.0, 0.0)
                .unwrap(),
            Stop::new(2, at("2021-10-27T09:00:00+02:00"), at("2021-10-27T11:00:00+02:00"), 0.0, 0.0)
                .unwrap(),
        ];
        let index = StopIndex::new(&stops);
        assert_eq!(
            index.containing(&at("2021-10-27T09:30:00+02:00")).map(|s| s.cluster_id),
            Some(2)
        );
        assert_eq!(
            index.containing(&at("2021-10-27T08:30:00+02:00")).map(|s| s.cluster_id),
            Some(1)
        );
    }

    #[test]
    fn test_sub_microsecond_boundary() {
        let start = at("2021-10-27T08:00:00.0000005+02:00");
        let stops = vec![Stop::new(0, start, at("2021-10-27T09:00:00+02:00"), 0.0, 0.0).unwrap()];
        let index = StopIndex::new(&stops);
        // Same microsecond as start, but earlier
        assert!(index.containing(&at("2021-10-27T08:00:00.0000001+02:00")).is_none());
        assert!(index.containing(&start).is_some());
    }

    #[test]
    fn test_offsets_accept_dst_change() {
        let stops = vec![
            Stop::new(0, at("2021-10-30T08:00:00+02:00"), at("2021-10-30T09:00:00+02:00"), 0.0, 0.0)
                .unwrap(),
            Stop::new(0, at("2021-11-01T08:00:00+01:00"), at("2021-11-01T09:00:00+01:00"), 0.0, 0.0)
                .unwrap(),
        ];
        let samples = vec![
            Sample::new(at("2021-10-30T08:30:00+02:00"), 0.0, 0.0),
            Sample::new(at("2021-11-01T08:30:00+01:00"), 0.0, 0.0),
        ];
        assert!(check_offsets(&samples, &stops).is_ok());
    }
}
