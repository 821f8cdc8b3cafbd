//! Work location inference.
//!
//! ## Primary pass
//! Among stops starting on a workday, excluding the home cluster, the cluster
//! with the most dwell time is the candidate. Its hours are averaged over the
//! number of workdays seen in the whole stop history; at least
//! `min_work_hours_per_day` (3h by default) accepts it.
//!
//! ## Day-grouped fallback
//! When the average is too low (or there is no candidate) workday stops are
//! grouped by date and each day elects its own top non-home cluster. Every
//! distinct winner becomes a work location, which covers subjects without one
//! fixed workplace.

use chrono::{DateTime, FixedOffset};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::home::latest_stop;
use crate::aggregation::{DurationTable, aggregate_durations, cluster_domain};
use crate::calendar::{chronological, count_workdays, group_by_day};
use crate::{ClusterId, GpsPoint, InferenceConfig, ResolvedStop};

/// Which pass produced the work locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkPhase {
    /// Single candidate with enough average daily hours.
    Primary,
    /// Per-day winners after the primary candidate was rejected.
    DayGrouped,
}

/// Statistics of the primary pass, reported whichever pass won.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryCandidate {
    /// Top workday cluster other than home, if any has dwell time
    pub cluster_id: Option<ClusterId>,
    pub hours_worked: f64,
    /// Workdays seen in the stop history (at least 1)
    pub number_of_workdays: u32,
    pub hours_per_workday: f64,
}

/// One inferred workplace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkCandidate {
    pub cluster_id: ClusterId,
    /// Workday dwell time at this cluster in seconds
    pub workday_duration: f64,
    pub position: GpsPoint,
    /// Start of the most recent workday stop at this cluster
    pub timestamp: DateTime<FixedOffset>,
    pub has_multiple_workplaces: bool,
}

/// Work inference result: zero, one or many workplaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkEstimate {
    pub phase: WorkPhase,
    pub primary: PrimaryCandidate,
    pub candidates: Vec<WorkCandidate>,
}

impl WorkEstimate {
    pub fn has_multiple_workplaces(&self) -> bool {
        self.candidates.len() > 1
    }
}

/// Infer work locations, never returning the home cluster.
pub fn locate_work(
    stops: &[ResolvedStop],
    home: ClusterId,
    config: &InferenceConfig,
) -> WorkEstimate {
    let on_workday = |r: &ResolvedStop| config.is_workday(r.stop.start_date());

    let workday_table = aggregate_durations(stops.iter().map(|r| &r.stop), |s| {
        s.cluster_id != home && config.is_workday(s.start_date())
    });

    let primary = primary_candidate(stops, &workday_table, home, config);

    let accepted = primary.cluster_id.is_some()
        && primary.hours_per_workday >= config.min_work_hours_per_day;

    let (phase, cluster_ids) = if accepted {
        info!(
            "[Work] Primary candidate {:?}: {:.2}h over {} workdays ({:.2}h/day)",
            primary.cluster_id,
            primary.hours_worked,
            primary.number_of_workdays,
            primary.hours_per_workday
        );
        (WorkPhase::Primary, primary.cluster_id.into_iter().collect::<Vec<_>>())
    } else {
        info!(
            "[Work] Primary candidate {:?} rejected ({:.2}h/day < {:.1}h), grouping by day",
            primary.cluster_id, primary.hours_per_workday, config.min_work_hours_per_day
        );
        (WorkPhase::DayGrouped, day_grouped_winners(stops, home, config))
    };

    let multiple = cluster_ids.len() > 1;
    let candidates = cluster_ids
        .into_iter()
        .filter_map(|cluster_id| {
            let last_visit = latest_stop(stops, |r| r.stop.cluster_id == cluster_id && on_workday(r))?;
            Some(WorkCandidate {
                cluster_id,
                workday_duration: workday_table.get(cluster_id),
                position: last_visit.position,
                timestamp: last_visit.stop.start,
                has_multiple_workplaces: multiple,
            })
        })
        .collect();

    WorkEstimate {
        phase,
        primary,
        candidates,
    }
}

fn primary_candidate(
    stops: &[ResolvedStop],
    workday_table: &DurationTable,
    home: ClusterId,
    config: &InferenceConfig,
) -> PrimaryCandidate {
    let winner = workday_table
        .argmax()
        .filter(|&(id, seconds)| id != home && seconds > 0.0);

    let ordered = chronological(stops);
    // No workdays is treated as one; the average then overstates the hours
    let number_of_workdays = count_workdays(&ordered, config).max(1);

    let hours_worked = winner.map_or(0.0, |(_, seconds)| seconds / 3600.0);

    PrimaryCandidate {
        cluster_id: winner.map(|(id, _)| id),
        hours_worked,
        number_of_workdays,
        hours_per_workday: hours_worked / f64::from(number_of_workdays),
    }
}

/// Distinct per-day winners in the order they were first elected.
fn day_grouped_winners(
    stops: &[ResolvedStop],
    home: ClusterId,
    config: &InferenceConfig,
) -> Vec<ClusterId> {
    let domain = cluster_domain(stops.iter().map(|r| &r.stop));
    let workday_stops: Vec<&ResolvedStop> = chronological(stops)
        .into_iter()
        .filter(|r| config.is_workday(r.stop.start_date()))
        .collect();

    let mut winners: Vec<ClusterId> = Vec::new();
    for day in group_by_day(&workday_stops) {
        let mut table = DurationTable::with_len(domain);
        for r in day.stops.iter().filter(|r| r.stop.cluster_id != home) {
            table.add(r.stop.cluster_id, r.stop.duration);
        }

        let Some((cluster_id, seconds)) = table.argmax() else {
            continue;
        };
        let visited = day.stops.iter().any(|r| r.stop.cluster_id == cluster_id);
        if cluster_id == home || !visited {
            debug!("[Work] {}: no non-home winner", day.date);
            continue;
        }

        debug!(
            "[Work] {}: cluster {} with {:.2}h",
            day.date,
            cluster_id,
            seconds / 3600.0
        );
        if !winners.contains(&cluster_id) {
            winners.push(cluster_id);
        }
    }
    winners
}
