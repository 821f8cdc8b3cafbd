//! Calendar walks over stops.
//!
//! Stops are attributed to the calendar date of their `start`, in the offset
//! the timestamp was recorded with. Walks visit stops in chronological order
//! and consume dates in strictly increasing order; each date change advances
//! the walk by exactly one step however many days lie between the two stops.

use chrono::NaiveDate;

use crate::{InferenceConfig, Stop};

/// Stops sorted by start instant. Equal starts keep input order.
pub fn chronological<T: AsRef<Stop>>(stops: &[T]) -> Vec<&T> {
    let mut ordered: Vec<&T> = stops.iter().collect();
    ordered.sort_by_key(|s| (*s).as_ref().start);
    ordered
}

/// Count workdays seen in a chronologically ordered walk.
///
/// Every new date whose weekday is a configured workday adds one. Dates with
/// no stops are never counted, so a user who was away (or not recording) on
/// a workday lowers the count.
pub fn count_workdays<T: AsRef<Stop>>(ordered: &[T], config: &InferenceConfig) -> u32 {
    let mut current: Option<NaiveDate> = None;
    let mut count = 0u32;
    for stop in ordered {
        let date = stop.as_ref().start_date();
        if current.map_or(true, |day| date > day) {
            current = Some(date);
            if config.is_workday(date) {
                count += 1;
            }
        }
    }
    count
}

/// Stops sharing one calendar date.
#[derive(Debug, Clone)]
pub struct DayGroup<T> {
    pub date: NaiveDate,
    pub stops: Vec<T>,
}

/// Split a chronologically ordered walk into per-date groups.
///
/// A stop whose date is not later than the current group's (possible only
/// when offsets change mid-walk) stays in the current group.
pub fn group_by_day<T: AsRef<Stop> + Clone>(ordered: &[T]) -> Vec<DayGroup<T>> {
    let mut groups: Vec<DayGroup<T>> = Vec::new();
    for stop in ordered {
        let date = stop.as_ref().start_date();
        match groups.last_mut() {
            Some(group) if date <= group.date => group.stops.push(stop.clone()),
            _ => groups.push(DayGroup {
                date,
                stops: vec![stop.clone()],
            }),
        }
    }
    groups
}
