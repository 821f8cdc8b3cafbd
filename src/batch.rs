//! Multi-user batch processing.
//!
//! Each user is inferred independently; one user's failure (no stops, bad
//! table, offset mismatch) is reported in its [`UserReport`] and never stops
//! the others. With the `parallel` feature users run on rayon's pool.

use log::{info, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::inference::{Inference, infer};
use crate::tables::UserDir;
use crate::{InferenceConfig, Result, Sample, Stop};

/// One user's input tables.
#[derive(Debug, Clone)]
pub struct UserInput {
    pub user: String,
    pub samples: Vec<Sample>,
    pub stops: Vec<Stop>,
}

/// Outcome for one user.
#[derive(Debug)]
pub struct UserReport {
    pub user: String,
    pub result: Result<Inference>,
}

impl UserReport {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Run inference for every user, isolating failures.
///
/// Reports come back in input order.
pub fn process_users(users: Vec<UserInput>, config: &InferenceConfig) -> Vec<UserReport> {
    let start = std::time::Instant::now();

    #[cfg(feature = "parallel")]
    let reports: Vec<UserReport> = users
        .into_par_iter()
        .map(|input| process_user(input, config))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let reports: Vec<UserReport> = users
        .into_iter()
        .map(|input| process_user(input, config))
        .collect();

    log_summary(&reports, start.elapsed());
    reports
}

/// Load and infer every user directory; load errors become failed reports.
pub fn process_user_dirs(dirs: &[UserDir], config: &InferenceConfig) -> Vec<UserReport> {
    let start = std::time::Instant::now();

    let run = |dir: &UserDir| {
        let user = dir.user();
        let result = dir
            .load()
            .and_then(|(samples, stops)| infer(&samples, &stops, config));
        report(user, result)
    };

    #[cfg(feature = "parallel")]
    let reports: Vec<UserReport> = dirs.par_iter().map(run).collect();

    #[cfg(not(feature = "parallel"))]
    let reports: Vec<UserReport> = dirs.iter().map(run).collect();

    log_summary(&reports, start.elapsed());
    reports
}

fn process_user(input: UserInput, config: &InferenceConfig) -> UserReport {
    let result = infer(&input.samples, &input.stops, config);
    report(input.user, result)
}

fn report(user: String, result: Result<Inference>) -> UserReport {
    if let Err(e) = &result {
        warn!("[Batch] {}: inference failed: {}", user, e);
    }
    UserReport { user, result }
}

fn log_summary(reports: &[UserReport], elapsed: std::time::Duration) {
    let succeeded = reports.iter().filter(|r| r.is_ok()).count();
    info!(
        "[Batch] {} users processed in {:?}: {} succeeded, {} failed",
        reports.len(),
        elapsed,
        succeeded,
        reports.len() - succeeded
    );
}
