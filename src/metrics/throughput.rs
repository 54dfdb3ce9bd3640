use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::date_util::{round2, week_start};
use crate::issue::IssueView;
use crate::metrics::types::ThroughputStats;

/// Week an issue was completed in, keyed by the week's Sunday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WeekBucket {
    Week(NaiveDate),
    /// Completion timestamp missing or unparseable.
    Invalid,
}

/// Count completed issues per calendar week (Sunday to Saturday, UTC).
pub fn weekly_counts(completed: &[&IssueView<'_>]) -> BTreeMap<WeekBucket, usize> {
    let mut counts = BTreeMap::new();
    for issue in completed {
        let bucket = match issue.completed_at() {
            Some(at) => WeekBucket::Week(week_start(at.date_naive())),
            None => WeekBucket::Invalid,
        };
        *counts.entry(bucket).or_insert(0) += 1;
    }
    counts
}

/// `total_completed` is always the input size; `weekly_avg` ignores the
/// invalid bucket.
pub fn throughput_stats(completed: &[&IssueView<'_>]) -> ThroughputStats {
    let counts = weekly_counts(completed);
    let weeks: Vec<usize> = counts
        .iter()
        .filter(|(bucket, _)| **bucket != WeekBucket::Invalid)
        .map(|(_, count)| *count)
        .collect();

    let weekly_avg = if weeks.is_empty() {
        0.0
    } else {
        round2(weeks.iter().sum::<usize>() as f64 / weeks.len() as f64)
    };

    ThroughputStats {
        weekly_avg,
        total_completed: completed.len(),
    }
}
