use crate::date_util::{days_between, round2};
use crate::issue::{IssueView, StateType};

/// Share of one issue's recorded history spent in an active state, 0.0–1.0.
///
/// Each step between consecutive transitions is credited to the state the
/// earlier transition moved into. A step with a missing timestamp or a
/// negative delta counts as zero time.
pub fn issue_efficiency(issue: &IssueView<'_>) -> f64 {
    let transitions = issue.transitions();
    if transitions.len() < 2 {
        return 0.0;
    }

    let mut active = 0.0;
    let mut total = 0.0;
    for pair in transitions.windows(2) {
        let (from, to) = (&pair[0], &pair[1]);
        let delta = match (from.at, to.at) {
            (Some(start), Some(end)) => days_between(start, end).max(0.0),
            _ => 0.0,
        };
        total += delta;
        if from.to_state.map(StateType::parse).is_some_and(|s| s.is_active()) {
            active += delta;
        }
    }

    if total > 0.0 {
        active / total
    } else {
        0.0
    }
}

/// Mean of per-issue efficiencies as a percentage, rounded to 2 decimals.
/// Every issue weighs the same regardless of how long it lived.
pub fn flow_efficiency(completed: &[&IssueView<'_>]) -> f64 {
    if completed.is_empty() {
        return 0.0;
    }
    let sum: f64 = completed.iter().map(|issue| issue_efficiency(issue)).sum();
    round2(sum / completed.len() as f64 * 100.0)
}
