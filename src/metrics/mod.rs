pub mod flow;
pub mod partition;
pub mod throughput;
pub mod time;
pub mod types;

pub use types::*;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::diagnostics::{DiagnosticSink, Warning};
use crate::issue::IssueView;

pub use flow::{flow_efficiency, issue_efficiency};
pub use partition::{partition, Partition};
pub use throughput::{throughput_stats, weekly_counts, WeekBucket};
pub use time::time_stats;

/// Group key for issues without a team.
pub const UNKNOWN_TEAM: &str = "Unknown Team";

/// Turns a collection of issues into [`MetricsRecord`]s.
pub struct MetricsEngine {
    sink: Arc<dyn DiagnosticSink>,
}

impl MetricsEngine {
    pub fn new(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { sink }
    }

    /// Metrics over every issue.
    pub fn overall(&self, issues: &[IssueView<'_>]) -> MetricsRecord {
        compute(issues.iter())
    }

    /// One record per team name, issues without a team under
    /// [`UNKNOWN_TEAM`].
    pub fn by_team(&self, issues: &[IssueView<'_>]) -> BTreeMap<String, MetricsRecord> {
        let mut groups: BTreeMap<&str, Vec<&IssueView<'_>>> = BTreeMap::new();
        for issue in issues {
            let team = issue.team_name().unwrap_or_else(|| {
                self.sink.warn(Warning::MissingTeam {
                    issue: issue.label().to_string(),
                });
                UNKNOWN_TEAM
            });
            groups.entry(team).or_default().push(issue);
        }

        groups
            .into_iter()
            .map(|(team, members)| (team.to_string(), compute(members)))
            .collect()
    }
}

fn compute<'v, 'a: 'v>(issues: impl IntoIterator<Item = &'v IssueView<'a>>) -> MetricsRecord {
    let parts = partition(issues);
    let mut record = MetricsRecord {
        total_issues: parts.total(),
        completed_issues: parts.completed.len(),
        in_progress_issues: parts.in_progress.len(),
        backlog_issues: parts.backlog.len(),
        ..Default::default()
    };
    if parts.completed.is_empty() {
        return record;
    }

    let cycle: Vec<f64> = parts
        .completed
        .iter()
        .filter_map(|i| i.cycle_time_days())
        .collect();
    let lead: Vec<f64> = parts
        .completed
        .iter()
        .filter_map(|i| i.lead_time_days())
        .collect();

    record.cycle_time = time_stats(&cycle);
    record.lead_time = time_stats(&lead);
    record.throughput = throughput_stats(&parts.completed);
    record.flow_efficiency = flow_efficiency(&parts.completed);
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{NoopSink, RecordingSink};
    use crate::issue::raw::{RawHistory, RawHistoryEntry, RawIssue, RawNamed, RawState, RawStateType};

    fn issue(id: &str, team: Option<&str>, state_type: &str) -> RawIssue {
        RawIssue {
            identifier: Some(id.to_string()),
            team: team.map(|t| RawNamed {
                name: Some(t.to_string()),
            }),
            state: Some(RawState {
                name: None,
                state_type: Some(state_type.to_string()),
            }),
            ..Default::default()
        }
    }

    /// Created Jan 1, started Jan 2, completed Jan 4 2024.
    fn finished(id: &str, team: Option<&str>) -> RawIssue {
        let step = |at: &str, to: &str| RawHistoryEntry {
            created_at: Some(at.to_string()),
            to_state: Some(RawStateType {
                state_type: Some(to.to_string()),
            }),
        };
        RawIssue {
            created_at: Some("2024-01-01T00:00:00Z".into()),
            started_at: Some("2024-01-02T00:00:00Z".into()),
            completed_at: Some("2024-01-04T00:00:00Z".into()),
            history: Some(RawHistory {
                nodes: Some(vec![
                    step("2024-01-01T00:00:00Z", "backlog"),
                    step("2024-01-02T00:00:00Z", "started"),
                    step("2024-01-04T00:00:00Z", "completed"),
                ]),
                ..Default::default()
            }),
            ..issue(id, team, "completed")
        }
    }

    fn sample() -> Vec<RawIssue> {
        vec![
            finished("ENG-1", Some("Platform")),
            finished("ENG-2", Some("Platform")),
            issue("ENG-3", Some("Platform"), "started"),
            issue("MOB-1", Some("Mobile"), "backlog"),
            issue("MOB-2", Some("Mobile"), "triage"),
            finished("X-1", None),
        ]
    }

    fn views<'a>(raws: &'a [RawIssue], sink: &'a dyn DiagnosticSink) -> Vec<IssueView<'a>> {
        raws.iter().map(|r| IssueView::new(r, sink)).collect()
    }

    #[test]
    fn test_overall_counts_and_times() {
        let raws = sample();
        let views = views(&raws, &NoopSink);
        let record = MetricsEngine::new(Arc::new(NoopSink)).overall(&views);

        assert_eq!(record.total_issues, 6);
        assert_eq!(record.completed_issues, 3);
        assert_eq!(record.in_progress_issues, 1);
        assert_eq!(record.backlog_issues, 2);
        assert_eq!(
            record.completed_issues + record.in_progress_issues + record.backlog_issues,
            record.total_issues
        );
        assert_eq!(record.cycle_time, TimeStats { average: 2.0, median: 2.0, p95: 2.0 });
        assert_eq!(record.lead_time, TimeStats { average: 3.0, median: 3.0, p95: 3.0 });
        assert_eq!(record.throughput.total_completed, 3);
        assert_eq!(record.throughput.weekly_avg, 3.0);
        assert_eq!(record.flow_efficiency, 66.67);
    }

    #[test]
    fn test_no_completed_issues_yields_zeros() {
        let raws = vec![issue("A", None, "started"), issue("B", None, "backlog")];
        let views = views(&raws, &NoopSink);
        let record = MetricsEngine::new(Arc::new(NoopSink)).overall(&views);

        assert_eq!(record.total_issues, 2);
        assert_eq!(record.cycle_time, TimeStats::default());
        assert_eq!(record.lead_time, TimeStats::default());
        assert_eq!(record.throughput, ThroughputStats::default());
        assert_eq!(record.flow_efficiency, 0.0);

        let json = serde_json::to_value(&record).unwrap();
        for key in ["cycle_time", "lead_time", "throughput", "flow_efficiency"] {
            assert!(json.get(key).is_some(), "{key} missing");
        }
        assert_eq!(json["cycle_time"]["p95"], 0.0);
    }

    #[test]
    fn test_empty_input() {
        let record = MetricsEngine::new(Arc::new(NoopSink)).overall(&[]);
        assert_eq!(record, MetricsRecord::default());
    }

    #[test]
    fn test_overall_is_idempotent() {
        let raws = sample();
        let views = views(&raws, &NoopSink);
        let engine = MetricsEngine::new(Arc::new(NoopSink));
        assert_eq!(engine.overall(&views), engine.overall(&views));
    }

    #[test]
    fn test_completed_issue_without_duration_is_excluded_from_sample() {
        let mut raws = vec![finished("A", None), finished("B", None)];
        raws[1].started_at = None;
        raws[1].history = None;
        let views = views(&raws, &NoopSink);
        let record = MetricsEngine::new(Arc::new(NoopSink)).overall(&views);

        // B has a lead time but no cycle time.
        assert_eq!(record.cycle_time.average, 2.0);
        assert_eq!(record.lead_time.average, 3.0);
        assert_eq!(record.completed_issues, 2);
    }

    #[test]
    fn test_by_team_groups_and_defaults() {
        let raws = sample();
        let sink = Arc::new(RecordingSink::new());
        let views = views(&raws, &NoopSink);
        let teams = MetricsEngine::new(sink.clone()).by_team(&views);

        assert_eq!(
            teams.keys().collect::<Vec<_>>(),
            vec!["Mobile", "Platform", UNKNOWN_TEAM]
        );
        assert_eq!(teams["Platform"].total_issues, 3);
        assert_eq!(teams["Platform"].completed_issues, 2);
        assert_eq!(teams["Mobile"].backlog_issues, 2);
        assert_eq!(teams["Mobile"].throughput, ThroughputStats::default());
        assert_eq!(teams[UNKNOWN_TEAM].completed_issues, 1);

        assert_eq!(
            sink.warnings(),
            vec![Warning::MissingTeam { issue: "X-1".into() }]
        );

        let total: usize = teams.values().map(|r| r.total_issues).sum();
        assert_eq!(total, raws.len());
    }
}
