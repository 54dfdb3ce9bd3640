use std::collections::BTreeMap;

use serde::Serialize;

use crate::ingest::IngestStatus;

/// Average, median and 95th percentile of a duration sample, in days.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TimeStats {
    pub average: f64,
    pub median: f64,
    pub p95: f64,
}

/// Completed issues per calendar week.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ThroughputStats {
    pub weekly_avg: f64,
    pub total_completed: usize,
}

/// Workflow metrics for one group of issues. Every field is always
/// populated; groups without completed issues carry zeros.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsRecord {
    pub total_issues: usize,
    pub completed_issues: usize,
    pub in_progress_issues: usize,
    pub backlog_issues: usize,
    pub cycle_time: TimeStats,
    pub lead_time: TimeStats,
    pub throughput: ThroughputStats,
    /// Percentage, 0–100.
    pub flow_efficiency: f64,
}

/// Metrics for a whole fetch: overall plus one record per team.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub status: IngestStatus,
    pub overall: MetricsRecord,
    pub by_team: BTreeMap<String, MetricsRecord>,
}
