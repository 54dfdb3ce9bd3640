use std::cell::{OnceCell, RefCell};
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::date_util::{days_between, parse_timestamp, round2};
use crate::diagnostics::{DiagnosticSink, Warning};
use crate::issue::raw::RawIssue;
use crate::issue::state::StateType;

/// Timestamp fields carried directly on an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimestampField {
    CreatedAt,
    UpdatedAt,
    StartedAt,
    CompletedAt,
    ArchivedAt,
}

impl TimestampField {
    pub fn name(self) -> &'static str {
        match self {
            TimestampField::CreatedAt => "createdAt",
            TimestampField::UpdatedAt => "updatedAt",
            TimestampField::StartedAt => "startedAt",
            TimestampField::CompletedAt => "completedAt",
            TimestampField::ArchivedAt => "archivedAt",
        }
    }

    fn raw(self, issue: &RawIssue) -> Option<&str> {
        match self {
            TimestampField::CreatedAt => issue.created_at.as_deref(),
            TimestampField::UpdatedAt => issue.updated_at.as_deref(),
            TimestampField::StartedAt => issue.started_at.as_deref(),
            TimestampField::CompletedAt => issue.completed_at.as_deref(),
            TimestampField::ArchivedAt => issue.archived_at.as_deref(),
        }
    }
}

/// A state transition from the issue's history.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<'a> {
    /// `None` when the upstream timestamp was missing or unparseable.
    pub at: Option<DateTime<Utc>>,
    pub to_state: Option<&'a str>,
}

/// Read-only typed access to one [`RawIssue`].
///
/// Accessors never fail: a missing or malformed field is `None`. Timestamps
/// are parsed on first access and remembered, so a bad value is reported to
/// the sink once and stays absent afterwards.
pub struct IssueView<'a> {
    raw: &'a RawIssue,
    sink: &'a dyn DiagnosticSink,
    timestamps: RefCell<HashMap<TimestampField, Option<DateTime<Utc>>>>,
    state_type: OnceCell<Option<StateType>>,
    started_at: OnceCell<Option<DateTime<Utc>>>,
    transitions: OnceCell<Vec<Transition<'a>>>,
}

impl<'a> IssueView<'a> {
    pub fn new(raw: &'a RawIssue, sink: &'a dyn DiagnosticSink) -> Self {
        Self {
            raw,
            sink,
            timestamps: RefCell::new(HashMap::new()),
            state_type: OnceCell::new(),
            started_at: OnceCell::new(),
            transitions: OnceCell::new(),
        }
    }

    pub fn raw(&self) -> &'a RawIssue {
        self.raw
    }

    /// Identifier for log messages: `ENG-12`, else the id, else `<unknown>`.
    pub fn label(&self) -> &'a str {
        self.raw
            .identifier
            .as_deref()
            .or(self.raw.id.as_deref())
            .unwrap_or("<unknown>")
    }

    // ── Scalars ────────────────────────────────────────────────────

    pub fn id(&self) -> Option<&'a str> {
        self.raw.id.as_deref()
    }

    pub fn identifier(&self) -> Option<&'a str> {
        self.raw.identifier.as_deref()
    }

    pub fn title(&self) -> Option<&'a str> {
        self.raw.title.as_deref()
    }

    pub fn priority(&self) -> Option<f64> {
        self.raw.priority
    }

    pub fn estimate(&self) -> Option<f64> {
        self.raw.estimate
    }

    pub fn state_name(&self) -> Option<&'a str> {
        self.raw.state.as_ref()?.name.as_deref()
    }

    pub fn team_name(&self) -> Option<&'a str> {
        self.raw.team.as_ref()?.name.as_deref()
    }

    pub fn assignee_name(&self) -> Option<&'a str> {
        self.raw.assignee.as_ref()?.name.as_deref()
    }

    pub fn state_type(&self) -> Option<&StateType> {
        self.state_type
            .get_or_init(|| {
                let raw = self.raw.state.as_ref()?.state_type.as_deref()?;
                let parsed = StateType::parse(raw);
                if !parsed.is_recognized() {
                    self.sink.warn(Warning::UnrecognizedStateType {
                        issue: self.label().to_string(),
                        value: raw.to_string(),
                    });
                }
                Some(parsed)
            })
            .as_ref()
    }

    // ── Timestamps ─────────────────────────────────────────────────

    pub fn timestamp(&self, field: TimestampField) -> Option<DateTime<Utc>> {
        if let Some(cached) = self.timestamps.borrow().get(&field) {
            return *cached;
        }
        let parsed = field.raw(self.raw).and_then(|value| {
            let ts = parse_timestamp(value);
            if ts.is_none() {
                self.sink.warn(Warning::UnparseableTimestamp {
                    issue: self.label().to_string(),
                    field: field.name(),
                    value: value.to_string(),
                });
            }
            ts
        });
        self.timestamps.borrow_mut().insert(field, parsed);
        parsed
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp(TimestampField::CreatedAt)
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp(TimestampField::UpdatedAt)
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp(TimestampField::CompletedAt)
    }

    pub fn archived_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp(TimestampField::ArchivedAt)
    }

    /// When work started: the explicit `startedAt`, else the first history
    /// entry that moved the issue into a `started` state.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        *self.started_at.get_or_init(|| {
            self.timestamp(TimestampField::StartedAt).or_else(|| {
                self.transitions()
                    .iter()
                    .find(|t| t.to_state == Some("started"))
                    .and_then(|t| t.at)
            })
        })
    }

    /// History entries in chronological order. If any entry's timestamp is
    /// missing or unparseable the upstream order is kept as-is. A partial
    /// history is reported once.
    pub fn transitions(&self) -> &[Transition<'a>] {
        self.transitions.get_or_init(|| {
            let mut transitions: Vec<Transition<'a>> = self
                .raw
                .history_nodes()
                .iter()
                .map(|entry| {
                    let at = entry.created_at.as_deref().and_then(|value| {
                        let ts = parse_timestamp(value);
                        if ts.is_none() {
                            self.sink.warn(Warning::UnparseableTimestamp {
                                issue: self.label().to_string(),
                                field: "history.createdAt",
                                value: value.to_string(),
                            });
                        }
                        ts
                    });
                    Transition {
                        at,
                        to_state: entry.to_state_type(),
                    }
                })
                .collect();
            if self.raw.history_truncated() {
                self.sink.warn(Warning::HistoryTruncated {
                    issue: self.label().to_string(),
                    entries: transitions.len(),
                });
            }
            if transitions.iter().all(|t| t.at.is_some()) {
                transitions.sort_by_key(|t| t.at);
            }
            transitions
        })
    }

    // ── Derived durations ──────────────────────────────────────────

    /// Days from start of work to completion.
    pub fn cycle_time_days(&self) -> Option<f64> {
        span_days(self.started_at(), self.completed_at())
    }

    /// Days from creation to completion.
    pub fn lead_time_days(&self) -> Option<f64> {
        span_days(self.created_at(), self.completed_at())
    }

    // ── Classification ─────────────────────────────────────────────

    pub fn is_completed(&self) -> bool {
        self.completed_at().is_some() && self.state_type() == Some(&StateType::Completed)
    }

    pub fn is_in_progress(&self) -> bool {
        self.state_type() == Some(&StateType::Started)
    }

    pub fn is_canceled(&self) -> bool {
        self.state_type() == Some(&StateType::Canceled)
    }

    /// Anything neither completed nor started, including missing and
    /// unrecognized state types.
    pub fn is_backlog(&self) -> bool {
        !matches!(
            self.state_type(),
            Some(StateType::Completed) | Some(StateType::Started)
        )
    }

    pub fn is_archived(&self) -> bool {
        self.archived_at().is_some()
    }

    pub fn summary(&self) -> IssueSummary {
        IssueSummary {
            id: self.id().map(str::to_string),
            identifier: self.identifier().map(str::to_string),
            title: self.title().map(str::to_string),
            state: self.state_name().map(str::to_string),
            state_type: self.state_type().cloned(),
            team: self.team_name().map(str::to_string),
            assignee: self.assignee_name().map(str::to_string),
            priority: self.priority(),
            estimate: self.estimate(),
            created_at: self.created_at(),
            started_at: self.started_at(),
            completed_at: self.completed_at(),
            archived_at: self.archived_at(),
            cycle_time_days: self.cycle_time_days(),
            lead_time_days: self.lead_time_days(),
        }
    }
}

fn span_days(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Option<f64> {
    let (start, end) = (start?, end?);
    if end < start {
        return None;
    }
    Some(round2(days_between(start, end)))
}

/// Flattened, owned snapshot of an issue for per-ticket output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueSummary {
    pub id: Option<String>,
    pub identifier: Option<String>,
    pub title: Option<String>,
    pub state: Option<String>,
    pub state_type: Option<StateType>,
    pub team: Option<String>,
    pub assignee: Option<String>,
    pub priority: Option<f64>,
    pub estimate: Option<f64>,
    pub created_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
    pub cycle_time_days: Option<f64>,
    pub lead_time_days: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{NoopSink, RecordingSink};
    use crate::issue::raw::{
        RawHistory, RawHistoryEntry, RawNamed, RawPageInfo, RawState, RawStateType,
    };

    fn entry(at: &str, to: &str) -> RawHistoryEntry {
        RawHistoryEntry {
            created_at: Some(at.to_string()),
            to_state: Some(RawStateType {
                state_type: Some(to.to_string()),
            }),
        }
    }

    fn issue(state_type: Option<&str>) -> RawIssue {
        RawIssue {
            id: Some("id-1".into()),
            identifier: Some("ENG-1".into()),
            title: Some("Title".into()),
            state: state_type.map(|t| RawState {
                name: Some("State".into()),
                state_type: Some(t.into()),
            }),
            team: Some(RawNamed { name: Some("Platform".into()) }),
            created_at: Some("2024-01-01T00:00:00.000Z".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_fields_are_absent() {
        let raw = RawIssue::default();
        let view = IssueView::new(&raw, &NoopSink);
        assert!(view.id().is_none());
        assert!(view.title().is_none());
        assert!(view.team_name().is_none());
        assert!(view.assignee_name().is_none());
        assert!(view.state_type().is_none());
        assert!(view.created_at().is_none());
        assert!(view.started_at().is_none());
        assert!(view.cycle_time_days().is_none());
        assert_eq!(view.label(), "<unknown>");
    }

    #[test]
    fn test_unparseable_timestamp_warns_once() {
        let mut raw = issue(Some("completed"));
        raw.completed_at = Some("yesterday-ish".into());
        let sink = RecordingSink::new();
        let view = IssueView::new(&raw, &sink);
        assert!(view.completed_at().is_none());
        assert!(view.completed_at().is_none());
        assert!(!view.is_completed());
        assert_eq!(sink.warnings().len(), 1);
        assert!(matches!(
            &sink.warnings()[0],
            Warning::UnparseableTimestamp { field: "completedAt", .. }
        ));
    }

    #[test]
    fn test_unrecognized_state_type_passes_through() {
        let raw = issue(Some("triage"));
        let sink = RecordingSink::new();
        let view = IssueView::new(&raw, &sink);
        assert_eq!(view.state_type(), Some(&StateType::Unrecognized("triage".into())));
        assert!(view.is_backlog());
        view.state_type();
        assert_eq!(sink.warnings().len(), 1);
    }

    #[test]
    fn test_started_at_prefers_explicit() {
        let mut raw = issue(Some("completed"));
        raw.started_at = Some("2024-01-02T00:00:00Z".into());
        raw.history = Some(RawHistory {
            nodes: Some(vec![entry("2024-01-03T00:00:00Z", "started")]),
            ..Default::default()
        });
        let view = IssueView::new(&raw, &NoopSink);
        assert_eq!(view.started_at(), parse_timestamp("2024-01-02T00:00:00Z"));
    }

    #[test]
    fn test_started_at_falls_back_to_history() {
        let mut raw = issue(Some("completed"));
        raw.history = Some(RawHistory {
            nodes: Some(vec![
                entry("2024-01-05T00:00:00Z", "started"),
                entry("2024-01-02T00:00:00Z", "unstarted"),
                entry("2024-01-03T00:00:00Z", "started"),
            ]),
            ..Default::default()
        });
        let view = IssueView::new(&raw, &NoopSink);
        // First started transition in chronological order.
        assert_eq!(view.started_at(), parse_timestamp("2024-01-03T00:00:00Z"));
    }

    #[test]
    fn test_started_at_absent_without_started_transition() {
        let mut raw = issue(Some("backlog"));
        raw.history = Some(RawHistory {
            nodes: Some(vec![entry("2024-01-02T00:00:00Z", "backlog")]),
            ..Default::default()
        });
        let view = IssueView::new(&raw, &NoopSink);
        assert!(view.started_at().is_none());
    }

    #[test]
    fn test_partial_history_warns_once() {
        let mut raw = issue(Some("completed"));
        raw.history = Some(RawHistory {
            nodes: Some(vec![entry("2024-01-02T00:00:00Z", "started")]),
            page_info: Some(RawPageInfo {
                has_next_page: Some(true),
            }),
        });
        let sink = RecordingSink::new();
        let view = IssueView::new(&raw, &sink);
        view.transitions();
        view.started_at();
        assert_eq!(
            sink.warnings(),
            vec![Warning::HistoryTruncated {
                issue: "ENG-1".into(),
                entries: 1
            }]
        );
    }

    #[test]
    fn test_transitions_keep_upstream_order_when_unparseable() {
        let mut raw = issue(Some("completed"));
        raw.history = Some(RawHistory {
            nodes: Some(vec![
                entry("2024-01-05T00:00:00Z", "completed"),
                entry("garbage", "started"),
                entry("2024-01-01T00:00:00Z", "backlog"),
            ]),
            ..Default::default()
        });
        let view = IssueView::new(&raw, &NoopSink);
        let states: Vec<_> = view.transitions().iter().map(|t| t.to_state).collect();
        assert_eq!(states, vec![Some("completed"), Some("started"), Some("backlog")]);
    }

    #[test]
    fn test_cycle_and_lead_time() {
        let mut raw = issue(Some("completed"));
        raw.started_at = Some("2024-01-02T00:00:00Z".into());
        raw.completed_at = Some("2024-01-04T12:00:00Z".into());
        let view = IssueView::new(&raw, &NoopSink);
        assert_eq!(view.cycle_time_days(), Some(2.5));
        assert_eq!(view.lead_time_days(), Some(3.5));
        assert!(view.is_completed());
    }

    #[test]
    fn test_durations_rounded_to_two_decimals() {
        let mut raw = issue(Some("completed"));
        raw.completed_at = Some("2024-01-01T08:00:00Z".into());
        let view = IssueView::new(&raw, &NoopSink);
        assert_eq!(view.lead_time_days(), Some(0.33));
    }

    #[test]
    fn test_negative_span_is_absent() {
        let mut raw = issue(Some("completed"));
        raw.started_at = Some("2024-01-05T00:00:00Z".into());
        raw.completed_at = Some("2024-01-04T00:00:00Z".into());
        let view = IssueView::new(&raw, &NoopSink);
        assert!(view.cycle_time_days().is_none());
        assert_eq!(view.lead_time_days(), Some(3.0));
    }

    #[test]
    fn test_completed_requires_timestamp_and_state() {
        let raw = issue(Some("completed"));
        let view = IssueView::new(&raw, &NoopSink);
        assert!(!view.is_completed());

        let mut raw = issue(Some("canceled"));
        raw.completed_at = Some("2024-01-04T00:00:00Z".into());
        let view = IssueView::new(&raw, &NoopSink);
        assert!(!view.is_completed());
        assert!(view.is_canceled());
        assert!(view.is_backlog());
    }

    #[test]
    fn test_summary_serializes() {
        let mut raw = issue(Some("started"));
        raw.assignee = Some(RawNamed { name: Some("Ada".into()) });
        let view = IssueView::new(&raw, &NoopSink);
        let summary = view.summary();
        assert_eq!(summary.team.as_deref(), Some("Platform"));
        assert_eq!(summary.assignee.as_deref(), Some("Ada"));
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["state_type"], "started");
        assert_eq!(json["identifier"], "ENG-1");
        assert!(json["completed_at"].is_null());
    }
}
