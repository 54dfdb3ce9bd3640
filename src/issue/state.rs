use std::fmt;

use serde::{Serialize, Serializer};

/// Workflow category of an issue's current state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StateType {
    Backlog,
    Unstarted,
    Started,
    Completed,
    Canceled,
    /// Passed through untouched so callers can still see what upstream sent.
    Unrecognized(String),
}

impl StateType {
    pub fn parse(s: &str) -> Self {
        match s {
            "backlog" => StateType::Backlog,
            "unstarted" => StateType::Unstarted,
            "started" => StateType::Started,
            "completed" => StateType::Completed,
            "canceled" => StateType::Canceled,
            other => StateType::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            StateType::Backlog => "backlog",
            StateType::Unstarted => "unstarted",
            StateType::Started => "started",
            StateType::Completed => "completed",
            StateType::Canceled => "canceled",
            StateType::Unrecognized(s) => s,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, StateType::Unrecognized(_))
    }

    /// States that count as active work when measuring flow efficiency.
    pub fn is_active(&self) -> bool {
        matches!(self, StateType::Started | StateType::Unstarted)
    }
}

impl fmt::Display for StateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for StateType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known() {
        assert_eq!(StateType::parse("backlog"), StateType::Backlog);
        assert_eq!(StateType::parse("unstarted"), StateType::Unstarted);
        assert_eq!(StateType::parse("started"), StateType::Started);
        assert_eq!(StateType::parse("completed"), StateType::Completed);
        assert_eq!(StateType::parse("canceled"), StateType::Canceled);
    }

    #[test]
    fn test_parse_unrecognized_passes_through() {
        let st = StateType::parse("triage");
        assert!(!st.is_recognized());
        assert_eq!(st.as_str(), "triage");
        // Matching is exact.
        assert_eq!(StateType::parse("Completed"), StateType::Unrecognized("Completed".into()));
    }

    #[test]
    fn test_active_states() {
        assert!(StateType::Started.is_active());
        assert!(StateType::Unstarted.is_active());
        assert!(!StateType::Backlog.is_active());
        assert!(!StateType::Completed.is_active());
        assert!(!StateType::Unrecognized("triage".into()).is_active());
    }
}
