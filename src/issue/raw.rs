use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One issue as returned by the upstream API. Every field is optional;
/// nothing here is validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawIssue {
    pub id: Option<String>,
    pub identifier: Option<String>,
    pub title: Option<String>,
    pub priority: Option<f64>,
    pub estimate: Option<f64>,
    pub state: Option<RawState>,
    pub team: Option<RawNamed>,
    pub assignee: Option<RawNamed>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub archived_at: Option<String>,
    pub history: Option<RawHistory>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawState {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub state_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawNamed {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawHistory {
    pub nodes: Option<Vec<RawHistoryEntry>>,
    pub page_info: Option<RawPageInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPageInfo {
    pub has_next_page: Option<bool>,
}

/// A single state transition: when it happened and the state it moved into.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawHistoryEntry {
    pub created_at: Option<String>,
    pub to_state: Option<RawStateType>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawStateType {
    #[serde(rename = "type")]
    pub state_type: Option<String>,
}

/// A top-level field dropped while decoding because its value had the
/// wrong shape.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub field: String,
    pub detail: String,
}

impl RawIssue {
    /// Decode one upstream node. A field whose value does not fit is
    /// dropped and reported; the rest of the record is kept. Fails only
    /// when `node` is not an object.
    pub fn from_node(node: &Value) -> Result<(Self, Vec<FieldError>), String> {
        if let Ok(issue) = RawIssue::deserialize(node) {
            return Ok((issue, Vec::new()));
        }
        let object = node
            .as_object()
            .ok_or_else(|| format!("expected an object, got {node}"))?;

        let mut kept = Map::new();
        let mut errors = Vec::new();
        for (field, value) in object {
            let single = Value::Object(Map::from_iter([(field.clone(), value.clone())]));
            match RawIssue::deserialize(&single) {
                Ok(_) => {
                    kept.insert(field.clone(), value.clone());
                }
                Err(e) => errors.push(FieldError {
                    field: field.clone(),
                    detail: e.to_string(),
                }),
            }
        }
        let issue = RawIssue::deserialize(&Value::Object(kept)).map_err(|e| e.to_string())?;
        Ok((issue, errors))
    }

    pub fn history_nodes(&self) -> &[RawHistoryEntry] {
        self.history
            .as_ref()
            .and_then(|h| h.nodes.as_deref())
            .unwrap_or(&[])
    }

    /// Upstream holds more history entries than were fetched.
    pub fn history_truncated(&self) -> bool {
        self.history
            .as_ref()
            .and_then(|h| h.page_info.as_ref())
            .and_then(|p| p.has_next_page)
            .unwrap_or(false)
    }
}

impl RawHistoryEntry {
    pub fn to_state_type(&self) -> Option<&str> {
        self.to_state.as_ref()?.state_type.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_full_record() {
        let json = r#"{
            "id": "abc",
            "identifier": "ENG-12",
            "title": "Fix login",
            "priority": 2,
            "estimate": 3.0,
            "state": {"name": "Done", "type": "completed"},
            "team": {"name": "Platform"},
            "assignee": null,
            "createdAt": "2024-01-01T00:00:00.000Z",
            "completedAt": "2024-01-04T00:00:00.000Z",
            "history": {"nodes": [
                {"createdAt": "2024-01-02T00:00:00.000Z", "toState": {"type": "started"}}
            ]}
        }"#;
        let issue: RawIssue = serde_json::from_str(json).unwrap();
        assert_eq!(issue.identifier.as_deref(), Some("ENG-12"));
        assert_eq!(issue.priority, Some(2.0));
        assert!(issue.assignee.is_none());
        assert!(issue.started_at.is_none());
        assert_eq!(issue.history_nodes().len(), 1);
        assert_eq!(issue.history_nodes()[0].to_state_type(), Some("started"));
    }

    #[test]
    fn test_deserialize_sparse_record() {
        let issue: RawIssue = serde_json::from_str(r#"{"id": "x", "history": {"nodes": null}}"#).unwrap();
        assert_eq!(issue.id.as_deref(), Some("x"));
        assert!(issue.history_nodes().is_empty());
        assert!(issue.state.is_none());
    }

    #[test]
    fn test_from_node_drops_mistyped_fields() {
        let node = serde_json::json!({
            "id": "abc",
            "identifier": "ENG-2",
            "estimate": "3",
            "priority": 1,
            "state": {"name": "Todo", "type": 7},
            "createdAt": "2024-01-01T00:00:00Z"
        });
        let (issue, errors) = RawIssue::from_node(&node).unwrap();
        assert_eq!(issue.identifier.as_deref(), Some("ENG-2"));
        assert_eq!(issue.priority, Some(1.0));
        assert_eq!(issue.created_at.as_deref(), Some("2024-01-01T00:00:00Z"));
        assert!(issue.estimate.is_none());
        assert!(issue.state.is_none());

        let mut fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        fields.sort();
        assert_eq!(fields, vec!["estimate", "state"]);
    }

    #[test]
    fn test_from_node_clean_record_has_no_errors() {
        let node = serde_json::json!({"id": "abc", "estimate": 2.5});
        let (issue, errors) = RawIssue::from_node(&node).unwrap();
        assert_eq!(issue.estimate, Some(2.5));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_from_node_rejects_non_object() {
        assert!(RawIssue::from_node(&serde_json::json!("ENG-1")).is_err());
        assert!(RawIssue::from_node(&serde_json::json!(42)).is_err());
    }

    #[test]
    fn test_history_truncated() {
        let issue: RawIssue = serde_json::from_str(
            r#"{"history": {"nodes": [], "pageInfo": {"hasNextPage": true}}}"#,
        )
        .unwrap();
        assert!(issue.history_truncated());
        assert!(!RawIssue::default().history_truncated());
    }
}
