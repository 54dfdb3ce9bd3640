use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::cache::CacheKey;

/// Options selecting which issues to fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueQuery {
    pub team: Option<String>,
    pub assignee: Option<String>,
    /// Inclusive lower bound on creation date.
    pub created_after: Option<NaiveDate>,
    /// Inclusive upper bound on creation date.
    pub created_before: Option<NaiveDate>,
    /// Inclusive lower bound on last update date.
    pub updated_after: Option<NaiveDate>,
    pub include_archived: bool,
}

impl IssueQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn team(mut self, name: &str) -> Self {
        self.team = Some(name.to_string());
        self
    }

    pub fn assignee(mut self, name: &str) -> Self {
        self.assignee = Some(name.to_string());
        self
    }

    pub fn created_after(mut self, date: NaiveDate) -> Self {
        self.created_after = Some(date);
        self
    }

    pub fn created_before(mut self, date: NaiveDate) -> Self {
        self.created_before = Some(date);
        self
    }

    pub fn updated_after(mut self, date: NaiveDate) -> Self {
        self.updated_after = Some(date);
        self
    }

    pub fn include_archived(mut self, val: bool) -> Self {
        self.include_archived = val;
        self
    }

    /// Fingerprint of every option. Two queries share a key only if they
    /// would request exactly the same issues.
    pub fn cache_key(&self) -> CacheKey {
        let date = |d: Option<NaiveDate>| d.map(|d| d.format("%Y-%m-%d").to_string());
        CacheKey::from_params(&[
            ("team", self.team.clone()),
            ("assignee", self.assignee.clone()),
            ("created_after", date(self.created_after)),
            ("created_before", date(self.created_before)),
            ("updated_after", date(self.updated_after)),
            ("include_archived", Some(self.include_archived.to_string())),
        ])
    }

    /// The `IssueFilter` input object for the GraphQL `issues` field, or
    /// `None` when nothing is filtered.
    pub fn graphql_filter(&self) -> Option<Value> {
        let mut filter = Map::new();

        if let Some(team) = &self.team {
            filter.insert("team".into(), json!({ "name": { "eqIgnoreCase": team } }));
        }
        if let Some(assignee) = &self.assignee {
            filter.insert(
                "assignee".into(),
                json!({ "name": { "eqIgnoreCase": assignee } }),
            );
        }

        let mut created = Map::new();
        if let Some(after) = self.created_after {
            created.insert("gte".into(), json!(start_of_day(after)));
        }
        if let Some(before) = self.created_before {
            // Inclusive date: anything before the following midnight.
            created.insert("lt".into(), json!(start_of_day(before + Duration::days(1))));
        }
        if !created.is_empty() {
            filter.insert("createdAt".into(), Value::Object(created));
        }

        if let Some(after) = self.updated_after {
            filter.insert("updatedAt".into(), json!({ "gte": start_of_day(after) }));
        }

        if filter.is_empty() {
            None
        } else {
            Some(Value::Object(filter))
        }
    }
}

fn start_of_day(date: NaiveDate) -> String {
    format!("{}T00:00:00.000Z", date.format("%Y-%m-%d"))
}
