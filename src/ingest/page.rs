use serde_json::{json, Value};

use crate::diagnostics::Warning;
use crate::ingest::query::IssueQuery;
use crate::issue::RawIssue;

/// GraphQL document for one page of issues.
pub const ISSUES_QUERY: &str = r#"query Issues($filter: IssueFilter, $first: Int!, $after: String, $includeArchived: Boolean) {
  issues(filter: $filter, first: $first, after: $after, includeArchived: $includeArchived) {
    nodes {
      id
      identifier
      title
      priority
      estimate
      state { name type }
      team { name }
      assignee { name }
      createdAt
      updatedAt
      startedAt
      completedAt
      archivedAt
      history(first: 100) {
        nodes {
          createdAt
          toState { type }
        }
        pageInfo {
          hasNextPage
        }
      }
    }
    pageInfo {
      hasNextPage
      endCursor
    }
  }
}"#;

/// Pagination position for one fetch session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageState {
    current_page: u32,
    cursor: Option<String>,
    has_more: bool,
}

impl PageState {
    pub fn new() -> Self {
        Self {
            current_page: 1,
            cursor: None,
            has_more: true,
        }
    }

    /// 1-based number of the page about to be requested.
    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn pages_fetched(&self) -> u32 {
        self.current_page - 1
    }

    /// No further page may be requested: upstream is exhausted, or
    /// `max_pages` pages have already been fetched.
    pub fn is_terminal(&self, max_pages: u32) -> bool {
        !self.has_more || self.current_page > max_pages
    }

    pub(super) fn advance(&mut self, has_more: bool, next_cursor: Option<String>) {
        self.has_more = has_more;
        self.cursor = next_cursor;
        self.current_page += 1;
    }
}

impl Default for PageState {
    fn default() -> Self {
        Self::new()
    }
}

/// One page request as handed to a [`QueryExecutor`](super::QueryExecutor).
#[derive(Debug, Clone, PartialEq)]
pub struct PageQuery {
    pub query: IssueQuery,
    pub first: u32,
    pub after: Option<String>,
}

impl PageQuery {
    pub fn new(query: IssueQuery, first: u32, after: Option<String>) -> Self {
        Self { query, first, after }
    }

    pub fn variables(&self) -> Value {
        json!({
            "filter": self.query.graphql_filter(),
            "first": self.first,
            "after": self.after,
            "includeArchived": self.query.include_archived,
        })
    }

    /// The JSON body POSTed to a GraphQL endpoint.
    pub fn to_request_body(&self) -> Value {
        json!({
            "query": ISSUES_QUERY,
            "variables": self.variables(),
        })
    }
}

/// A decoded page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub issues: Vec<RawIssue>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
    /// Fields dropped from individual issues.
    pub warnings: Vec<Warning>,
}

/// Decode the `data` object of an issues response.
///
/// Anything other than `{issues: {nodes: [...], pageInfo: {hasNextPage,
/// endCursor}}}` is rejected, as is a response that claims more pages but
/// gives no cursor to reach them. A mistyped field inside one node only
/// drops that field.
pub fn parse_page(data: &Value) -> Result<Page, String> {
    if data.is_null() {
        return Err("response has no data".into());
    }
    let connection = data
        .get("issues")
        .filter(|v| v.is_object())
        .ok_or("response has no issues object")?;

    let nodes = connection
        .get("nodes")
        .and_then(Value::as_array)
        .ok_or("issues.nodes is missing or not an array")?;
    let mut issues = Vec::with_capacity(nodes.len());
    let mut warnings = Vec::new();
    for (i, node) in nodes.iter().enumerate() {
        let (issue, errors) =
            RawIssue::from_node(node).map_err(|e| format!("issues.nodes[{i}]: {e}"))?;
        let label = issue
            .identifier
            .clone()
            .or_else(|| issue.id.clone())
            .unwrap_or_else(|| format!("issues.nodes[{i}]"));
        warnings.extend(errors.into_iter().map(|e| Warning::InvalidField {
            issue: label.clone(),
            field: e.field,
            detail: e.detail,
        }));
        issues.push(issue);
    }

    let page_info = connection
        .get("pageInfo")
        .filter(|v| v.is_object())
        .ok_or("issues.pageInfo is missing")?;
    let has_more = page_info
        .get("hasNextPage")
        .and_then(Value::as_bool)
        .ok_or("pageInfo.hasNextPage is missing or not a boolean")?;
    let next_cursor = page_info
        .get("endCursor")
        .and_then(Value::as_str)
        .map(str::to_string);

    if has_more && next_cursor.is_none() {
        return Err("hasNextPage is true but endCursor is missing".into());
    }

    Ok(Page {
        issues,
        has_more,
        next_cursor,
        warnings,
    })
}
