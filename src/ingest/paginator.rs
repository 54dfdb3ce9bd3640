use serde_json::Value;

use crate::diagnostics::{DiagnosticSink, Warning};
use crate::error::Result;
use crate::ingest::page::{parse_page, PageQuery, PageState};
use crate::ingest::query::IssueQuery;
use crate::issue::RawIssue;

/// Hard ceiling on pages per fetch, whatever upstream says about `hasNextPage`.
pub const MAX_PAGES: u32 = 100;

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 250;

/// Runs a single page query against the upstream API and returns the
/// response's `data` object.
///
/// Timeouts and retries are the executor's business; the paginator treats
/// any `Err` as the end of the fetch.
#[allow(async_fn_in_trait)]
pub trait QueryExecutor {
    async fn execute(&self, query: &PageQuery) -> Result<Value>;
}

/// Result of walking every page.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Upstream reported no more pages.
    Complete(Vec<RawIssue>),
    /// Stopped at [`MAX_PAGES`] while upstream still had more.
    Truncated(Vec<RawIssue>),
    /// A page failed or was malformed; everything fetched so far is dropped.
    Failed(String),
}

impl FetchOutcome {
    pub fn issues(&self) -> &[RawIssue] {
        match self {
            FetchOutcome::Complete(issues) | FetchOutcome::Truncated(issues) => issues,
            FetchOutcome::Failed(_) => &[],
        }
    }
}

/// Walks cursor pagination sequentially: each request needs the cursor from
/// the previous response.
pub struct Paginator<'a, E> {
    executor: &'a E,
    sink: &'a dyn DiagnosticSink,
    page_size: u32,
    max_pages: u32,
}

impl<'a, E: QueryExecutor> Paginator<'a, E> {
    pub fn new(executor: &'a E, sink: &'a dyn DiagnosticSink) -> Self {
        Self {
            executor,
            sink,
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: MAX_PAGES,
        }
    }

    /// Clamped to `1..=MAX_PAGE_SIZE`.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub async fn fetch_all(&self, query: &IssueQuery) -> FetchOutcome {
        let mut state = PageState::new();
        let mut issues: Vec<RawIssue> = Vec::new();

        while !state.is_terminal(self.max_pages) {
            let page_number = state.current_page();
            let page_query = PageQuery::new(
                query.clone(),
                self.page_size,
                state.cursor().map(str::to_string),
            );

            let page = match self.executor.execute(&page_query).await {
                Ok(data) => parse_page(&data),
                Err(e) => Err(e.to_string()),
            };
            let page = match page {
                Ok(page) => page,
                Err(detail) => {
                    self.sink.warn(Warning::UpstreamProtocol {
                        page: page_number,
                        detail: detail.clone(),
                    });
                    return FetchOutcome::Failed(detail);
                }
            };

            for warning in page.warnings {
                self.sink.warn(warning);
            }
            self.sink.on_page_fetched(page_number, page.issues.len());
            issues.extend(page.issues);
            state.advance(page.has_more, page.next_cursor);
        }

        if state.has_more() {
            self.sink.warn(Warning::SafetyLimitReached {
                pages: state.pages_fetched(),
                issues: issues.len(),
            });
            FetchOutcome::Truncated(issues)
        } else {
            FetchOutcome::Complete(issues)
        }
    }
}
