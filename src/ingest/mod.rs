pub mod linear;
pub mod page;
pub mod paginator;
pub mod query;
pub mod rate_limit;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use linear::{LinearClient, DEFAULT_API_URL};
pub use page::{PageQuery, PageState};
pub use paginator::{FetchOutcome, Paginator, QueryExecutor, DEFAULT_PAGE_SIZE, MAX_PAGES};
pub use query::IssueQuery;

use crate::cache::CacheStore;
use crate::diagnostics::{DiagnosticSink, Warning};
use crate::issue::{IssueView, RawIssue};

/// How an [`IssueCollection`] was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum IngestStatus {
    Fresh,
    Cached,
    /// Pagination hit the safety limit, on this fetch or on the one that
    /// filled the cache.
    Truncated,
    /// The fetch failed; the collection is empty.
    Failed(String),
}

/// Cache payload: the issues plus whether the fetch that produced them was
/// cut short.
#[derive(Serialize, Deserialize)]
struct CachedFetch<I> {
    truncated: bool,
    issues: I,
}

/// Issues returned by the pipeline. Downstream code reads them through
/// [`IssueView`] only.
pub struct IssueCollection {
    issues: Vec<RawIssue>,
    status: IngestStatus,
    sink: Arc<dyn DiagnosticSink>,
}

impl IssueCollection {
    pub fn new(issues: Vec<RawIssue>, status: IngestStatus, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            issues,
            status,
            sink,
        }
    }

    pub fn views(&self) -> Vec<IssueView<'_>> {
        self.issues
            .iter()
            .map(|raw| IssueView::new(raw, self.sink.as_ref()))
            .collect()
    }

    pub fn status(&self) -> &IngestStatus {
        &self.status
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Cache-or-fetch front door for issue data.
pub struct IngestionPipeline<E> {
    executor: E,
    cache: Option<CacheStore>,
    sink: Arc<dyn DiagnosticSink>,
    page_size: u32,
}

impl<E: QueryExecutor> IngestionPipeline<E> {
    /// A pipeline that always fetches. Add a cache with [`Self::with_cache`].
    pub fn new(executor: E, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            executor,
            cache: None,
            sink,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_cache(mut self, cache: CacheStore) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn caching_enabled(&self) -> bool {
        self.cache.is_some()
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn sink(&self) -> &Arc<dyn DiagnosticSink> {
        &self.sink
    }

    /// Return the issues matching `query`.
    ///
    /// With a cache: a same-day hit is returned without touching the
    /// network; a miss fetches and stores the result. Never fails: an
    /// upstream error yields an empty collection with
    /// [`IngestStatus::Failed`].
    pub async fn fetch(&self, query: &IssueQuery) -> IssueCollection {
        let Some(cache) = &self.cache else {
            return self.collect(self.fetch_uncached(query).await);
        };

        let key = query.cache_key();
        if let Some(cached) = cache.get::<CachedFetch<Vec<RawIssue>>>(&key).await {
            self.sink.on_cache_hit(&key.to_string(), cached.issues.len());
            let status = if cached.truncated {
                self.sink.warn(Warning::SafetyLimitReached {
                    pages: MAX_PAGES,
                    issues: cached.issues.len(),
                });
                IngestStatus::Truncated
            } else {
                IngestStatus::Cached
            };
            return IssueCollection::new(cached.issues, status, self.sink.clone());
        }
        self.sink.on_cache_miss(&key.to_string());

        let outcome = self.fetch_uncached(query).await;
        // Failures are not cached.
        if !matches!(outcome, FetchOutcome::Failed(_)) {
            let payload = CachedFetch {
                truncated: matches!(outcome, FetchOutcome::Truncated(_)),
                issues: outcome.issues(),
            };
            if let Err(e) = cache.put(&key, &payload).await {
                self.sink.warn(Warning::CacheWriteFailed {
                    key: key.to_string(),
                    detail: e.to_string(),
                });
            }
        }
        self.collect(outcome)
    }

    async fn fetch_uncached(&self, query: &IssueQuery) -> FetchOutcome {
        Paginator::new(&self.executor, self.sink.as_ref())
            .with_page_size(self.page_size)
            .fetch_all(query)
            .await
    }

    fn collect(&self, outcome: FetchOutcome) -> IssueCollection {
        let (issues, status) = match outcome {
            FetchOutcome::Complete(issues) => (issues, IngestStatus::Fresh),
            FetchOutcome::Truncated(issues) => (issues, IngestStatus::Truncated),
            FetchOutcome::Failed(reason) => (Vec::new(), IngestStatus::Failed(reason)),
        };
        IssueCollection::new(issues, status, self.sink.clone())
    }
}
