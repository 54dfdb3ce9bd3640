pub mod cache;
pub mod config;
pub mod date_util;
pub mod diagnostics;
pub mod error;
pub mod ingest;
pub mod issue;
pub mod metrics;
pub mod storage;

pub use cache::{CacheKey, CacheRecord, CacheStats, CacheStore};
pub use config::{Overrides, Settings};
pub use diagnostics::{DiagnosticSink, LogSink, NoopSink, RecordingSink, Warning};
pub use error::{Error, Result};
pub use ingest::{
    FetchOutcome, IngestStatus, IngestionPipeline, IssueCollection, IssueQuery, LinearClient,
    QueryExecutor,
};
pub use issue::{IssueSummary, IssueView, RawIssue, StateType};
pub use metrics::{MetricsEngine, MetricsRecord, MetricsReport, TimeStats, ThroughputStats};
pub use storage::Database;

use std::sync::Arc;

/// Main entry point: fetches issues and turns them into metrics.
pub struct LinearFlow<E> {
    pipeline: IngestionPipeline<E>,
    engine: MetricsEngine,
}

impl<E: QueryExecutor> LinearFlow<E> {
    pub fn new(pipeline: IngestionPipeline<E>) -> Self {
        let engine = MetricsEngine::new(pipeline.sink().clone());
        Self { pipeline, engine }
    }

    pub fn pipeline(&self) -> &IngestionPipeline<E> {
        &self.pipeline
    }

    pub fn engine(&self) -> &MetricsEngine {
        &self.engine
    }

    /// Fetch the issues matching `query`, from cache when possible.
    pub async fn issues(&self, query: &IssueQuery) -> IssueCollection {
        self.pipeline.fetch(query).await
    }

    /// Fetch and compute overall and per-team metrics in one pass.
    pub async fn report(&self, query: &IssueQuery) -> MetricsReport {
        let collection = self.issues(query).await;
        let views = collection.views();
        MetricsReport {
            status: collection.status().clone(),
            overall: self.engine.overall(&views),
            by_team: self.engine.by_team(&views),
        }
    }
}

impl LinearFlow<LinearClient> {
    /// Wire a Linear client, and optionally the cache, from resolved settings.
    pub fn from_settings(
        settings: &Settings,
        db: Database,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Result<Self> {
        let client = LinearClient::new(settings.require_api_key()?, settings.api_url.as_str())?;
        let mut pipeline =
            IngestionPipeline::new(client, sink.clone()).with_page_size(settings.page_size);
        if settings.cache_enabled {
            pipeline = pipeline.with_cache(CacheStore::new(db, sink));
        }
        Ok(Self::new(pipeline))
    }
}
