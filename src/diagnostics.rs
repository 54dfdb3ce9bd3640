//! Injected reporting for recoverable problems.
//!
//! Nothing in the ingest or metrics path fails its caller on bad data.
//! Instead, each component is handed a [`DiagnosticSink`] at construction and
//! reports what it had to paper over.

use std::fmt;
use std::sync::Mutex;

/// A recovered problem. Every variant describes a condition that was
/// handled locally: a field became absent, a cache read became a miss, or a
/// fetch stopped early.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    UnparseableTimestamp {
        issue: String,
        field: &'static str,
        value: String,
    },
    UnrecognizedStateType {
        issue: String,
        value: String,
    },
    InvalidField {
        issue: String,
        field: String,
        detail: String,
    },
    HistoryTruncated {
        issue: String,
        entries: usize,
    },
    MissingTeam {
        issue: String,
    },
    CacheIntegrity {
        key: String,
        detail: String,
    },
    CacheExpired {
        key: String,
    },
    CacheWriteFailed {
        key: String,
        detail: String,
    },
    UpstreamProtocol {
        page: u32,
        detail: String,
    },
    SafetyLimitReached {
        pages: u32,
        issues: usize,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::UnparseableTimestamp { issue, field, value } => {
                write!(f, "{issue}: could not parse {field} timestamp '{value}'")
            }
            Warning::UnrecognizedStateType { issue, value } => {
                write!(f, "{issue}: unrecognized state type '{value}'")
            }
            Warning::InvalidField {
                issue,
                field,
                detail,
            } => write!(f, "{issue}: dropped field {field}: {detail}"),
            Warning::HistoryTruncated { issue, entries } => write!(
                f,
                "{issue}: only the first {entries} history entries were fetched"
            ),
            Warning::MissingTeam { issue } => write!(f, "{issue}: no team, grouped as Unknown Team"),
            Warning::CacheIntegrity { key, detail } => {
                write!(f, "cache entry {key} unreadable, treating as miss: {detail}")
            }
            Warning::CacheExpired { key } => write!(f, "cache entry {key} expired"),
            Warning::CacheWriteFailed { key, detail } => {
                write!(f, "could not write cache entry {key}: {detail}")
            }
            Warning::UpstreamProtocol { page, detail } => {
                write!(f, "page {page} fetch failed, discarding results: {detail}")
            }
            Warning::SafetyLimitReached { pages, issues } => write!(
                f,
                "stopped after {pages} pages ({issues} issues); results may be truncated"
            ),
        }
    }
}

/// Receives warnings and progress events from the ingest and metrics path.
pub trait DiagnosticSink: Send + Sync {
    fn warn(&self, warning: Warning);

    fn on_page_fetched(&self, _page: u32, _issues: usize) {}
    fn on_cache_hit(&self, _key: &str, _issues: usize) {}
    fn on_cache_miss(&self, _key: &str) {}
}

/// Forwards everything to the `log` facade.
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn warn(&self, warning: Warning) {
        match warning {
            Warning::CacheExpired { .. } => log::debug!("{warning}"),
            _ => log::warn!("{warning}"),
        }
    }

    fn on_page_fetched(&self, page: u32, issues: usize) {
        log::debug!("Fetched page {page} ({issues} issues)");
    }

    fn on_cache_hit(&self, key: &str, issues: usize) {
        log::info!("Cache hit for {key} ({issues} issues)");
    }

    fn on_cache_miss(&self, key: &str) {
        log::info!("Cache miss for {key}");
    }
}

/// Discards everything.
pub struct NoopSink;

impl DiagnosticSink for NoopSink {
    fn warn(&self, _warning: Warning) {}
}

/// Keeps warnings in memory and forwards them to the log.
#[derive(Default)]
pub struct RecordingSink {
    warnings: Mutex<Vec<Warning>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warnings(&self) -> Vec<Warning> {
        self.warnings
            .lock()
            .map(|w| w.clone())
            .unwrap_or_default()
    }

    pub fn truncated(&self) -> bool {
        self.warnings()
            .iter()
            .any(|w| matches!(w, Warning::SafetyLimitReached { .. }))
    }
}

impl DiagnosticSink for RecordingSink {
    fn warn(&self, warning: Warning) {
        LogSink.warn(warning.clone());
        if let Ok(mut w) = self.warnings.lock() {
            w.push(warning);
        }
    }
}
