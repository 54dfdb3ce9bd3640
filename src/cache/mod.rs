//! Day-scoped result cache.
//!
//! A record written at any time of day stays valid until 23:59:59 local time
//! that same day. Expiry is checked on read and never deletes anything;
//! [`CacheStore::purge_expired`] is the only eviction.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Local};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::date_util::end_of_day;
use crate::diagnostics::{DiagnosticSink, Warning};
use crate::error::{Error, Result};
use crate::storage::repository::{self, CacheRow};
use crate::storage::Database;

const KEY_VERSION: &str = "issues/v2";

/// Deterministic fingerprint of a set of request parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Hash `(name, value)` pairs. Order-insensitive; a parameter that is
    /// absent must still be passed (as `None`) so that "unset" and "empty"
    /// stay distinct.
    pub fn from_params(params: &[(&str, Option<String>)]) -> Self {
        let mut sorted: Vec<&(&str, Option<String>)> = params.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));

        let mut hasher = Sha256::new();
        hasher.update(KEY_VERSION.as_bytes());
        for (name, value) in sorted {
            hasher.update(b"\n");
            hasher.update(name.as_bytes());
            match value {
                Some(v) => {
                    hasher.update(format!("={}:", v.len()).as_bytes());
                    hasher.update(v.as_bytes());
                }
                None => hasher.update(b"!"),
            }
        }
        CacheKey(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Full digests are noise in logs.
        f.write_str(&self.0[..12.min(self.0.len())])
    }
}

/// A stored result set with its validity window.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRecord {
    pub key: CacheKey,
    pub payload: String,
    pub cached_at: DateTime<FixedOffset>,
    pub expires_at: DateTime<FixedOffset>,
}

impl CacheRecord {
    /// A record for `payload` written at `now`, valid until end of that day.
    pub fn new(key: CacheKey, payload: String, now: DateTime<FixedOffset>) -> Self {
        Self {
            key,
            payload,
            expires_at: end_of_day(&now),
            cached_at: now,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<FixedOffset>) -> bool {
        now > self.expires_at
    }

    fn to_row(&self) -> CacheRow {
        CacheRow {
            cache_key: self.key.as_str().to_string(),
            payload: self.payload.clone(),
            cached_at: self.cached_at.to_rfc3339(),
            expires_at: self.expires_at.to_rfc3339(),
        }
    }

    fn from_row(row: CacheRow) -> std::result::Result<Self, String> {
        let cached_at = DateTime::parse_from_rfc3339(&row.cached_at)
            .map_err(|e| format!("bad cached_at '{}': {e}", row.cached_at))?;
        let expires_at = DateTime::parse_from_rfc3339(&row.expires_at)
            .map_err(|e| format!("bad expires_at '{}': {e}", row.expires_at))?;
        Ok(Self {
            key: CacheKey(row.cache_key),
            payload: row.payload,
            cached_at,
            expires_at,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub expired: usize,
}

/// Key-addressed JSON cache over the `cache_entries` table.
///
/// Reads never fail: a missing, expired, or undecodable entry is a miss.
#[derive(Clone)]
pub struct CacheStore {
    db: Database,
    sink: Arc<dyn DiagnosticSink>,
}

impl CacheStore {
    pub fn new(db: Database, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { db, sink }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        self.get_at(key, Local::now().fixed_offset()).await
    }

    pub async fn get_at<T: DeserializeOwned>(
        &self,
        key: &CacheKey,
        now: DateTime<FixedOffset>,
    ) -> Option<T> {
        let record = self.read_record(key).await?;
        if record.is_expired_at(now) {
            self.sink.warn(Warning::CacheExpired {
                key: key.to_string(),
            });
            return None;
        }
        match serde_json::from_str(&record.payload) {
            Ok(value) => Some(value),
            Err(e) => {
                self.sink.warn(Warning::CacheIntegrity {
                    key: key.to_string(),
                    detail: e.to_string(),
                });
                None
            }
        }
    }

    /// The stored record regardless of expiry; `None` if absent or unreadable.
    pub async fn read_record(&self, key: &CacheKey) -> Option<CacheRecord> {
        let lookup = key.as_str().to_string();
        let row = match self
            .db
            .reader()
            .call(move |conn| repository::get_cache_row(conn, &lookup))
            .await
        {
            Ok(row) => row?,
            Err(e) => {
                self.sink.warn(Warning::CacheIntegrity {
                    key: key.to_string(),
                    detail: e.to_string(),
                });
                return None;
            }
        };
        match CacheRecord::from_row(row) {
            Ok(record) => Some(record),
            Err(detail) => {
                self.sink.warn(Warning::CacheIntegrity {
                    key: key.to_string(),
                    detail,
                });
                None
            }
        }
    }

    pub async fn put<T: Serialize + ?Sized>(&self, key: &CacheKey, value: &T) -> Result<CacheRecord> {
        self.put_at(key, value, Local::now().fixed_offset()).await
    }

    pub async fn put_at<T: Serialize + ?Sized>(
        &self,
        key: &CacheKey,
        value: &T,
        now: DateTime<FixedOffset>,
    ) -> Result<CacheRecord> {
        let payload = serde_json::to_string(value)?;
        let record = CacheRecord::new(key.clone(), payload, now);
        self.put_record(&record).await?;
        Ok(record)
    }

    /// Store a record as-is, including its expiry.
    pub async fn put_record(&self, record: &CacheRecord) -> Result<()> {
        let row = record.to_row();
        self.db
            .writer()
            .call(move |conn| repository::put_cache_row(conn, &row))
            .await
            .map_err(|e| Error::Cache(e.to_string()))
    }

    pub async fn purge_expired(&self) -> Result<usize> {
        self.purge_expired_at(Local::now().fixed_offset()).await
    }

    /// Delete every record expired at `now`. Rows whose expiry cannot be
    /// decoded are deleted too, since no read can ever use them.
    pub async fn purge_expired_at(&self, now: DateTime<FixedOffset>) -> Result<usize> {
        self.db
            .writer()
            .call(move |conn| {
                let stale: Vec<String> = repository::list_cache_expiries(conn)?
                    .into_iter()
                    .filter(|(_, expires_at)| expiry_passed(expires_at, now))
                    .map(|(key, _)| key)
                    .collect();
                repository::delete_cache_rows(conn, &stale)
            })
            .await
            .map_err(|e| Error::Cache(e.to_string()))
    }

    pub async fn clear(&self) -> Result<usize> {
        self.db
            .writer()
            .call(|conn| repository::clear_cache(conn))
            .await
            .map_err(|e| Error::Cache(e.to_string()))
    }

    pub async fn stats_at(&self, now: DateTime<FixedOffset>) -> Result<CacheStats> {
        let expiries = self
            .db
            .reader()
            .call(|conn| repository::list_cache_expiries(conn))
            .await
            .map_err(|e| Error::Cache(e.to_string()))?;
        Ok(CacheStats {
            entries: expiries.len(),
            expired: expiries
                .iter()
                .filter(|(_, expires_at)| expiry_passed(expires_at, now))
                .count(),
        })
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        self.stats_at(Local::now().fixed_offset()).await
    }
}

fn expiry_passed(expires_at: &str, now: DateTime<FixedOffset>) -> bool {
    DateTime::parse_from_rfc3339(expires_at)
        .map(|exp| now > exp)
        .unwrap_or(true)
}
