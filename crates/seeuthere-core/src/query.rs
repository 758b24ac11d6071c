// ABOUTME: Process-wide cache of async fetches keyed by query identity, with staleness and retry policy.
// ABOUTME: Each key has its own mutex held across the fetch, giving a single writer per key.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::error::FetchError;

/// Identity under which fetched data is cached and deduplicated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    /// True when the leading parts of this key equal `prefix`.
    pub fn starts_with(&self, prefix: &[&str]) -> bool {
        prefix.len() <= self.0.len() && self.0.iter().zip(prefix).all(|(a, b)| a == b)
    }

    /// True when any part of the key equals `part`.
    pub fn contains(&self, part: &str) -> bool {
        self.0.iter().any(|p| p == part)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

/// How long successful data stays fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    /// Cached data never refetches because of age.
    Infinite,
    After(Duration),
}

/// Decides how many more attempts a failed query gets and how long to wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Same retry budget, no waiting between attempts.
    pub fn immediate() -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Number of retries left after the failure at `attempt_index` (0-based).
    /// An invalid token is terminal.
    pub fn retries_remaining(&self, attempt_index: u32, error: &FetchError) -> u32 {
        if error.is_invalid_token() {
            return 0;
        }
        self.max_retries.saturating_sub(attempt_index)
    }

    /// Exponential backoff capped at `max_delay`.
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt_index).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Default options applied to every query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    pub stale_time: Staleness,
    pub retry: RetryPolicy,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            stale_time: Staleness::Infinite,
            retry: RetryPolicy::default(),
        }
    }
}

/// Lifecycle of a single query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    Idle,
    Fetching,
    Success,
    Error,
}

#[derive(Debug)]
struct QueryEntry {
    status: QueryStatus,
    data: Option<serde_json::Value>,
    error: Option<FetchError>,
    failure_count: u32,
    fetch_count: u32,
    fetched_at: Option<Instant>,
    updated_at: Option<DateTime<Utc>>,
    /// Set when the entry was invalidated. A retired entry is no longer in
    /// the map and must not be written.
    retired: bool,
}

impl QueryEntry {
    fn new() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
            failure_count: 0,
            fetch_count: 0,
            fetched_at: None,
            updated_at: None,
            retired: false,
        }
    }

    fn retire(&mut self) {
        self.retired = true;
        self.status = QueryStatus::Idle;
        self.data = None;
        self.error = None;
    }
}

/// Point-in-time view of a cache entry, for the devtools panel.
#[derive(Debug, Clone, Serialize)]
pub struct QuerySnapshot {
    pub key: QueryKey,
    pub label: String,
    pub status: QueryStatus,
    pub has_data: bool,
    pub failure_count: u32,
    pub fetch_count: u32,
    pub updated_at: Option<String>,
    pub error: Option<String>,
}

/// Shared query cache. Clone the surrounding `Arc` to share it.
pub struct QueryClient {
    entries: RwLock<HashMap<QueryKey, Arc<Mutex<QueryEntry>>>>,
    options: QueryOptions,
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new(QueryOptions::default())
    }
}

impl QueryClient {
    pub fn new(options: QueryOptions) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            options,
        }
    }

    async fn slot(&self, key: &QueryKey) -> Arc<Mutex<QueryEntry>> {
        if let Some(slot) = self.entries.read().await.get(key) {
            return Arc::clone(slot);
        }
        let mut entries = self.entries.write().await;
        Arc::clone(
            entries
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(QueryEntry::new()))),
        )
    }

    /// Remove `key` if it still maps to `slot`.
    async fn unlink(&self, key: &QueryKey, slot: &Arc<Mutex<QueryEntry>>) -> bool {
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|live| Arc::ptr_eq(live, slot)) {
            entries.remove(key);
            true
        } else {
            false
        }
    }

    /// Lock the live entry for `key`, skipping entries retired while we
    /// waited on them.
    async fn claim(&self, key: &QueryKey) -> OwnedMutexGuard<QueryEntry> {
        loop {
            let slot = self.slot(key).await;
            let entry = Arc::clone(&slot).lock_owned().await;
            if !entry.retired {
                return entry;
            }
            drop(entry);
            self.unlink(key, &slot).await;
        }
    }

    fn is_fresh(&self, entry: &QueryEntry) -> bool {
        if entry.status != QueryStatus::Success {
            return false;
        }
        match self.options.stale_time {
            Staleness::Infinite => true,
            Staleness::After(ttl) => entry.fetched_at.is_some_and(|at| at.elapsed() < ttl),
        }
    }

    /// Return cached data for `key` if fresh, otherwise run `fetcher` under
    /// the retry policy and cache its result.
    ///
    /// Concurrent calls with the same key wait for the in-flight fetch and
    /// then read its result instead of fetching again.
    pub async fn fetch<T, F, Fut>(&self, key: QueryKey, mut fetcher: F) -> Result<T, FetchError>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut entry = self.claim(&key).await;

        if self.is_fresh(&entry) {
            if let Some(data) = entry.data.clone() {
                tracing::debug!(%key, "query cache hit");
                return serde_json::from_value(data).map_err(|e| FetchError::decode(e.to_string()));
            }
        }

        entry.status = QueryStatus::Fetching;
        let mut attempt: u32 = 0;
        loop {
            entry.fetch_count += 1;
            tracing::debug!(%key, attempt, "fetching query");

            let err = match fetcher().await {
                Ok(value) => match serde_json::to_value(&value) {
                    Ok(data) => {
                        entry.status = QueryStatus::Success;
                        entry.data = Some(data);
                        entry.error = None;
                        entry.failure_count = 0;
                        entry.fetched_at = Some(Instant::now());
                        entry.updated_at = Some(Utc::now());
                        return Ok(value);
                    }
                    Err(e) => FetchError::decode(e.to_string()),
                },
                Err(err) => err,
            };

            entry.failure_count += 1;
            let remaining = self.options.retry.retries_remaining(attempt, &err);
            if remaining == 0 {
                tracing::warn!(%key, attempt, error = %err, "query failed");
                entry.status = QueryStatus::Error;
                entry.error = Some(err.clone());
                entry.updated_at = Some(Utc::now());
                return Err(err);
            }

            let delay = self.options.retry.delay_for(attempt);
            tracing::debug!(%key, attempt, remaining, ?delay, error = %err, "retrying query");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Drop every entry whose key contains `part`. Returns how many were removed.
    ///
    /// An entry with a fetch in flight is dropped once that fetch finishes,
    /// so a key never has two fetches running at once.
    pub async fn invalidate_containing(&self, part: &str) -> usize {
        let doomed: Vec<(QueryKey, Arc<Mutex<QueryEntry>>)> = self
            .entries
            .read()
            .await
            .iter()
            .filter(|(key, _)| key.contains(part))
            .map(|(key, slot)| (key.clone(), Arc::clone(slot)))
            .collect();

        let mut removed = 0;
        for (key, slot) in doomed {
            let mut entry = slot.lock().await;
            entry.retire();
            drop(entry);
            if self.unlink(&key, &slot).await {
                removed += 1;
            }
        }
        removed
    }

    /// Snapshot of all entries, sorted by key. Entries locked by an
    /// in-flight fetch are reported as fetching without waiting.
    pub async fn snapshot(&self) -> Vec<QuerySnapshot> {
        let entries = self.entries.read().await;
        let mut out: Vec<QuerySnapshot> = entries
            .iter()
            .map(|(key, slot)| match slot.try_lock() {
                Ok(entry) => QuerySnapshot {
                    key: key.clone(),
                    label: key.to_string(),
                    status: entry.status,
                    has_data: entry.data.is_some(),
                    failure_count: entry.failure_count,
                    fetch_count: entry.fetch_count,
                    updated_at: entry.updated_at.map(|t| t.to_rfc3339()),
                    error: entry.error.as_ref().map(|e| e.message.clone()),
                },
                Err(_) => QuerySnapshot {
                    key: key.clone(),
                    label: key.to_string(),
                    status: QueryStatus::Fetching,
                    has_data: false,
                    failure_count: 0,
                    fetch_count: 0,
                    updated_at: None,
                    error: None,
                },
            })
            .collect();
        out.sort_by(|a, b| a.key.cmp(&b.key));
        out
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
