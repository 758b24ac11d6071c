// ABOUTME: Bounded per-visitor participant storage for the midpoint page.
// ABOUTME: Entries expire after an idle period, the visitor count is capped, and empty lists are dropped.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use seeuthere_core::{ParticipantContext, Point};
use thiserror::Error;
use tokio::sync::RwLock;
use ulid::Ulid;

/// Errors raised when changing a visitor's participants.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VisitorError {
    #[error("a midpoint search can have at most {0} participants")]
    TooManyParticipants(usize),
}

/// Bounds on server-held visitor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisitorLimits {
    /// Entries untouched for this long are dropped.
    pub idle: Duration,
    pub max_visitors: usize,
    pub max_participants: usize,
}

impl Default for VisitorLimits {
    fn default() -> Self {
        Self {
            idle: Duration::from_secs(2 * 60 * 60),
            max_visitors: 10_000,
            max_participants: 10,
        }
    }
}

#[derive(Debug)]
struct VisitorEntry {
    participants: ParticipantContext,
    last_seen: Instant,
}

/// Participant lists keyed by the visitor cookie.
#[derive(Debug)]
pub struct VisitorStore {
    entries: RwLock<HashMap<Ulid, VisitorEntry>>,
    limits: VisitorLimits,
}

impl Default for VisitorStore {
    fn default() -> Self {
        Self::new(VisitorLimits::default())
    }
}

impl VisitorStore {
    pub fn new(limits: VisitorLimits) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            limits,
        }
    }

    pub fn limits(&self) -> VisitorLimits {
        self.limits
    }

    /// Copy of a visitor's participants. Unknown or expired visitors get an
    /// empty list.
    pub async fn participants(&self, visitor: Ulid) -> ParticipantContext {
        let mut entries = self.entries.write().await;
        match entries.get_mut(&visitor) {
            Some(entry) if entry.last_seen.elapsed() < self.limits.idle => {
                entry.last_seen = Instant::now();
                entry.participants.clone()
            }
            Some(_) => {
                entries.remove(&visitor);
                ParticipantContext::default()
            }
            None => ParticipantContext::default(),
        }
    }

    /// Add a participant for `visitor`, creating the entry if needed.
    ///
    /// Expired entries are swept first. When the store is full, the least
    /// recently seen visitor makes room for a new one.
    pub async fn add(
        &self,
        visitor: Ulid,
        name: &str,
        address: &str,
        point: Point,
    ) -> Result<Ulid, VisitorError> {
        let mut entries = self.entries.write().await;
        let idle = self.limits.idle;
        entries.retain(|_, e| e.last_seen.elapsed() < idle);

        if let Some(entry) = entries.get(&visitor) {
            if entry.participants.len() >= self.limits.max_participants {
                return Err(VisitorError::TooManyParticipants(self.limits.max_participants));
            }
        } else {
            if self.limits.max_participants == 0 {
                return Err(VisitorError::TooManyParticipants(0));
            }
            while entries.len() >= self.limits.max_visitors.max(1) {
                let Some(oldest) = entries
                    .iter()
                    .min_by_key(|(_, e)| e.last_seen)
                    .map(|(id, _)| *id)
                else {
                    break;
                };
                entries.remove(&oldest);
                tracing::debug!(visitor = %oldest, "visitor evicted to make room");
            }
        }

        let entry = entries.entry(visitor).or_insert_with(|| VisitorEntry {
            participants: ParticipantContext::default(),
            last_seen: Instant::now(),
        });
        entry.last_seen = Instant::now();
        Ok(entry.participants.add(name, address, point))
    }

    /// Remove a participant. A visitor left with no participants is dropped.
    pub async fn remove(&self, visitor: Ulid, id: Ulid) -> bool {
        let mut entries = self.entries.write().await;
        let Some(entry) = entries.get_mut(&visitor) else {
            return false;
        };
        let removed = entry.participants.remove(id);
        entry.last_seen = Instant::now();
        if entry.participants.is_empty() {
            entries.remove(&visitor);
        }
        removed
    }

    /// Drop every idle entry. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        let idle = self.limits.idle;
        entries.retain(|_, e| e.last_seen.elapsed() < idle);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
