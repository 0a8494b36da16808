//! Per-user match list cache.
//!
//! Entries hold the ranked list computed for a user together with its
//! creation time. Expiry is checked lazily on read; nothing evicts entries in
//! the background, so an expired entry may sit in memory until it is
//! overwritten, invalidated, or swept by [`MatchCache::purge_expired`].
//!
//! Writers capture a [`CacheGeneration`] before computing and hand it back on
//! insert. `invalidate` and `clear` advance the generation, so a list whose
//! computation overlapped an invalidation is never stored.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::models::ScoredMatch;

/// A ranked match list and the candidate pool it was drawn from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedList {
    /// Candidates, best first
    pub matches: Vec<ScoredMatch>,

    /// Ids kept out of the candidate pool when it was built
    pub excluded: HashSet<String>,

    /// The pool hit its size cap, so more candidates exist beyond it
    pub pool_truncated: bool,
}

impl RankedList {
    pub fn new(matches: Vec<ScoredMatch>) -> Self {
        Self {
            matches,
            ..Self::default()
        }
    }
}

/// Snapshot of a user's cache generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheGeneration {
    epoch: u64,
    user: u64,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    list: Arc<RankedList>,
    created_at: Instant,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,

    /// Bumped by `invalidate`; users never invalidated are at 0
    generations: HashMap<String, u64>,

    /// Bumped by `clear`
    epoch: u64,
}

impl CacheState {
    fn generation(&self, user_id: &str) -> CacheGeneration {
        CacheGeneration {
            epoch: self.epoch,
            user: self.generations.get(user_id).copied().unwrap_or(0),
        }
    }
}

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,

    /// Computed lists dropped because an invalidation overlapped them
    pub stale_writes: u64,
}

/// TTL cache of ranked match lists keyed by requesting user.
#[derive(Debug)]
pub struct MatchCache {
    ttl: Duration,
    state: RwLock<CacheState>,
    hits: AtomicU64,
    misses: AtomicU64,
    stale_writes: AtomicU64,
}

impl MatchCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: RwLock::new(CacheState::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            stale_writes: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached list for `user_id`, if present and younger than the TTL.
    pub async fn get(&self, user_id: &str) -> Option<Arc<RankedList>> {
        let state = self.state.read().await;
        match state.entries.get(user_id) {
            Some(entry) if entry.created_at.elapsed() < self.ttl => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(Arc::clone(&entry.list))
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Current generation of `user_id`. Capture before computing a list.
    pub async fn generation(&self, user_id: &str) -> CacheGeneration {
        self.state.read().await.generation(user_id)
    }

    /// Store a list computed under `generation`, replacing any previous one.
    ///
    /// Returns `false` and stores nothing if the user was invalidated or the
    /// cache was cleared since `generation` was taken.
    pub async fn insert(&self, user_id: &str, generation: CacheGeneration, list: Arc<RankedList>) -> bool {
        let mut state = self.state.write().await;
        if state.generation(user_id) != generation {
            self.stale_writes.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        state.entries.insert(
            user_id.to_string(),
            CacheEntry {
                list,
                created_at: Instant::now(),
            },
        );
        true
    }

    /// Drop the entry for `user_id`. Returns whether one existed.
    pub async fn invalidate(&self, user_id: &str) -> bool {
        let mut state = self.state.write().await;
        *state.generations.entry(user_id.to_string()).or_insert(0) += 1;
        state.entries.remove(user_id).is_some()
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.entries.clear();
        state.generations.clear();
        state.epoch += 1;
    }

    /// Remove expired entries. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut state = self.state.write().await;
        let before = state.entries.len();
        state.entries.retain(|_, entry| entry.created_at.elapsed() < self.ttl);
        before - state.entries.len()
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.state.read().await.entries.len(),
            stale_writes: self.stale_writes.load(Ordering::Relaxed),
        }
    }
}
