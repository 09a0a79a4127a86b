//! Edit Jail - per-author edit-abuse state machine
//!
//! Strikes are counted per post. When any post of an author reaches the
//! strike limit the author is jailed, which suppresses every post of theirs
//! until the jail duration has passed. Release is lazy: the entry is removed
//! the first time the author is checked after expiry.
//!
//! All read-modify-write sequences and the persistence write that follows
//! them run under one mutex, so concurrent evaluations cannot interleave.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::store::{JailSnapshot, StateStore};
use crate::error::ScoutError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JailPolicy {
    /// Stale observations of one post that trigger a jail
    pub strike_limit: u32,
    /// How long a jailed author stays suppressed
    pub duration: Duration,
}

impl Default for JailPolicy {
    fn default() -> Self {
        Self {
            strike_limit: 2,
            duration: Duration::hours(24),
        }
    }
}

/// Result of checking an author before evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JailStatus {
    /// No jail entry
    Clear,
    /// Jailed until the given time
    Jailed { until: DateTime<Utc> },
    /// Entry had expired and was removed by this check
    Released,
}

impl JailStatus {
    pub fn is_jailed(&self) -> bool {
        matches!(self, JailStatus::Jailed { .. })
    }
}

/// Result of recording a stale observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrikeOutcome {
    /// Strike recorded, below the limit
    Strike { count: u32 },
    /// Limit reached; the author is now jailed
    Jailed { count: u32, until: DateTime<Utc> },
}

/// Active jail entry, for monitoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JailRecord {
    pub author: String,
    pub jailed_at: DateTime<Utc>,
    pub release_at: DateTime<Utc>,
}

pub struct EditJail {
    policy: JailPolicy,
    book: Mutex<JailSnapshot>,
    store: Arc<dyn StateStore>,
}

/// Strike key: lower-cased author plus permlink
pub fn post_id(author: &str, permlink: &str) -> String {
    format!("{}/{}", author.to_lowercase(), permlink)
}

fn start_time(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or(DateTime::UNIX_EPOCH)
}

impl EditJail {
    /// Restore from `store`; unreadable state starts empty
    pub fn open(policy: JailPolicy, store: Arc<dyn StateStore>) -> Self {
        let snapshot = store.restore();
        Self {
            policy,
            book: Mutex::new(snapshot),
            store,
        }
    }

    pub fn policy(&self) -> &JailPolicy {
        &self.policy
    }

    /// Check whether `author` may be evaluated at `now`.
    /// An expired entry is removed and the state saved.
    pub async fn check(&self, author: &str, now: DateTime<Utc>) -> JailStatus {
        let author = author.to_lowercase();
        let mut book = self.book.lock().await;

        let Some(&started_ms) = book.jail_entries.get(&author) else {
            return JailStatus::Clear;
        };

        let until = start_time(started_ms) + self.policy.duration;
        if now < until {
            return JailStatus::Jailed { until };
        }

        book.jail_entries.remove(&author);
        info!(author = %author, "Jail expired, author released");
        self.save_locked(&book);

        JailStatus::Released
    }

    /// Record that `author/permlink` was observed stale at `now`
    pub async fn record_stale(&self, author: &str, permlink: &str, now: DateTime<Utc>) -> StrikeOutcome {
        let id = post_id(author, permlink);
        let mut book = self.book.lock().await;

        let count = {
            let entry = book.edit_record.entry(id.clone()).or_insert(0);
            *entry += 1;
            *entry
        };

        let outcome = if count >= self.policy.strike_limit {
            let author = author.to_lowercase();
            book.jail_entries.insert(author.clone(), now.timestamp_millis());
            info!(author = %author, post = %id, strikes = count, "Author jailed for late edits");
            StrikeOutcome::Jailed {
                count,
                until: now + self.policy.duration,
            }
        } else {
            debug!(post = %id, strikes = count, "Stale post strike recorded");
            StrikeOutcome::Strike { count }
        };

        self.save_locked(&book);
        outcome
    }

    /// Save the current state (used before hibernation)
    pub async fn persist(&self) -> Result<(), ScoutError> {
        let book = self.book.lock().await;
        self.store.save(&book)
    }

    pub async fn snapshot(&self) -> JailSnapshot {
        self.book.lock().await.clone()
    }

    pub async fn strikes(&self, author: &str, permlink: &str) -> u32 {
        let book = self.book.lock().await;
        book.edit_record
            .get(&post_id(author, permlink))
            .copied()
            .unwrap_or(0)
    }

    /// Entries still in force at `now`, soonest release first.
    /// Read-only: expired entries are left for lazy release.
    pub async fn active(&self, now: DateTime<Utc>) -> Vec<JailRecord> {
        let book = self.book.lock().await;
        let mut records: Vec<JailRecord> = book
            .jail_entries
            .iter()
            .map(|(author, &started_ms)| {
                let jailed_at = start_time(started_ms);
                JailRecord {
                    author: author.clone(),
                    jailed_at,
                    release_at: jailed_at + self.policy.duration,
                }
            })
            .filter(|r| now < r.release_at)
            .collect();

        records.sort_by_key(|r| r.release_at);
        records
    }

    fn save_locked(&self, book: &JailSnapshot) {
        if let Err(e) = self.store.save(book) {
            warn!(error_kind = e.kind(), "Edit-jail state kept in memory only: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jail::store::InMemoryStore;

    fn jail_with_store() -> (EditJail, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        (EditJail::open(JailPolicy::default(), store.clone()), store)
    }

    #[tokio::test]
    async fn test_second_strike_jails_author() {
        let (jail, store) = jail_with_store();
        let now = Utc::now();

        let first = jail.record_stale("Alice", "post-1", now).await;
        assert_eq!(first, StrikeOutcome::Strike { count: 1 });
        assert_eq!(jail.check("alice", now).await, JailStatus::Clear);

        let second = jail.record_stale("alice", "post-1", now).await;
        assert!(matches!(second, StrikeOutcome::Jailed { count: 2, .. }));
        assert!(jail.check("ALICE", now).await.is_jailed());

        let saved = store.stored().unwrap();
        assert_eq!(saved.edit_record.get("alice/post-1"), Some(&2));
        assert!(saved.jail_entries.contains_key("alice"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_strikes_all_counted() {
        let (jail, store) = jail_with_store();
        let jail = Arc::new(jail);
        let now = Utc::now();

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let jail = jail.clone();
                tokio::spawn(async move { jail.record_stale("a", "p", now).await })
            })
            .collect();

        let mut counts = Vec::new();
        for handle in handles {
            counts.push(match handle.await.unwrap() {
                StrikeOutcome::Strike { count } | StrikeOutcome::Jailed { count, .. } => count,
            });
        }
        counts.sort_unstable();

        // Every increment saw a distinct previous value
        assert_eq!(counts, (1..=64).collect::<Vec<u32>>());
        assert_eq!(jail.strikes("a", "p").await, 64);
        assert_eq!(store.save_count(), 64);
        assert_eq!(store.stored().unwrap().edit_record.get("a/p"), Some(&64));
    }

    #[tokio::test]
    async fn test_strikes_are_per_post() {
        let (jail, _) = jail_with_store();
        let now = Utc::now();

        jail.record_stale("alice", "post-1", now).await;
        let other = jail.record_stale("alice", "post-2", now).await;

        assert_eq!(other, StrikeOutcome::Strike { count: 1 });
        assert_eq!(jail.check("alice", now).await, JailStatus::Clear);
    }

    #[tokio::test]
    async fn test_lazy_release_after_duration() {
        let (jail, store) = jail_with_store();
        let jailed_at = Utc::now() - Duration::hours(30);

        jail.record_stale("bob", "p", jailed_at).await;
        jail.record_stale("bob", "p", jailed_at).await;

        // Still listed until someone checks
        assert!(jail.snapshot().await.jail_entries.contains_key("bob"));
        assert!(jail.active(Utc::now()).await.is_empty());

        assert_eq!(jail.check("bob", Utc::now()).await, JailStatus::Released);
        assert!(!jail.snapshot().await.jail_entries.contains_key("bob"));
        assert!(!store.stored().unwrap().jail_entries.contains_key("bob"));
        assert_eq!(jail.check("bob", Utc::now()).await, JailStatus::Clear);

        // Strike history is never purged
        assert_eq!(jail.strikes("bob", "p").await, 2);
    }

    #[tokio::test]
    async fn test_jail_boundary_is_exact() {
        let (jail, _) = jail_with_store();
        let jailed_at = Utc::now();

        jail.record_stale("carol", "p", jailed_at).await;
        jail.record_stale("carol", "p", jailed_at).await;

        let just_before = jailed_at + Duration::hours(24) - Duration::milliseconds(1);
        assert!(jail.check("carol", just_before).await.is_jailed());

        let at_expiry = jailed_at + Duration::hours(24);
        assert_eq!(jail.check("carol", at_expiry).await, JailStatus::Released);
    }

    #[tokio::test]
    async fn test_restores_from_store() {
        let mut snapshot = JailSnapshot::default();
        snapshot.edit_record.insert("dave/old".to_string(), 1);
        snapshot
            .jail_entries
            .insert("erin".to_string(), Utc::now().timestamp_millis());
        let store = Arc::new(InMemoryStore::with_snapshot(snapshot));

        let jail = EditJail::open(JailPolicy::default(), store);

        assert!(jail.check("erin", Utc::now()).await.is_jailed());
        assert!(matches!(
            jail.record_stale("dave", "old", Utc::now()).await,
            StrikeOutcome::Jailed { count: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_store_failure_keeps_memory_state() {
        let (jail, store) = jail_with_store();
        store.set_failing(true);

        jail.record_stale("frank", "p", Utc::now()).await;
        jail.record_stale("frank", "p", Utc::now()).await;

        assert!(jail.check("frank", Utc::now()).await.is_jailed());
        assert!(jail.persist().await.is_err());
    }
}
