//! Social lists
//!
//! Followed and muted accounts come from the chain's follow lists; new,
//! pending and blacklisted accounts come from plain text files with one
//! account per line. Everything is trimmed and lower-cased. Lists are
//! rebuilt at the start of every session.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::ledger::{FollowKind, Ledger};

/// Page size of `get_following`
pub const FOLLOW_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Clone, Default)]
pub struct ListSets {
    pub followed: HashSet<String>,
    pub muted: HashSet<String>,
    pub new_users: HashSet<String>,
    pub pending: HashSet<String>,
    pub blacklist: HashSet<String>,
}

impl ListSets {
    pub fn counts(&self) -> ListCounts {
        ListCounts {
            followed: self.followed.len(),
            muted: self.muted.len(),
            new_users: self.new_users.len(),
            pending: self.pending.len(),
            blacklist: self.blacklist.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListCounts {
    pub followed: usize,
    pub muted: usize,
    pub new_users: usize,
    pub pending: usize,
    pub blacklist: usize,
}

/// Optional list files
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListFiles {
    pub new_users: Option<PathBuf>,
    pub pending: Option<PathBuf>,
    pub blacklist: Option<PathBuf>,
}

pub struct SocialLists {
    account: String,
    ledger: Arc<dyn Ledger>,
    files: ListFiles,
    sets: RwLock<ListSets>,
    page_size: u32,
    attempts: u32,
    retry_delay: Duration,
}

impl SocialLists {
    pub fn new(account: impl Into<String>, ledger: Arc<dyn Ledger>, files: ListFiles) -> Self {
        Self {
            account: account.into(),
            ledger,
            files,
            sets: RwLock::new(ListSets::default()),
            page_size: FOLLOW_PAGE_SIZE,
            attempts: 5,
            retry_delay: Duration::from_secs(1),
        }
    }

    /// Override pagination and retry behaviour
    pub fn with_paging(mut self, page_size: u32, attempts: u32, retry_delay: Duration) -> Self {
        self.page_size = page_size.max(1);
        self.attempts = attempts.max(1);
        self.retry_delay = retry_delay;
        self
    }

    /// Rebuild every list. A follow list that cannot be synced keeps its
    /// previous contents.
    pub async fn refresh(&self) -> ListCounts {
        let previous = self.sets.read().await.clone();

        let followed = match self.sync_follows(FollowKind::Blog).await {
            Ok(set) => set,
            Err(e) => {
                warn!("Followed list not refreshed: {:#}", e);
                previous.followed
            }
        };
        let muted = match self.sync_follows(FollowKind::Ignore).await {
            Ok(set) => set,
            Err(e) => {
                warn!("Muted list not refreshed: {:#}", e);
                previous.muted
            }
        };

        let sets = ListSets {
            followed,
            muted,
            new_users: load_optional(self.files.new_users.as_deref()),
            pending: load_optional(self.files.pending.as_deref()),
            blacklist: load_optional(self.files.blacklist.as_deref()),
        };
        let counts = sets.counts();
        *self.sets.write().await = sets;

        info!(
            followed = counts.followed,
            muted = counts.muted,
            new_users = counts.new_users,
            pending = counts.pending,
            blacklist = counts.blacklist,
            "Social lists synced"
        );
        counts
    }

    /// Page through one follow list of the scout account
    pub async fn sync_follows(&self, kind: FollowKind) -> Result<HashSet<String>> {
        let mut accounts = HashSet::new();
        let mut start = String::new();

        loop {
            let batch = self.fetch_page(kind, &start).await?;
            let batch_len = batch.len();

            for entry in &batch {
                if start.is_empty() || entry.following != start {
                    accounts.insert(entry.following.trim().to_lowercase());
                }
            }

            if batch_len < self.page_size as usize {
                break;
            }
            match batch.last() {
                Some(last) if last.following != start => start = last.following.clone(),
                _ => break,
            }
        }

        debug!(kind = kind.as_str(), count = accounts.len(), "Follow list synced");
        Ok(accounts)
    }

    async fn fetch_page(&self, kind: FollowKind, start: &str) -> Result<Vec<crate::ledger::FollowEntry>> {
        let mut attempt = 1;
        loop {
            match self
                .ledger
                .following(&self.account, start, kind, self.page_size)
                .await
            {
                Ok(batch) => return Ok(batch),
                Err(e) if attempt < self.attempts => {
                    debug!(kind = kind.as_str(), attempt, "Follow page failed, retrying: {:#}", e);
                    attempt += 1;
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => {
                    return Err(e).context(format!(
                        "{} list page at {:?} failed after {} attempts",
                        kind.as_str(),
                        start,
                        attempt
                    ));
                }
            }
        }
    }

    pub async fn is_followed(&self, author: &str) -> bool {
        self.sets.read().await.followed.contains(&author.to_lowercase())
    }

    /// Muted, new, pending or blacklisted
    pub async fn is_benched(&self, author: &str) -> bool {
        let author = author.to_lowercase();
        let sets = self.sets.read().await;
        sets.muted.contains(&author)
            || sets.new_users.contains(&author)
            || sets.pending.contains(&author)
            || sets.blacklist.contains(&author)
    }

    pub async fn counts(&self) -> ListCounts {
        self.sets.read().await.counts()
    }
}

fn load_optional(path: Option<&Path>) -> HashSet<String> {
    match path {
        Some(path) => load_list_file(path),
        None => HashSet::new(),
    }
}

/// One account per line; a missing file is an empty list
pub fn load_list_file(path: &Path) -> HashSet<String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => parse_list(&contents),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashSet::new(),
        Err(e) => {
            warn!(path = %path.display(), "List file unreadable: {}", e);
            HashSet::new()
        }
    }
}

pub fn parse_list(contents: &str) -> HashSet<String> {
    contents
        .lines()
        .map(|line| line.trim().to_lowercase())
        .filter(|line| !line.is_empty())
        .collect()
}
