//! Wire Types for Ledger Communication
//!
//! Shapes follow the `condenser_api` JSON responses. Only the fields the
//! scout reads are modelled; everything else is ignored on deserialize.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Chain timestamps are UTC without a zone suffix (`2024-05-01T12:00:00`)
const CHAIN_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Parse a chain timestamp, accepting an optional trailing `Z`
pub fn parse_chain_time(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim().trim_end_matches('Z');
    NaiveDateTime::parse_from_str(trimmed, CHAIN_TIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Format a timestamp the way the chain does
pub fn format_chain_time(time: DateTime<Utc>) -> String {
    time.format(CHAIN_TIME_FORMAT).to_string()
}

fn deserialize_chain_time<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_chain_time(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid chain timestamp: {}", raw)))
}

/// Subset of `get_dynamic_global_properties`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalProperties {
    pub head_block_number: u64,
}

/// A signed block as returned by `get_block`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Block {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub transaction_id: String,
    #[serde(default)]
    pub operations: Vec<Operation>,
}

/// `["comment", { ... }]` pair; the payload stays untyped until needed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation(pub String, pub serde_json::Value);

impl Operation {
    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.1
    }
}

/// Payload of a `comment` operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentOperation {
    pub author: String,
    pub permlink: String,
    #[serde(default)]
    pub parent_author: String,
    #[serde(default)]
    pub parent_permlink: String,
}

impl CommentOperation {
    /// Root posts carry an empty parent author; replies do not
    pub fn is_root_post(&self) -> bool {
        self.parent_author.is_empty()
    }
}

/// Subset of an account record from `get_accounts`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountState {
    pub name: String,
    /// Voting power in basis points at `last_vote_time`
    pub voting_power: u32,
    #[serde(deserialize_with = "deserialize_chain_time")]
    pub last_vote_time: DateTime<Utc>,
}

/// Post as returned by `get_content`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostContent {
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub permlink: String,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub json_metadata: String,
}

impl PostContent {
    /// Build a post in chain format, mostly for test fixtures
    pub fn new(
        author: &str,
        permlink: &str,
        created: DateTime<Utc>,
        body: &str,
        tags: &[&str],
    ) -> Self {
        Self {
            author: author.to_string(),
            permlink: permlink.to_string(),
            created: format_chain_time(created),
            body: body.to_string(),
            json_metadata: serde_json::json!({ "tags": tags }).to_string(),
        }
    }

    /// The node answers unknown posts with an empty record
    pub fn exists(&self) -> bool {
        !self.author.is_empty()
    }
}

/// Which follow list to page through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowKind {
    /// Followed accounts
    Blog,
    /// Muted accounts
    Ignore,
}

impl FollowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FollowKind::Blog => "blog",
            FollowKind::Ignore => "ignore",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowEntry {
    pub follower: String,
    pub following: String,
    #[serde(default)]
    pub what: Vec<String>,
}

/// Unsigned vote operation handed to the signing relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteOperation {
    pub voter: String,
    pub author: String,
    pub permlink: String,
    pub weight: u16,
}

/// Unsigned comment operation carrying a report table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportComment {
    pub parent_author: String,
    pub parent_permlink: String,
    pub author: String,
    pub permlink: String,
    pub title: String,
    pub body: String,
    pub json_metadata: String,
}

/// Result of a broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResult {
    pub id: String,
    #[serde(default)]
    pub block_num: Option<u64>,
    /// Synthetic result; nothing reached the chain
    #[serde(default)]
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_chain_time() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_chain_time("2024-05-01T12:30:00"), Some(expected));
        assert_eq!(parse_chain_time("2024-05-01T12:30:00Z"), Some(expected));
        assert_eq!(parse_chain_time("yesterday"), None);
    }

    #[test]
    fn test_block_deserialize() {
        let raw = serde_json::json!({
            "timestamp": "2024-05-01T12:30:00",
            "witness": "someone",
            "transactions": [{
                "transaction_id": "abc123",
                "operations": [
                    ["comment", {"author": "alice", "permlink": "hello", "parent_author": "", "parent_permlink": "life"}],
                    ["vote", {"voter": "bob", "author": "alice", "permlink": "hello", "weight": 10000}]
                ]
            }]
        });

        let block: Block = serde_json::from_value(raw).unwrap();
        assert_eq!(block.transactions.len(), 1);
        assert_eq!(block.transactions[0].operations[0].name(), "comment");

        let op: CommentOperation =
            serde_json::from_value(block.transactions[0].operations[0].payload().clone()).unwrap();
        assert!(op.is_root_post());
    }

    #[test]
    fn test_account_deserialize() {
        let raw = serde_json::json!({
            "name": "curator",
            "voting_power": 8123,
            "last_vote_time": "2024-05-01T12:30:00",
            "balance": "1.000 HIVE"
        });

        let account: AccountState = serde_json::from_value(raw).unwrap();
        assert_eq!(account.voting_power, 8123);
        assert_eq!(format_chain_time(account.last_vote_time), "2024-05-01T12:30:00");
    }
}
