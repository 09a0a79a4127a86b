//! Curation reports
//!
//! Every rejection and jail is written up as a one-row markdown table and
//! posted by the logger account as a reply to a fixed log post. Without a
//! logger account the table is only logged locally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::ScoutError;
use crate::ledger::{Ledger, ReportComment, TxResult};
use crate::stats::ScoutStats;

const APP_TAG: &str = concat!("ledger-scout/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportKind {
    EditJail,
    TagRejection,
    FastTrackRejection,
    StandardRuleRejection,
}

impl ReportKind {
    pub fn label(&self) -> &'static str {
        match self {
            ReportKind::EditJail => "EDIT JAIL",
            ReportKind::TagRejection => "TAG REJECTION",
            ReportKind::FastTrackRejection => "FAST TRACK REJECTION",
            ReportKind::StandardRuleRejection => "STANDARD RULE REJECTION",
        }
    }
}

impl std::fmt::Display for ReportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One reported decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRow {
    pub time: DateTime<Utc>,
    pub author: String,
    pub permlink: String,
    pub block: u64,
    pub transaction_id: String,
    pub kind: ReportKind,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ReportColumn {
    Time,
    Author,
    Link,
    Block,
    Trx,
    Type,
    Details,
}

impl ReportColumn {
    pub const ALL: [ReportColumn; 7] = [
        ReportColumn::Time,
        ReportColumn::Author,
        ReportColumn::Link,
        ReportColumn::Block,
        ReportColumn::Trx,
        ReportColumn::Type,
        ReportColumn::Details,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ReportColumn::Time => "Time",
            ReportColumn::Author => "Author",
            ReportColumn::Link => "Link",
            ReportColumn::Block => "Block",
            ReportColumn::Trx => "TRX ID",
            ReportColumn::Type => "Type",
            ReportColumn::Details => "Details",
        }
    }

    fn cell(&self, row: &ReportRow) -> String {
        match self {
            ReportColumn::Time => row.time.format("%I:%M:%S %p").to_string(),
            ReportColumn::Author => row.author.clone(),
            ReportColumn::Link => format!(
                "[PeakD](https://peakd.com/@{}/{})",
                row.author, row.permlink
            ),
            ReportColumn::Block => row.block.to_string(),
            ReportColumn::Trx => format!(
                "[Link](https://hiveblockexplorer.com/tx/{})",
                row.transaction_id
            ),
            ReportColumn::Type => row.kind.label().to_string(),
            ReportColumn::Details => row.details.clone(),
        }
    }
}

impl FromStr for ReportColumn {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "time" => Ok(ReportColumn::Time),
            "author" => Ok(ReportColumn::Author),
            "link" => Ok(ReportColumn::Link),
            "block" => Ok(ReportColumn::Block),
            "trx" | "trx_id" => Ok(ReportColumn::Trx),
            "type" | "reason" => Ok(ReportColumn::Type),
            "details" => Ok(ReportColumn::Details),
            other => Err(anyhow::anyhow!("Unknown report column: {}", other)),
        }
    }
}

/// Enabled columns, always rendered in canonical order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportColumns(Vec<ReportColumn>);

impl Default for ReportColumns {
    fn default() -> Self {
        Self(ReportColumn::ALL.to_vec())
    }
}

impl ReportColumns {
    pub fn new(mut columns: Vec<ReportColumn>) -> Self {
        columns.sort();
        columns.dedup();
        Self(columns)
    }

    /// Parse a comma list such as `time,author,type`
    pub fn parse(list: &str) -> anyhow::Result<Self> {
        let columns = list
            .split(',')
            .filter(|c| !c.trim().is_empty())
            .map(ReportColumn::from_str)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self::new(columns))
    }

    pub fn columns(&self) -> &[ReportColumn] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Header, separator and one data row
pub fn render_table(row: &ReportRow, columns: &ReportColumns) -> String {
    let mut head = String::from("|");
    let mut sep = String::from("|");
    let mut data = String::from("|");

    for column in columns.columns() {
        head.push_str(&format!(" {} |", column.label()));
        sep.push_str(" --- |");
        data.push_str(&format!(" {} |", column.cell(row)));
    }

    format!("{}\n{}\n{}", head, sep, data)
}

/// Where reports are posted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportTarget {
    pub logger_account: String,
    pub parent_author: String,
    pub parent_permlink: String,
}

impl ReportTarget {
    /// `log_post` is `@author/permlink`, optionally behind a front-end URL
    pub fn parse(logger_account: &str, log_post: &str) -> anyhow::Result<Self> {
        let tail = log_post
            .rsplit_once('@')
            .map(|(_, tail)| tail)
            .unwrap_or(log_post);

        let (author, permlink) = tail
            .split_once('/')
            .ok_or_else(|| anyhow::anyhow!("Log post must look like @author/permlink"))?;
        let permlink = permlink.trim_end_matches('/');

        if logger_account.trim().is_empty() || author.is_empty() || permlink.is_empty() {
            return Err(anyhow::anyhow!("Log post must look like @author/permlink"));
        }

        Ok(Self {
            logger_account: logger_account.trim().to_string(),
            parent_author: author.to_string(),
            parent_permlink: permlink.to_string(),
        })
    }
}

/// Unique permlink for a report reply
pub fn report_permlink(row: &ReportRow, now: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(row.author.as_bytes());
    hasher.update(row.permlink.as_bytes());
    hasher.update(row.kind.label().as_bytes());
    hasher.update(now.timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
    let digest = format!("{:x}", hasher.finalize());

    format!("log-{}-{}", now.timestamp_millis(), &digest[..8])
}

pub struct Reporter {
    ledger: Arc<dyn Ledger>,
    target: Option<ReportTarget>,
    columns: ReportColumns,
    stats: Arc<ScoutStats>,
}

impl Reporter {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        target: Option<ReportTarget>,
        columns: ReportColumns,
        stats: Arc<ScoutStats>,
    ) -> Self {
        Self {
            ledger,
            target,
            columns,
            stats,
        }
    }

    /// Post the report. `Ok(None)` when no destination is configured.
    pub async fn send(&self, row: &ReportRow) -> Result<Option<TxResult>, ScoutError> {
        let table = render_table(row, &self.columns);

        let Some(target) = &self.target else {
            info!(author = %row.author, kind = %row.kind, "Report (local only):\n{}", table);
            return Ok(None);
        };

        let comment = ReportComment {
            parent_author: target.parent_author.clone(),
            parent_permlink: target.parent_permlink.clone(),
            author: target.logger_account.clone(),
            permlink: report_permlink(row, Utc::now()),
            title: String::new(),
            body: table,
            json_metadata: serde_json::json!({ "app": APP_TAG }).to_string(),
        };

        let tx = self
            .ledger
            .broadcast_report(&comment)
            .await
            .map_err(|e| ScoutError::broadcast(format!("{:#}", e)))?;

        self.stats.record_report();
        info!(author = %row.author, kind = %row.kind, tx = %tx.id, "Report sent");
        Ok(Some(tx))
    }

    /// Send and log any failure; reports are never retried
    pub async fn send_logged(&self, row: &ReportRow) {
        if let Err(e) = self.send(row).await {
            warn!(
                error_kind = e.kind(),
                author = %row.author,
                kind = %row.kind,
                "Report dropped: {}",
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;
    use chrono::TimeZone;

    fn sample_row() -> ReportRow {
        ReportRow {
            time: Utc.with_ymd_and_hms(2024, 5, 1, 14, 5, 9).unwrap(),
            author: "alice".to_string(),
            permlink: "my-post".to_string(),
            block: 88_000_001,
            transaction_id: "abc123".to_string(),
            kind: ReportKind::TagRejection,
            details: "Tag: nsfw".to_string(),
        }
    }

    #[test]
    fn test_render_all_columns() {
        let table = render_table(&sample_row(), &ReportColumns::default());
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(
            lines[0],
            "| Time | Author | Link | Block | TRX ID | Type | Details |"
        );
        assert_eq!(lines[1], "| --- | --- | --- | --- | --- | --- | --- |");
        assert_eq!(
            lines[2],
            "| 02:05:09 PM | alice | [PeakD](https://peakd.com/@alice/my-post) | 88000001 | \
             [Link](https://hiveblockexplorer.com/tx/abc123) | TAG REJECTION | Tag: nsfw |"
        );
    }

    #[test]
    fn test_render_enabled_columns_only() {
        let columns = ReportColumns::parse("details, author,reason").unwrap();
        let table = render_table(&sample_row(), &columns);

        assert_eq!(
            table,
            "| Author | Type | Details |\n| --- | --- | --- |\n| alice | TAG REJECTION | Tag: nsfw |"
        );
        assert!(ReportColumns::parse("author,colour").is_err());
    }

    #[test]
    fn test_target_parsing() {
        let target = ReportTarget::parse("logbot", "@scout/daily-log").unwrap();
        assert_eq!(target.parent_author, "scout");
        assert_eq!(target.parent_permlink, "daily-log");

        let from_url = ReportTarget::parse("logbot", "https://peakd.com/hive/@scout/daily-log").unwrap();
        assert_eq!(from_url, target);

        assert!(ReportTarget::parse("logbot", "scout").is_err());
        assert!(ReportTarget::parse("", "@scout/daily-log").is_err());
    }

    #[test]
    fn test_permlink_shape() {
        let now = Utc::now();
        let permlink = report_permlink(&sample_row(), now);
        let expected_prefix = format!("log-{}-", now.timestamp_millis());

        assert!(permlink.starts_with(&expected_prefix));
        assert_eq!(permlink.len(), expected_prefix.len() + 8);
    }

    #[tokio::test]
    async fn test_send_broadcasts_and_counts() {
        let ledger = Arc::new(InMemoryLedger::new());
        let stats = Arc::new(ScoutStats::new());
        let target = ReportTarget::parse("logbot", "@scout/daily-log").unwrap();
        let reporter = Reporter::new(ledger.clone(), Some(target), ReportColumns::default(), stats.clone());

        let tx = reporter.send(&sample_row()).await.unwrap();
        assert!(tx.is_some());

        let reports = ledger.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].author, "logbot");
        assert_eq!(reports[0].parent_permlink, "daily-log");
        assert!(reports[0].json_metadata.contains("ledger-scout/"));
        assert_eq!(stats.snapshot().reports, 1);
    }

    #[tokio::test]
    async fn test_local_only_is_not_counted() {
        let ledger = Arc::new(InMemoryLedger::new());
        let stats = Arc::new(ScoutStats::new());
        let reporter = Reporter::new(ledger.clone(), None, ReportColumns::default(), stats.clone());

        assert!(reporter.send(&sample_row()).await.unwrap().is_none());
        assert!(ledger.reports().is_empty());
        assert_eq!(stats.snapshot().reports, 0);
    }

    #[tokio::test]
    async fn test_failed_broadcast_is_not_counted() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.set_broadcasts_failing(true);
        let stats = Arc::new(ScoutStats::new());
        let target = ReportTarget::parse("logbot", "@scout/daily-log").unwrap();
        let reporter = Reporter::new(ledger, Some(target), ReportColumns::default(), stats.clone());

        let err = reporter.send(&sample_row()).await.unwrap_err();
        assert_eq!(err.kind(), "broadcast");
        assert_eq!(stats.snapshot().reports, 0);
    }
}
