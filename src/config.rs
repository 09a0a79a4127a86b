use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::curation::{CuratorConfig, QualityRules, ReportColumns, ReportTarget};
use crate::governor::{BudgetMode, BudgetPolicy, DEFAULT_REGEN_SECS, MAX_LEVEL};
use crate::jail::JailPolicy;
use crate::ledger::LedgerConfig;
use crate::ledger::client::DEFAULT_NODES;
use crate::social::ListFiles;

/// A post older than 30 days is never fresh
const MAX_FRESHNESS_SECS: i64 = 30 * 24 * 3600;
const MAX_GRACE_SECS: i64 = 24 * 3600;
const MAX_JAIL_HOURS: i64 = 365 * 24;

/// Configuration for the scout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoutConfig {
    /// Voting account and base weight
    pub account: AccountConfig,
    /// Quality rules and freshness window
    pub rules: RulesConfig,
    /// Voting power floor and hibernation
    pub budget: BudgetConfig,
    /// Edit jail policy and state file
    pub jail: JailConfig,
    /// Task periods and concurrency
    pub timing: TimingConfig,
    /// API nodes and signing relay
    pub rpc: RpcConfig,
    /// Report destination and layout
    pub reports: ReportConfig,
    /// Account list files
    pub files: ListFiles,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Status API
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub name: String,
    /// Base vote weight in basis points
    pub vote_weight: u16,
    /// Never broadcast, only log
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    pub word_count: usize,
    pub image_count: usize,
    pub second_word_min: usize,
    pub second_image_min: usize,
    pub fast_word_min: usize,
    pub fast_image_min: usize,
    pub freshness_secs: i64,
    pub freshness_grace_secs: i64,
    pub tags_to_skip: Vec<String>,
    pub fetch_throttle_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    pub mode: BudgetMode,
    /// Floor percentage
    pub vp_threshold: f64,
    /// Hibernation cooldown
    pub recharge_ms: u64,
    pub regen_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JailConfig {
    pub hours: i64,
    pub strike_limit: u32,
    pub memory_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    pub poll_interval_ms: u64,
    pub sample_interval_ms: u64,
    pub summary_interval_secs: u64,
    pub max_in_flight: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    pub nodes: Vec<String>,
    pub timeout_secs: u64,
    pub signer_url: Option<String>,
    pub signer_api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub logger_account: Option<String>,
    /// `@author/permlink` of the post reports reply to
    pub log_post_link: Option<String>,
    pub columns: ReportColumns,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for RulesConfig {
    fn default() -> Self {
        let rules = QualityRules::default();
        Self {
            word_count: rules.word_min,
            image_count: rules.image_min,
            second_word_min: rules.second_word_min,
            second_image_min: rules.second_image_min,
            fast_word_min: rules.fast_word_min,
            fast_image_min: rules.fast_image_min,
            freshness_secs: 300,
            freshness_grace_secs: 60,
            tags_to_skip: Vec::new(),
            fetch_throttle_ms: 2000,
        }
    }
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            account: AccountConfig {
                name: String::new(), // Must be configured
                vote_weight: 5000,
                dry_run: false,
            },
            rules: RulesConfig::default(),
            budget: BudgetConfig {
                mode: BudgetMode::Unmonitored,
                vp_threshold: 15.0,
                recharge_ms: 1_800_000,
                regen_secs: DEFAULT_REGEN_SECS,
            },
            jail: JailConfig {
                hours: 24,
                strike_limit: 2,
                memory_file: PathBuf::from("scanner_memory.json"),
            },
            timing: TimingConfig {
                poll_interval_ms: 3000,
                sample_interval_ms: 15_000,
                summary_interval_secs: 3600,
                max_in_flight: 32,
            },
            rpc: RpcConfig {
                nodes: DEFAULT_NODES.iter().map(|n| n.to_string()).collect(),
                timeout_secs: 4,
                signer_url: None,
                signer_api_key: String::new(),
            },
            reports: ReportConfig {
                logger_account: None,
                log_post_link: None,
                columns: ReportColumns::default(),
            },
            files: ListFiles::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
            },
            api: ApiConfig {
                enabled: true,
                host: "127.0.0.1".to_string(),
                port: 8787,
            },
        }
    }
}

/// Reads `SCOUT_*` values through a lookup function
struct Vars<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    /// Set and non-blank
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn require(&self, name: &str) -> Result<String> {
        self.get(name)
            .with_context(|| format!("{} environment variable is required", name))
    }

    fn parse<T>(&self, name: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        self.get(name)
            .map(|raw| {
                raw.parse::<T>()
                    .with_context(|| format!("Invalid {} value", name))
            })
            .transpose()
    }

    fn parse_required<T>(&self, name: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        self.require(name)?
            .parse::<T>()
            .with_context(|| format!("Invalid {} value", name))
    }

    fn flag(&self, name: &str) -> Result<Option<bool>> {
        self.get(name)
            .map(|raw| match raw.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(anyhow::anyhow!("Invalid {} value: {}", name, raw)),
            })
            .transpose()
    }

    fn list(&self, name: &str) -> Option<Vec<String>> {
        self.get(name).map(|raw| {
            raw.split(',')
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect()
        })
    }
}

impl ScoutConfig {
    /// Load configuration from environment variables and validate it
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup` instead of the process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };
        let mut config = Self::default();

        // Account
        config.account.name = vars.require("SCOUT_ACCOUNT")?.to_lowercase();
        config.account.vote_weight = vars.parse_required("SCOUT_VOTE_WEIGHT")?;
        if let Some(dry_run) = vars.flag("SCOUT_DRY_RUN")? {
            config.account.dry_run = dry_run;
        }

        // Rules
        config.rules.word_count = vars.parse_required("SCOUT_WORD_COUNT")?;
        config.rules.image_count = vars.parse_required("SCOUT_IMAGE_COUNT")?;
        config.rules.fast_word_min = vars.parse_required("SCOUT_FAST_WORD_MIN")?;
        config.rules.fast_image_min = vars.parse_required("SCOUT_FAST_IMAGE_MIN")?;
        config.rules.freshness_secs = vars.parse_required("SCOUT_FRESHNESS_SECS")?;

        if let Some(v) = vars.parse("SCOUT_SECOND_WORD_MIN")? {
            config.rules.second_word_min = v;
        }
        if let Some(v) = vars.parse("SCOUT_SECOND_IMAGE_MIN")? {
            config.rules.second_image_min = v;
        }
        if let Some(v) = vars.parse("SCOUT_FRESHNESS_GRACE_SECS")? {
            config.rules.freshness_grace_secs = v;
        }
        if let Some(v) = vars.parse("SCOUT_FETCH_THROTTLE_MS")? {
            config.rules.fetch_throttle_ms = v;
        }
        if let Some(tags) = vars.list("SCOUT_TAGS_TO_SKIP") {
            config.rules.tags_to_skip = tags.into_iter().map(|t| t.to_lowercase()).collect();
        }

        // Budget
        if let Some(mode) = vars.get("SCOUT_MODE") {
            config.budget.mode = mode.parse().context("Invalid SCOUT_MODE value")?;
        }
        if let Some(v) = vars.parse("SCOUT_VP_THRESHOLD")? {
            config.budget.vp_threshold = v;
        }
        if let Some(v) = vars.parse("SCOUT_RECHARGE_MS")? {
            config.budget.recharge_ms = v;
        }
        if let Some(v) = vars.parse("SCOUT_REGEN_SECS")? {
            config.budget.regen_secs = v;
        }

        // Jail
        if let Some(v) = vars.parse("SCOUT_JAIL_HOURS")? {
            config.jail.hours = v;
        }
        if let Some(v) = vars.parse("SCOUT_STRIKE_LIMIT")? {
            config.jail.strike_limit = v;
        }
        if let Some(path) = vars.get("SCOUT_MEMORY_FILE") {
            config.jail.memory_file = PathBuf::from(path);
        }

        // Timing
        if let Some(v) = vars.parse("SCOUT_POLL_INTERVAL_MS")? {
            config.timing.poll_interval_ms = v;
        }
        if let Some(v) = vars.parse("SCOUT_SAMPLE_INTERVAL_MS")? {
            config.timing.sample_interval_ms = v;
        }
        if let Some(v) = vars.parse("SCOUT_SUMMARY_INTERVAL_SECS")? {
            config.timing.summary_interval_secs = v;
        }
        if let Some(v) = vars.parse("SCOUT_MAX_IN_FLIGHT")? {
            config.timing.max_in_flight = v;
        }

        // RPC and signing relay
        if let Some(nodes) = vars.list("SCOUT_RPC_NODES") {
            config.rpc.nodes = nodes;
        }
        if let Some(v) = vars.parse("SCOUT_RPC_TIMEOUT_SECS")? {
            config.rpc.timeout_secs = v;
        }
        config.rpc.signer_url = vars.get("SCOUT_SIGNER_URL");
        if let Some(key) = vars.get("SCOUT_SIGNER_API_KEY") {
            config.rpc.signer_api_key = key;
        }

        // Reports
        config.reports.logger_account = vars.get("SCOUT_LOGGER_ACCOUNT");
        config.reports.log_post_link = vars.get("SCOUT_LOG_POST_LINK");
        if let Some(columns) = vars.get("SCOUT_REPORT_COLUMNS") {
            config.reports.columns =
                ReportColumns::parse(&columns).context("Invalid SCOUT_REPORT_COLUMNS value")?;
        }

        // List files
        config.files.new_users = vars.get("SCOUT_NEW_USERS_FILE").map(PathBuf::from);
        config.files.pending = vars.get("SCOUT_PENDING_FILE").map(PathBuf::from);
        config.files.blacklist = vars.get("SCOUT_BLACKLIST_FILE").map(PathBuf::from);

        // Logging
        if let Some(level) = vars.get("SCOUT_LOG_LEVEL") {
            config.logging.level = level.to_lowercase();
        }

        // Status API
        if let Some(enabled) = vars.flag("SCOUT_API_ENABLED")? {
            config.api.enabled = enabled;
        }
        if let Some(host) = vars.get("SCOUT_API_HOST") {
            config.api.host = host;
        }
        if let Some(v) = vars.parse("SCOUT_API_PORT")? {
            config.api.port = v;
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration for consistency
    pub fn validate(&self) -> Result<()> {
        if self.account.name.is_empty() {
            return Err(anyhow::anyhow!("Voting account cannot be empty"));
        }

        if self.account.vote_weight == 0 || self.account.vote_weight as u32 > MAX_LEVEL {
            return Err(anyhow::anyhow!(
                "Vote weight must be between 1 and {}, got {}",
                MAX_LEVEL,
                self.account.vote_weight
            ));
        }

        if !(1..=MAX_FRESHNESS_SECS).contains(&self.rules.freshness_secs) {
            return Err(anyhow::anyhow!(
                "Freshness window must be between 1 and {} seconds, got {}",
                MAX_FRESHNESS_SECS,
                self.rules.freshness_secs
            ));
        }

        if !(0..=MAX_GRACE_SECS).contains(&self.rules.freshness_grace_secs) {
            return Err(anyhow::anyhow!(
                "Freshness grace must be between 0 and {} seconds, got {}",
                MAX_GRACE_SECS,
                self.rules.freshness_grace_secs
            ));
        }

        if !(0.0..=100.0).contains(&self.budget.vp_threshold) {
            return Err(anyhow::anyhow!(
                "VP threshold must be a percentage, got {}",
                self.budget.vp_threshold
            ));
        }

        if self.budget.regen_secs == 0 {
            return Err(anyhow::anyhow!("Regeneration time must be non-zero"));
        }

        if self.jail.hours <= 0 || self.jail.strike_limit == 0 {
            return Err(anyhow::anyhow!(
                "Jail duration and strike limit must be positive"
            ));
        }

        if self.jail.hours > MAX_JAIL_HOURS {
            return Err(anyhow::anyhow!(
                "Jail duration cannot exceed {} hours, got {}",
                MAX_JAIL_HOURS,
                self.jail.hours
            ));
        }

        if self.timing.poll_interval_ms == 0
            || self.timing.sample_interval_ms == 0
            || self.timing.summary_interval_secs == 0
        {
            return Err(anyhow::anyhow!("Task periods must be non-zero"));
        }

        if self.timing.max_in_flight == 0 {
            return Err(anyhow::anyhow!("At least one evaluation must be allowed in flight"));
        }

        // RPC nodes must be HTTPS
        if self.rpc.nodes.is_empty() {
            return Err(anyhow::anyhow!("At least one RPC node must be configured"));
        }
        for node in &self.rpc.nodes {
            let url = url::Url::parse(node).with_context(|| format!("Invalid RPC node URL: {}", node))?;
            if url.scheme() != "https" {
                return Err(anyhow::anyhow!("RPC node is not HTTPS: {}", node));
            }
        }

        if let Some(signer) = &self.rpc.signer_url {
            let url = url::Url::parse(signer)
                .with_context(|| format!("Invalid signing relay URL: {}", signer))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(anyhow::anyhow!("Signing relay must be HTTP(S): {}", signer));
            }
        }

        self.report_target()?;

        if self.api.enabled {
            self.api_addr()?;
        }

        if !matches!(
            self.logging.level.as_str(),
            "error" | "warn" | "info" | "debug" | "trace"
        ) {
            return Err(anyhow::anyhow!("Unknown log level: {}", self.logging.level));
        }

        Ok(())
    }

    /// Broadcasts are suppressed when asked to, or when nothing can sign them
    pub fn effective_dry_run(&self) -> bool {
        self.account.dry_run || self.rpc.signer_url.is_none()
    }

    pub fn to_rules(&self) -> QualityRules {
        QualityRules {
            word_min: self.rules.word_count,
            image_min: self.rules.image_count,
            second_word_min: self.rules.second_word_min,
            second_image_min: self.rules.second_image_min,
            fast_word_min: self.rules.fast_word_min,
            fast_image_min: self.rules.fast_image_min,
            base_weight: self.account.vote_weight,
            tags_to_skip: self.rules.tags_to_skip.clone(),
        }
    }

    pub fn to_curator_config(&self) -> CuratorConfig {
        CuratorConfig {
            account: self.account.name.clone(),
            freshness_secs: self.rules.freshness_secs,
            grace_secs: self.rules.freshness_grace_secs,
            fetch_throttle: Duration::from_millis(self.rules.fetch_throttle_ms),
        }
    }

    pub fn to_budget_policy(&self) -> BudgetPolicy {
        BudgetPolicy {
            mode: self.budget.mode,
            threshold_pct: self.budget.vp_threshold,
            regen_secs: self.budget.regen_secs,
            cooldown: Duration::from_millis(self.budget.recharge_ms),
            sample_interval: Duration::from_millis(self.timing.sample_interval_ms),
        }
    }

    pub fn to_jail_policy(&self) -> JailPolicy {
        JailPolicy {
            strike_limit: self.jail.strike_limit,
            duration: chrono::Duration::hours(self.jail.hours),
        }
    }

    pub fn to_ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            nodes: self.rpc.nodes.clone(),
            timeout_secs: self.rpc.timeout_secs,
            signer_url: self.rpc.signer_url.clone(),
            signer_api_key: self.rpc.signer_api_key.clone(),
        }
    }

    /// Report destination; `None` unless both logger and log post are set
    pub fn report_target(&self) -> Result<Option<ReportTarget>> {
        match (&self.reports.logger_account, &self.reports.log_post_link) {
            (Some(logger), Some(link)) => ReportTarget::parse(logger, link)
                .context("Invalid SCOUT_LOG_POST_LINK value")
                .map(Some),
            _ => Ok(None),
        }
    }

    pub fn api_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.api.host, self.api.port)
            .parse()
            .context("Invalid status API address")
    }
}

/// Mask a secret for logging, keeping only its ends
pub fn sanitize_for_logging(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    match chars.len() {
        0 => "<unset>".to_string(),
        n if n <= 8 => "***".to_string(),
        n => {
            let head: String = chars[..3].iter().collect();
            let tail: String = chars[n - 3..].iter().collect();
            format!("{}***{}", head, tail)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn required() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("SCOUT_ACCOUNT", "Curator"),
            ("SCOUT_VOTE_WEIGHT", "5000"),
            ("SCOUT_WORD_COUNT", "100"),
            ("SCOUT_IMAGE_COUNT", "1"),
            ("SCOUT_FAST_WORD_MIN", "50"),
            ("SCOUT_FAST_IMAGE_MIN", "1"),
            ("SCOUT_FRESHNESS_SECS", "300"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<ScoutConfig> {
        ScoutConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string()))
    }

    #[test]
    fn test_sanitize_for_logging() {
        assert_eq!(sanitize_for_logging("relay-api-key-123456"), "rel***456");
        assert_eq!(sanitize_for_logging("short"), "***");
        assert_eq!(sanitize_for_logging(""), "<unset>");
    }

    #[test]
    fn test_defaults_applied() {
        let config = load(&required()).unwrap();

        assert_eq!(config.account.name, "curator");
        assert_eq!(config.budget.mode, BudgetMode::Unmonitored);
        assert_eq!(config.budget.vp_threshold, 15.0);
        assert_eq!(config.budget.recharge_ms, 1_800_000);
        assert_eq!(config.rules.second_word_min, 99_999);
        assert_eq!(config.rules.freshness_grace_secs, 60);
        assert_eq!(config.jail.memory_file, PathBuf::from("scanner_memory.json"));
        assert_eq!(config.timing.max_in_flight, 32);
        assert_eq!(config.api.port, 8787);
        assert!(config.effective_dry_run());
        assert!(config.report_target().unwrap().is_none());
    }

    #[test]
    fn test_missing_required_value() {
        let mut vars = required();
        vars.remove("SCOUT_FRESHNESS_SECS");

        let err = load(&vars).unwrap_err();
        assert!(err.to_string().contains("SCOUT_FRESHNESS_SECS"));
    }

    #[test]
    fn test_invalid_number() {
        let mut vars = required();
        vars.insert("SCOUT_VOTE_WEIGHT", "lots");
        let err = load(&vars).unwrap_err();
        assert!(err.to_string().contains("Invalid SCOUT_VOTE_WEIGHT value"));

        vars.insert("SCOUT_VOTE_WEIGHT", "20000");
        assert!(load(&vars).is_err());
    }

    #[test]
    fn test_time_windows_bounded() {
        // i64::MAX
        let huge = "9223372036854775807";

        for name in [
            "SCOUT_FRESHNESS_SECS",
            "SCOUT_FRESHNESS_GRACE_SECS",
            "SCOUT_JAIL_HOURS",
        ] {
            let mut vars = required();
            vars.insert(name, huge);
            let err = load(&vars).unwrap_err();
            assert!(format!("{:#}", err).contains("got"), "{} accepted", name);
        }

        let mut vars = required();
        vars.insert("SCOUT_FRESHNESS_SECS", "2592000");
        vars.insert("SCOUT_FRESHNESS_GRACE_SECS", "86400");
        vars.insert("SCOUT_JAIL_HOURS", "8760");
        let config = load(&vars).unwrap();
        assert_eq!(config.to_curator_config().stale_after().num_seconds(), 2_678_400);
        assert_eq!(config.to_jail_policy().duration.num_hours(), 8760);
    }

    #[test]
    fn test_optional_values() {
        let mut vars = required();
        vars.insert("SCOUT_MODE", "1");
        vars.insert("SCOUT_TAGS_TO_SKIP", "NSFW, spam,,");
        vars.insert("SCOUT_SIGNER_URL", "http://127.0.0.1:9000");
        vars.insert("SCOUT_LOGGER_ACCOUNT", "logbot");
        vars.insert("SCOUT_LOG_POST_LINK", "@scout/daily-log");
        vars.insert("SCOUT_REPORT_COLUMNS", "author,type");

        let config = load(&vars).unwrap();
        assert_eq!(config.budget.mode, BudgetMode::Monitored);
        assert_eq!(config.rules.tags_to_skip, vec!["nsfw", "spam"]);
        assert!(!config.effective_dry_run());
        assert_eq!(config.reports.columns.columns().len(), 2);

        let target = config.report_target().unwrap().unwrap();
        assert_eq!(target.parent_author, "scout");
    }

    #[test]
    fn test_rejects_plain_http_node() {
        let mut vars = required();
        vars.insert("SCOUT_RPC_NODES", "http://insecure.example");
        assert!(load(&vars).is_err());
    }

    #[test]
    fn test_policies_from_config() {
        let config = load(&required()).unwrap();

        let rules = config.to_rules();
        assert_eq!(rules.base_weight, 5000);
        assert_eq!(rules.word_min, 100);

        let jail = config.to_jail_policy();
        assert_eq!(jail, JailPolicy::default());

        assert_eq!(
            config.to_curator_config().stale_after(),
            chrono::Duration::seconds(360)
        );
    }
}
