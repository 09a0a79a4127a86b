//! JSON-RPC Client for Ledger Nodes
//!
//! Reads go to the public API nodes over JSON-RPC 2.0 with failover: a node
//! that errors is skipped and the next one in the list becomes active.
//! Writes never carry keys. Unsigned operations are POSTed to a signing
//! relay which signs and submits them.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::Ledger;
use super::types::*;

pub const DEFAULT_NODES: [&str; 3] = [
    "https://api.deathwing.me",
    "https://api.hive.blog",
    "https://anyx.io",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// API nodes in preference order
    pub nodes: Vec<String>,
    pub timeout_secs: u64,
    /// Base URL of the signing relay; broadcasts fail without one
    pub signer_url: Option<String>,
    pub signer_api_key: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            nodes: DEFAULT_NODES.iter().map(|n| n.to_string()).collect(),
            timeout_secs: 4,
            signer_url: None,
            signer_api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RpcLedgerClient {
    config: LedgerConfig,
    http_client: Client,
    state: Arc<RwLock<ClientState>>,
}

#[derive(Debug, Clone, Default)]
struct ClientState {
    active_node: usize,
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: serde_json::Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Serialize)]
struct RelayRequest {
    operations: Vec<(&'static str, serde_json::Value)>,
}

#[derive(Debug, Deserialize)]
struct RelayResponse {
    success: bool,
    tx_id: Option<String>,
    block_num: Option<u64>,
    error: Option<String>,
}

impl RpcLedgerClient {
    pub fn new(config: LedgerConfig) -> Result<Self> {
        if config.nodes.is_empty() {
            return Err(anyhow::anyhow!("At least one API node is required"));
        }

        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("ledger-scout/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            http_client,
            state: Arc::new(RwLock::new(ClientState::default())),
        })
    }

    /// Call `method` and require a non-null result
    async fn call<T: DeserializeOwned>(&self, method: &str, params: serde_json::Value) -> Result<T> {
        self.call_optional(method, params)
            .await?
            .ok_or_else(|| anyhow::anyhow!("{} returned no result", method))
    }

    /// Call `method` on the active node, failing over through the list once.
    /// A `null` result is `Ok(None)`.
    async fn call_optional<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<Option<T>> {
        let node_count = self.config.nodes.len();
        let start = self.state.read().await.active_node % node_count;
        let mut last_error = None;

        for offset in 0..node_count {
            let index = (start + offset) % node_count;
            let node = &self.config.nodes[index];

            match self.call_node::<T>(node, method, params.clone()).await {
                Ok(value) => {
                    if offset > 0 {
                        let mut state = self.state.write().await;
                        state.active_node = index;
                        info!(node = %node, "Switched active API node");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    debug!(node = %node, method = %method, "RPC call failed: {:#}", e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow::anyhow!("No API nodes configured"))
            .context(format!("{} failed on all {} nodes", method, node_count)))
    }

    async fn call_node<T: DeserializeOwned>(
        &self,
        node: &str,
        method: &str,
        params: serde_json::Value,
    ) -> Result<Option<T>> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: 1,
        };

        let resp = self
            .http_client
            .post(node)
            .json(&request)
            .send()
            .await
            .context("Request failed")?;

        if !resp.status().is_success() {
            return Err(anyhow::anyhow!("Node answered with status {}", resp.status()));
        }

        let body: RpcResponse<T> = resp.json().await.context("Failed to parse RPC response")?;

        if let Some(err) = body.error {
            return Err(anyhow::anyhow!("RPC error {}: {}", err.code, err.message));
        }

        Ok(body.result)
    }

    async fn relay(&self, op_name: &'static str, payload: serde_json::Value) -> Result<TxResult> {
        let base = self
            .config
            .signer_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No signing relay configured"))?;
        let url = format!("{}/broadcast", base.trim_end_matches('/'));

        let request = RelayRequest {
            operations: vec![(op_name, payload)],
        };

        // The key goes to the relay only, never to the public API nodes
        let mut builder = self.http_client.post(&url).json(&request);
        if !self.config.signer_api_key.is_empty() {
            builder = builder.header("X-Api-Key", &self.config.signer_api_key);
        }

        let resp = builder
            .send()
            .await
            .context("Failed to reach signing relay")?;

        if !resp.status().is_success() {
            return Err(anyhow::anyhow!(
                "Signing relay answered with status {}",
                resp.status()
            ));
        }

        let response: RelayResponse = resp
            .json()
            .await
            .context("Failed to parse relay response")?;

        if !response.success {
            return Err(anyhow::anyhow!(
                "Relay rejected {}: {}",
                op_name,
                response.error.unwrap_or_else(|| "unknown error".to_string())
            ));
        }

        Ok(TxResult {
            id: response.tx_id.unwrap_or_default(),
            block_num: response.block_num,
            dry_run: false,
        })
    }
}

#[async_trait]
impl Ledger for RpcLedgerClient {
    async fn head_height(&self) -> Result<u64> {
        let props: GlobalProperties = self
            .call("condenser_api.get_dynamic_global_properties", serde_json::json!([]))
            .await?;

        Ok(props.head_block_number)
    }

    async fn block(&self, height: u64) -> Result<Option<Block>> {
        // `null` for heights the node has not produced yet
        self.call_optional("condenser_api.get_block", serde_json::json!([height]))
            .await
    }

    async fn account(&self, name: &str) -> Result<AccountState> {
        let accounts: Vec<AccountState> = self
            .call("condenser_api.get_accounts", serde_json::json!([[name]]))
            .await?;

        accounts
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Account not found: {}", name))
    }

    async fn content(&self, author: &str, permlink: &str) -> Result<Option<PostContent>> {
        let content: PostContent = self
            .call("condenser_api.get_content", serde_json::json!([author, permlink]))
            .await?;

        Ok(content.exists().then_some(content))
    }

    async fn following(
        &self,
        account: &str,
        start: &str,
        kind: FollowKind,
        limit: u32,
    ) -> Result<Vec<FollowEntry>> {
        self.call(
            "condenser_api.get_following",
            serde_json::json!([account, start, kind.as_str(), limit]),
        )
        .await
    }

    async fn broadcast_vote(&self, vote: &VoteOperation) -> Result<TxResult> {
        let payload = serde_json::to_value(vote).context("Failed to encode vote")?;
        let result = self.relay("vote", payload).await;

        if let Err(ref e) = result {
            warn!(author = %vote.author, permlink = %vote.permlink, "Vote relay failed: {:#}", e);
        }

        result
    }

    async fn broadcast_report(&self, report: &ReportComment) -> Result<TxResult> {
        let payload = serde_json::to_value(report).context("Failed to encode report")?;
        self.relay("comment", payload).await
    }
}
