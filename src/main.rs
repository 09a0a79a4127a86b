use anyhow::{Context, Result};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{Level, error, info, warn};

use ledger_scout::{
    DryRunLedger, JsonFileStore, Ledger, RpcLedgerClient, Scout,
    config::{ScoutConfig, sanitize_for_logging},
    create_status_router,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first - nothing runs on a bad config
    let config = ScoutConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {:#}", e);
        eprintln!("Please check the SCOUT_* environment variables.");
        e
    })?;

    init_logging(&config)?;

    info!("Starting ledger scout v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Account: @{}, mode: {}, base weight: {}%, floor: {}%",
        config.account.name,
        config.budget.mode.as_str(),
        config.account.vote_weight as f64 / 100.0,
        config.budget.vp_threshold
    );
    info!(
        "Rules: {}w/{}i standard, {}w/{}i fast track, freshness {}s + {}s grace",
        config.rules.word_count,
        config.rules.image_count,
        config.rules.fast_word_min,
        config.rules.fast_image_min,
        config.rules.freshness_secs,
        config.rules.freshness_grace_secs
    );
    info!(
        "RPC nodes: {}, signing relay: {}, relay key: {}",
        config.rpc.nodes.join(", "),
        config.rpc.signer_url.as_deref().unwrap_or("<none>"),
        sanitize_for_logging(&config.rpc.signer_api_key)
    );

    // Ledger access
    let client = RpcLedgerClient::new(config.to_ledger_config())
        .context("Failed to create ledger client")?;
    let ledger: Arc<dyn Ledger> = if config.effective_dry_run() {
        if config.rpc.signer_url.is_none() {
            warn!("No signing relay configured - running in dry-run mode");
        } else {
            info!("Dry-run mode: votes and reports are logged, not broadcast");
        }
        Arc::new(DryRunLedger::new(Arc::new(client)))
    } else {
        Arc::new(client)
    };

    // Durable edit-jail state
    let store = Arc::new(JsonFileStore::new(&config.jail.memory_file));
    info!("Edit-jail state file: {}", store.path().display());

    let scout = Scout::new(&config, ledger, store)?;

    if config.api.enabled {
        let app = create_status_router(scout.status_state()).layer(TraceLayer::new_for_http());
        let bind_addr = config.api_addr()?;
        let listener = tokio::net::TcpListener::bind(bind_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", bind_addr, e))?;

        info!("Status API listening on {}", bind_addr);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("Status API stopped: {}", e);
            }
        });
    }

    let jail = scout.jail();
    tokio::select! {
        _ = scout.run() => {}
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            info!("Shutdown requested");
        }
    }

    if let Err(e) = jail.persist().await {
        warn!(error_kind = e.kind(), "Edit-jail state not saved on shutdown: {}", e);
    }

    Ok(())
}

/// Initialize logging from configuration
fn init_logging(config: &ScoutConfig) -> Result<()> {
    let log_level = match config.logging.level.as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}
