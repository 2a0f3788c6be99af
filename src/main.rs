//! Pontis Publisher - publishes oracle entries as batched account transactions
//!
//! Loads configuration, connects to the ledger gateway, warms the account's
//! nonce cache and serves the status API until a shutdown signal arrives.

use anyhow::{Context, Result};
use pontis_publisher::api::{self, AppState};
use pontis_publisher::config::Settings;
use pontis_publisher::metrics::{self, MetricsServer};
use pontis_publisher::publisher::PublisherClient;
use pontis_publisher::tx::{load_signing_key, TransactionSubmitter};
use pontis_publisher::RpcGateway;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

const DEFAULT_PRIVATE_KEY_ENV: &str = "PONTIS_PRIVATE_KEY";
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);
/// Submissions are kept this long for `/submissions`
const TRACKED_SUBMISSION_TTL_SECS: i64 = 3600;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting Pontis Publisher v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    info!(
        "Loaded configuration for {} ({} RPC endpoints)",
        settings.submitter.network,
        settings.gateway.rpc_urls.len()
    );

    let gateway = Arc::new(RpcGateway::new(&settings.gateway)?);

    let key_env = settings
        .wallet
        .private_key_env
        .as_deref()
        .unwrap_or(DEFAULT_PRIVATE_KEY_ENV);
    let signing_key = load_signing_key(key_env)?;

    let submitter = Arc::new(TransactionSubmitter::new(
        gateway.clone(),
        Arc::new(signing_key),
        settings.submitter.clone(),
    )?);

    // Warm the nonce cache; a failure here is retried on the first submission
    match submitter.resolve_nonces().await {
        Ok(snapshot) => info!(
            "Account nonces: confirmed={:?} next={:?}",
            snapshot.confirmed_nonce, snapshot.next_nonce
        ),
        Err(e) => warn!("Initial nonce resolution failed: {}", e),
    }

    let publisher = Arc::new(PublisherClient::new(
        submitter.clone(),
        settings.publisher.clone(),
    ));
    info!("Publisher client ready for {}", publisher.publisher_name());

    match publisher.get_fee_token_balance().await {
        Ok(0) => warn!("Account holds no fee token; submissions will fail"),
        Ok(balance) => info!("Fee token balance: {}", balance),
        Err(e) => warn!("Fee token balance unavailable: {}", e),
    }

    // Start API server
    let api_handle = if settings.api.enabled {
        let config = settings.api.clone();
        let state = AppState {
            submitter: submitter.clone(),
            publisher: publisher.clone(),
        };
        Some(tokio::spawn(async move {
            if let Err(e) = api::run_server(config, state).await {
                error!("API server error: {}", e);
            }
        }))
    } else {
        None
    };

    // Start metrics server
    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    // Health check and housekeeping loop
    let health_handle = tokio::spawn({
        let gateway = gateway.clone();
        let submitter = submitter.clone();
        async move {
            loop {
                tokio::time::sleep(HEALTH_CHECK_INTERVAL).await;

                if gateway.health_check().await {
                    metrics::record_health_check();
                } else {
                    warn!("Gateway health check failed");
                    metrics::record_health_check_failure();
                }

                submitter.prune_tracked(TRACKED_SUBMISSION_TTL_SECS);
            }
        }
    });

    info!("Pontis Publisher is running");
    if settings.api.enabled {
        info!("API server: http://{}:{}", settings.api.host, settings.api.port);
    }
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    // Wait for shutdown signal
    shutdown_signal().await.context("Failed to install signal handler")?;

    info!("Shutdown signal received, stopping...");

    // Abort background tasks
    health_handle.abort();
    if let Some(h) = api_handle {
        h.abort();
    }
    if let Some(h) = metrics_handle {
        h.abort();
    }

    info!("Pontis Publisher stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,pontis_publisher=debug,hyper=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}

#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<()> {
    let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    tokio::select! {
        result = signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<()> {
    signal::ctrl_c().await
}
