//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Nonce resolution and invalidation
//! - Fee quotes
//! - Transaction submission and confirmation
//! - Error rates by kind

use crate::error::{PublisherError, PublisherResult};

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram, Counter,
    CounterVec, Encoder, Gauge, Histogram, TextEncoder,
};
use std::net::SocketAddr;
use tracing::{error, info};

lazy_static! {
    // Nonce metrics
    pub static ref NONCE_RESOLUTIONS: Counter = register_counter!(
        "pontis_nonce_resolutions_total",
        "Total nonce resolutions against the ledger"
    ).unwrap();

    pub static ref NONCE_OVERRIDES: Counter = register_counter!(
        "pontis_nonce_overrides_total",
        "Times the cached next nonce was kept over the ledger's pending nonce"
    ).unwrap();

    pub static ref NONCE_INVALIDATIONS: Counter = register_counter!(
        "pontis_nonce_invalidations_total",
        "Times the nonce cache was dropped after an ambiguous failure"
    ).unwrap();

    // Fee metrics
    pub static ref FEE_ESTIMATE: Gauge = register_gauge!(
        "pontis_fee_estimate",
        "Most recent fee estimate"
    ).unwrap();

    pub static ref FEE_MAX: Gauge = register_gauge!(
        "pontis_fee_max",
        "Most recent fee cap attached to a transaction"
    ).unwrap();

    // Transaction metrics
    pub static ref TX_EMPTY_BATCHES: Counter = register_counter!(
        "pontis_empty_batches_total",
        "Submissions skipped because the batch was empty"
    ).unwrap();

    pub static ref TX_SUBMITTED: Counter = register_counter!(
        "pontis_transactions_submitted_total",
        "Total transactions accepted by the gateway"
    ).unwrap();

    pub static ref TX_CONFIRMED: Counter = register_counter!(
        "pontis_transactions_confirmed_total",
        "Total transactions that reached the requested confirmation level"
    ).unwrap();

    pub static ref TX_FAILED: CounterVec = register_counter_vec!(
        "pontis_transactions_failed_total",
        "Total failed submissions or confirmations by error kind",
        &["kind"]
    ).unwrap();

    pub static ref SUBMIT_LATENCY: Histogram = register_histogram!(
        "pontis_submit_latency_seconds",
        "Time from batch to gateway acceptance",
        vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    ).unwrap();

    pub static ref CONFIRMATION_LATENCY: Histogram = register_histogram!(
        "pontis_confirmation_latency_seconds",
        "Time spent waiting for confirmation",
        vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]
    ).unwrap();

    // Health metrics
    pub static ref HEALTH_CHECK_SUCCESS: Counter = register_counter!(
        "pontis_health_check_success_total",
        "Total successful gateway health checks"
    ).unwrap();

    pub static ref HEALTH_CHECK_FAILURE: Counter = register_counter!(
        "pontis_health_check_failure_total",
        "Total failed gateway health checks"
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> PublisherResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| PublisherError::Internal(format!("bind {}: {}", addr, e)))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| PublisherError::Internal(format!("metrics server: {}", e)))?;

        Ok(())
    }
}

async fn metrics_handler() -> Result<String, StatusCode> {
    render().map_err(|e| {
        error!("Failed to encode metrics: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Render every registered metric in the text exposition format
pub fn render() -> PublisherResult<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| PublisherError::Internal(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| PublisherError::Internal(e.to_string()))
}

// Helper functions to record metrics

pub fn record_nonce_resolution() {
    NONCE_RESOLUTIONS.inc();
}

pub fn record_nonce_override() {
    NONCE_OVERRIDES.inc();
}

pub fn record_nonce_invalidation() {
    NONCE_INVALIDATIONS.inc();
}

pub fn record_fee_quote(estimate: u128, max_fee: u128) {
    FEE_ESTIMATE.set(estimate as f64);
    FEE_MAX.set(max_fee as f64);
}

pub fn record_empty_batch() {
    TX_EMPTY_BATCHES.inc();
}

pub fn record_tx_submitted() {
    TX_SUBMITTED.inc();
}

pub fn record_submit_latency(latency_secs: f64) {
    SUBMIT_LATENCY.observe(latency_secs);
}

pub fn record_tx_confirmed() {
    TX_CONFIRMED.inc();
}

pub fn record_confirmation_latency(latency_secs: f64) {
    CONFIRMATION_LATENCY.observe(latency_secs);
}

pub fn record_tx_failed(kind: &str) {
    TX_FAILED.with_label_values(&[kind]).inc();
}

pub fn record_health_check() {
    HEALTH_CHECK_SUCCESS.inc();
}

pub fn record_health_check_failure() {
    HEALTH_CHECK_FAILURE.inc();
}
