//! HTTP API for health checks, account state, and entry publishing

use crate::config::ApiConfig;
use crate::error::{PublisherError, PublisherResult};
use crate::felt::felt_to_hex;
use crate::publisher::{EntryRequest, PublisherClient};
use crate::tx::{NonceSnapshot, SubmissionOutcome, TransactionSubmitter};

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub submitter: Arc<TransactionSubmitter>,
    pub publisher: Arc<PublisherClient>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/account", get(get_account))
        .route("/submissions", get(get_submissions))
        .route("/entries", post(publish_entries))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the HTTP API server
pub async fn run_server(config: ApiConfig, state: AppState) -> PublisherResult<()> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| PublisherError::Internal(format!("bind {}: {}", addr, e)))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| PublisherError::Internal(format!("API server: {}", e)))?;

    Ok(())
}

/// Health check endpoint - basic liveness
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Account address and cached nonces
async fn get_account(State(state): State<AppState>) -> impl IntoResponse {
    let nonces = state.submitter.account_snapshot().await;

    Json(AccountResponse {
        address: felt_to_hex(state.submitter.account_address()),
        publisher: state.publisher.publisher_name().to_string(),
        nonces,
        tracked_submissions: state.submitter.tracked_submissions().len(),
    })
}

async fn get_submissions(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.submitter.tracked_submissions())
}

/// Publish entries in one transaction
async fn publish_entries(
    State(state): State<AppState>,
    Json(requests): Json<Vec<EntryRequest>>,
) -> Response {
    let result = match state.publisher.entries_from_requests(&requests) {
        Ok(entries) => state.publisher.publish_many(&entries).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(SubmissionOutcome::Empty) => (
            StatusCode::OK,
            Json(PublishResponse {
                status: "skipped",
                transaction_hash: None,
            }),
        )
            .into_response(),
        Ok(SubmissionOutcome::Submitted(handle)) => {
            // Drive the submission to a terminal stage in the background
            let submitter = state.submitter.clone();
            let awaited = handle.clone();
            tokio::spawn(async move {
                if let Err(e) = submitter.await_confirmation(&awaited, None).await {
                    warn!("Published transaction {} unconfirmed: {}", awaited, e);
                }
            });

            (
                StatusCode::ACCEPTED,
                Json(PublishResponse {
                    status: "submitted",
                    transaction_hash: Some(handle.to_string()),
                }),
            )
                .into_response()
        }
        Err(e) => {
            warn!("Publishing {} entries failed: {}", requests.len(), e);
            (
                error_status(&e),
                Json(ErrorResponse {
                    error: e.to_string(),
                    kind: e.kind(),
                }),
            )
                .into_response()
        }
    }
}

fn error_status(e: &PublisherError) -> StatusCode {
    match e {
        PublisherError::Encoding(_) | PublisherError::InvalidTransaction(_) => {
            StatusCode::BAD_REQUEST
        }
        PublisherError::TransientNetwork { .. } | PublisherError::Timeout { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        PublisherError::StaleNonce { .. } | PublisherError::AmbiguousOutcome { .. } => {
            StatusCode::CONFLICT
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// Response types

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct AccountResponse {
    address: String,
    publisher: String,
    nonces: NonceSnapshot,
    tracked_submissions: usize,
}

#[derive(Serialize)]
struct PublishResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    transaction_hash: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    kind: &'static str,
}
