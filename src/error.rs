//! Error types for the Pontis publisher

use thiserror::Error;

/// Main error type for the publisher and its submission engine
#[derive(Error, Debug)]
pub enum PublisherError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Gateway unreachable or timed out. Nothing reached the ledger.
    #[error("Transient network fault during {operation}: {message}")]
    TransientNetwork { operation: String, message: String },

    /// Fee estimation reverted; the batch itself is defective.
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    /// The ledger accepted the submission but its final outcome is unknown or failed.
    #[error("Ambiguous outcome for transaction {handle}: {reason}")]
    AmbiguousOutcome { handle: String, reason: String },

    #[error("Stale nonce {nonce}: {message}")]
    StaleNonce { nonce: u64, message: String },

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Timeout waiting for {operation}")]
    Timeout { operation: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PublisherError {
    /// Check if error is retryable without touching nonce state
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PublisherError::TransientNetwork { .. } | PublisherError::Timeout { .. }
        )
    }

    /// Check if error leaves the cached nonce untrustworthy
    pub fn invalidates_nonce(&self) -> bool {
        matches!(
            self,
            PublisherError::AmbiguousOutcome { .. } | PublisherError::StaleNonce { .. }
        )
    }

    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            PublisherError::Config(_) => "config",
            PublisherError::TransientNetwork { .. } => "transient_network",
            PublisherError::InvalidTransaction(_) => "invalid_transaction",
            PublisherError::AmbiguousOutcome { .. } => "ambiguous_outcome",
            PublisherError::StaleNonce { .. } => "stale_nonce",
            PublisherError::Signing(_) => "signing",
            PublisherError::Gateway(_) => "gateway",
            PublisherError::Encoding(_) => "encoding",
            PublisherError::Timeout { .. } => "timeout",
            PublisherError::Internal(_) => "internal",
        }
    }
}

/// Result type for publisher operations
pub type PublisherResult<T> = Result<T, PublisherError>;
