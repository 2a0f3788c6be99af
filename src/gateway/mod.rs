//! Ledger gateway - the remote network as seen by the submission engine
//!
//! This module provides:
//! - The `LedgerGateway` trait the engine is written against
//! - Block tags, transaction handles and status types
//! - A Starknet JSON-RPC implementation with multi-endpoint failover

pub mod rpc;

pub use rpc::RpcGateway;

use crate::error::PublisherResult;
use crate::felt::Felt;
use crate::tx::SignedTransaction;

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

/// Which ledger state a read is evaluated against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockTag {
    /// Finalized transactions only
    Confirmed,
    /// Includes transactions accepted into the pool
    Pending,
}

/// Opaque identifier of a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TxHandle(String);

impl TxHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status reported by the ledger for a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    NotReceived,
    Received,
    AcceptedOnL2,
    AcceptedOnL1,
    Rejected { reason: String },
    Reverted { reason: String },
}

/// How far a transaction must progress before a wait is satisfied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationLevel {
    /// Accepted into the pool
    #[default]
    Accepted,
    Finalized,
}

impl TxStatus {
    pub fn reaches(&self, level: ConfirmationLevel) -> bool {
        match level {
            ConfirmationLevel::Accepted => matches!(
                self,
                TxStatus::Received | TxStatus::AcceptedOnL2 | TxStatus::AcceptedOnL1
            ),
            ConfirmationLevel::Finalized => {
                matches!(self, TxStatus::AcceptedOnL2 | TxStatus::AcceptedOnL1)
            }
        }
    }

    /// Failure reason if the ledger reports the transaction as failed
    pub fn failure(&self) -> Option<&str> {
        match self {
            TxStatus::Rejected { reason } | TxStatus::Reverted { reason } => Some(reason),
            _ => None,
        }
    }
}

/// Remote ledger operations consumed by the submission engine
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Evaluate a view entrypoint against the given state
    async fn read(
        &self,
        contract: Felt,
        entrypoint: &str,
        args: &[Felt],
        at: BlockTag,
    ) -> PublisherResult<Vec<Felt>>;

    /// Evaluate (not commit) a transaction against confirmed state and return its cost
    async fn estimate_fee(&self, transaction: &SignedTransaction) -> PublisherResult<u128>;

    async fn submit(&self, transaction: &SignedTransaction) -> PublisherResult<TxHandle>;

    async fn poll_status(&self, handle: &TxHandle) -> PublisherResult<TxStatus>;
}
