//! Account nonce tracking for reliable transaction submission
//!
//! Handles:
//! - Confirmed vs pending nonce resolution against a lagging ledger
//! - Local override while our own submission is not yet visible in pending state
//! - Invalidation after ambiguous outcomes so the next resolution re-derives
//!   ground truth from the network
//!
//! Resolution and submission for one account are serialized through
//! [`AccountStateCache::lease`]; accounts are independent of each other.

use crate::error::{PublisherError, PublisherResult};
use crate::felt::{felt_to_u64, Felt};
use crate::gateway::{BlockTag, LedgerGateway};

use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Entrypoint of the account contract exposing its current nonce
pub const GET_NONCE_ENTRYPOINT: &str = "get_nonce";

/// Nonce pair as last resolved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NonceSnapshot {
    pub confirmed_nonce: Option<u64>,
    pub next_nonce: Option<u64>,
}

/// Result of one resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedNonces {
    /// Nonce on confirmed state, used for fee estimation
    pub confirmed: u64,
    /// Nonce for the signed submission
    pub next: u64,
}

/// Nonces read from the ledger in one query pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteNonces {
    pub confirmed: u64,
    pub pending: u64,
}

#[derive(Debug, Default)]
struct NonceState {
    confirmed: Option<u64>,
    next: Option<u64>,
    /// Whether `next` has been handed to a submission since it was resolved
    next_submitted: bool,
}

/// Locally cached nonce state for one account
pub struct AccountStateCache {
    address: Felt,
    state: Mutex<NonceState>,
}

impl AccountStateCache {
    pub fn new(address: Felt) -> Self {
        Self {
            address,
            state: Mutex::new(NonceState::default()),
        }
    }

    pub fn address(&self) -> Felt {
        self.address
    }

    /// Take exclusive ownership of the account's nonce state.
    ///
    /// Hold the lease from resolution until the submission has been handed to
    /// the gateway so concurrent submitters cannot interleave.
    pub async fn lease(&self) -> NonceLease<'_> {
        NonceLease {
            address: self.address,
            state: self.state.lock().await,
        }
    }

    /// Query confirmed and pending nonces and derive the nonce for the next write
    pub async fn resolve_nonces(
        &self,
        gateway: &dyn LedgerGateway,
    ) -> PublisherResult<ResolvedNonces> {
        let mut lease = self.lease().await;
        let remote = fetch_remote_nonces(gateway, self.address).await?;
        Ok(lease.apply(remote))
    }

    /// Forget `next_nonce` after a submission whose outcome cannot be confirmed
    pub async fn invalidate_on_ambiguous_failure(&self) {
        self.lease().await.invalidate();
    }

    pub async fn snapshot(&self) -> NonceSnapshot {
        let state = self.state.lock().await;
        NonceSnapshot {
            confirmed_nonce: state.confirmed,
            next_nonce: state.next,
        }
    }
}

/// Exclusive access to one account's nonce state
pub struct NonceLease<'a> {
    address: Felt,
    state: MutexGuard<'a, NonceState>,
}

impl NonceLease<'_> {
    pub async fn resolve(
        &mut self,
        gateway: &dyn LedgerGateway,
    ) -> PublisherResult<ResolvedNonces> {
        let remote = fetch_remote_nonces(gateway, self.address).await?;
        Ok(self.apply(remote))
    }

    /// Fold a fresh query pair into the cached state.
    ///
    /// A cached `next` at or above `remote.pending` means our own submission
    /// has not reached pending state yet: it is reused if still unsubmitted and
    /// advanced by one otherwise.
    pub fn apply(&mut self, remote: RemoteNonces) -> ResolvedNonces {
        self.state.confirmed = Some(remote.confirmed);

        let next = match self.state.next {
            Some(cached) if cached >= remote.pending => {
                if self.state.next_submitted {
                    crate::metrics::record_nonce_override();
                    debug!(
                        "Pending nonce {} lags local nonce {}, using {}",
                        remote.pending,
                        cached,
                        cached + 1
                    );
                    cached + 1
                } else {
                    cached
                }
            }
            _ => remote.pending,
        };

        if next != remote.pending {
            debug!(
                "Resolved nonces for {:#x}: confirmed={} pending={} next={}",
                self.address, remote.confirmed, remote.pending, next
            );
        }

        if self.state.next != Some(next) {
            self.state.next_submitted = false;
        }
        self.state.next = Some(next);
        crate::metrics::record_nonce_resolution();

        ResolvedNonces {
            confirmed: remote.confirmed,
            next,
        }
    }

    /// Record that `nonce` was handed to the gateway
    pub fn mark_submitted(&mut self, nonce: u64) {
        if self.state.next != Some(nonce) {
            warn!(
                "Submitted nonce {} differs from cached next nonce {:?} for {:#x}",
                nonce, self.state.next, self.address
            );
            self.state.next = Some(nonce);
        }
        self.state.next_submitted = true;
    }

    pub fn invalidate(&mut self) {
        if let Some(next) = self.state.next.take() {
            info!(
                "Invalidated cached next nonce {} for {:#x}; next resolution re-queries the ledger",
                next, self.address
            );
            crate::metrics::record_nonce_invalidation();
        }
        self.state.next_submitted = false;
    }

    pub fn next_nonce(&self) -> Option<u64> {
        self.state.next
    }
}

/// Read the account nonce on confirmed and on pending state
pub async fn fetch_remote_nonces(
    gateway: &dyn LedgerGateway,
    address: Felt,
) -> PublisherResult<RemoteNonces> {
    let confirmed = fetch_nonce(gateway, address, BlockTag::Confirmed).await?;
    let pending = fetch_nonce(gateway, address, BlockTag::Pending).await?;

    if pending < confirmed {
        warn!(
            "Pending nonce {} below confirmed nonce {} for {:#x}",
            pending, confirmed, address
        );
    }

    Ok(RemoteNonces { confirmed, pending })
}

async fn fetch_nonce(
    gateway: &dyn LedgerGateway,
    address: Felt,
    at: BlockTag,
) -> PublisherResult<u64> {
    let result = gateway.read(address, GET_NONCE_ENTRYPOINT, &[], at).await?;

    let nonce = result.first().copied().ok_or_else(|| {
        PublisherError::Gateway(format!("{} returned no value", GET_NONCE_ENTRYPOINT))
    })?;

    felt_to_u64(nonce)
}
