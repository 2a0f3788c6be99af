//! Transaction submitter with retry logic and ambiguous-outcome recovery

use super::batch::{Batch, Call, CallBatcher};
use super::fee::FeeEstimator;
use super::nonce::{fetch_remote_nonces, AccountStateCache, NonceSnapshot};
use super::prepared::PreparedTransaction;
use super::signer::TransactionSigner;
use crate::config::SubmitterConfig;
use crate::error::{PublisherError, PublisherResult};
use crate::felt::{str_to_felt, Felt};
use crate::gateway::{ConfirmationLevel, LedgerGateway, TxHandle};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Lifecycle of one submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStage {
    Building,
    FeeEstimated,
    Signed,
    Submitted,
    Accepted,
    Rejected,
    /// Confirmation timed out
    Unknown,
}

impl SubmissionStage {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubmissionStage::Accepted | SubmissionStage::Rejected | SubmissionStage::Unknown
        )
    }
}

/// Result of a `submit` call that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Empty batch, nothing was sent
    Empty,
    Submitted(TxHandle),
}

impl SubmissionOutcome {
    pub fn handle(&self) -> Option<&TxHandle> {
        match self {
            SubmissionOutcome::Empty => None,
            SubmissionOutcome::Submitted(handle) => Some(handle),
        }
    }
}

/// A submission the gateway accepted, kept for status reporting
#[derive(Debug, Clone, Serialize)]
pub struct TrackedSubmission {
    pub handle: TxHandle,
    pub nonce: u64,
    pub max_fee: u128,
    pub stage: SubmissionStage,
    pub submitted_at: DateTime<Utc>,
}

/// Batches, prices, signs and submits transactions for one account
pub struct TransactionSubmitter {
    gateway: Arc<dyn LedgerGateway>,
    signer: Arc<dyn TransactionSigner>,
    account: AccountStateCache,
    batcher: CallBatcher,
    fee_estimator: FeeEstimator,
    chain_id: Felt,
    config: SubmitterConfig,
    tracked: DashMap<TxHandle, TrackedSubmission>,
}

impl TransactionSubmitter {
    pub fn new(
        gateway: Arc<dyn LedgerGateway>,
        signer: Arc<dyn TransactionSigner>,
        config: SubmitterConfig,
    ) -> PublisherResult<Self> {
        let chain_id = str_to_felt(&config.chain_id)?;
        let fee_estimator = FeeEstimator::new(config.fee_safety_margin)?;

        info!(
            "Transaction submitter initialized for account {:#x} on {} ({})",
            config.account_address, config.network, config.chain_id
        );

        Ok(Self {
            gateway,
            signer,
            account: AccountStateCache::new(config.account_address),
            batcher: CallBatcher,
            fee_estimator,
            chain_id,
            config,
            tracked: DashMap::new(),
        })
    }

    pub fn account_address(&self) -> Felt {
        self.account.address()
    }

    pub fn gateway(&self) -> &dyn LedgerGateway {
        self.gateway.as_ref()
    }

    pub async fn account_snapshot(&self) -> NonceSnapshot {
        self.account.snapshot().await
    }

    /// Resolve nonces outside of a submission, e.g. to warm the cache at startup
    pub async fn resolve_nonces(&self) -> PublisherResult<NonceSnapshot> {
        self.account.resolve_nonces(self.gateway.as_ref()).await?;
        Ok(self.account.snapshot().await)
    }

    /// Submit a single call
    pub async fn submit_call(
        &self,
        to: Felt,
        entrypoint: &str,
        args: Vec<Felt>,
        fee_ceiling: Option<u128>,
    ) -> PublisherResult<SubmissionOutcome> {
        let batch = Batch::new().with_call(Call::new(to, entrypoint, args));
        self.submit(&batch, fee_ceiling).await
    }

    /// Batch, price, sign and submit `batch` as one transaction.
    ///
    /// Empty batches return [`SubmissionOutcome::Empty`] without touching the
    /// network. The account lease is held from nonce resolution until the
    /// gateway has answered the submission.
    pub async fn submit(
        &self,
        batch: &Batch,
        fee_ceiling: Option<u128>,
    ) -> PublisherResult<SubmissionOutcome> {
        if batch.is_empty() {
            debug!("Skipping submission as batch is empty");
            crate::metrics::record_empty_batch();
            return Ok(SubmissionOutcome::Empty);
        }

        let started = Instant::now();
        let sender = self.account.address();
        let ceiling = fee_ceiling.or(self.config.max_fee_ceiling);
        let mut stage = SubmissionStage::Building;
        let encoded = self
            .batcher
            .encode(batch)
            .map_err(|e| self.record_failure(stage, e))?;

        let mut lease = self.account.lease().await;
        let remote = self
            .with_retry("nonce query", || {
                fetch_remote_nonces(self.gateway.as_ref(), sender)
            })
            .await
            .map_err(|e| self.record_failure(stage, e))?;
        let nonces = lease.apply(remote);

        // Estimation runs against confirmed state, so the skeleton carries the confirmed nonce
        let skeleton =
            PreparedTransaction::new(sender, &encoded, nonces.confirmed, 0, self.chain_id)
                .sign(self.signer.as_ref())
                .map_err(|e| self.record_failure(stage, e))?;
        let quote = self
            .with_retry("fee estimation", || {
                self.fee_estimator
                    .estimate(self.gateway.as_ref(), &skeleton, ceiling)
            })
            .await
            .map_err(|e| self.record_failure(stage, e))?;
        stage = self.advance(stage, SubmissionStage::FeeEstimated);

        let signed = PreparedTransaction::new(
            sender,
            &encoded,
            nonces.next,
            quote.max_fee,
            self.chain_id,
        )
        .sign(self.signer.as_ref())
        .map_err(|e| self.record_failure(stage, e))?;
        stage = self.advance(stage, SubmissionStage::Signed);

        let nonce = signed.nonce();
        let result = self
            .with_retry("submission", || self.gateway.submit(&signed))
            .await;

        match result {
            Ok(handle) => {
                lease.mark_submitted(nonce);
                drop(lease);
                self.advance(stage, SubmissionStage::Submitted);

                info!(
                    "Transaction {} submitted: {} call(s), nonce {}, max_fee {} (estimate {})",
                    handle,
                    batch.len(),
                    nonce,
                    quote.max_fee,
                    quote.estimate
                );

                self.tracked.insert(
                    handle.clone(),
                    TrackedSubmission {
                        handle: handle.clone(),
                        nonce,
                        max_fee: quote.max_fee,
                        stage: SubmissionStage::Submitted,
                        submitted_at: Utc::now(),
                    },
                );

                crate::metrics::record_tx_submitted();
                crate::metrics::record_submit_latency(started.elapsed().as_secs_f64());

                Ok(SubmissionOutcome::Submitted(handle))
            }
            Err(e) => {
                if e.invalidates_nonce() {
                    lease.invalidate();
                }
                Err(self.record_failure(stage, e))
            }
        }
    }

    /// Wait until `handle` reaches `level` (default: accepted into the pool).
    ///
    /// A rejected or reverted transaction, one whose status cannot be read, or
    /// one that is not confirmed within the configured timeout invalidates the
    /// cached nonce before the `AmbiguousOutcome` error is returned. Dropping
    /// the future leaves both the transaction and the nonce state untouched.
    pub async fn await_confirmation(
        &self,
        handle: &TxHandle,
        level: Option<ConfirmationLevel>,
    ) -> PublisherResult<()> {
        let level = level.unwrap_or_default();
        let started = Instant::now();
        let wait = self.config.confirmation_timeout();

        match timeout(wait, self.poll_until(handle, level)).await {
            Ok(Ok(())) => {
                self.set_stage(handle, SubmissionStage::Accepted);
                info!("Transaction {} reached {:?}", handle, level);
                crate::metrics::record_tx_confirmed();
                crate::metrics::record_confirmation_latency(started.elapsed().as_secs_f64());
                Ok(())
            }
            Ok(Err(e)) if e.invalidates_nonce() => {
                // Rejected can mean nonce free or nonce consumed; only a fresh resolution tells
                self.account.invalidate_on_ambiguous_failure().await;
                self.set_stage(handle, SubmissionStage::Rejected);
                error!("Transaction {} failed: {}", handle, e);
                crate::metrics::record_tx_failed(e.kind());
                Err(e)
            }
            Ok(Err(e)) => {
                self.account.invalidate_on_ambiguous_failure().await;
                self.set_stage(handle, SubmissionStage::Unknown);
                error!("Status of transaction {} unavailable: {}", handle, e);

                let e = PublisherError::AmbiguousOutcome {
                    handle: handle.to_string(),
                    reason: format!("status unavailable: {}", e),
                };
                crate::metrics::record_tx_failed(e.kind());
                Err(e)
            }
            Err(_) => {
                self.account.invalidate_on_ambiguous_failure().await;
                self.set_stage(handle, SubmissionStage::Unknown);
                warn!("Transaction {} not confirmed within {:?}", handle, wait);

                let e = PublisherError::AmbiguousOutcome {
                    handle: handle.to_string(),
                    reason: format!("not confirmed within {:?}", wait),
                };
                crate::metrics::record_tx_failed(e.kind());
                Err(e)
            }
        }
    }

    /// Submissions known to this process, oldest first
    pub fn tracked_submissions(&self) -> Vec<TrackedSubmission> {
        let mut submissions: Vec<_> = self.tracked.iter().map(|e| e.value().clone()).collect();
        submissions.sort_by_key(|s| (s.submitted_at, s.nonce));
        submissions
    }

    /// Drop submissions older than `max_age_secs`, whatever their stage.
    ///
    /// Submissions nobody awaited stay `Submitted` forever, so age alone
    /// decides.
    pub fn prune_tracked(&self, max_age_secs: i64) {
        let cutoff = Utc::now() - chrono::Duration::seconds(max_age_secs);
        let before = self.tracked.len();

        self.tracked.retain(|handle, s| {
            let keep = s.submitted_at > cutoff;
            if !keep && !s.stage.is_terminal() {
                debug!(
                    "Dropping unconfirmed submission {} (nonce {}) from tracking",
                    handle, s.nonce
                );
            }
            keep
        });

        let pruned = before.saturating_sub(self.tracked.len());
        if pruned > 0 {
            debug!("Pruned {} tracked submission(s)", pruned);
        }
    }

    async fn poll_until(
        &self,
        handle: &TxHandle,
        level: ConfirmationLevel,
    ) -> PublisherResult<()> {
        loop {
            match self.gateway.poll_status(handle).await {
                Ok(status) if status.reaches(level) => return Ok(()),
                Ok(status) => {
                    if let Some(reason) = status.failure() {
                        return Err(PublisherError::AmbiguousOutcome {
                            handle: handle.to_string(),
                            reason: reason.to_string(),
                        });
                    }
                    debug!(
                        "Transaction {} status {:?}, waiting for {:?}",
                        handle, status, level
                    );
                }
                Err(e) if e.is_retryable() => {
                    warn!("Status poll for {} failed: {}", handle, e);
                }
                Err(e) => return Err(e),
            }

            tokio::time::sleep(self.config.poll_interval()).await;
        }
    }

    /// Run `op`, retrying transient gateway faults up to `max_retries` times
    async fn with_retry<T, F, Fut>(&self, operation: &str, mut op: F) -> PublisherResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = PublisherResult<T>>,
    {
        let max_attempts = self.config.max_retries.saturating_add(1);
        let mut attempts = 0;

        loop {
            attempts += 1;

            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempts < max_attempts => {
                    warn!(
                        "{} failed (attempt {}/{}): {}",
                        operation, attempts, max_attempts, e
                    );
                    tokio::time::sleep(self.config.retry_delay()).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn advance(&self, from: SubmissionStage, to: SubmissionStage) -> SubmissionStage {
        debug!("Submission {:?} -> {:?}", from, to);
        to
    }

    fn set_stage(&self, handle: &TxHandle, stage: SubmissionStage) {
        if let Some(mut tracked) = self.tracked.get_mut(handle) {
            tracked.stage = stage;
        }
    }

    fn record_failure(&self, stage: SubmissionStage, e: PublisherError) -> PublisherError {
        error!("Submission failed at {:?}: {}", stage, e);
        crate::metrics::record_tx_failed(e.kind());
        e
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{BlockTag, MockLedgerGateway, TxStatus};
    use crate::testing::{test_config, FakeLedger, SubmitFault};
    use crate::tx::signer::test_signing_key;

    use tokio_test::{assert_err, assert_ok};

    fn submitter(ledger: Arc<FakeLedger>) -> TransactionSubmitter {
        TransactionSubmitter::new(ledger, Arc::new(test_signing_key()), test_config()).unwrap()
    }

    fn entry_batch() -> Batch {
        Batch::new().with_call(Call::new(
            Felt::from(0x0c0ffeeu64),
            "submit_entry",
            (1..=4u64).map(Felt::from).collect(),
        ))
    }

    fn submitted_handle(outcome: SubmissionOutcome) -> TxHandle {
        match outcome {
            SubmissionOutcome::Submitted(handle) => handle,
            SubmissionOutcome::Empty => panic!("expected a submission"),
        }
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_gateway_calls() {
        // Any call on a mock without expectations panics
        let gateway = MockLedgerGateway::new();
        let submitter = TransactionSubmitter::new(
            Arc::new(gateway),
            Arc::new(test_signing_key()),
            test_config(),
        )
        .unwrap();

        let outcome = submitter.submit(&Batch::new(), None).await.unwrap();
        assert_eq!(outcome, SubmissionOutcome::Empty);
    }

    #[tokio::test]
    async fn test_two_phase_nonces_and_fee() {
        let ledger = Arc::new(FakeLedger::new(4, 5));
        ledger.set_fee_estimate(1000);
        let submitter = submitter(ledger.clone());

        assert_ok!(submitter.submit(&entry_batch(), None).await);

        let estimated = ledger.estimated();
        assert_eq!(estimated.len(), 1);
        assert_eq!(estimated[0].nonce(), 4);
        assert_eq!(estimated[0].transaction().max_fee(), 0);

        let submitted = ledger.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].nonce(), 5);
        assert_eq!(submitted[0].transaction().max_fee(), 1100);
        assert_ne!(estimated[0].hash(), submitted[0].hash());
    }

    #[tokio::test]
    async fn test_caller_ceiling_caps_fee() {
        let ledger = Arc::new(FakeLedger::new(0, 0));
        ledger.set_fee_estimate(1000);
        let submitter = submitter(ledger.clone());

        submitter.submit(&entry_batch(), Some(1050)).await.unwrap();
        assert_eq!(ledger.submitted()[0].transaction().max_fee(), 1050);
    }

    #[tokio::test]
    async fn test_consecutive_submissions_advance_by_one() {
        // pending state never catches up during the burst
        let ledger = Arc::new(FakeLedger::new(5, 5));
        let submitter = submitter(ledger.clone());

        for _ in 0..4 {
            submitter.submit(&entry_batch(), None).await.unwrap();
        }

        let nonces: Vec<u64> = ledger.submitted().iter().map(|tx| tx.nonce()).collect();
        assert_eq!(nonces, vec![5, 6, 7, 8]);
        assert_eq!(submitter.account_snapshot().await.next_nonce, Some(8));
    }

    #[tokio::test]
    async fn test_concurrent_submissions_get_distinct_nonces() {
        let ledger = Arc::new(FakeLedger::new(10, 10));
        let submitter = Arc::new(submitter(ledger.clone()));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let submitter = submitter.clone();
                tokio::spawn(async move { submitter.submit(&entry_batch(), None).await })
            })
            .collect();

        for result in futures::future::join_all(handles).await {
            assert!(result.unwrap().is_ok());
        }

        let mut nonces: Vec<u64> = ledger.submitted().iter().map(|tx| tx.nonce()).collect();
        nonces.sort_unstable();
        assert_eq!(nonces, (10..16).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_rejected_outcome_invalidates_nonce() {
        let ledger = Arc::new(FakeLedger::new(5, 5));
        let submitter = submitter(ledger.clone());

        let handle = submitted_handle(submitter.submit(&entry_batch(), None).await.unwrap());
        ledger.push_status(
            &handle,
            TxStatus::Rejected {
                reason: "Invalid transaction nonce".to_string(),
            },
        );

        let err = submitter.await_confirmation(&handle, None).await.unwrap_err();
        assert!(matches!(err, PublisherError::AmbiguousOutcome { .. }));
        assert_eq!(submitter.account_snapshot().await.next_nonce, None);
        assert_eq!(
            submitter.tracked_submissions()[0].stage,
            SubmissionStage::Rejected
        );

        // Ledger still reports pending 5: a fresh resolution reuses it instead of 6
        let reads_before = ledger.nonce_reads().len();
        submitter.submit(&entry_batch(), None).await.unwrap();
        assert_eq!(ledger.submitted()[1].nonce(), 5);
        assert_eq!(
            ledger.nonce_reads()[reads_before..],
            [BlockTag::Confirmed, BlockTag::Pending]
        );
    }

    #[tokio::test]
    async fn test_accepted_outcome_keeps_nonce() {
        let ledger = Arc::new(FakeLedger::new(5, 5));
        let submitter = submitter(ledger.clone());

        let handle = submitted_handle(submitter.submit(&entry_batch(), None).await.unwrap());
        ledger.push_status(&handle, TxStatus::NotReceived);
        ledger.push_status(&handle, TxStatus::Received);

        assert_ok!(
            submitter
                .await_confirmation(&handle, Some(ConfirmationLevel::Accepted))
                .await
        );
        assert_eq!(submitter.account_snapshot().await.next_nonce, Some(5));
        assert_eq!(
            submitter.tracked_submissions()[0].stage,
            SubmissionStage::Accepted
        );
    }

    #[tokio::test]
    async fn test_confirmation_timeout_is_unknown() {
        let ledger = Arc::new(FakeLedger::new(5, 5));
        let mut config = test_config();
        config.confirmation_timeout_secs = 1;
        let submitter =
            TransactionSubmitter::new(ledger.clone(), Arc::new(test_signing_key()), config)
                .unwrap();

        let handle = submitted_handle(submitter.submit(&entry_batch(), None).await.unwrap());
        // No scripted status: the fake keeps answering Received, which never finalizes

        let err = submitter
            .await_confirmation(&handle, Some(ConfirmationLevel::Finalized))
            .await
            .unwrap_err();

        assert!(matches!(err, PublisherError::AmbiguousOutcome { .. }));
        assert_eq!(submitter.account_snapshot().await.next_nonce, None);
        assert_eq!(
            submitter.tracked_submissions()[0].stage,
            SubmissionStage::Unknown
        );
    }

    #[tokio::test]
    async fn test_transient_submit_fault_retries_same_nonce() {
        let ledger = Arc::new(FakeLedger::new(3, 3));
        ledger.fail_next_submits(SubmitFault::Transient, 2);
        let submitter = submitter(ledger.clone());

        assert_ok!(submitter.submit(&entry_batch(), None).await);

        let submitted = ledger.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].nonce(), 3);
        assert_eq!(ledger.submit_attempts(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_transient_faults_do_not_consume_nonce() {
        let ledger = Arc::new(FakeLedger::new(3, 3));
        ledger.fail_next_submits(SubmitFault::Transient, 10);
        let submitter = submitter(ledger.clone());

        let err = submitter.submit(&entry_batch(), None).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(ledger.submit_attempts(), test_config().max_retries as usize + 1);

        ledger.fail_next_submits(SubmitFault::Transient, 0);
        submitter.submit(&entry_batch(), None).await.unwrap();
        assert_eq!(ledger.submitted()[0].nonce(), 3);
    }

    #[tokio::test]
    async fn test_stale_nonce_invalidates_and_retry_recovers() {
        let ledger = Arc::new(FakeLedger::new(5, 5));
        let submitter = submitter(ledger.clone());

        submitter.submit(&entry_batch(), None).await.unwrap();

        // The first transaction silently dropped; the ledger rejects nonce 6 as too high
        ledger.fail_next_submits(SubmitFault::StaleNonce, 1);
        let err = submitter.submit(&entry_batch(), None).await.unwrap_err();
        assert!(matches!(err, PublisherError::StaleNonce { nonce: 6, .. }));
        assert_eq!(submitter.account_snapshot().await.next_nonce, None);

        submitter.submit(&entry_batch(), None).await.unwrap();
        assert_eq!(ledger.submitted().last().unwrap().nonce(), 5);
    }

    #[tokio::test]
    async fn test_estimation_revert_is_not_retried() {
        let ledger = Arc::new(FakeLedger::new(0, 0));
        ledger.set_fee_revert("Entry point not found");
        let submitter = submitter(ledger.clone());

        let err = assert_err!(submitter.submit(&entry_batch(), None).await);
        assert!(matches!(err, PublisherError::InvalidTransaction(_)));
        assert_eq!(ledger.estimated().len(), 1);
        assert!(ledger.submitted().is_empty());
        // The resolved nonce was never used and is reused next time
        assert_eq!(submitter.account_snapshot().await.next_nonce, Some(0));
    }

    #[tokio::test]
    async fn test_stale_nonce_from_mock_gateway() {
        let mut gateway = MockLedgerGateway::new();
        gateway
            .expect_read()
            .returning(|_, _, _, _| Ok(vec![Felt::from(2u64)]));
        gateway.expect_estimate_fee().times(1).returning(|_| Ok(10));
        gateway.expect_submit().times(1).returning(|tx| {
            Err(PublisherError::StaleNonce {
                nonce: tx.nonce(),
                message: "Invalid transaction nonce".to_string(),
            })
        });

        let submitter = TransactionSubmitter::new(
            Arc::new(gateway),
            Arc::new(test_signing_key()),
            test_config(),
        )
        .unwrap();

        let err = submitter.submit(&entry_batch(), None).await.unwrap_err();
        assert!(err.invalidates_nonce());
        assert_eq!(submitter.account_snapshot().await.next_nonce, None);
        assert_eq!(submitter.account_snapshot().await.confirmed_nonce, Some(2));
    }

    #[tokio::test]
    async fn test_unreadable_status_is_unknown() {
        let mut gateway = MockLedgerGateway::new();
        gateway
            .expect_read()
            .returning(|_, _, _, _| Ok(vec![Felt::from(7u64)]));
        gateway.expect_estimate_fee().returning(|_| Ok(10));
        gateway
            .expect_submit()
            .times(1)
            .returning(|_| Ok(TxHandle::new("0xabc")));
        gateway
            .expect_poll_status()
            .times(1)
            .returning(|_| Err(PublisherError::Gateway("unexpected error code".to_string())));

        let submitter = TransactionSubmitter::new(
            Arc::new(gateway),
            Arc::new(test_signing_key()),
            test_config(),
        )
        .unwrap();

        let handle = submitted_handle(submitter.submit(&entry_batch(), None).await.unwrap());
        assert_eq!(submitter.account_snapshot().await.next_nonce, Some(7));

        let err = submitter.await_confirmation(&handle, None).await.unwrap_err();
        assert!(matches!(err, PublisherError::AmbiguousOutcome { .. }));
        assert_eq!(submitter.account_snapshot().await.next_nonce, None);
        assert_eq!(
            submitter.tracked_submissions()[0].stage,
            SubmissionStage::Unknown
        );
    }

    #[tokio::test]
    async fn test_prune_drops_unconfirmed_submissions() {
        let ledger = Arc::new(FakeLedger::new(0, 0));
        let submitter = submitter(ledger.clone());

        for _ in 0..5 {
            submitter.submit(&entry_batch(), None).await.unwrap();
        }
        assert_eq!(submitter.tracked_submissions().len(), 5);

        submitter.prune_tracked(3600);
        assert_eq!(submitter.tracked_submissions().len(), 5);

        // Never awaited, so every entry is still Submitted
        submitter.prune_tracked(0);
        assert!(submitter.tracked_submissions().is_empty());
    }

    #[tokio::test]
    async fn test_transient_nonce_read_faults_are_retried() {
        let ledger = Arc::new(FakeLedger::new(4, 5));
        ledger.fail_next_reads(2);
        let submitter = submitter(ledger.clone());

        assert_ok!(submitter.submit(&entry_batch(), None).await);

        assert_eq!(ledger.submitted()[0].nonce(), 5);
        assert_eq!(
            ledger.nonce_reads(),
            vec![BlockTag::Confirmed, BlockTag::Pending]
        );
    }

    #[tokio::test]
    async fn test_exhausted_nonce_read_faults_leave_nonce_unchanged() {
        let ledger = Arc::new(FakeLedger::new(5, 5));
        let submitter = submitter(ledger.clone());
        submitter.submit(&entry_batch(), None).await.unwrap();

        ledger.fail_next_reads(10);
        let err = submitter.submit(&entry_batch(), None).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(submitter.account_snapshot().await.next_nonce, Some(5));
        assert_eq!(ledger.submit_attempts(), 1);

        ledger.fail_next_reads(0);
        submitter.submit(&entry_batch(), None).await.unwrap();
        assert_eq!(ledger.submitted()[1].nonce(), 6);
    }

    #[tokio::test]
    async fn test_transient_estimate_faults_are_retried() {
        let ledger = Arc::new(FakeLedger::new(2, 2));
        ledger.set_fee_estimate(1000);
        ledger.fail_next_estimates(2);
        let submitter = submitter(ledger.clone());

        assert_ok!(submitter.submit(&entry_batch(), None).await);

        assert_eq!(ledger.estimate_attempts(), 3);
        assert_eq!(ledger.submitted()[0].nonce(), 2);
        assert_eq!(ledger.submitted()[0].transaction().max_fee(), 1100);
    }

    #[tokio::test]
    async fn test_exhausted_estimate_faults_leave_nonce_unchanged() {
        let ledger = Arc::new(FakeLedger::new(5, 5));
        ledger.fail_next_estimates(10);
        let submitter = submitter(ledger.clone());

        let err = submitter.submit(&entry_batch(), None).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(
            ledger.estimate_attempts(),
            test_config().max_retries as usize + 1
        );
        assert_eq!(ledger.submit_attempts(), 0);
        // Resolved but never handed to a submission, so it is reused
        assert_eq!(submitter.account_snapshot().await.next_nonce, Some(5));

        ledger.fail_next_estimates(0);
        submitter.submit(&entry_batch(), None).await.unwrap();
        assert_eq!(ledger.submitted()[0].nonce(), 5);
    }
}
