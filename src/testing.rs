//! In-memory ledger used by unit tests

use crate::config::SubmitterConfig;
use crate::error::{PublisherError, PublisherResult};
use crate::felt::Felt;
use crate::gateway::{BlockTag, LedgerGateway, TxHandle, TxStatus};
use crate::tx::nonce::GET_NONCE_ENTRYPOINT;
use crate::tx::signer::test_signing_key;
use crate::tx::{Batch, Call, CallBatcher, PreparedTransaction, SignedTransaction};

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy)]
pub enum SubmitFault {
    Transient,
    StaleNonce,
}

struct FakeState {
    confirmed: u64,
    pending: u64,
    nonce_reads: Vec<BlockTag>,
    read_failures: usize,
    fee: Result<u128, String>,
    estimate_failures: usize,
    estimate_attempts: usize,
    estimated: Vec<SignedTransaction>,
    submitted: Vec<SignedTransaction>,
    submit_attempts: usize,
    submit_fault: Option<(SubmitFault, usize)>,
    statuses: HashMap<TxHandle, VecDeque<TxStatus>>,
    views: HashMap<String, Vec<Felt>>,
    view_calls: Vec<(Felt, String, Vec<Felt>)>,
}

/// Scriptable ledger: nonces, fee quotes, submit faults and status sequences
pub struct FakeLedger {
    state: Mutex<FakeState>,
}

impl FakeLedger {
    pub fn new(confirmed: u64, pending: u64) -> Self {
        Self {
            state: Mutex::new(FakeState {
                confirmed,
                pending,
                nonce_reads: Vec::new(),
                read_failures: 0,
                fee: Ok(1000),
                estimate_failures: 0,
                estimate_attempts: 0,
                estimated: Vec::new(),
                submitted: Vec::new(),
                submit_attempts: 0,
                submit_fault: None,
                statuses: HashMap::new(),
                views: HashMap::new(),
                view_calls: Vec::new(),
            }),
        }
    }

    pub fn set_nonces(&self, confirmed: u64, pending: u64) {
        let mut state = self.state.lock().unwrap();
        state.confirmed = confirmed;
        state.pending = pending;
    }

    pub fn fail_next_reads(&self, count: usize) {
        self.state.lock().unwrap().read_failures = count;
    }

    pub fn set_fee_estimate(&self, fee: u128) {
        self.state.lock().unwrap().fee = Ok(fee);
    }

    pub fn set_fee_revert(&self, reason: &str) {
        self.state.lock().unwrap().fee = Err(reason.to_string());
    }

    /// The next `count` estimates fail as transient network faults
    pub fn fail_next_estimates(&self, count: usize) {
        self.state.lock().unwrap().estimate_failures = count;
    }

    pub fn fail_next_submits(&self, fault: SubmitFault, count: usize) {
        self.state.lock().unwrap().submit_fault = Some((fault, count));
    }

    pub fn push_status(&self, handle: &TxHandle, status: TxStatus) {
        self.state
            .lock()
            .unwrap()
            .statuses
            .entry(handle.clone())
            .or_default()
            .push_back(status);
    }

    pub fn set_view(&self, entrypoint: &str, result: Vec<Felt>) {
        self.state
            .lock()
            .unwrap()
            .views
            .insert(entrypoint.to_string(), result);
    }

    pub fn nonce_reads(&self) -> Vec<BlockTag> {
        self.state.lock().unwrap().nonce_reads.clone()
    }

    pub fn estimated(&self) -> Vec<SignedTransaction> {
        self.state.lock().unwrap().estimated.clone()
    }

    pub fn submitted(&self) -> Vec<SignedTransaction> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn estimate_attempts(&self) -> usize {
        self.state.lock().unwrap().estimate_attempts
    }

    pub fn submit_attempts(&self) -> usize {
        self.state.lock().unwrap().submit_attempts
    }

    pub fn view_calls(&self) -> Vec<(Felt, String, Vec<Felt>)> {
        self.state.lock().unwrap().view_calls.clone()
    }
}

#[async_trait]
impl LedgerGateway for FakeLedger {
    async fn read(
        &self,
        contract: Felt,
        entrypoint: &str,
        args: &[Felt],
        at: BlockTag,
    ) -> PublisherResult<Vec<Felt>> {
        let mut state = self.state.lock().unwrap();

        if state.read_failures > 0 {
            state.read_failures -= 1;
            return Err(PublisherError::TransientNetwork {
                operation: "starknet_call".to_string(),
                message: "connection refused".to_string(),
            });
        }

        if entrypoint == GET_NONCE_ENTRYPOINT {
            state.nonce_reads.push(at);
            let nonce = match at {
                BlockTag::Confirmed => state.confirmed,
                BlockTag::Pending => state.pending,
            };
            return Ok(vec![Felt::from(nonce)]);
        }

        state
            .view_calls
            .push((contract, entrypoint.to_string(), args.to_vec()));
        state
            .views
            .get(entrypoint)
            .cloned()
            .ok_or_else(|| PublisherError::Gateway(format!("no view scripted for {}", entrypoint)))
    }

    async fn estimate_fee(&self, transaction: &SignedTransaction) -> PublisherResult<u128> {
        let mut state = self.state.lock().unwrap();
        state.estimate_attempts += 1;

        if state.estimate_failures > 0 {
            state.estimate_failures -= 1;
            return Err(PublisherError::TransientNetwork {
                operation: "starknet_estimateFee".to_string(),
                message: "connection reset".to_string(),
            });
        }

        state.estimated.push(transaction.clone());
        state
            .fee
            .clone()
            .map_err(PublisherError::InvalidTransaction)
    }

    async fn submit(&self, transaction: &SignedTransaction) -> PublisherResult<TxHandle> {
        let mut state = self.state.lock().unwrap();
        state.submit_attempts += 1;

        if let Some((fault, remaining)) = state.submit_fault.as_mut() {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(match fault {
                    SubmitFault::Transient => PublisherError::TransientNetwork {
                        operation: "starknet_addInvokeTransaction".to_string(),
                        message: "request timed out".to_string(),
                    },
                    SubmitFault::StaleNonce => PublisherError::StaleNonce {
                        nonce: transaction.nonce(),
                        message: "Invalid transaction nonce".to_string(),
                    },
                });
            }
        }

        state.submitted.push(transaction.clone());
        Ok(TxHandle::new(format!("{:#x}", transaction.hash())))
    }

    async fn poll_status(&self, handle: &TxHandle) -> PublisherResult<TxStatus> {
        let mut state = self.state.lock().unwrap();
        Ok(state
            .statuses
            .get_mut(handle)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(TxStatus::Received))
    }
}

pub fn test_config() -> SubmitterConfig {
    SubmitterConfig {
        network: "testnet".to_string(),
        chain_id: "SN_GOERLI".to_string(),
        account_address: Felt::from(0xacc0u64),
        max_retries: 2,
        retry_delay_ms: 1,
        fee_safety_margin: 1.1,
        max_fee_ceiling: None,
        confirmation_timeout_secs: 5,
        poll_interval_ms: 5,
    }
}

/// Zero-fee signed transaction at `nonce`
pub fn skeleton(nonce: u64) -> SignedTransaction {
    let batch = Batch::new().with_call(Call::new(Felt::from(0xc0ffeeu64), "submit_entry", vec![]));
    PreparedTransaction::new(
        Felt::from(0xacc0u64),
        &CallBatcher.encode(&batch).unwrap(),
        nonce,
        0,
        Felt::ZERO,
    )
    .sign(&test_signing_key())
    .unwrap()
}
