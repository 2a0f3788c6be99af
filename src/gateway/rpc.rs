//! JSON-RPC ledger gateway with multi-endpoint support and automatic failover

use super::{BlockTag, LedgerGateway, TxHandle, TxStatus};
use crate::config::GatewayConfig;
use crate::error::{PublisherError, PublisherResult};
use crate::felt::{felt_to_u128, parse_felt, selector_from_name, Felt};
use crate::tx::SignedTransaction;

use async_trait::async_trait;
use starknet::core::types::{
    BlockId, BlockTag as RpcBlockTag, BroadcastedInvokeTransaction,
    BroadcastedInvokeTransactionV1, BroadcastedTransaction, FunctionCall,
    SimulationFlagForEstimateFee, StarknetError, TransactionExecutionStatus,
    TransactionStatus,
};
use starknet::providers::jsonrpc::{HttpTransport, JsonRpcClient};
use starknet::providers::{Provider, ProviderError, Url};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, warn};

type RpcClient = JsonRpcClient<HttpTransport>;

/// Failure of a single JSON-RPC request
#[derive(Debug)]
enum RpcFailure {
    /// Transport failure or timeout on every endpoint
    Unavailable(PublisherError),
    /// The node answered with a Starknet error
    Rejected(StarknetError),
}

/// Ledger gateway over HTTP JSON-RPC with failover between endpoints
pub struct RpcGateway {
    /// JSON-RPC clients (multiple for failover)
    clients: Vec<Arc<RpcClient>>,
    /// Current active client index
    current_client: AtomicUsize,
    request_timeout: Duration,
}

impl RpcGateway {
    pub fn new(config: &GatewayConfig) -> PublisherResult<Self> {
        let mut clients = Vec::new();

        for url in &config.rpc_urls {
            match Url::parse(url) {
                Ok(parsed) => {
                    clients.push(Arc::new(JsonRpcClient::new(HttpTransport::new(parsed))));
                    debug!("Added JSON-RPC endpoint: {}", url);
                }
                Err(e) => {
                    warn!("Failed to create client for {}: {}", url, e);
                }
            }
        }

        if clients.is_empty() {
            return Err(PublisherError::Config("No valid RPC endpoints".to_string()));
        }

        Ok(Self {
            clients,
            current_client: AtomicUsize::new(0),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        })
    }

    /// Get the active client
    fn client(&self) -> Arc<RpcClient> {
        let idx = self.current_client.load(Ordering::Relaxed);
        self.clients[idx % self.clients.len()].clone()
    }

    /// Switch to next available endpoint
    fn failover(&self) {
        let current = self.current_client.load(Ordering::Relaxed);
        let next = (current + 1) % self.clients.len();
        self.current_client.store(next, Ordering::Relaxed);
        warn!("RPC failover to endpoint {}", next);
    }

    /// Run one request, failing over between endpoints on transport errors
    async fn request<T, F, Fut>(&self, method: &str, call: F) -> Result<T, RpcFailure>
    where
        F: Fn(Arc<RpcClient>) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut last_error = None;

        for _ in 0..self.clients.len() {
            match timeout(self.request_timeout, call(self.client())).await {
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(ProviderError::StarknetError(e))) => return Err(RpcFailure::Rejected(e)),
                Ok(Err(e)) => {
                    warn!("{} failed: {}", method, e);
                    last_error = Some(PublisherError::TransientNetwork {
                        operation: method.to_string(),
                        message: e.to_string(),
                    });
                }
                Err(_) => {
                    warn!("{} timed out after {:?}", method, self.request_timeout);
                    last_error = Some(PublisherError::Timeout {
                        operation: method.to_string(),
                    });
                }
            }

            self.failover();
        }

        Err(RpcFailure::Unavailable(last_error.unwrap_or_else(|| {
            PublisherError::TransientNetwork {
                operation: method.to_string(),
                message: "All endpoints failed".to_string(),
            }
        })))
    }

    /// Health check
    pub async fn health_check(&self) -> bool {
        match self
            .request("starknet_blockNumber", |client| async move {
                client.block_number().await
            })
            .await
        {
            Ok(_) => true,
            Err(e) => {
                error!("Gateway health check failed: {:?}", e);
                false
            }
        }
    }
}

#[async_trait]
impl LedgerGateway for RpcGateway {
    async fn read(
        &self,
        contract: Felt,
        entrypoint: &str,
        args: &[Felt],
        at: BlockTag,
    ) -> PublisherResult<Vec<Felt>> {
        let request = FunctionCall {
            contract_address: contract,
            entry_point_selector: selector_from_name(entrypoint)?,
            calldata: args.to_vec(),
        };

        self.request("starknet_call", |client| {
            let request = request.clone();
            async move { client.call(request, block_id(at)).await }
        })
        .await
        .map_err(|failure| into_error("starknet_call", failure))
    }

    async fn estimate_fee(&self, transaction: &SignedTransaction) -> PublisherResult<u128> {
        let invoke = invoke_transaction(transaction);

        let estimates = self
            .request("starknet_estimateFee", |client| {
                let request = vec![BroadcastedTransaction::Invoke(invoke.clone())];
                async move {
                    client
                        .estimate_fee(
                            request,
                            Vec::<SimulationFlagForEstimateFee>::new(),
                            block_id(BlockTag::Confirmed),
                        )
                        .await
                }
            })
            .await
            .map_err(|failure| match failure {
                RpcFailure::Rejected(
                    e @ (StarknetError::ContractError(_)
                    | StarknetError::TransactionExecutionError(_)),
                ) => PublisherError::InvalidTransaction(format!("{:?}", e)),
                failure => into_error("starknet_estimateFee", failure),
            })?;

        let estimate = estimates.first().ok_or_else(|| {
            PublisherError::Gateway("starknet_estimateFee returned no estimate".to_string())
        })?;

        felt_to_u128(estimate.overall_fee)
    }

    async fn submit(&self, transaction: &SignedTransaction) -> PublisherResult<TxHandle> {
        let invoke = invoke_transaction(transaction);

        let result = self
            .request("starknet_addInvokeTransaction", |client| {
                let invoke = invoke.clone();
                async move { client.add_invoke_transaction(invoke).await }
            })
            .await
            .map_err(|failure| submit_error(transaction.nonce(), failure))?;

        Ok(TxHandle::new(format!("{:#x}", result.transaction_hash)))
    }

    async fn poll_status(&self, handle: &TxHandle) -> PublisherResult<TxStatus> {
        let hash = parse_felt(handle.as_str())?;

        match self
            .request("starknet_getTransactionStatus", |client| async move {
                client.get_transaction_status(hash).await
            })
            .await
        {
            Ok(status) => Ok(parse_status(&status)),
            Err(RpcFailure::Rejected(StarknetError::TransactionHashNotFound)) => {
                Ok(TxStatus::NotReceived)
            }
            Err(failure) => Err(into_error("starknet_getTransactionStatus", failure)),
        }
    }
}

fn block_id(at: BlockTag) -> BlockId {
    match at {
        BlockTag::Confirmed => BlockId::Tag(RpcBlockTag::Latest),
        BlockTag::Pending => BlockId::Tag(RpcBlockTag::Pending),
    }
}

fn invoke_transaction(transaction: &SignedTransaction) -> BroadcastedInvokeTransaction {
    let tx = transaction.transaction();
    BroadcastedInvokeTransaction::V1(BroadcastedInvokeTransactionV1 {
        sender_address: tx.sender(),
        calldata: tx.calldata().to_vec(),
        max_fee: Felt::from(tx.max_fee()),
        signature: transaction.signature().to_vec(),
        nonce: Felt::from(tx.nonce()),
        is_query: false,
    })
}

fn parse_status(status: &TransactionStatus) -> TxStatus {
    match status {
        TransactionStatus::Received => TxStatus::Received,
        TransactionStatus::Rejected => TxStatus::Rejected {
            reason: "rejected by sequencer".to_string(),
        },
        TransactionStatus::AcceptedOnL2(TransactionExecutionStatus::Reverted)
        | TransactionStatus::AcceptedOnL1(TransactionExecutionStatus::Reverted) => {
            TxStatus::Reverted {
                reason: "execution reverted".to_string(),
            }
        }
        TransactionStatus::AcceptedOnL2(_) => TxStatus::AcceptedOnL2,
        TransactionStatus::AcceptedOnL1(_) => TxStatus::AcceptedOnL1,
    }
}

fn submit_error(nonce: u64, failure: RpcFailure) -> PublisherError {
    match failure {
        RpcFailure::Rejected(StarknetError::InvalidTransactionNonce) => {
            PublisherError::StaleNonce {
                nonce,
                message: "Invalid transaction nonce".to_string(),
            }
        }
        failure => into_error("starknet_addInvokeTransaction", failure),
    }
}

fn into_error(method: &str, failure: RpcFailure) -> PublisherError {
    match failure {
        RpcFailure::Unavailable(e) => e,
        RpcFailure::Rejected(e) => {
            PublisherError::Gateway(format!("{} rejected: {:?}", method, e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::skeleton;

    #[test]
    fn test_parse_status() {
        assert_eq!(
            parse_status(&TransactionStatus::Received),
            TxStatus::Received
        );
        assert_eq!(
            parse_status(&TransactionStatus::AcceptedOnL2(
                TransactionExecutionStatus::Succeeded
            )),
            TxStatus::AcceptedOnL2
        );
        assert!(matches!(
            parse_status(&TransactionStatus::AcceptedOnL2(
                TransactionExecutionStatus::Reverted
            )),
            TxStatus::Reverted { .. }
        ));
        assert!(matches!(
            parse_status(&TransactionStatus::Rejected),
            TxStatus::Rejected { .. }
        ));
    }

    #[test]
    fn test_invoke_transaction_carries_signed_fields() {
        let tx = skeleton(3);

        match invoke_transaction(&tx) {
            BroadcastedInvokeTransaction::V1(invoke) => {
                assert_eq!(invoke.sender_address, Felt::from(0xacc0u64));
                assert_eq!(invoke.nonce, Felt::from(3u64));
                assert_eq!(invoke.max_fee, Felt::ZERO);
                assert_eq!(invoke.signature, tx.signature().to_vec());
                assert_eq!(invoke.signature.len(), 2);
                assert_eq!(invoke.calldata, tx.transaction().calldata().to_vec());
                assert!(!invoke.is_query);
            }
            other => panic!("expected a v1 invoke, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_nonce_maps_to_stale_nonce() {
        let err = submit_error(
            6,
            RpcFailure::Rejected(StarknetError::InvalidTransactionNonce),
        );
        assert!(matches!(err, PublisherError::StaleNonce { nonce: 6, .. }));
        assert!(err.invalidates_nonce());
    }

    #[test]
    fn test_other_rejections_map_to_gateway_error() {
        let err = into_error(
            "starknet_call",
            RpcFailure::Rejected(StarknetError::ContractNotFound),
        );
        assert!(matches!(err, PublisherError::Gateway(_)));
        assert!(!err.is_retryable());
        assert!(!err.invalidates_nonce());
    }

    #[test]
    fn test_block_tags() {
        assert!(matches!(
            block_id(BlockTag::Confirmed),
            BlockId::Tag(RpcBlockTag::Latest)
        ));
        assert!(matches!(
            block_id(BlockTag::Pending),
            BlockId::Tag(RpcBlockTag::Pending)
        ));
    }

    #[test]
    fn test_new_requires_a_valid_url() {
        let config = GatewayConfig {
            rpc_urls: vec!["not a url".to_string()],
            request_timeout_secs: 5,
        };
        assert!(matches!(
            RpcGateway::new(&config),
            Err(PublisherError::Config(_))
        ));
    }
}
