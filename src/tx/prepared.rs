//! Prepared and signed invoke transactions

use super::batch::EncodedBatch;
use super::signer::TransactionSigner;
use crate::error::PublisherResult;
use crate::felt::Felt;

use starknet::core::crypto::compute_hash_on_elements;

/// "invoke" as a short string
const PREFIX_INVOKE: u64 = 0x696e766f6b65;

/// Invoke transactions carrying a `max_fee` are version 1
const INVOKE_VERSION: u64 = 1;

/// A batch bound to one nonce and one fee cap.
///
/// Signing consumes the value, so a prepared transaction is used at most once.
/// A different nonce or fee means building a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedTransaction {
    sender: Felt,
    calldata: Vec<Felt>,
    nonce: u64,
    max_fee: u128,
    chain_id: Felt,
    hash: Felt,
}

impl PreparedTransaction {
    pub fn new(
        sender: Felt,
        batch: &EncodedBatch,
        nonce: u64,
        max_fee: u128,
        chain_id: Felt,
    ) -> Self {
        let calldata = batch.execute_calldata(nonce);
        let hash = compute_hash(sender, &calldata, nonce, max_fee, chain_id);

        Self {
            sender,
            calldata,
            nonce,
            max_fee,
            chain_id,
            hash,
        }
    }

    pub fn sender(&self) -> Felt {
        self.sender
    }

    pub fn calldata(&self) -> &[Felt] {
        &self.calldata
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn max_fee(&self) -> u128 {
        self.max_fee
    }

    pub fn chain_id(&self) -> Felt {
        self.chain_id
    }

    pub fn hash(&self) -> Felt {
        self.hash
    }

    pub fn sign(self, signer: &dyn TransactionSigner) -> PublisherResult<SignedTransaction> {
        let signature = signer.sign(self.hash)?;
        Ok(SignedTransaction {
            transaction: self,
            signature,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    transaction: PreparedTransaction,
    signature: Vec<Felt>,
}

impl SignedTransaction {
    pub fn transaction(&self) -> &PreparedTransaction {
        &self.transaction
    }

    pub fn signature(&self) -> &[Felt] {
        &self.signature
    }

    pub fn nonce(&self) -> u64 {
        self.transaction.nonce
    }

    pub fn hash(&self) -> Felt {
        self.transaction.hash
    }
}

/// Pedersen hash chain over the v1 invoke fields
fn compute_hash(
    sender: Felt,
    calldata: &[Felt],
    nonce: u64,
    max_fee: u128,
    chain_id: Felt,
) -> Felt {
    compute_hash_on_elements(&[
        Felt::from(PREFIX_INVOKE),
        Felt::from(INVOKE_VERSION),
        sender,
        Felt::ZERO,
        compute_hash_on_elements(calldata),
        Felt::from(max_fee),
        chain_id,
        Felt::from(nonce),
    ])
}
