//! Pontis publisher - oracle entry publishing over an account-abstraction ledger
//!
//! Batches contract calls into one signed transaction per submission, tracks
//! the account nonce across confirmed and pending state, caps fees from an
//! estimate, and recovers from ambiguous outcomes by re-deriving the nonce.

pub mod api;
pub mod config;
pub mod error;
pub mod felt;
pub mod gateway;
pub mod metrics;
pub mod publisher;
pub mod tx;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Settings;
pub use error::{PublisherError, PublisherResult};
pub use gateway::{ConfirmationLevel, LedgerGateway, RpcGateway, TxHandle, TxStatus};
pub use publisher::{Entry, PublisherClient};
pub use tx::{Batch, Call, SubmissionOutcome, TransactionSubmitter};
