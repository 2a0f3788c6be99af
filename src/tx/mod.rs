//! Transaction submission: batching, nonce management, fee capping, signing

mod batch;
mod fee;
pub mod nonce;
mod prepared;
mod sender;
pub mod signer;

pub use batch::{Batch, Call, CallBatcher, CallDescriptor, EncodedBatch};
pub use fee::{FeeEstimator, FeeQuote, DEFAULT_FEE_SAFETY_MARGIN};
pub use nonce::{AccountStateCache, NonceLease, NonceSnapshot, ResolvedNonces};
pub use prepared::{PreparedTransaction, SignedTransaction};
pub use sender::{SubmissionOutcome, SubmissionStage, TrackedSubmission, TransactionSubmitter};
pub use signer::{load_signing_key, TransactionSigner};
