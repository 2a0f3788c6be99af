//! Oracle publisher client built on the transaction submitter

use crate::config::PublisherConfig;
use crate::error::{PublisherError, PublisherResult};
use crate::felt::{felt_to_u128, felt_to_u64, str_to_felt, Felt};
use crate::gateway::BlockTag;
use crate::tx::{SubmissionOutcome, TransactionSubmitter};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

const SUBMIT_ENTRY: &str = "submit_entry";
const SUBMIT_MANY_ENTRIES: &str = "submit_many_entries";
const UPDATE_PUBLISHER_ADDRESS: &str = "update_publisher_address";
const GET_DECIMALS: &str = "get_decimals";
const GET_VALUE: &str = "get_value";
const BALANCE_OF: &str = "balanceOf";

/// How the oracle combines entries from different publishers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMode {
    #[default]
    Median,
}

impl AggregationMode {
    pub fn as_felt(&self) -> Felt {
        match self {
            // "median" as a short string
            AggregationMode::Median => Felt::from(0x6d656469616eu64),
        }
    }
}

/// One oracle datum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub key: Felt,
    pub value: Felt,
    pub timestamp: u64,
    pub publisher: Felt,
}

impl Entry {
    /// Build an entry from a short-string key and publisher name
    pub fn new(key: &str, value: u128, timestamp: u64, publisher: &str) -> PublisherResult<Self> {
        Ok(Self {
            key: str_to_felt(key)?,
            value: Felt::from(value),
            timestamp,
            publisher: str_to_felt(publisher)?,
        })
    }
}

/// Entry as accepted by the HTTP API
#[derive(Debug, Clone, Deserialize)]
pub struct EntryRequest {
    pub key: String,
    pub value: u128,
    pub timestamp: u64,
    /// Defaults to the configured publisher name
    #[serde(default)]
    pub publisher: Option<String>,
}

pub fn serialize_entry(entry: &Entry) -> Vec<Felt> {
    vec![
        entry.key,
        entry.value,
        Felt::from(entry.timestamp),
        entry.publisher,
    ]
}

/// `[len, entry_0..., entry_1..., ...]`
pub fn serialize_entries(entries: &[Entry]) -> Vec<Felt> {
    let mut felts = Vec::with_capacity(1 + entries.len() * 4);
    felts.push(Felt::from(entries.len()));
    for entry in entries {
        felts.extend(serialize_entry(entry));
    }
    felts
}

/// Lowercase `"base/quote"` oracle key
pub fn currency_pair_to_key(base: &str, quote: &str) -> String {
    format!("{}/{}", base, quote).to_lowercase()
}

/// Publishes entries to the oracle controller and manages the publisher record
pub struct PublisherClient {
    submitter: Arc<TransactionSubmitter>,
    config: PublisherConfig,
}

impl PublisherClient {
    pub fn new(submitter: Arc<TransactionSubmitter>, config: PublisherConfig) -> Self {
        Self { submitter, config }
    }

    pub fn publisher_name(&self) -> &str {
        &self.config.publisher_name
    }

    pub fn submitter(&self) -> &TransactionSubmitter {
        &self.submitter
    }

    /// Convert API requests into entries signed off by this publisher by default
    pub fn entries_from_requests(
        &self,
        requests: &[EntryRequest],
    ) -> PublisherResult<Vec<Entry>> {
        requests
            .iter()
            .map(|request| {
                let publisher = request
                    .publisher
                    .as_deref()
                    .unwrap_or(&self.config.publisher_name);
                Entry::new(&request.key, request.value, request.timestamp, publisher)
            })
            .collect()
    }

    pub async fn publish(&self, entry: &Entry) -> PublisherResult<SubmissionOutcome> {
        let outcome = self
            .submitter
            .submit_call(
                self.config.oracle_controller_address,
                SUBMIT_ENTRY,
                serialize_entry(entry),
                None,
            )
            .await?;

        if let Some(handle) = outcome.handle() {
            info!("Updated entry with transaction {}", handle);
        }
        Ok(outcome)
    }

    pub async fn publish_many(&self, entries: &[Entry]) -> PublisherResult<SubmissionOutcome> {
        if entries.is_empty() {
            info!("Skipping publishing as entries array is empty");
            return Ok(SubmissionOutcome::Empty);
        }

        let outcome = self
            .submitter
            .submit_call(
                self.config.oracle_controller_address,
                SUBMIT_MANY_ENTRIES,
                serialize_entries(entries),
                None,
            )
            .await?;

        if let Some(handle) = outcome.handle() {
            info!(
                "Sent {} updated entries with transaction {}",
                entries.len(),
                handle
            );
        }
        Ok(outcome)
    }

    pub async fn update_publisher_address(
        &self,
        new_address: Felt,
    ) -> PublisherResult<SubmissionOutcome> {
        let outcome = self
            .submitter
            .submit_call(
                self.config.publisher_registry_address,
                UPDATE_PUBLISHER_ADDRESS,
                vec![new_address],
                None,
            )
            .await?;

        if let Some(handle) = outcome.handle() {
            info!("Updated publisher address with transaction {}", handle);
        }
        Ok(outcome)
    }

    pub async fn get_decimals(&self, key: &str) -> PublisherResult<u64> {
        let result = self
            .submitter
            .gateway()
            .read(
                self.config.oracle_controller_address,
                GET_DECIMALS,
                &[str_to_felt(key)?],
                BlockTag::Confirmed,
            )
            .await?;

        let decimals = result.first().copied().ok_or_else(|| {
            PublisherError::Gateway(format!("{} returned no value", GET_DECIMALS))
        })?;
        felt_to_u64(decimals)
    }

    /// Aggregated value for `key` and its last update timestamp
    pub async fn get_value(
        &self,
        key: &str,
        aggregation_mode: AggregationMode,
    ) -> PublisherResult<(Felt, u64)> {
        let result = self
            .submitter
            .gateway()
            .read(
                self.config.oracle_controller_address,
                GET_VALUE,
                &[str_to_felt(key)?, aggregation_mode.as_felt()],
                BlockTag::Confirmed,
            )
            .await?;

        match result.as_slice() {
            [value, timestamp, ..] => Ok((*value, felt_to_u64(*timestamp)?)),
            _ => Err(PublisherError::Gateway(format!(
                "{} returned {} values, expected 2",
                GET_VALUE,
                result.len()
            ))),
        }
    }

    /// Fee token balance of the publishing account on confirmed state.
    ///
    /// The token returns a `Uint256` as `(low, high)` 128-bit limbs; a balance
    /// that does not fit in `u128` is reported as an encoding error.
    pub async fn get_fee_token_balance(&self) -> PublisherResult<u128> {
        let account = self.submitter.account_address();
        let result = self
            .submitter
            .gateway()
            .read(
                self.config.fee_token_address,
                BALANCE_OF,
                &[account],
                BlockTag::Confirmed,
            )
            .await?;

        let (low, high) = match result.as_slice() {
            [low, high, ..] => (felt_to_u128(*low)?, felt_to_u128(*high)?),
            _ => {
                return Err(PublisherError::Gateway(format!(
                    "{} returned {} values, expected 2",
                    BALANCE_OF,
                    result.len()
                )))
            }
        };

        if high != 0 {
            return Err(PublisherError::Encoding(format!(
                "balance of {:#x} exceeds u128 (high limb {:#x})",
                account, high
            )));
        }
        Ok(low)
    }
}
