//! Fee estimation and capping

use super::prepared::SignedTransaction;
use crate::error::{PublisherError, PublisherResult};
use crate::gateway::LedgerGateway;

use tracing::debug;

/// Estimated fee is multiplied by this to set `max_fee`
pub const DEFAULT_FEE_SAFETY_MARGIN: f64 = 1.1;

const BPS_DENOMINATOR: u128 = 10_000;

/// Estimate and the cap derived from it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeQuote {
    pub estimate: u128,
    pub max_fee: u128,
}

/// Fee estimator for invoke transactions
#[derive(Debug, Clone)]
pub struct FeeEstimator {
    /// Safety margin in basis points (11_000 = 1.1x)
    margin_bps: u128,
}

impl FeeEstimator {
    /// Create a fee estimator; `safety_margin` must be greater than 1
    pub fn new(safety_margin: f64) -> PublisherResult<Self> {
        if !safety_margin.is_finite() {
            return Err(PublisherError::Config(format!(
                "fee safety margin must be finite, got {}",
                safety_margin
            )));
        }

        let margin_bps = (safety_margin * BPS_DENOMINATOR as f64).round();
        if margin_bps <= BPS_DENOMINATOR as f64 {
            return Err(PublisherError::Config(format!(
                "fee safety margin must be greater than 1, got {}",
                safety_margin
            )));
        }

        Ok(Self {
            margin_bps: margin_bps as u128,
        })
    }

    /// `min(floor(estimate * margin), ceiling)`
    pub fn derive_cap(&self, estimate: u128, ceiling: Option<u128>) -> u128 {
        let derived = match estimate.checked_mul(self.margin_bps) {
            Some(scaled) => scaled / BPS_DENOMINATOR,
            None => (estimate / BPS_DENOMINATOR).saturating_mul(self.margin_bps),
        };

        match ceiling {
            Some(ceiling) => derived.min(ceiling),
            None => derived,
        }
    }

    /// Ask the gateway to evaluate a zero-fee skeleton and derive the fee cap.
    ///
    /// A revert comes back as `InvalidTransaction` and must not be retried.
    pub async fn estimate(
        &self,
        gateway: &dyn LedgerGateway,
        skeleton: &SignedTransaction,
        ceiling: Option<u128>,
    ) -> PublisherResult<FeeQuote> {
        let estimate = gateway.estimate_fee(skeleton).await?;
        let max_fee = self.derive_cap(estimate, ceiling);

        debug!(
            "Fee estimate {} -> max_fee {} (ceiling {:?}, nonce {})",
            estimate,
            max_fee,
            ceiling,
            skeleton.nonce()
        );
        crate::metrics::record_fee_quote(estimate, max_fee);

        Ok(FeeQuote { estimate, max_fee })
    }
}

impl Default for FeeEstimator {
    fn default() -> Self {
        Self {
            margin_bps: 11_000,
        }
    }
}
