//! Signing collaborator

use crate::error::{PublisherError, PublisherResult};
use crate::felt::{parse_felt, Felt};

use starknet::signers::SigningKey;
use tracing::debug;

/// Signs transaction hashes with a secret held in memory
pub trait TransactionSigner: Send + Sync {
    /// Signature as the `[r, s]` felt pair the account contract verifies
    fn sign(&self, hash: Felt) -> PublisherResult<Vec<Felt>>;
}

impl TransactionSigner for SigningKey {
    fn sign(&self, hash: Felt) -> PublisherResult<Vec<Felt>> {
        let signature = SigningKey::sign(self, &hash)
            .map_err(|e| PublisherError::Signing(e.to_string()))?;
        Ok(vec![signature.r, signature.s])
    }
}

/// Load the account's STARK key from the environment variable named `env_var`
pub fn load_signing_key(env_var: &str) -> PublisherResult<SigningKey> {
    let key = std::env::var(env_var).map_err(|_| {
        PublisherError::Signing(format!(
            "No signing key configured. Set {} to the account private key",
            env_var
        ))
    })?;

    let key = key.trim();
    let secret = if key.starts_with("0x") {
        parse_felt(key)
    } else {
        parse_felt(&format!("0x{}", key))
    }
    .map_err(|e| PublisherError::Signing(format!("Invalid private key: {}", e)))?;

    if secret == Felt::ZERO {
        return Err(PublisherError::Signing("Private key is zero".to_string()));
    }

    let signing_key = SigningKey::from_secret_scalar(secret);
    debug!(
        "Loaded signing key with public key {:#x}",
        signing_key.verifying_key().scalar()
    );
    Ok(signing_key)
}

#[cfg(test)]
pub(crate) fn test_signing_key() -> SigningKey {
    SigningKey::from_secret_scalar(
        parse_felt("0x0139fe4d6f02e666e86a6f58e65060f115cd3c185bd9e98bd829636931458f79").unwrap(),
    )
}
