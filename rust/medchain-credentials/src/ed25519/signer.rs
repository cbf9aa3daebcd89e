use std::fmt;

use crate::{Authority, Ed25519Verifier, Identity, MedchainCredentialsError, Principal};

/// Ed25519 signing key paired with its verifier.
#[derive(Clone)]
pub struct Ed25519Signer {
    key: ed25519_dalek::SigningKey,
    verifier: Ed25519Verifier,
}

impl Ed25519Signer {
    /// Generate a fresh key from the operating system's RNG.
    pub fn generate() -> Result<Self, MedchainCredentialsError> {
        let mut seed = [0u8; 32];
        getrandom::getrandom(&mut seed)
            .map_err(|error| MedchainCredentialsError::SigningFailed(error.to_string()))?;
        Ok(Self::from_seed(seed))
    }

    /// Deterministic key from a 32 byte seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let key = ed25519_dalek::SigningKey::from_bytes(&seed);
        let verifier = Ed25519Verifier::from(key.verifying_key());
        Self { key, verifier }
    }

    /// Import raw seed bytes.
    pub fn import(seed: &[u8]) -> Result<Self, MedchainCredentialsError> {
        let seed: [u8; 32] = seed
            .try_into()
            .map_err(|_| MedchainCredentialsError::InvalidKey(format!("{} bytes", seed.len())))?;
        Ok(Self::from_seed(seed))
    }

    /// Export raw seed bytes.
    pub fn export(&self) -> [u8; 32] {
        self.key.to_bytes()
    }

    /// The public half.
    pub fn verifier(&self) -> &Ed25519Verifier {
        &self.verifier
    }
}

impl Principal for Ed25519Signer {
    fn identity(&self) -> Identity {
        self.verifier.identity()
    }
}

impl Authority for Ed25519Signer {
    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, MedchainCredentialsError> {
        use signature::Signer;

        let signature: ed25519_dalek::Signature = self
            .key
            .try_sign(payload)
            .map_err(|error| MedchainCredentialsError::SigningFailed(error.to_string()))?;
        Ok(signature.to_bytes().to_vec())
    }
}

impl fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("verifier", &self.verifier)
            .finish_non_exhaustive()
    }
}
