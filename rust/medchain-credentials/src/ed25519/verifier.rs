use std::{fmt, str::FromStr};

use base58::{FromBase58, ToBase58};

use crate::{ED25519_SCHEME, Identity, MedchainCredentialsError, Principal};

/// Ed25519 public key that checks signatures for one identity.
///
/// Displays as `ed25519:<base58 public key>`, which is also the textual form
/// of the matching [`Identity`].
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Ed25519Verifier(ed25519_dalek::VerifyingKey);

impl Ed25519Verifier {
    /// Raw public key bytes.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Verify `signature` over `message`.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), MedchainCredentialsError> {
        use signature::Verifier;

        let signature = ed25519_dalek::Signature::from_slice(signature)
            .map_err(|error| MedchainCredentialsError::InvalidKey(error.to_string()))?;
        self.0
            .verify(message, &signature)
            .map_err(|_| MedchainCredentialsError::InvalidSignature(self.to_string()))
    }
}

impl From<ed25519_dalek::VerifyingKey> for Ed25519Verifier {
    fn from(key: ed25519_dalek::VerifyingKey) -> Self {
        Self(key)
    }
}

impl TryFrom<&[u8]> for Ed25519Verifier {
    type Error = MedchainCredentialsError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| MedchainCredentialsError::InvalidKey(format!("{} bytes", bytes.len())))?;
        ed25519_dalek::VerifyingKey::from_bytes(&bytes)
            .map(Self)
            .map_err(|error| MedchainCredentialsError::InvalidKey(error.to_string()))
    }
}

impl Principal for Ed25519Verifier {
    fn identity(&self) -> Identity {
        Identity::ed25519(self)
    }
}

impl fmt::Display for Ed25519Verifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ED25519_SCHEME}:{}", self.0.as_bytes().to_base58())
    }
}

impl fmt::Debug for Ed25519Verifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Verifier({self})")
    }
}

impl FromStr for Ed25519Verifier {
    type Err = MedchainCredentialsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let body = value
            .strip_prefix(ED25519_SCHEME)
            .and_then(|rest| rest.strip_prefix(':'))
            .ok_or_else(|| MedchainCredentialsError::InvalidIdentity(value.to_string()))?;
        let bytes = body
            .from_base58()
            .map_err(|_| MedchainCredentialsError::InvalidIdentity(value.to_string()))?;
        Self::try_from(bytes.as_slice())
    }
}
