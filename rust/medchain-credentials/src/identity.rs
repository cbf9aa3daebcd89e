use std::{fmt, str::FromStr};

use base58::FromBase58;
use medchain_common::Blake3Hash;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Ed25519Verifier, MedchainCredentialsError};

/// Scheme prefix for identities backed by an Ed25519 public key.
pub const ED25519_SCHEME: &str = "ed25519";

/// Scheme prefix for identities that delegate to another DARC.
pub const DARC_SCHEME: &str = "darc";

/// A signer identity as it appears in access-control expressions.
///
/// The textual form is `<scheme>:<base58 value>`. Two schemes exist:
///
/// - `ed25519:<public key>` names a key that can produce signatures.
/// - `darc:<darc base id>` names another DARC whose `_sign` rule decides
///   whether a set of signers counts as that identity.
///
/// Identities compare and order by their textual form so they can be stored
/// in ordered sets and maps and encoded canonically.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identity(String);

impl Identity {
    /// The identity of an Ed25519 verifying key.
    pub fn ed25519(verifier: &Ed25519Verifier) -> Self {
        Identity(verifier.to_string())
    }

    /// An identity delegating to the DARC with the given base id.
    pub fn darc(base_id: &Blake3Hash) -> Self {
        Identity(format!("{DARC_SCHEME}:{base_id}"))
    }

    /// The scheme portion (`ed25519` or `darc`).
    pub fn scheme(&self) -> &str {
        self.0.split_once(':').map(|(scheme, _)| scheme).unwrap_or("")
    }

    /// True if this identity refers to another DARC.
    pub fn is_darc(&self) -> bool {
        self.scheme() == DARC_SCHEME
    }

    /// The DARC base id, for `darc:` identities.
    pub fn darc_id(&self) -> Option<Blake3Hash> {
        let (scheme, value) = self.0.split_once(':')?;
        if scheme != DARC_SCHEME {
            return None;
        }
        value.parse().ok()
    }

    /// The verifying key behind an `ed25519:` identity.
    pub fn verifier(&self) -> Result<Ed25519Verifier, MedchainCredentialsError> {
        if self.scheme() != ED25519_SCHEME {
            return Err(MedchainCredentialsError::NotVerifiable(self.0.clone()));
        }
        self.0.parse()
    }

    /// Check that `signature` over `message` was produced by this identity.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), MedchainCredentialsError> {
        self.verifier()?
            .verify(message, signature)
            .map_err(|_| MedchainCredentialsError::InvalidSignature(self.0.clone()))
    }

    /// The textual form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Identity {
    type Err = MedchainCredentialsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || MedchainCredentialsError::InvalidIdentity(value.to_string());
        let (scheme, body) = value.split_once(':').ok_or_else(invalid)?;
        let bytes = body.from_base58().map_err(|_| invalid())?;

        match scheme {
            ED25519_SCHEME | DARC_SCHEME if bytes.len() == 32 => Ok(Identity(value.to_string())),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self.0)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
