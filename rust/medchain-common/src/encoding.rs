//! Canonical encoding.
//!
//! Everything that is hashed or signed is first encoded as IPLD-compatible
//! DAG-CBOR, which gives a single byte representation per value.

use serde::{Serialize, de::DeserializeOwned};

use crate::Blake3Hash;

/// Errors raised while encoding or decoding canonical CBOR.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MedchainEncodingError {
    /// The value could not be encoded
    #[error("Failed to encode value: {0}")]
    EncodeFailed(String),

    /// The bytes could not be decoded into the requested type
    #[error("Failed to decode value: {0}")]
    DecodeFailed(String),
}

/// Encode a value as canonical DAG-CBOR.
pub fn to_cbor<T>(value: &T) -> Result<Vec<u8>, MedchainEncodingError>
where
    T: Serialize + ?Sized,
{
    serde_ipld_dagcbor::to_vec(value)
        .map_err(|error| MedchainEncodingError::EncodeFailed(format!("{error}")))
}

/// Decode a value from DAG-CBOR bytes.
pub fn from_cbor<T>(bytes: &[u8]) -> Result<T, MedchainEncodingError>
where
    T: DeserializeOwned,
{
    serde_ipld_dagcbor::from_slice::<T>(bytes)
        .map_err(|error| MedchainEncodingError::DecodeFailed(format!("{error}")))
}

/// Hash the canonical encoding of a value.
pub fn hash_cbor<T>(value: &T) -> Result<Blake3Hash, MedchainEncodingError>
where
    T: Serialize + ?Sized,
{
    Ok(Blake3Hash::hash(&to_cbor(value)?))
}
