use std::{array::TryFromSliceError, fmt};

use base58::{FromBase58, ToBase58};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The size of a BLAKE3 hash in bytes.
pub const BLAKE3_HASH_SIZE: usize = 32;

/// A BLAKE3 cryptographic hash.
///
/// Every identifier in the ledger (instances, DARC versions, blocks,
/// instruction digests) is one of these. It serializes as a CBOR byte string
/// and displays as base58.
///
/// ```rust
/// use medchain_common::Blake3Hash;
///
/// let hash = Blake3Hash::hash(b"hello world");
/// let parsed: Blake3Hash = hash.to_string().parse().unwrap();
/// assert_eq!(hash, parsed);
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Blake3Hash([u8; BLAKE3_HASH_SIZE]);

impl Blake3Hash {
    /// Computes the BLAKE3 hash of the given bytes.
    pub fn hash(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).into())
    }

    /// Computes the BLAKE3 hash over a sequence of chunks, as if they were
    /// concatenated.
    pub fn hash_iter<'a, I>(bytes: I) -> Self
    where
        I: Iterator<Item = &'a [u8]>,
    {
        let mut hasher = blake3::Hasher::new();
        for chunk in bytes {
            hasher.update(chunk);
        }
        Self(hasher.finalize().into())
    }

    /// Raw digest bytes.
    pub fn bytes(&self) -> &[u8; BLAKE3_HASH_SIZE] {
        &self.0
    }

    /// True for the all-zero hash.
    pub fn is_null(&self) -> bool {
        self.0 == [0u8; BLAKE3_HASH_SIZE]
    }
}

impl From<[u8; BLAKE3_HASH_SIZE]> for Blake3Hash {
    fn from(value: [u8; BLAKE3_HASH_SIZE]) -> Self {
        Blake3Hash(value)
    }
}

impl TryFrom<&[u8]> for Blake3Hash {
    type Error = TryFromSliceError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Ok(Blake3Hash(value.try_into()?))
    }
}

impl AsRef<[u8]> for Blake3Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Blake3Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_base58())
    }
}

impl fmt::Debug for Blake3Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", &self.0[..6].to_base58())
    }
}

/// Error produced when a base58 string does not decode to a 32-byte hash.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Invalid hash encoding: {0}")]
pub struct InvalidHash(pub String);

impl std::str::FromStr for Blake3Hash {
    type Err = InvalidHash;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let bytes = value
            .from_base58()
            .map_err(|_| InvalidHash(value.to_string()))?;
        Blake3Hash::try_from(bytes.as_slice()).map_err(|_| InvalidHash(value.to_string()))
    }
}

impl Serialize for Blake3Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Blake3Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = serde_bytes::ByteBuf::deserialize(deserializer)?;
        Blake3Hash::try_from(bytes.as_slice()).map_err(|_| {
            serde::de::Error::invalid_length(bytes.len(), &"a 32 byte BLAKE3 digest")
        })
    }
}

/// The all-zero hash, used as the "no previous" marker.
pub const NULL_BLAKE3_HASH: Blake3Hash = Blake3Hash([0u8; BLAKE3_HASH_SIZE]);
