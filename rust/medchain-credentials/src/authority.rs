//! Principal and Authority traits for identity and signing.

use crate::{Identity, MedchainCredentialsError};

/// Something that has an [`Identity`].
pub trait Principal {
    /// The identity access rules refer to.
    fn identity(&self) -> Identity;
}

/// A principal that can sign payloads.
pub trait Authority: Principal + Send + Sync {
    /// Sign the given payload, returning the raw signature bytes.
    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, MedchainCredentialsError>;
}
