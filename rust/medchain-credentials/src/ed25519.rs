//! Ed25519 keys behind `ed25519:` identities.

mod signer;
mod verifier;

pub use signer::Ed25519Signer;
pub use verifier::Ed25519Verifier;

/// Length in bytes of an Ed25519 signature.
pub const SIGNATURE_LENGTH: usize = ed25519_dalek::SIGNATURE_LENGTH;
