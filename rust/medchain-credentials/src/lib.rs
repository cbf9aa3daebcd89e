//! Signer identities and concrete signing keys.
//!
//! An [`Identity`] is the string form that access-control expressions are
//! written over (`ed25519:<base58 public key>` or `darc:<base58 id>`). The
//! [`Ed25519Signer`] / [`Ed25519Verifier`] pair produces and checks the
//! signatures that bind an identity to a transaction or a deferred
//! instruction. The signature primitive itself is `ed25519-dalek`.

mod error;
pub use error::*;

mod identity;
pub use identity::*;

mod authority;
pub use authority::*;

pub mod ed25519;
pub use ed25519::{Ed25519Signer, Ed25519Verifier};
