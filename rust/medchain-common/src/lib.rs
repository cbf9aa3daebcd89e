#![warn(missing_docs)]

//! This crate constitutes a library of light weight helpers that are shared
//! across the other medchain crates: the BLAKE3 hash type used for every
//! identifier, and the canonical CBOR encoding that signatures and hashes are
//! computed over.

mod hash;
pub use hash::*;

mod encoding;
pub use encoding::*;
