use thiserror::Error;

/// Errors produced while parsing identities, handling keys or checking
/// signatures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MedchainCredentialsError {
    /// The identity string is not `<scheme>:<value>` with a known scheme.
    #[error("Invalid identity '{0}'")]
    InvalidIdentity(String),

    /// The identity cannot sign or verify (for example a `darc:` identity).
    #[error("Identity '{0}' has no verification key")]
    NotVerifiable(String),

    /// Key material had the wrong shape.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// The signing key is not available or cannot be used.
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// Signature did not verify against the message.
    #[error("Invalid signature from '{0}'")]
    InvalidSignature(String),
}
