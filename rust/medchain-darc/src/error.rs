use medchain_common::MedchainEncodingError;
use thiserror::Error;

/// Errors raised by rule parsing, evaluation and evolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MedchainDarcError {
    /// An expression did not parse
    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    /// An action string did not have the `<verb>:<target>` shape
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// A project, action or DARC is not known
    #[error("Not found: {0}")]
    NotFound(String),

    /// The signers do not satisfy the governing rule
    #[error("Denied: {0}")]
    Denied(String),

    /// The proposed version is not a valid successor of the current one
    #[error("Invalid evolution: {0}")]
    InvalidEvolution(String),

    /// Delegation through `darc:` identities went too deep
    #[error("Delegation depth exceeded {0}")]
    DelegationTooDeep(usize),

    /// Canonical encoding failed
    #[error("Encoding failed: {0}")]
    Encoding(String),
}

impl From<MedchainEncodingError> for MedchainDarcError {
    fn from(value: MedchainEncodingError) -> Self {
        MedchainDarcError::Encoding(format!("{value}"))
    }
}
