use medchain_common::MedchainEncodingError;
use medchain_credentials::MedchainCredentialsError;
use medchain_darc::MedchainDarcError;
use thiserror::Error;

/// Errors surfaced by the ledger and by the contracts running on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MedchainLedgerError {
    /// Referenced instance, project, action, identity or proposal is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// An authorization or evolution check failed
    #[error("Denied: {0}")]
    Denied(String),

    /// A status change the query state machine does not allow
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// A stale signer counter or a lost race; retry with fresh state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A deferred proposal passed its expiry height
    #[error("Expired: {0}")]
    Expired(String),

    /// A deferred proposal is still missing signatures
    #[error("Not ready: {0}")]
    NotReady(String),

    /// A deferred proposal has already been executed
    #[error("Already executed: {0}")]
    AlreadyExecuted(String),

    /// A missing or malformed argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Canonical encoding failed
    #[error("Encoding failed: {0}")]
    Encoding(String),
}

impl MedchainLedgerError {
    /// Whether retrying with refreshed state may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MedchainLedgerError::Conflict(_))
    }
}

impl From<MedchainEncodingError> for MedchainLedgerError {
    fn from(value: MedchainEncodingError) -> Self {
        MedchainLedgerError::Encoding(format!("{value}"))
    }
}

impl From<MedchainDarcError> for MedchainLedgerError {
    fn from(value: MedchainDarcError) -> Self {
        match value {
            MedchainDarcError::NotFound(what) => MedchainLedgerError::NotFound(what),
            MedchainDarcError::Denied(reason) => MedchainLedgerError::Denied(reason),
            MedchainDarcError::InvalidEvolution(reason) => MedchainLedgerError::Denied(reason),
            MedchainDarcError::DelegationTooDeep(_) => MedchainLedgerError::Denied(format!("{value}")),
            MedchainDarcError::InvalidExpression(_) | MedchainDarcError::InvalidAction(_) => {
                MedchainLedgerError::InvalidArgument(format!("{value}"))
            }
            MedchainDarcError::Encoding(reason) => MedchainLedgerError::Encoding(reason),
        }
    }
}

impl From<MedchainCredentialsError> for MedchainLedgerError {
    fn from(value: MedchainCredentialsError) -> Self {
        match value {
            MedchainCredentialsError::InvalidSignature(_) => {
                MedchainLedgerError::Denied(format!("{value}"))
            }
            _ => MedchainLedgerError::InvalidArgument(format!("{value}")),
        }
    }
}
