use medchain_ledger::MedchainLedgerError;
use thiserror::Error;

/// Errors raised by client sessions and streams.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MedchainClientError {
    /// The ledger refused or failed an operation
    #[error(transparent)]
    Ledger(#[from] MedchainLedgerError),

    /// A bounded wait ran out
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Client configuration could not be loaded
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The block subscription ended or fell behind irrecoverably
    #[error("Stream failed: {0}")]
    Stream(String),
}

impl MedchainClientError {
    /// Whether repeating the operation with refreshed state may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            MedchainClientError::Ledger(error) => error.is_retryable(),
            MedchainClientError::Timeout(_) => true,
            _ => false,
        }
    }
}

impl From<medchain_common::MedchainEncodingError> for MedchainClientError {
    fn from(value: medchain_common::MedchainEncodingError) -> Self {
        MedchainClientError::Ledger(value.into())
    }
}

impl From<medchain_credentials::MedchainCredentialsError> for MedchainClientError {
    fn from(value: medchain_credentials::MedchainCredentialsError) -> Self {
        MedchainClientError::Ledger(value.into())
    }
}

impl From<medchain_darc::MedchainDarcError> for MedchainClientError {
    fn from(value: medchain_darc::MedchainDarcError) -> Self {
        MedchainClientError::Ledger(value.into())
    }
}
