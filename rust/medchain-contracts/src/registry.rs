//! The contract registry every medchain ledger runs with.

use medchain_darc::evolution::{DARC_CONTRACT, SECURE_DARC_CONTRACT};
use medchain_ledger::ContractRegistry;

use crate::{
    darc::{DarcContract, SecureDarcContract},
    deferred::{DEFERRED_CONTRACT, DeferredContract},
    medchain::{QUERY_CONTRACT, QueryContract},
    project::{PROJECT_CONTRACT, ProjectContract},
};

/// A registry with the DARC, secure DARC, project, query and deferred
/// contracts.
pub fn registry() -> ContractRegistry {
    let mut registry = ContractRegistry::new();
    registry
        .register(DARC_CONTRACT, DarcContract::construct)
        .register(SECURE_DARC_CONTRACT, SecureDarcContract::construct)
        .register(PROJECT_CONTRACT, ProjectContract::construct)
        .register(QUERY_CONTRACT, QueryContract::construct)
        .register(DEFERRED_CONTRACT, DeferredContract::construct);
    registry
}
