use medchain_common::Blake3Hash;
use serde::{Deserialize, Serialize};

use crate::InstanceId;

/// Kind of change a contract asks the ledger to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateAction {
    /// Create a new instance; fails if the id is taken
    Create,
    /// Replace the value of an existing instance
    Update,
    /// Remove an existing instance
    Remove,
}

/// A change to one instance, produced by a contract and applied by the
/// ledger when the whole transaction succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    /// Kind of change
    pub action: StateAction,
    /// Instance touched
    pub instance: InstanceId,
    /// Contract type of the instance
    pub contract: String,
    /// New value (empty on removal)
    #[serde(with = "serde_bytes")]
    pub value: Vec<u8>,
    /// Governing DARC base id
    pub darc: Blake3Hash,
    /// Instance version after the change, set by the ledger
    pub version: u64,
}

impl StateChange {
    /// A new instance.
    pub fn create(instance: InstanceId, contract: &str, value: Vec<u8>, darc: Blake3Hash) -> Self {
        Self::new(StateAction::Create, instance, contract, value, darc)
    }

    /// A new value for an existing instance.
    pub fn update(instance: InstanceId, contract: &str, value: Vec<u8>, darc: Blake3Hash) -> Self {
        Self::new(StateAction::Update, instance, contract, value, darc)
    }

    /// Removal of an instance.
    pub fn remove(instance: InstanceId, contract: &str, darc: Blake3Hash) -> Self {
        Self::new(StateAction::Remove, instance, contract, Vec::new(), darc)
    }

    fn new(
        action: StateAction,
        instance: InstanceId,
        contract: &str,
        value: Vec<u8>,
        darc: Blake3Hash,
    ) -> Self {
        StateChange {
            action,
            instance,
            contract: contract.to_string(),
            value,
            darc,
            version: 0,
        }
    }
}
