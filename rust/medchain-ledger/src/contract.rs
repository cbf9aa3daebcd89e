use std::collections::{BTreeSet, HashMap};

use medchain_common::{Blake3Hash, from_cbor};
use medchain_credentials::Identity;
use medchain_darc::{Darc, DarcResolver};

use crate::{
    CONFIG_CONTRACT, ChainConfig, Instance, InstanceId, Instruction, MedchainLedgerError,
    StateChange, verify,
};

/// Read-only view of ledger state, as seen while a transaction executes.
pub trait ReadState: Send + Sync {
    /// The instance at `id`, including uncommitted changes of earlier
    /// instructions in the same transaction.
    fn instance(&self, id: &InstanceId) -> Option<Instance>;

    /// Last used counter of `identity` (0 if it never signed).
    fn counter(&self, identity: &Identity) -> u64;
}

/// What a contract sees while verifying or executing an instruction.
pub struct ExecutionContext<'a> {
    /// Current state
    pub state: &'a dyn ReadState,
    /// Registry for dispatching to other contract types
    pub registry: &'a ContractRegistry,
    /// Index of the block being built
    pub height: u64,
}

impl ExecutionContext<'_> {
    /// The instance at `id`, or `NotFound`.
    pub fn instance(&self, id: &InstanceId) -> Result<Instance, MedchainLedgerError> {
        self.state
            .instance(id)
            .ok_or_else(|| MedchainLedgerError::NotFound(format!("instance {id}")))
    }

    /// Latest version of the DARC with `base_id`.
    pub fn darc(&self, base_id: &Blake3Hash) -> Result<Darc, MedchainLedgerError> {
        let instance = self.instance(&InstanceId::darc(base_id))?;
        Ok(from_cbor(&instance.value)?)
    }

    /// The chain configuration.
    pub fn config(&self) -> Result<ChainConfig, MedchainLedgerError> {
        let instance = self.instance(&InstanceId::CONFIG)?;
        if instance.contract != CONFIG_CONTRACT {
            return Err(MedchainLedgerError::NotFound("chain configuration".to_string()));
        }
        Ok(from_cbor(&instance.value)?)
    }

    /// Whether `base_id` is the genesis DARC.
    pub fn is_genesis_darc(&self, base_id: &Blake3Hash) -> Result<bool, MedchainLedgerError> {
        Ok(self.config()?.genesis_darc == *base_id)
    }

    /// Check that `signers` satisfy the DARC governing `instruction`'s
    /// target for the instruction's action.
    pub fn authorize(
        &self,
        instruction: &Instruction,
        signers: &BTreeSet<Identity>,
    ) -> Result<(), MedchainLedgerError> {
        verify::verify_rule(self, instruction, signers)
    }
}

impl DarcResolver for ExecutionContext<'_> {
    fn resolve(&self, base_id: &Blake3Hash) -> Option<Darc> {
        self.darc(base_id).ok()
    }
}

/// The behavior behind one contract type tag.
///
/// The ledger constructs the contract of an instruction's target instance
/// (for spawns, the parent) from the instance's value and calls
/// [`Contract::verify_instruction`] followed by the matching entry point.
pub trait Contract: Send + Sync {
    /// Authenticate and authorize `instruction`. Counters have already been
    /// checked by the ledger.
    fn verify_instruction(
        &self,
        ctx: &ExecutionContext<'_>,
        instruction: &Instruction,
        tx_hash: &Blake3Hash,
    ) -> Result<(), MedchainLedgerError> {
        verify::verify_instruction(ctx, instruction, tx_hash)
    }

    /// Authorize an instruction that runs on behalf of a completed deferred
    /// proposal. `signers` are the identities that co-signed it; there are
    /// no counters or transaction signatures to check.
    fn verify_deferred(
        &self,
        ctx: &ExecutionContext<'_>,
        instruction: &Instruction,
        signers: &BTreeSet<Identity>,
    ) -> Result<(), MedchainLedgerError> {
        ctx.authorize(instruction, signers)
    }

    /// Create new instances.
    fn spawn(
        &self,
        _ctx: &ExecutionContext<'_>,
        instruction: &Instruction,
    ) -> Result<Vec<StateChange>, MedchainLedgerError> {
        Err(MedchainLedgerError::InvalidArgument(format!(
            "{} is not supported",
            instruction.action()
        )))
    }

    /// Run a command on the target instance.
    fn invoke(
        &self,
        _ctx: &ExecutionContext<'_>,
        instruction: &Instruction,
    ) -> Result<Vec<StateChange>, MedchainLedgerError> {
        Err(MedchainLedgerError::InvalidArgument(format!(
            "{} is not supported",
            instruction.action()
        )))
    }

    /// Remove the target instance.
    fn delete(
        &self,
        _ctx: &ExecutionContext<'_>,
        instruction: &Instruction,
    ) -> Result<Vec<StateChange>, MedchainLedgerError> {
        Err(MedchainLedgerError::InvalidArgument(format!(
            "{} is not supported",
            instruction.action()
        )))
    }
}

/// Builds a contract from the value of the instance it runs on. Spawns
/// dispatched through the registry pass an empty value.
pub type ContractConstructor = fn(&[u8]) -> Result<Box<dyn Contract>, MedchainLedgerError>;

/// Maps contract type tags to constructors. Built once, before the ledger
/// starts.
#[derive(Default, Clone)]
pub struct ContractRegistry {
    constructors: HashMap<String, ContractConstructor>,
}

impl ContractRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `constructor` under `tag`, replacing any earlier one.
    pub fn register(&mut self, tag: &str, constructor: ContractConstructor) -> &mut Self {
        self.constructors.insert(tag.to_string(), constructor);
        self
    }

    /// Whether `tag` is known.
    pub fn contains(&self, tag: &str) -> bool {
        self.constructors.contains_key(tag)
    }

    /// Construct the contract for `tag` from an instance value.
    pub fn construct(&self, tag: &str, value: &[u8]) -> Result<Box<dyn Contract>, MedchainLedgerError> {
        let constructor = self
            .constructors
            .get(tag)
            .ok_or_else(|| MedchainLedgerError::NotFound(format!("contract type '{tag}'")))?;
        constructor(value)
    }
}

impl std::fmt::Debug for ContractRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tags = self.constructors.keys().collect::<Vec<_>>();
        tags.sort();
        f.debug_struct("ContractRegistry").field("tags", &tags).finish()
    }
}
