use std::collections::{BTreeMap, HashMap};

use medchain_common::{NULL_BLAKE3_HASH, from_cbor, to_cbor};
use medchain_credentials::Identity;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::{
    Block, CONFIG_CONTRACT, ChainConfig, ClientTransaction, ContractRegistry, ExecutionContext,
    GenesisConfig, Instance, InstanceId, InstructionKind, MedchainLedgerError, Proof, ReadState,
    StateAction, StateChange, TxResult, proof::compute_root, verify,
};

const EVENT_CAPACITY: usize = 256;

#[derive(Default)]
struct LedgerState {
    instances: BTreeMap<InstanceId, Instance>,
    counters: HashMap<Identity, u64>,
    blocks: Vec<Block>,
}

/// Writes of a transaction in progress, layered over committed state.
/// Reads see staged values first and fall back to the committed ones.
struct Staging<'a> {
    base: &'a LedgerState,
    instances: BTreeMap<InstanceId, Option<Instance>>,
    counters: HashMap<Identity, u64>,
}

impl<'a> Staging<'a> {
    fn new(base: &'a LedgerState) -> Self {
        Staging {
            base,
            instances: BTreeMap::new(),
            counters: HashMap::new(),
        }
    }

    fn apply(&mut self, mut change: StateChange) -> Result<StateChange, MedchainLedgerError> {
        let existing = self.instance(&change.instance);
        match (change.action, existing) {
            (StateAction::Create, Some(_)) => {
                return Err(MedchainLedgerError::InvalidArgument(format!(
                    "instance {} already exists",
                    change.instance
                )));
            }
            (StateAction::Create, None) => change.version = 0,
            (StateAction::Update | StateAction::Remove, None) => {
                return Err(MedchainLedgerError::NotFound(format!(
                    "instance {}",
                    change.instance
                )));
            }
            (StateAction::Update, Some(existing)) => change.version = existing.version + 1,
            (StateAction::Remove, Some(existing)) => change.version = existing.version,
        }

        let staged = match change.action {
            StateAction::Remove => None,
            StateAction::Create | StateAction::Update => Some(Instance {
                id: change.instance,
                contract: change.contract.clone(),
                value: change.value.clone(),
                darc: change.darc,
                version: change.version,
            }),
        };
        self.instances.insert(change.instance, staged);
        Ok(change)
    }
}

impl ReadState for Staging<'_> {
    fn instance(&self, id: &InstanceId) -> Option<Instance> {
        match self.instances.get(id) {
            Some(staged) => staged.clone(),
            None => self.base.instances.get(id).cloned(),
        }
    }

    fn counter(&self, identity: &Identity) -> u64 {
        self.counters
            .get(identity)
            .or_else(|| self.base.counters.get(identity))
            .copied()
            .unwrap_or(0)
    }
}

struct Executed {
    instances: BTreeMap<InstanceId, Option<Instance>>,
    counters: HashMap<Identity, u64>,
    changes: Vec<StateChange>,
}

/// A single-node ledger kept entirely in memory.
///
/// Transactions are serialized by one lock; each one either commits all of
/// its instructions in a new block or leaves state untouched. Committed
/// blocks are broadcast to subscribers.
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
    registry: ContractRegistry,
    events: broadcast::Sender<Block>,
}

impl MemoryLedger {
    /// Start a ledger from `genesis`, with the configuration instance and
    /// the genesis DARC instance in block 0.
    pub fn genesis(
        genesis: GenesisConfig,
        registry: ContractRegistry,
    ) -> Result<Self, MedchainLedgerError> {
        if !registry.contains(&genesis.darc_contract) {
            return Err(MedchainLedgerError::NotFound(format!(
                "contract type '{}'",
                genesis.darc_contract
            )));
        }

        let darc = genesis.darc();
        let base_id = darc.base_id()?;
        let config = ChainConfig::from_genesis(&genesis)?;

        let changes = vec![
            StateChange::create(InstanceId::CONFIG, CONFIG_CONTRACT, to_cbor(&config)?, base_id),
            StateChange::create(
                InstanceId::darc(&base_id),
                &genesis.darc_contract,
                to_cbor(&darc)?,
                base_id,
            ),
        ];

        let mut state = LedgerState::default();
        for change in &changes {
            state.instances.insert(
                change.instance,
                Instance {
                    id: change.instance,
                    contract: change.contract.clone(),
                    value: change.value.clone(),
                    darc: change.darc,
                    version: 0,
                },
            );
        }

        let (_, state_root) = compute_root(&state.instances)?;
        state.blocks.push(Block {
            index: 0,
            previous: NULL_BLAKE3_HASH,
            results: vec![TxResult {
                transaction: ClientTransaction::new(Vec::new()),
                changes,
            }],
            state_root,
        });

        let digest = config.digest()?;
        tracing::info!(genesis_darc = %base_id, config = %digest, "ledger started");

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(MemoryLedger {
            state: Mutex::new(state),
            registry,
            events,
        })
    }

    /// The contract registry this ledger dispatches through.
    pub fn registry(&self) -> &ContractRegistry {
        &self.registry
    }

    /// Verify and execute `tx`, committing it in a new block.
    pub fn submit(&self, tx: ClientTransaction) -> Result<Block, MedchainLedgerError> {
        let mut state = self.state.lock();

        let executed = match self.execute(&state, &tx) {
            Ok(executed) => executed,
            Err(error) => {
                tracing::warn!(%error, "transaction rejected");
                return Err(error);
            }
        };

        let mut instances = state.instances.clone();
        for (id, staged) in executed.instances {
            match staged {
                Some(instance) => instances.insert(id, instance),
                None => instances.remove(&id),
            };
        }
        let (_, state_root) = compute_root(&instances)?;
        let previous = match state.blocks.last() {
            Some(block) => block.id()?,
            None => NULL_BLAKE3_HASH,
        };

        let block = Block {
            index: state.blocks.len() as u64,
            previous,
            results: vec![TxResult {
                transaction: tx,
                changes: executed.changes,
            }],
            state_root,
        };

        state.instances = instances;
        state.counters.extend(executed.counters);
        state.blocks.push(block.clone());
        drop(state);

        tracing::info!(
            block = block.index,
            changes = block.changes().count(),
            "transaction committed"
        );
        // Nobody listening is fine.
        let _ = self.events.send(block.clone());
        Ok(block)
    }

    fn execute(
        &self,
        base: &LedgerState,
        tx: &ClientTransaction,
    ) -> Result<Executed, MedchainLedgerError> {
        let config: ChainConfig = base
            .instances
            .get(&InstanceId::CONFIG)
            .ok_or_else(|| MedchainLedgerError::NotFound("chain configuration".to_string()))
            .and_then(|instance| Ok(from_cbor::<ChainConfig>(&instance.value)?))?;

        if tx.instructions.is_empty() {
            return Err(MedchainLedgerError::InvalidArgument(
                "empty transaction".to_string(),
            ));
        }
        if tx.instructions.len() > config.max_instructions_per_tx {
            return Err(MedchainLedgerError::InvalidArgument(format!(
                "{} instructions exceed the limit of {}",
                tx.instructions.len(),
                config.max_instructions_per_tx
            )));
        }

        let tx_hash = tx.hash()?;
        let height = base.blocks.len() as u64;
        let mut staging = Staging::new(base);
        let mut changes = Vec::new();

        for instruction in &tx.instructions {
            verify::verify_counters(&staging, instruction)?;

            let target = staging.instance(&instruction.instance).ok_or_else(|| {
                MedchainLedgerError::NotFound(format!("instance {}", instruction.instance))
            })?;
            match &instruction.kind {
                InstructionKind::Invoke { contract, .. } | InstructionKind::Delete { contract }
                    if *contract != target.contract =>
                {
                    return Err(MedchainLedgerError::InvalidArgument(format!(
                        "instance {} is a {}, not a {contract}",
                        instruction.instance, target.contract
                    )));
                }
                _ => (),
            }

            let contract = self.registry.construct(&target.contract, &target.value)?;
            let produced = {
                let ctx = ExecutionContext {
                    state: &staging,
                    registry: &self.registry,
                    height,
                };
                contract.verify_instruction(&ctx, instruction, &tx_hash)?;
                tracing::debug!(instance = %instruction.instance, action = %instruction.action(), "instruction verified");

                match &instruction.kind {
                    InstructionKind::Spawn { .. } => contract.spawn(&ctx, instruction)?,
                    InstructionKind::Invoke { .. } => contract.invoke(&ctx, instruction)?,
                    InstructionKind::Delete { .. } => contract.delete(&ctx, instruction)?,
                }
            };

            for change in produced {
                changes.push(staging.apply(change)?);
            }
            for (identity, counter) in instruction
                .signer_identities
                .iter()
                .zip(&instruction.signer_counters)
            {
                staging.counters.insert(identity.clone(), *counter);
            }
        }

        Ok(Executed {
            instances: staging.instances,
            counters: staging.counters,
            changes,
        })
    }

    /// The committed instance at `id`.
    pub fn instance(&self, id: &InstanceId) -> Result<Instance, MedchainLedgerError> {
        self.state
            .lock()
            .instances
            .get(id)
            .cloned()
            .ok_or_else(|| MedchainLedgerError::NotFound(format!("instance {id}")))
    }

    /// An inclusion proof for the instance at `id` against the latest block.
    pub fn proof(&self, id: &InstanceId) -> Result<Proof, MedchainLedgerError> {
        let state = self.state.lock();
        let instance = state
            .instances
            .get(id)
            .cloned()
            .ok_or_else(|| MedchainLedgerError::NotFound(format!("instance {id}")))?;
        let (leaves, root) = compute_root(&state.instances)?;
        Ok(Proof {
            instance,
            leaves,
            root,
            block: state.blocks.len().saturating_sub(1) as u64,
        })
    }

    /// Last counter `identity` used; 0 if it never signed.
    pub fn signer_counter(&self, identity: &Identity) -> u64 {
        self.state.lock().counters.get(identity).copied().unwrap_or(0)
    }

    /// The block at `index`.
    pub fn block(&self, index: u64) -> Option<Block> {
        self.state.lock().blocks.get(index as usize).cloned()
    }

    /// The newest block.
    pub fn latest_block(&self) -> Result<Block, MedchainLedgerError> {
        self.state
            .lock()
            .blocks
            .last()
            .cloned()
            .ok_or_else(|| MedchainLedgerError::NotFound("latest block".to_string()))
    }

    /// Blocks after `index`, oldest first; every block when `None`.
    pub fn blocks_after(&self, index: Option<u64>) -> Vec<Block> {
        let start = index.map_or(0, |index| {
            usize::try_from(index).map_or(usize::MAX, |index| index.saturating_add(1))
        });
        self.state
            .lock()
            .blocks
            .iter()
            .skip(start)
            .cloned()
            .collect()
    }

    /// Receive every block committed from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Block> {
        self.events.subscribe()
    }
}
