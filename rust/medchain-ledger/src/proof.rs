use std::collections::BTreeMap;

use medchain_common::{Blake3Hash, hash_cbor};
use serde::{Deserialize, Serialize};

use crate::{Block, Instance, InstanceId, MedchainLedgerError};

/// Hash of one instance as it enters the state root.
pub fn leaf_hash(instance: &Instance) -> Result<Blake3Hash, MedchainLedgerError> {
    Ok(hash_cbor(instance)?)
}

/// Root over leaf hashes listed in instance id order.
pub fn state_root(leaves: &[Blake3Hash]) -> Blake3Hash {
    Blake3Hash::hash_iter(leaves.iter().map(|leaf| leaf.as_ref()))
}

pub(crate) fn compute_root(
    instances: &BTreeMap<InstanceId, Instance>,
) -> Result<(Vec<Blake3Hash>, Blake3Hash), MedchainLedgerError> {
    let leaves = instances
        .values()
        .map(leaf_hash)
        .collect::<Result<Vec<_>, _>>()?;
    let root = state_root(&leaves);
    Ok((leaves, root))
}

/// Evidence that an instance had a given value as of a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    /// The proven instance
    pub instance: Instance,
    /// Every leaf of the state, in instance id order
    pub leaves: Vec<Blake3Hash>,
    /// State root the leaves hash to
    pub root: Blake3Hash,
    /// Index of the block whose state root this is
    pub block: u64,
}

impl Proof {
    /// Check the proof is internally consistent: the instance is one of the
    /// leaves and the leaves hash to the root.
    pub fn verify(&self) -> Result<(), MedchainLedgerError> {
        let leaf = leaf_hash(&self.instance)?;
        if !self.leaves.contains(&leaf) {
            return Err(MedchainLedgerError::Denied(format!(
                "instance {} is not in the proof",
                self.instance.id
            )));
        }
        if state_root(&self.leaves) != self.root {
            return Err(MedchainLedgerError::Denied("proof root mismatch".to_string()));
        }
        Ok(())
    }

    /// Check the proof and that it matches `block`'s state root.
    pub fn verify_against(&self, block: &Block) -> Result<(), MedchainLedgerError> {
        self.verify()?;
        if block.index != self.block || block.state_root != self.root {
            return Err(MedchainLedgerError::Denied(format!(
                "proof does not match block {}",
                block.index
            )));
        }
        Ok(())
    }
}
