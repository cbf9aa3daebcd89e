use medchain_common::{Blake3Hash, hash_cbor};
use medchain_credentials::Identity;
use medchain_darc::Action;
use serde::{Deserialize, Serialize};

use crate::{Arguments, InstanceId, MedchainLedgerError};

/// What an instruction asks its target instance to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstructionKind {
    /// Create a new instance of `contract`; the target is the parent
    /// instance whose DARC must allow `spawn:<contract>`.
    Spawn {
        /// Contract type of the new instance
        contract: String,
        /// Spawn arguments
        args: Arguments,
    },
    /// Run `command` on the target instance.
    Invoke {
        /// Contract type of the target
        contract: String,
        /// Command name
        command: String,
        /// Command arguments
        args: Arguments,
    },
    /// Remove the target instance.
    Delete {
        /// Contract type of the target
        contract: String,
    },
}

/// One step of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// Target instance
    pub instance: InstanceId,
    /// The operation
    pub kind: InstructionKind,
    /// Identities signing this instruction
    pub signer_identities: Vec<Identity>,
    /// Next counter value for each signer, in the same order
    pub signer_counters: Vec<u64>,
    /// Signatures over the transaction hash, in the same order
    pub signatures: Vec<Vec<u8>>,
}

#[derive(Serialize)]
struct InstructionDigest<'a> {
    instance: &'a InstanceId,
    kind: &'a InstructionKind,
    signer_identities: &'a [Identity],
    signer_counters: &'a [u64],
}

impl Instruction {
    /// Spawn a `contract` instance under `parent`.
    pub fn spawn(parent: InstanceId, contract: &str, args: Arguments) -> Self {
        Self::unsigned(
            parent,
            InstructionKind::Spawn {
                contract: contract.to_string(),
                args,
            },
        )
    }

    /// Invoke `command` on `instance`.
    pub fn invoke(instance: InstanceId, contract: &str, command: &str, args: Arguments) -> Self {
        Self::unsigned(
            instance,
            InstructionKind::Invoke {
                contract: contract.to_string(),
                command: command.to_string(),
                args,
            },
        )
    }

    /// Delete `instance`.
    pub fn delete(instance: InstanceId, contract: &str) -> Self {
        Self::unsigned(
            instance,
            InstructionKind::Delete {
                contract: contract.to_string(),
            },
        )
    }

    fn unsigned(instance: InstanceId, kind: InstructionKind) -> Self {
        Instruction {
            instance,
            kind,
            signer_identities: Vec::new(),
            signer_counters: Vec::new(),
            signatures: Vec::new(),
        }
    }

    /// Declare who signs this instruction and with which counters.
    pub fn with_signers(mut self, identities: Vec<Identity>, counters: Vec<u64>) -> Self {
        self.signer_identities = identities;
        self.signer_counters = counters;
        self.signatures.clear();
        self
    }

    /// Hash of everything but the signatures.
    pub fn hash(&self) -> Result<Blake3Hash, MedchainLedgerError> {
        Ok(hash_cbor(&InstructionDigest {
            instance: &self.instance,
            kind: &self.kind,
            signer_identities: &self.signer_identities,
            signer_counters: &self.signer_counters,
        })?)
    }

    /// The DARC action this instruction needs.
    pub fn action(&self) -> Action {
        match &self.kind {
            InstructionKind::Spawn { contract, .. } => Action::spawn(contract),
            InstructionKind::Invoke {
                contract, command, ..
            } => Action::invoke(contract, command),
            InstructionKind::Delete { contract } => Action::delete(contract),
        }
    }

    /// Arguments of a spawn or invoke; empty for delete.
    pub fn args(&self) -> &Arguments {
        static EMPTY: Arguments = Arguments::empty();
        match &self.kind {
            InstructionKind::Spawn { args, .. } | InstructionKind::Invoke { args, .. } => args,
            InstructionKind::Delete { .. } => &EMPTY,
        }
    }

    /// Command name of an invoke.
    pub fn command(&self) -> Option<&str> {
        match &self.kind {
            InstructionKind::Invoke { command, .. } => Some(command),
            _ => None,
        }
    }

    /// A deterministic new instance id derived from this instruction.
    pub fn derive_id(&self, what: &str) -> Result<InstanceId, MedchainLedgerError> {
        let hash = self.hash()?;
        Ok(InstanceId::from(Blake3Hash::hash_iter(
            [hash.as_ref(), what.as_bytes()].into_iter(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medchain_credentials::{Ed25519Signer, Principal};

    #[test]
    fn it_maps_instructions_to_actions() {
        let target = InstanceId::CONFIG;
        assert_eq!(
            Instruction::spawn(target, "project", Arguments::new()).action(),
            Action::spawn("project")
        );
        assert_eq!(
            Instruction::invoke(target, "medchain", "count_global", Arguments::new()).action(),
            Action::invoke("medchain", "count_global")
        );
        assert_eq!(Instruction::delete(target, "project").action(), Action::delete("project"));
    }

    #[test]
    fn it_hashes_without_signatures() -> anyhow::Result<()> {
        let signer = Ed25519Signer::from_seed([1; 32]);
        let mut instruction = Instruction::invoke(
            InstanceId::CONFIG,
            "medchain",
            "submit",
            Arguments::new().with("query", "q1:A:count_global"),
        )
        .with_signers(vec![signer.identity()], vec![1]);

        let before = instruction.hash()?;
        instruction.signatures.push(vec![1, 2, 3]);
        assert_eq!(instruction.hash()?, before);

        let recounted = instruction.clone().with_signers(vec![signer.identity()], vec![2]);
        assert_ne!(recounted.hash()?, before);
        assert_ne!(instruction.derive_id("")?, instruction.derive_id("other")?);
        Ok(())
    }
}
