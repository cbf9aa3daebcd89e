use medchain_common::Blake3Hash;
use medchain_credentials::{Authority, Principal};
use serde::{Deserialize, Serialize};

use crate::{Instruction, MedchainLedgerError};

/// An ordered list of instructions that commit together or not at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientTransaction {
    /// Instructions in execution order
    pub instructions: Vec<Instruction>,
}

impl ClientTransaction {
    /// Wrap instructions into a transaction.
    pub fn new(instructions: Vec<Instruction>) -> Self {
        ClientTransaction { instructions }
    }

    /// The hash every signature in the transaction covers. It binds all
    /// instructions, signers and counters, but not the signatures.
    pub fn hash(&self) -> Result<Blake3Hash, MedchainLedgerError> {
        let hashes = self
            .instructions
            .iter()
            .map(Instruction::hash)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Blake3Hash::hash_iter(hashes.iter().map(|hash| hash.as_ref())))
    }

    /// Fill in every instruction's signatures using `signers`. Each declared
    /// signer identity must have a matching authority.
    pub fn sign(&mut self, signers: &[&dyn Authority]) -> Result<(), MedchainLedgerError> {
        let hash = self.hash()?;
        for instruction in self.instructions.iter_mut() {
            let mut signatures = Vec::with_capacity(instruction.signer_identities.len());
            for identity in &instruction.signer_identities {
                let signer = signers
                    .iter()
                    .find(|signer| &signer.identity() == identity)
                    .ok_or_else(|| MedchainLedgerError::NotFound(format!("signer {identity}")))?;
                signatures.push(signer.sign(hash.as_ref())?);
            }
            instruction.signatures = signatures;
        }
        Ok(())
    }
}
