//! Default instruction verification.
//!
//! An instruction is accepted when every declared signer produced a valid
//! signature over the transaction hash, each signer's counter is exactly one
//! above the last one it used, and the signer set satisfies the rule for
//! the instruction's action in the DARC governing the target instance.

use std::collections::BTreeSet;

use medchain_common::Blake3Hash;
use medchain_credentials::Identity;
use medchain_darc::evolution;

use crate::{ExecutionContext, Instruction, MedchainLedgerError, ReadState};

/// Signatures, then the DARC rule. Used by contracts that keep the default
/// [`crate::Contract::verify_instruction`].
pub fn verify_instruction(
    ctx: &ExecutionContext<'_>,
    instruction: &Instruction,
    tx_hash: &Blake3Hash,
) -> Result<(), MedchainLedgerError> {
    verify_signatures(instruction, tx_hash)?;
    verify_rule(ctx, instruction, &signer_set(instruction))
}

/// The declared signers as a set.
pub fn signer_set(instruction: &Instruction) -> BTreeSet<Identity> {
    instruction.signer_identities.iter().cloned().collect()
}

/// Every declared signer signed `tx_hash`.
pub fn verify_signatures(
    instruction: &Instruction,
    tx_hash: &Blake3Hash,
) -> Result<(), MedchainLedgerError> {
    let identities = &instruction.signer_identities;
    if identities.is_empty() {
        return Err(MedchainLedgerError::Denied("instruction has no signers".to_string()));
    }
    if identities.len() != instruction.signatures.len() {
        return Err(MedchainLedgerError::Denied(format!(
            "{} signers but {} signatures",
            identities.len(),
            instruction.signatures.len()
        )));
    }

    for (identity, signature) in identities.iter().zip(&instruction.signatures) {
        identity.verify(tx_hash.as_ref(), signature).map_err(|error| {
            tracing::debug!(%identity, "signature rejected");
            MedchainLedgerError::Denied(format!("{error}"))
        })?;
    }
    Ok(())
}

/// Each signer's counter is the next one after `state`'s.
pub fn verify_counters(
    state: &dyn ReadState,
    instruction: &Instruction,
) -> Result<(), MedchainLedgerError> {
    if instruction.signer_identities.len() != instruction.signer_counters.len() {
        return Err(MedchainLedgerError::InvalidArgument(
            "signer counters do not match signers".to_string(),
        ));
    }
    for (identity, counter) in instruction
        .signer_identities
        .iter()
        .zip(&instruction.signer_counters)
    {
        let expected = state.counter(identity) + 1;
        if *counter != expected {
            return Err(MedchainLedgerError::Conflict(format!(
                "counter {counter} for {identity}, expected {expected}"
            )));
        }
    }
    Ok(())
}

/// `signers` satisfy the governing DARC's rule for the instruction.
pub fn verify_rule(
    ctx: &ExecutionContext<'_>,
    instruction: &Instruction,
    signers: &BTreeSet<Identity>,
) -> Result<(), MedchainLedgerError> {
    let target = ctx.instance(&instruction.instance)?;
    let darc = ctx.darc(&target.darc)?;
    let action = instruction.action();

    evolution::authorize(&darc, &action, signers, ctx).map_err(|error| {
        tracing::debug!(instance = %instruction.instance, %action, "rule not satisfied");
        MedchainLedgerError::from(error)
    })
}
