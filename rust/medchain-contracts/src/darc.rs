//! Contracts that hold DARCs.
//!
//! A DARC instance lives at [`InstanceId::darc`] of its base id and governs
//! itself. Both contracts spawn new DARCs from a version 0 `darc` argument,
//! evolve from a `darc` argument carrying the next version, and hand spawns
//! of any other contract type to that type's contract. Neither allows
//! deletion.

use std::collections::BTreeSet;

use medchain_common::{from_cbor, to_cbor};
use medchain_credentials::Identity;
use medchain_darc::{
    Darc,
    evolution::{self, DARC_CONTRACT, Evolution, SECURE_DARC_CONTRACT},
};
use medchain_ledger::{
    Contract, ExecutionContext, InstanceId, Instruction, InstructionKind, MedchainLedgerError,
    StateChange, verify,
};

/// Argument carrying a CBOR encoded [`Darc`].
pub const DARC_ARG: &str = "darc";

fn spawned_contract(instruction: &Instruction) -> Result<&str, MedchainLedgerError> {
    match &instruction.kind {
        InstructionKind::Spawn { contract, .. } => Ok(contract),
        _ => Err(MedchainLedgerError::InvalidArgument("not a spawn".to_string())),
    }
}

fn darc_argument(instruction: &Instruction) -> Result<Darc, MedchainLedgerError> {
    Ok(from_cbor(instruction.args().require(DARC_ARG)?)?)
}

/// Create a DARC instance for a version 0 `darc` under the contract `tag`.
fn create_darc(tag: &str, darc: Darc) -> Result<Vec<StateChange>, MedchainLedgerError> {
    if darc.version() != 0 {
        return Err(MedchainLedgerError::InvalidArgument(format!(
            "a new DARC starts at version 0, not {}",
            darc.version()
        )));
    }
    let base_id = darc.base_id()?;
    tracing::info!(darc = %base_id, contract = tag, "DARC spawned");
    Ok(vec![StateChange::create(
        InstanceId::darc(&base_id),
        tag,
        to_cbor(&darc)?,
        base_id,
    )])
}

fn delegate_spawn(
    ctx: &ExecutionContext<'_>,
    instruction: &Instruction,
    tag: &str,
) -> Result<Vec<StateChange>, MedchainLedgerError> {
    ctx.registry.construct(tag, &[])?.spawn(ctx, instruction)
}

/// Check and commit an evolution of `current` to the `darc` argument.
fn evolve(
    ctx: &ExecutionContext<'_>,
    instruction: &Instruction,
    tag: &str,
    current: &Darc,
    tier: Evolution,
) -> Result<Vec<StateChange>, MedchainLedgerError> {
    let target = ctx.instance(&instruction.instance)?;
    let proposed = darc_argument(instruction)?;
    let signers: BTreeSet<Identity> = verify::signer_set(instruction);
    let base_id = current.base_id()?;
    let genesis = ctx.is_genesis_darc(&base_id)?;

    if let Err(error) = tier.check(current, &proposed, &signers, ctx, genesis) {
        tracing::warn!(darc = %base_id, ?tier, %error, "evolution refused");
        return Err(error.into());
    }

    tracing::info!(darc = %base_id, ?tier, version = proposed.version(), "DARC evolved");
    Ok(vec![StateChange::update(
        target.id,
        tag,
        to_cbor(&proposed)?,
        target.darc,
    )])
}

fn current(darc: Option<&Darc>) -> Result<&Darc, MedchainLedgerError> {
    darc.ok_or_else(|| MedchainLedgerError::NotFound("DARC".to_string()))
}

/// The plain DARC contract.
///
/// Evolves whenever `invoke:darc.evolve` is satisfied and the new version
/// is a well-formed successor.
pub struct DarcContract {
    darc: Option<Darc>,
}

impl DarcContract {
    /// Constructor for the contract registry.
    pub fn construct(value: &[u8]) -> Result<Box<dyn Contract>, MedchainLedgerError> {
        let darc = if value.is_empty() {
            None
        } else {
            Some(from_cbor(value)?)
        };
        Ok(Box::new(DarcContract { darc }))
    }
}

impl Contract for DarcContract {
    fn spawn(
        &self,
        ctx: &ExecutionContext<'_>,
        instruction: &Instruction,
    ) -> Result<Vec<StateChange>, MedchainLedgerError> {
        match spawned_contract(instruction)? {
            DARC_CONTRACT => create_darc(DARC_CONTRACT, darc_argument(instruction)?),
            other => delegate_spawn(ctx, instruction, other),
        }
    }

    fn invoke(
        &self,
        ctx: &ExecutionContext<'_>,
        instruction: &Instruction,
    ) -> Result<Vec<StateChange>, MedchainLedgerError> {
        match instruction.command() {
            Some("evolve") => evolve(
                ctx,
                instruction,
                DARC_CONTRACT,
                current(self.darc.as_ref())?,
                Evolution::Plain,
            ),
            other => Err(MedchainLedgerError::InvalidArgument(format!(
                "unknown command {other:?} for {DARC_CONTRACT}"
            ))),
        }
    }

    fn delete(
        &self,
        _ctx: &ExecutionContext<'_>,
        _instruction: &Instruction,
    ) -> Result<Vec<StateChange>, MedchainLedgerError> {
        Err(MedchainLedgerError::Denied("DARCs are never deleted".to_string()))
    }
}

/// The secure DARC contract.
///
/// `evolve` is the restricted tier and `evolve_unrestricted` the
/// unrestricted one. Every secure DARC it creates goes through
/// [`evolution::spawn_child`].
pub struct SecureDarcContract {
    darc: Option<Darc>,
}

impl SecureDarcContract {
    /// Constructor for the contract registry.
    pub fn construct(value: &[u8]) -> Result<Box<dyn Contract>, MedchainLedgerError> {
        let darc = if value.is_empty() {
            None
        } else {
            Some(from_cbor(value)?)
        };
        Ok(Box::new(SecureDarcContract { darc }))
    }
}

impl Contract for SecureDarcContract {
    fn spawn(
        &self,
        ctx: &ExecutionContext<'_>,
        instruction: &Instruction,
    ) -> Result<Vec<StateChange>, MedchainLedgerError> {
        match spawned_contract(instruction)? {
            SECURE_DARC_CONTRACT => {
                let requested = darc_argument(instruction)?;
                let child = evolution::spawn_child(requested.description(), requested.rules().clone())
                    .inspect_err(|error| tracing::warn!(%error, "secure DARC spawn refused"))?;
                create_darc(SECURE_DARC_CONTRACT, child)
            }
            DARC_CONTRACT => create_darc(DARC_CONTRACT, darc_argument(instruction)?),
            other => delegate_spawn(ctx, instruction, other),
        }
    }

    fn invoke(
        &self,
        ctx: &ExecutionContext<'_>,
        instruction: &Instruction,
    ) -> Result<Vec<StateChange>, MedchainLedgerError> {
        let tier = match instruction.command() {
            Some("evolve") => Evolution::Restricted,
            Some("evolve_unrestricted") => Evolution::Unrestricted,
            other => {
                return Err(MedchainLedgerError::InvalidArgument(format!(
                    "unknown command {other:?} for {SECURE_DARC_CONTRACT}"
                )));
            }
        };
        evolve(
            ctx,
            instruction,
            SECURE_DARC_CONTRACT,
            current(self.darc.as_ref())?,
            tier,
        )
    }

    fn delete(
        &self,
        _ctx: &ExecutionContext<'_>,
        _instruction: &Instruction,
    ) -> Result<Vec<StateChange>, MedchainLedgerError> {
        Err(MedchainLedgerError::Denied("DARCs are never deleted".to_string()))
    }
}
