//! Multi-party co-signing of a single instruction.
//!
//! A proposal names the instruction, the identities that must sign it and
//! the block height at which it lapses. Each required identity adds its
//! signature over the proposal digest in its own transaction. The digest
//! binds the instruction hash to the proposal's own instance id, so a
//! signature collected for one proposal is worthless on any other. Once all of
//! them have signed, anyone may execute the proposal: the instruction is
//! authorized against its target's DARC as if the collected identities had
//! signed it directly, then dispatched to the target's contract. A proposal
//! executes at most once.

use std::collections::{BTreeMap, BTreeSet};

use medchain_common::{Blake3Hash, from_cbor, to_cbor};
use medchain_credentials::Identity;
use medchain_ledger::{
    Contract, ExecutionContext, InstanceId, Instruction, InstructionKind, MedchainLedgerError,
    StateChange,
};
use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;

/// Contract tag of deferred proposals.
pub const DEFERRED_CONTRACT: &str = "deferred";

/// Argument carrying the CBOR encoded proposed instruction.
pub const INSTRUCTION_ARG: &str = "instruction";
/// Argument listing required identities, comma separated.
pub const REQUIRED_ARG: &str = "required";
/// Argument carrying the expiry height in decimal.
pub const EXPIRE_AT_ARG: &str = "expire_at";
/// Argument naming the identity that signs.
pub const IDENTITY_ARG: &str = "identity";
/// Argument carrying a signature over the proposal digest.
pub const SIGNATURE_ARG: &str = "signature";

/// Value of a deferred instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredProposal {
    /// The proposed instruction, without signers
    pub instruction: Instruction,
    /// Hash of the proposed instruction
    pub instruction_hash: Blake3Hash,
    /// What every co-signer signs: the proposal id and the instruction hash
    pub digest: Blake3Hash,
    /// Identities that must sign before execution
    pub required: BTreeSet<Identity>,
    /// Signatures collected so far
    pub signatures: BTreeMap<Identity, ByteBuf>,
    /// First block height at which the proposal is inert
    pub expire_at: u64,
    /// Set by the one successful execution
    pub executed: bool,
}

impl DeferredProposal {
    /// Proposal `id` for `instruction`. Any signers already on it are
    /// dropped.
    pub fn new(
        id: InstanceId,
        instruction: Instruction,
        required: BTreeSet<Identity>,
        expire_at: u64,
    ) -> Result<Self, MedchainLedgerError> {
        if required.is_empty() {
            return Err(MedchainLedgerError::InvalidArgument(
                "a proposal needs at least one required identity".to_string(),
            ));
        }
        let instruction = instruction.with_signers(Vec::new(), Vec::new());
        let instruction_hash = instruction.hash()?;
        Ok(DeferredProposal {
            instruction,
            instruction_hash,
            digest: Self::digest_for(&id, &instruction_hash),
            required,
            signatures: BTreeMap::new(),
            expire_at,
            executed: false,
        })
    }

    /// The value co-signers of proposal `id` sign.
    pub fn digest_for(id: &InstanceId, instruction_hash: &Blake3Hash) -> Blake3Hash {
        Blake3Hash::hash_iter([id.hash().as_ref(), instruction_hash.as_ref()].into_iter())
    }

    /// Whether the proposal lapsed at `height`.
    pub fn is_expired(&self, height: u64) -> bool {
        !self.executed && height >= self.expire_at
    }

    /// Whether every required identity signed.
    pub fn is_ready(&self) -> bool {
        self.required
            .iter()
            .all(|identity| self.signatures.contains_key(identity))
    }

    /// Identities whose signatures were collected.
    pub fn collected(&self) -> BTreeSet<Identity> {
        self.signatures.keys().cloned().collect()
    }

    /// Record `identity`'s signature over the proposal digest.
    pub fn add_signature(
        &mut self,
        identity: Identity,
        signature: &[u8],
        height: u64,
    ) -> Result<(), MedchainLedgerError> {
        if self.executed {
            return Err(MedchainLedgerError::AlreadyExecuted(
                "proposal was executed".to_string(),
            ));
        }
        if self.is_expired(height) {
            return Err(MedchainLedgerError::Expired(format!(
                "proposal expired at height {}",
                self.expire_at
            )));
        }
        if !self.required.contains(&identity) {
            return Err(MedchainLedgerError::Denied(format!(
                "{identity} is not a required signer"
            )));
        }
        if self.signatures.contains_key(&identity) {
            return Err(MedchainLedgerError::Denied(format!(
                "{identity} already signed"
            )));
        }
        identity
            .verify(self.digest.as_ref(), signature)
            .map_err(|error| MedchainLedgerError::Denied(format!("{error}")))?;

        self.signatures
            .insert(identity, ByteBuf::from(signature.to_vec()));
        Ok(())
    }

    /// Mark the proposal executed and return the instruction as signed by
    /// the collected identities. Counters are zero; they are not checked.
    pub fn begin_execute(&mut self, height: u64) -> Result<Instruction, MedchainLedgerError> {
        if self.executed {
            return Err(MedchainLedgerError::AlreadyExecuted(
                "proposal was executed".to_string(),
            ));
        }
        if self.is_expired(height) {
            return Err(MedchainLedgerError::Expired(format!(
                "proposal expired at height {}",
                self.expire_at
            )));
        }
        if !self.is_ready() {
            let missing = self.required.len() - self.signatures.len();
            return Err(MedchainLedgerError::NotReady(format!(
                "{missing} required signature(s) missing"
            )));
        }

        self.executed = true;
        let signers = self.signatures.keys().cloned().collect::<Vec<_>>();
        let counters = vec![0; signers.len()];
        Ok(self.instruction.clone().with_signers(signers, counters))
    }
}

fn parse_required(list: &str) -> Result<BTreeSet<Identity>, MedchainLedgerError> {
    list.split(',')
        .map(str::trim)
        .filter(|identity| !identity.is_empty())
        .map(|identity| identity.parse::<Identity>().map_err(MedchainLedgerError::from))
        .collect()
}

/// The deferred contract.
pub struct DeferredContract {
    proposal: Option<DeferredProposal>,
}

impl DeferredContract {
    /// Constructor for the contract registry.
    pub fn construct(value: &[u8]) -> Result<Box<dyn Contract>, MedchainLedgerError> {
        let proposal = if value.is_empty() {
            None
        } else {
            Some(from_cbor(value)?)
        };
        Ok(Box::new(DeferredContract { proposal }))
    }

    fn execute(
        ctx: &ExecutionContext<'_>,
        proposal: &mut DeferredProposal,
    ) -> Result<Vec<StateChange>, MedchainLedgerError> {
        let proposed = proposal.begin_execute(ctx.height)?;
        let signers = proposal.collected();

        let target = ctx.instance(&proposed.instance)?;
        match &proposed.kind {
            InstructionKind::Invoke { contract, .. } | InstructionKind::Delete { contract }
                if *contract != target.contract =>
            {
                return Err(MedchainLedgerError::InvalidArgument(format!(
                    "instance {} is a {}, not a {contract}",
                    proposed.instance, target.contract
                )));
            }
            _ => (),
        }

        let contract = ctx.registry.construct(&target.contract, &target.value)?;
        contract.verify_deferred(ctx, &proposed, &signers)?;
        match &proposed.kind {
            InstructionKind::Spawn { .. } => contract.spawn(ctx, &proposed),
            InstructionKind::Invoke { .. } => contract.invoke(ctx, &proposed),
            InstructionKind::Delete { .. } => contract.delete(ctx, &proposed),
        }
    }
}

impl Contract for DeferredContract {
    fn spawn(
        &self,
        ctx: &ExecutionContext<'_>,
        instruction: &Instruction,
    ) -> Result<Vec<StateChange>, MedchainLedgerError> {
        let parent = ctx.instance(&instruction.instance)?;
        let args = instruction.args();

        let proposed: Instruction = from_cbor(args.require(INSTRUCTION_ARG)?)?;
        let required = parse_required(args.require_str(REQUIRED_ARG)?)?;
        let expire_at = args
            .require_str(EXPIRE_AT_ARG)?
            .parse::<u64>()
            .map_err(|error| MedchainLedgerError::InvalidArgument(format!("{EXPIRE_AT_ARG}: {error}")))?;
        if expire_at <= ctx.height {
            return Err(MedchainLedgerError::Expired(format!(
                "proposal would expire at height {expire_at}, current height is {}",
                ctx.height
            )));
        }

        let id = instruction.derive_id("")?;
        let proposal = DeferredProposal::new(id, proposed, required, expire_at)?;
        tracing::info!(
            proposal = %id,
            action = %proposal.instruction.action(),
            required = proposal.required.len(),
            expire_at,
            "proposal created"
        );
        Ok(vec![StateChange::create(
            id,
            DEFERRED_CONTRACT,
            to_cbor(&proposal)?,
            parent.darc,
        )])
    }

    fn invoke(
        &self,
        ctx: &ExecutionContext<'_>,
        instruction: &Instruction,
    ) -> Result<Vec<StateChange>, MedchainLedgerError> {
        let mut proposal = self
            .proposal
            .clone()
            .ok_or_else(|| MedchainLedgerError::NotFound("proposal".to_string()))?;
        let target = ctx.instance(&instruction.instance)?;
        let args = instruction.args();

        let mut changes = match instruction.command() {
            Some("add_signature") => {
                let identity: Identity = args.require_str(IDENTITY_ARG)?.parse()?;
                let signature = args.require(SIGNATURE_ARG)?;
                proposal.add_signature(identity.clone(), signature, ctx.height)?;
                tracing::debug!(
                    proposal = %target.id,
                    %identity,
                    collected = proposal.signatures.len(),
                    required = proposal.required.len(),
                    "signature added"
                );
                Vec::new()
            }
            Some("execute") => {
                let effects = Self::execute(ctx, &mut proposal)?;
                tracing::info!(proposal = %target.id, effects = effects.len(), "proposal executed");
                effects
            }
            other => {
                return Err(MedchainLedgerError::InvalidArgument(format!(
                    "unknown command {other:?} for {DEFERRED_CONTRACT}"
                )));
            }
        };

        changes.push(StateChange::update(
            target.id,
            DEFERRED_CONTRACT,
            to_cbor(&proposal)?,
            target.darc,
        ));
        Ok(changes)
    }

    fn delete(
        &self,
        _ctx: &ExecutionContext<'_>,
        _instruction: &Instruction,
    ) -> Result<Vec<StateChange>, MedchainLedgerError> {
        Err(MedchainLedgerError::Denied(
            "proposals are never deleted".to_string(),
        ))
    }
}
