//! The query contract.
//!
//! One instance per project holds that project's [`QueryStore`]. Commands
//! take a `query` argument (`token:project:action`) whose project must be
//! the instance's project:
//!
//! - `submit` records a new query as `Submitted`.
//! - `update` moves a query to the `status` argument.
//! - `decide` authorizes every signer of the instruction against the
//!   project DARC and records `Authorized` or `Rejected`. Its only
//!   precondition is valid signatures; an unauthorized signer leads to a
//!   recorded rejection, not a failed transaction.
//! - `verify_status` succeeds only for `Authorized` queries.
//! - each query action (`count_global`, `patient_list`, ...) records the
//!   `status` argument once the project DARC allows
//!   `invoke:medchain.<action>` for the signers.

use std::collections::BTreeSet;

use medchain_common::{Blake3Hash, from_cbor, to_cbor};
use medchain_credentials::Identity;
use medchain_darc::{Action, Darc, DarcResolver, Expr, MedchainDarcError, RuleSource};
use medchain_ledger::{
    Contract, ExecutionContext, Instance, Instruction, MedchainLedgerError, StateChange, verify,
};
use serde::{Deserialize, Serialize};

use crate::{QueryId, QueryStatus, QueryStore, lifecycle};

/// Contract tag of the query contract.
pub const QUERY_CONTRACT: &str = "medchain";

/// Query actions a project can grant.
pub const QUERY_ACTIONS: [&str; 7] = [
    "patient_list",
    "count_per_site",
    "count_per_site_obfuscated",
    "count_per_site_shuffled",
    "count_per_site_shuffled_obfuscated",
    "count_global",
    "count_global_obfuscated",
];

/// Argument naming the query.
pub const QUERY_ARG: &str = "query";
/// Argument carrying a [`QueryStatus`].
pub const STATUS_ARG: &str = "status";
/// Argument naming the project of a new store.
pub const PROJECT_ARG: &str = "project";

/// Value of a query contract instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryContractState {
    /// Project whose queries this instance records
    pub project: String,
    /// The records
    pub queries: QueryStore,
}

impl QueryContractState {
    /// Decode from a ledger instance.
    pub fn from_instance(instance: &Instance) -> Result<Self, MedchainLedgerError> {
        if instance.contract != QUERY_CONTRACT {
            return Err(MedchainLedgerError::InvalidArgument(format!(
                "instance {} is a {}, not a {QUERY_CONTRACT}",
                instance.id, instance.contract
            )));
        }
        Ok(from_cbor(&instance.value)?)
    }
}

/// Rules of the DARC governing a project's query store.
struct ProjectRules<'a, 'b> {
    ctx: &'a ExecutionContext<'b>,
    project: &'a str,
    darc: Blake3Hash,
}

impl DarcResolver for ProjectRules<'_, '_> {
    fn resolve(&self, base_id: &Blake3Hash) -> Option<Darc> {
        self.ctx.resolve(base_id)
    }
}

impl RuleSource for ProjectRules<'_, '_> {
    fn lookup(&self, project: &str, action: &Action) -> Result<Expr, MedchainDarcError> {
        if project != self.project {
            return Err(MedchainDarcError::NotFound(format!("project {project}")));
        }
        let darc = self
            .ctx
            .darc(&self.darc)
            .map_err(|error| MedchainDarcError::NotFound(format!("{error}")))?;
        darc.rules()
            .get(action)
            .cloned()
            .ok_or_else(|| MedchainDarcError::NotFound(format!("{action} in project {project}")))
    }
}

/// Create a query store for `project`, governed by the parent's DARC.
pub(crate) fn spawn_store(
    ctx: &ExecutionContext<'_>,
    instruction: &Instruction,
    project: &str,
) -> Result<Vec<StateChange>, MedchainLedgerError> {
    if project.is_empty() || project.contains(':') {
        return Err(MedchainLedgerError::InvalidArgument(format!(
            "invalid project name '{project}'"
        )));
    }
    let parent = ctx.instance(&instruction.instance)?;
    let state = QueryContractState {
        project: project.to_string(),
        queries: QueryStore::new(),
    };
    tracing::info!(project, "query store spawned");
    Ok(vec![StateChange::create(
        instruction.derive_id("")?,
        QUERY_CONTRACT,
        to_cbor(&state)?,
        parent.darc,
    )])
}

/// The query contract. Built without state when a spawn is dispatched to it.
pub struct QueryContract {
    state: Option<QueryContractState>,
}

impl QueryContract {
    /// Constructor for the contract registry.
    pub fn construct(value: &[u8]) -> Result<Box<dyn Contract>, MedchainLedgerError> {
        let state = if value.is_empty() {
            None
        } else {
            Some(from_cbor(value)?)
        };
        Ok(Box::new(QueryContract { state }))
    }

    fn is_decide(instruction: &Instruction) -> bool {
        instruction.command() == Some("decide")
    }
}

impl Contract for QueryContract {
    fn verify_instruction(
        &self,
        ctx: &ExecutionContext<'_>,
        instruction: &Instruction,
        tx_hash: &Blake3Hash,
    ) -> Result<(), MedchainLedgerError> {
        if Self::is_decide(instruction) {
            verify::verify_signatures(instruction, tx_hash)
        } else {
            verify::verify_instruction(ctx, instruction, tx_hash)
        }
    }

    fn verify_deferred(
        &self,
        ctx: &ExecutionContext<'_>,
        instruction: &Instruction,
        signers: &BTreeSet<Identity>,
    ) -> Result<(), MedchainLedgerError> {
        if Self::is_decide(instruction) {
            Ok(())
        } else {
            ctx.authorize(instruction, signers)
        }
    }

    fn spawn(
        &self,
        ctx: &ExecutionContext<'_>,
        instruction: &Instruction,
    ) -> Result<Vec<StateChange>, MedchainLedgerError> {
        let project = instruction.args().require_str(PROJECT_ARG)?;
        spawn_store(ctx, instruction, project)
    }

    fn invoke(
        &self,
        ctx: &ExecutionContext<'_>,
        instruction: &Instruction,
    ) -> Result<Vec<StateChange>, MedchainLedgerError> {
        let mut state = self
            .state
            .clone()
            .ok_or_else(|| MedchainLedgerError::NotFound("query store".to_string()))?;
        let target = ctx.instance(&instruction.instance)?;
        let args = instruction.args();
        let command = instruction.command().unwrap_or_default();

        let id: QueryId = args.require_str(QUERY_ARG)?.parse()?;
        if id.project() != state.project {
            return Err(MedchainLedgerError::InvalidArgument(format!(
                "query {id} does not belong to project {}",
                state.project
            )));
        }

        match command {
            "submit" => lifecycle::spawn(&mut state.queries, id, QueryStatus::Submitted)?,
            "update" => {
                let status = args.require_str(STATUS_ARG)?.parse()?;
                lifecycle::update(&mut state.queries, id, status)?;
            }
            "decide" => {
                let rules = ProjectRules {
                    ctx,
                    project: &state.project,
                    darc: target.darc,
                };
                let signers = verify::signer_set(instruction);
                lifecycle::decide(&mut state.queries, id, &signers, &rules)?;
            }
            "verify_status" => {
                state.queries.verify_status(&id)?;
                return Ok(Vec::new());
            }
            action if QUERY_ACTIONS.contains(&action) => {
                if id.action() != action {
                    return Err(MedchainLedgerError::InvalidArgument(format!(
                        "query {id} is not a {action} query"
                    )));
                }
                let status = args.require_str(STATUS_ARG)?.parse()?;
                lifecycle::update(&mut state.queries, id, status)?;
            }
            other => {
                return Err(MedchainLedgerError::InvalidArgument(format!(
                    "unknown command '{other}' for {QUERY_CONTRACT}"
                )));
            }
        }

        Ok(vec![StateChange::update(
            target.id,
            QUERY_CONTRACT,
            to_cbor(&state)?,
            target.darc,
        )])
    }

    fn delete(
        &self,
        _ctx: &ExecutionContext<'_>,
        _instruction: &Instruction,
    ) -> Result<Vec<StateChange>, MedchainLedgerError> {
        Err(MedchainLedgerError::Denied(
            "queries are never deleted".to_string(),
        ))
    }
}
