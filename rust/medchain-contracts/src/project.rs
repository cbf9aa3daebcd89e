//! The project contract: a project's name, description and the actions
//! each user is authorized for.
//!
//! Spawned under a DARC with `name` and `description`. Commands:
//!
//! - `add` with `user` and `actions` (comma separated) grants actions.
//! - `remove` with `user` and `action` revokes one action.
//!
//! A project can also spawn the query store (`medchain`) for its own name.
//! Projects are never deleted.

use medchain_common::{from_cbor, to_cbor};
use medchain_ledger::{
    Contract, ExecutionContext, Instance, InstanceId, Instruction, InstructionKind,
    MedchainLedgerError, StateChange,
};
use serde::{Deserialize, Serialize};

use crate::medchain::{QUERY_CONTRACT, spawn_store};

/// Contract tag of the project contract.
pub const PROJECT_CONTRACT: &str = "project";

/// Actions granted to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationEntry {
    /// The user
    pub user_id: String,
    /// Granted actions, in grant order
    pub actions: Vec<String>,
}

/// Value of a project instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Project name, the middle field of its query ids
    pub name: String,
    /// Free-form description
    pub description: String,
    /// At most one entry per user
    pub authorizations: Vec<AuthorizationEntry>,
    /// Instance that administers the project (lookup only)
    pub admin: InstanceId,
}

impl Project {
    /// A project with no authorizations.
    pub fn new(name: &str, description: &str, admin: InstanceId) -> Self {
        Project {
            name: name.to_string(),
            description: description.to_string(),
            authorizations: Vec::new(),
            admin,
        }
    }

    /// Decode from a ledger instance.
    pub fn from_instance(instance: &Instance) -> Result<Self, MedchainLedgerError> {
        if instance.contract != PROJECT_CONTRACT {
            return Err(MedchainLedgerError::InvalidArgument(format!(
                "instance {} is a {}, not a {PROJECT_CONTRACT}",
                instance.id, instance.contract
            )));
        }
        Ok(from_cbor(&instance.value)?)
    }

    /// The entry of `user_id`.
    pub fn find(&self, user_id: &str) -> Option<&AuthorizationEntry> {
        self.authorizations
            .iter()
            .find(|entry| entry.user_id == user_id)
    }

    /// Whether `user_id` was granted `action`.
    pub fn is_allowed(&self, user_id: &str, action: &str) -> bool {
        self.find(user_id)
            .is_some_and(|entry| entry.actions.iter().any(|granted| granted == action))
    }

    /// Grant every action of a comma separated list.
    pub fn add(&mut self, user_id: &str, actions: &str) {
        let position = match self
            .authorizations
            .iter()
            .position(|entry| entry.user_id == user_id)
        {
            Some(position) => position,
            None => {
                self.authorizations.push(AuthorizationEntry {
                    user_id: user_id.to_string(),
                    actions: Vec::new(),
                });
                self.authorizations.len() - 1
            }
        };

        let entry = &mut self.authorizations[position];
        for action in actions.split(',').map(str::trim).filter(|action| !action.is_empty()) {
            if !entry.actions.iter().any(|granted| granted == action) {
                entry.actions.push(action.to_string());
            }
        }
    }

    /// Revoke one action; unknown users and actions are ignored.
    pub fn remove(&mut self, user_id: &str, action: &str) {
        if let Some(entry) = self
            .authorizations
            .iter_mut()
            .find(|entry| entry.user_id == user_id)
        {
            entry.actions.retain(|granted| granted != action);
        }
    }
}

/// The project contract. Built without state when a spawn is dispatched to
/// it.
pub struct ProjectContract {
    project: Option<Project>,
}

impl ProjectContract {
    /// Constructor for the contract registry.
    pub fn construct(value: &[u8]) -> Result<Box<dyn Contract>, MedchainLedgerError> {
        let project = if value.is_empty() {
            None
        } else {
            Some(from_cbor(value)?)
        };
        Ok(Box::new(ProjectContract { project }))
    }
}

impl Contract for ProjectContract {
    fn spawn(
        &self,
        ctx: &ExecutionContext<'_>,
        instruction: &Instruction,
    ) -> Result<Vec<StateChange>, MedchainLedgerError> {
        let InstructionKind::Spawn { contract, args } = &instruction.kind else {
            return Err(MedchainLedgerError::InvalidArgument("not a spawn".to_string()));
        };

        match (contract.as_str(), &self.project) {
            (QUERY_CONTRACT, Some(project)) => spawn_store(ctx, instruction, &project.name),
            (PROJECT_CONTRACT, None) => {
                let parent = ctx.instance(&instruction.instance)?;
                let name = args.require_str("name")?;
                if name.is_empty() || name.contains(':') {
                    return Err(MedchainLedgerError::InvalidArgument(format!(
                        "invalid project name '{name}'"
                    )));
                }
                let description = args.search("description").unwrap_or_default();
                let project = Project::new(
                    name,
                    &String::from_utf8_lossy(description),
                    instruction.instance,
                );
                tracing::info!(project = name, "project spawned");
                Ok(vec![StateChange::create(
                    instruction.derive_id("")?,
                    PROJECT_CONTRACT,
                    to_cbor(&project)?,
                    parent.darc,
                )])
            }
            (other, _) => Err(MedchainLedgerError::InvalidArgument(format!(
                "a project cannot spawn '{other}'"
            ))),
        }
    }

    fn invoke(
        &self,
        ctx: &ExecutionContext<'_>,
        instruction: &Instruction,
    ) -> Result<Vec<StateChange>, MedchainLedgerError> {
        let mut project = self
            .project
            .clone()
            .ok_or_else(|| MedchainLedgerError::NotFound("project".to_string()))?;
        let target = ctx.instance(&instruction.instance)?;
        let args = instruction.args();
        let user = args.require_str("user")?;

        match instruction.command() {
            Some("add") => project.add(user, args.require_str("actions")?),
            Some("remove") => project.remove(user, args.require_str("action")?),
            other => {
                return Err(MedchainLedgerError::InvalidArgument(format!(
                    "unknown command {other:?} for {PROJECT_CONTRACT}"
                )));
            }
        }

        tracing::debug!(project = %project.name, user, "authorizations changed");
        Ok(vec![StateChange::update(
            target.id,
            PROJECT_CONTRACT,
            to_cbor(&project)?,
            target.darc,
        )])
    }

    fn delete(
        &self,
        _ctx: &ExecutionContext<'_>,
        _instruction: &Instruction,
    ) -> Result<Vec<StateChange>, MedchainLedgerError> {
        Err(MedchainLedgerError::Denied(
            "projects are never deleted".to_string(),
        ))
    }
}
