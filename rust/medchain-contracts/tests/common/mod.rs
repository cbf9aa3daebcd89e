#![allow(dead_code)]

use std::collections::HashMap;

use medchain_common::{Blake3Hash, from_cbor, to_cbor};
use medchain_contracts::{
    medchain::QueryContractState,
    project::Project,
    registry,
};
use medchain_credentials::{Authority, Ed25519Signer, Identity, Principal};
use medchain_darc::{
    Action, Darc, Expr, Rules,
    evolution::{evolve_action, evolve_unrestricted_action},
};
use medchain_ledger::{
    Arguments, Block, ChainConfig, ClientTransaction, GenesisConfig, InstanceId, Instruction,
    MedchainLedgerError, MemoryLedger,
};

pub fn signer(seed: u8) -> Ed25519Signer {
    Ed25519Signer::from_seed([seed; 32])
}

pub fn only(signer: &Ed25519Signer) -> Expr {
    Expr::identity(signer.identity())
}

pub fn any_of(signers: &[&Ed25519Signer]) -> Expr {
    Expr::any_of(signers.iter().map(|signer| signer.identity()))
        .expect("at least one signer")
}

/// A ledger whose genesis secure DARC is administered by `root`.
pub fn start(root: &Ed25519Signer) -> anyhow::Result<MemoryLedger> {
    let rules = Rules::new()
        .with(Action::spawn("secure_darc"), only(root))
        .with(Action::spawn("darc"), only(root))
        .with(evolve_action(), only(root))
        .with(evolve_unrestricted_action(), only(root));
    Ok(MemoryLedger::genesis(
        GenesisConfig::new("genesis", rules, "secure_darc"),
        registry(),
    )?)
}

pub fn genesis_darc(ledger: &MemoryLedger) -> anyhow::Result<Blake3Hash> {
    let config: ChainConfig = from_cbor(&ledger.instance(&InstanceId::CONFIG)?.value)?;
    Ok(config.genesis_darc)
}

/// Sign and submit `instructions` with every signer on each, using the next
/// counters the ledger expects.
pub fn submit(
    ledger: &MemoryLedger,
    signers: &[&Ed25519Signer],
    instructions: Vec<Instruction>,
) -> Result<Block, MedchainLedgerError> {
    let mut next: HashMap<Identity, u64> = HashMap::new();
    let instructions = instructions
        .into_iter()
        .map(|instruction| {
            let identities = signers
                .iter()
                .map(|signer| signer.identity())
                .collect::<Vec<_>>();
            let counters = identities
                .iter()
                .map(|identity| {
                    let counter = next
                        .entry(identity.clone())
                        .or_insert_with(|| ledger.signer_counter(identity));
                    *counter += 1;
                    *counter
                })
                .collect();
            instruction.with_signers(identities, counters)
        })
        .collect();

    let mut tx = ClientTransaction::new(instructions);
    let authorities = signers
        .iter()
        .map(|signer| *signer as &dyn Authority)
        .collect::<Vec<_>>();
    tx.sign(&authorities)?;
    ledger.submit(tx)
}

/// The instance created by the first change of `block`.
pub fn created(block: &Block) -> InstanceId {
    block.results[0].changes[0].instance
}

/// Spawn a secure DARC under `parent`.
pub fn spawn_secure_darc(
    ledger: &MemoryLedger,
    root: &Ed25519Signer,
    parent: &Blake3Hash,
    darc: &Darc,
) -> Result<Blake3Hash, MedchainLedgerError> {
    let spawn = Instruction::spawn(
        InstanceId::darc(parent),
        "secure_darc",
        Arguments::new().with("darc", to_cbor(darc)?),
    );
    let block = submit(ledger, &[root], vec![spawn])?;
    Ok(*created(&block).hash())
}

/// Everything the scenarios need about one project.
pub struct ProjectFixture {
    pub darc: Blake3Hash,
    pub project: InstanceId,
    pub store: InstanceId,
}

/// Project `name` under its own secure DARC: `root` administers it and
/// `user` may run `count_global` queries.
pub fn project(
    ledger: &MemoryLedger,
    root: &Ed25519Signer,
    user: &Ed25519Signer,
    name: &str,
) -> anyhow::Result<ProjectFixture> {
    let rules = Rules::new()
        .with(Action::spawn("project"), only(root))
        .with(Action::spawn("medchain"), only(root))
        .with(Action::spawn("deferred"), any_of(&[root, user]))
        .with(Action::invoke("project", "add"), only(root))
        .with(Action::invoke("project", "remove"), only(root))
        .with(Action::invoke("medchain", "submit"), any_of(&[root, user]))
        .with(Action::invoke("medchain", "update"), only(root))
        .with(Action::invoke("medchain", "verify_status"), any_of(&[root, user]))
        .with(Action::invoke("medchain", "count_global"), only(user))
        .with(Action::invoke("deferred", "add_signature"), any_of(&[root, user]))
        .with(Action::invoke("deferred", "execute"), any_of(&[root, user]))
        .with(Action::delete("medchain"), only(root))
        .with(evolve_action(), only(root))
        .with(evolve_unrestricted_action(), only(root));
    let darc = Darc::new(format!("project {name}"), rules);
    let darc = spawn_secure_darc(ledger, root, &genesis_darc(ledger)?, &darc)?;

    let spawn_project = Instruction::spawn(
        InstanceId::darc(&darc),
        "project",
        Arguments::new()
            .with("name", name)
            .with("description", format!("study {name}")),
    );
    let project = created(&submit(ledger, &[root], vec![spawn_project])?);

    let spawn_store = Instruction::spawn(project, "medchain", Arguments::new());
    let store = created(&submit(ledger, &[root], vec![spawn_store])?);

    Ok(ProjectFixture {
        darc,
        project,
        store,
    })
}

pub fn query(store: InstanceId, command: &str, query: &str) -> Instruction {
    Instruction::invoke(
        store,
        "medchain",
        command,
        Arguments::new().with("query", query),
    )
}

pub fn queries(ledger: &MemoryLedger, store: &InstanceId) -> anyhow::Result<QueryContractState> {
    Ok(QueryContractState::from_instance(&ledger.instance(store)?)?)
}

pub fn project_state(ledger: &MemoryLedger, project: &InstanceId) -> anyhow::Result<Project> {
    Ok(Project::from_instance(&ledger.instance(project)?)?)
}

pub fn darc(ledger: &MemoryLedger, base_id: &Blake3Hash) -> anyhow::Result<Darc> {
    Ok(from_cbor(&ledger.instance(&InstanceId::darc(base_id))?.value)?)
}
