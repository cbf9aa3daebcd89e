use std::collections::HashMap;

use medchain_common::{Blake3Hash, from_cbor, to_cbor};
use medchain_contracts::{
    Query, QueryId, QueryStatus,
    deferred::{
        DEFERRED_CONTRACT, DeferredProposal, EXPIRE_AT_ARG, IDENTITY_ARG, INSTRUCTION_ARG,
        REQUIRED_ARG, SIGNATURE_ARG,
    },
    medchain::{QUERY_ARG, QUERY_CONTRACT, QueryContractState, STATUS_ARG},
    project::{PROJECT_CONTRACT, Project},
};
use medchain_credentials::{Authority, Ed25519Signer, Identity, Principal};
use medchain_darc::{
    Darc, Rules,
    evolution::{DARC_CONTRACT, Evolution, SECURE_DARC_CONTRACT},
};
use medchain_ledger::{
    Arguments, Block, ClientTransaction, InstanceId, Instruction, LedgerApi, MedchainLedgerError,
    Proof,
};

use crate::{ClientConfig, MedchainClientError};

/// One client's view of a ledger: its signing keys and the signer counters
/// it last used.
///
/// Every mutating call signs with all of the session's signers and advances
/// each of their counters by one per instruction. A counter conflict makes
/// the session re-read its counters from the ledger and try again, up to
/// [`ClientConfig::max_commit_retries`] times.
#[derive(Debug)]
pub struct Session<L> {
    ledger: L,
    config: ClientConfig,
    signers: Vec<Ed25519Signer>,
    counters: HashMap<Identity, u64>,
}

impl<L> Session<L>
where
    L: LedgerApi,
{
    /// A session signing with `signers`. Counters start unknown; call
    /// [`Session::refresh_counters`] to pick them up from the ledger, or let
    /// the first conflict do it.
    pub fn new(ledger: L, config: ClientConfig, signers: Vec<Ed25519Signer>) -> Self {
        Session {
            ledger,
            config,
            signers,
            counters: HashMap::new(),
        }
    }

    /// The ledger this session talks to.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// The session's configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Identities of the session's signers, in signing order.
    pub fn identities(&self) -> Vec<Identity> {
        self.signers.iter().map(Principal::identity).collect()
    }

    /// Last counter the session used for `identity`.
    pub fn counter(&self, identity: &Identity) -> u64 {
        self.counters.get(identity).copied().unwrap_or(0)
    }

    /// Re-read every signer's counter from the ledger.
    pub async fn refresh_counters(&mut self) -> Result<(), MedchainClientError> {
        for identity in self.identities() {
            let counter = self.ledger.signer_counter(&identity).await?;
            self.counters.insert(identity, counter);
        }
        tracing::debug!(signers = self.signers.len(), "counters refreshed");
        Ok(())
    }

    fn sign(&self, instructions: &[Instruction]) -> Result<ClientTransaction, MedchainClientError> {
        let identities = self.identities();
        let mut next = identities
            .iter()
            .map(|identity| (identity.clone(), self.counter(identity)))
            .collect::<HashMap<_, _>>();

        let instructions = instructions
            .iter()
            .map(|instruction| {
                let counters = identities
                    .iter()
                    .map(|identity| {
                        let counter = next.entry(identity.clone()).or_default();
                        *counter += 1;
                        *counter
                    })
                    .collect();
                instruction.clone().with_signers(identities.clone(), counters)
            })
            .collect();

        let mut tx = ClientTransaction::new(instructions);
        let authorities = self
            .signers
            .iter()
            .map(|signer| signer as &dyn Authority)
            .collect::<Vec<_>>();
        tx.sign(&authorities)?;
        Ok(tx)
    }

    /// Sign and submit `instructions` as one transaction.
    pub async fn commit(
        &mut self,
        instructions: Vec<Instruction>,
    ) -> Result<Block, MedchainClientError> {
        let mut attempt = 0;
        loop {
            let tx = self.sign(&instructions)?;
            match self.ledger.submit(tx).await {
                Ok(block) => {
                    let used = instructions.len() as u64;
                    for identity in self.identities() {
                        *self.counters.entry(identity).or_default() += used;
                    }
                    return Ok(block);
                }
                Err(error) if error.is_retryable() && attempt < self.config.max_commit_retries => {
                    attempt += 1;
                    tracing::debug!(%error, attempt, "counter conflict, retrying");
                    self.refresh_counters().await?;
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    async fn commit_one(&mut self, instruction: Instruction) -> Result<Block, MedchainClientError> {
        self.commit(vec![instruction]).await
    }

    fn created(block: &Block) -> Result<InstanceId, MedchainClientError> {
        block
            .changes()
            .next()
            .map(|change| change.instance)
            .ok_or_else(|| {
                MedchainLedgerError::NotFound(format!("created instance in block {}", block.index))
                    .into()
            })
    }

    // DARCs

    /// Spawn `darc` under the DARC `parent`, owned by the secure DARC
    /// contract when `secure` is set. Returns the new base id.
    pub async fn spawn_darc(
        &mut self,
        parent: &Blake3Hash,
        darc: &Darc,
        secure: bool,
    ) -> Result<Blake3Hash, MedchainClientError> {
        let contract = if secure { SECURE_DARC_CONTRACT } else { DARC_CONTRACT };
        let spawn = Instruction::spawn(
            InstanceId::darc(parent),
            contract,
            Arguments::new().with("darc", to_cbor(darc)?),
        );
        let block = self.commit_one(spawn).await?;
        Ok(*Self::created(&block)?.hash())
    }

    /// The current version of the DARC `base_id`.
    pub async fn darc(&self, base_id: &Blake3Hash) -> Result<Darc, MedchainClientError> {
        let instance = self.ledger.instance(&InstanceId::darc(base_id)).await?;
        Ok(from_cbor(&instance.value)?)
    }

    /// Replace the rules of `base_id` under the given tier. Plain DARCs only
    /// accept [`Evolution::Plain`], secure ones only the other two.
    pub async fn evolve(
        &mut self,
        base_id: &Blake3Hash,
        tier: Evolution,
        rules: Rules,
    ) -> Result<Darc, MedchainClientError> {
        let current = self.darc(base_id).await?;
        let next = current.evolve_to(rules)?;
        let (contract, command) = match tier {
            Evolution::Plain => (DARC_CONTRACT, "evolve"),
            Evolution::Restricted => (SECURE_DARC_CONTRACT, "evolve"),
            Evolution::Unrestricted => (SECURE_DARC_CONTRACT, "evolve_unrestricted"),
        };
        let evolve = Instruction::invoke(
            InstanceId::darc(base_id),
            contract,
            command,
            Arguments::new().with("darc", to_cbor(&next)?),
        );
        self.commit_one(evolve).await?;
        Ok(next)
    }

    // Projects

    /// Spawn a project under the DARC `darc`.
    pub async fn spawn_project(
        &mut self,
        darc: &Blake3Hash,
        name: &str,
        description: &str,
    ) -> Result<InstanceId, MedchainClientError> {
        let spawn = Instruction::spawn(
            InstanceId::darc(darc),
            PROJECT_CONTRACT,
            Arguments::new()
                .with("name", name)
                .with("description", description),
        );
        Self::created(&self.commit_one(spawn).await?)
    }

    /// The project at `project`.
    pub async fn project(&self, project: &InstanceId) -> Result<Project, MedchainClientError> {
        Ok(Project::from_instance(&self.ledger.instance(project).await?)?)
    }

    /// Grant `user` every action of the comma separated `actions`.
    pub async fn add_authorization(
        &mut self,
        project: InstanceId,
        user: &str,
        actions: &str,
    ) -> Result<Block, MedchainClientError> {
        let add = Instruction::invoke(
            project,
            PROJECT_CONTRACT,
            "add",
            Arguments::new().with("user", user).with("actions", actions),
        );
        self.commit_one(add).await
    }

    /// Revoke one action from `user`.
    pub async fn remove_authorization(
        &mut self,
        project: InstanceId,
        user: &str,
        action: &str,
    ) -> Result<Block, MedchainClientError> {
        let remove = Instruction::invoke(
            project,
            PROJECT_CONTRACT,
            "remove",
            Arguments::new().with("user", user).with("action", action),
        );
        self.commit_one(remove).await
    }

    // Queries

    /// Spawn the query store of `project`.
    pub async fn spawn_query_store(
        &mut self,
        project: InstanceId,
    ) -> Result<InstanceId, MedchainClientError> {
        let spawn = Instruction::spawn(project, QUERY_CONTRACT, Arguments::new());
        Self::created(&self.commit_one(spawn).await?)
    }

    fn query_instruction(store: InstanceId, command: &str, id: &QueryId) -> Instruction {
        Instruction::invoke(
            store,
            QUERY_CONTRACT,
            command,
            Arguments::new().with(QUERY_ARG, id.as_str()),
        )
    }

    /// Record `id` as submitted.
    pub async fn submit_query(
        &mut self,
        store: InstanceId,
        id: &QueryId,
    ) -> Result<Block, MedchainClientError> {
        self.commit_one(Self::query_instruction(store, "submit", id))
            .await
    }

    /// Decide `id` with the session's signers and return the recorded
    /// status.
    pub async fn decide(
        &mut self,
        store: InstanceId,
        id: &QueryId,
    ) -> Result<QueryStatus, MedchainClientError> {
        self.commit_one(Self::query_instruction(store, "decide", id))
            .await?;
        self.query_status(&store, id).await?.ok_or_else(|| {
            MedchainLedgerError::NotFound(format!("query {id} after decide")).into()
        })
    }

    /// Move `id` to `status`.
    pub async fn update(
        &mut self,
        store: InstanceId,
        id: &QueryId,
        status: QueryStatus,
    ) -> Result<Block, MedchainClientError> {
        let update = Instruction::invoke(
            store,
            QUERY_CONTRACT,
            "update",
            Arguments::new()
                .with(QUERY_ARG, id.as_str())
                .with(STATUS_ARG, status.to_string()),
        );
        self.commit_one(update).await
    }

    /// Record `status` through the query's own action command, which the
    /// project DARC authorizes per action.
    pub async fn record_action(
        &mut self,
        store: InstanceId,
        id: &QueryId,
        status: QueryStatus,
    ) -> Result<Block, MedchainClientError> {
        let record = Instruction::invoke(
            store,
            QUERY_CONTRACT,
            id.action(),
            Arguments::new()
                .with(QUERY_ARG, id.as_str())
                .with(STATUS_ARG, status.to_string()),
        );
        self.commit_one(record).await
    }

    /// Succeeds only if `id` is recorded as authorized.
    pub async fn verify_status(
        &mut self,
        store: InstanceId,
        id: &QueryId,
    ) -> Result<(), MedchainClientError> {
        self.commit_one(Self::query_instruction(store, "verify_status", id))
            .await?;
        Ok(())
    }

    /// The committed records of `store`.
    pub async fn queries(
        &self,
        store: &InstanceId,
    ) -> Result<QueryContractState, MedchainClientError> {
        Ok(QueryContractState::from_instance(
            &self.ledger.instance(store).await?,
        )?)
    }

    /// The committed status of `id`, `None` if it is not recorded.
    pub async fn query_status(
        &self,
        store: &InstanceId,
        id: &QueryId,
    ) -> Result<Option<QueryStatus>, MedchainClientError> {
        Ok(self
            .queries(store)
            .await?
            .queries
            .get(id)
            .map(|query| query.status))
    }

    /// Committed records of `store` with `status`.
    pub async fn search(
        &self,
        store: &InstanceId,
        status: QueryStatus,
    ) -> Result<Vec<Query>, MedchainClientError> {
        Ok(self
            .queries(store)
            .await?
            .queries
            .search(status)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Poll until `id` reaches `expected`, for at most
    /// [`ClientConfig::wait_timeout_ms`]. Giving up leaves state untouched.
    pub async fn wait_for_status(
        &self,
        store: &InstanceId,
        id: &QueryId,
        expected: QueryStatus,
    ) -> Result<(), MedchainClientError> {
        match tokio::time::timeout(
            self.config.wait_timeout(),
            self.poll_status(store, id, expected),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!(query = %id, %expected, "gave up waiting");
                Err(MedchainClientError::Timeout(format!(
                    "query {id} did not reach {expected} within {}ms",
                    self.config.wait_timeout_ms
                )))
            }
        }
    }

    async fn poll_status(
        &self,
        store: &InstanceId,
        id: &QueryId,
        expected: QueryStatus,
    ) -> Result<(), MedchainClientError> {
        loop {
            if self.query_status(store, id).await? == Some(expected) {
                return Ok(());
            }
            tokio::time::sleep(self.config.poll_interval()).await;
        }
    }

    // Deferred signing

    /// Propose `instruction` for co-signing by `required`, under the DARC
    /// `darc`. The proposal lapses at block height `expire_at`.
    pub async fn propose(
        &mut self,
        darc: &Blake3Hash,
        instruction: &Instruction,
        required: &[Identity],
        expire_at: u64,
    ) -> Result<InstanceId, MedchainClientError> {
        let required = required
            .iter()
            .map(Identity::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let spawn = Instruction::spawn(
            InstanceId::darc(darc),
            DEFERRED_CONTRACT,
            Arguments::new()
                .with(INSTRUCTION_ARG, to_cbor(instruction)?)
                .with(REQUIRED_ARG, required)
                .with(EXPIRE_AT_ARG, expire_at.to_string()),
        );
        Self::created(&self.commit_one(spawn).await?)
    }

    /// The committed proposal at `proposal`.
    pub async fn proposal(
        &self,
        proposal: &InstanceId,
    ) -> Result<DeferredProposal, MedchainClientError> {
        let instance = self.ledger.instance(proposal).await?;
        Ok(from_cbor(&instance.value)?)
    }

    /// Whether every required identity signed `proposal`.
    pub async fn is_ready(&self, proposal: &InstanceId) -> Result<bool, MedchainClientError> {
        Ok(self.proposal(proposal).await?.is_ready())
    }

    /// Sign `proposal` with `signer` and submit the signature with the
    /// session's own signers.
    pub async fn add_signature(
        &mut self,
        proposal: InstanceId,
        signer: &dyn Authority,
    ) -> Result<Block, MedchainClientError> {
        let digest = self.proposal(&proposal).await?.digest;
        let signature = signer.sign(digest.as_ref())?;
        let add = Instruction::invoke(
            proposal,
            DEFERRED_CONTRACT,
            "add_signature",
            Arguments::new()
                .with(IDENTITY_ARG, signer.identity().as_str())
                .with(SIGNATURE_ARG, signature),
        );
        self.commit_one(add).await
    }

    /// Execute a ready proposal.
    pub async fn execute(&mut self, proposal: InstanceId) -> Result<Block, MedchainClientError> {
        let execute = Instruction::invoke(proposal, DEFERRED_CONTRACT, "execute", Arguments::new());
        self.commit_one(execute).await
    }

    // Proofs

    /// An inclusion proof for `id`, checked against the block it names.
    pub async fn proof(&self, id: &InstanceId) -> Result<Proof, MedchainClientError> {
        let proof = self.ledger.proof(id).await?;
        let blocks = self.ledger.blocks_after(proof.block.checked_sub(1)).await?;
        let block = blocks.first().ok_or_else(|| {
            MedchainLedgerError::NotFound(format!("block {}", proof.block))
        })?;
        proof.verify_against(block)?;
        Ok(proof)
    }
}
