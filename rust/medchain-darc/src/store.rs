use std::collections::{BTreeSet, HashMap};

use medchain_common::Blake3Hash;
use medchain_credentials::Identity;
use parking_lot::RwLock;

use crate::{Action, Darc, DarcResolver, Expr, MedchainDarcError, evolution::Evolution};

/// Read access to the rules governing projects.
pub trait RuleSource: DarcResolver {
    /// The expression for `action` in the DARC attached to `project`.
    fn lookup(&self, project: &str, action: &Action) -> Result<Expr, MedchainDarcError>;
}

#[derive(Default)]
struct RuleStoreState {
    versions: HashMap<Blake3Hash, Darc>,
    latest: HashMap<Blake3Hash, Blake3Hash>,
    projects: HashMap<String, Blake3Hash>,
    genesis: Option<Blake3Hash>,
}

impl DarcResolver for RuleStoreState {
    fn resolve(&self, base_id: &Blake3Hash) -> Option<Darc> {
        self.latest
            .get(base_id)
            .and_then(|id| self.versions.get(id))
            .cloned()
    }
}

/// Evolve-only store of DARC versions, with projects attached to DARCs by
/// base id.
///
/// Every version ever accepted stays addressable by its id; the latest
/// version of each DARC is what lookups and evaluations see. Evolution
/// checks and the switch to the new version happen under one write lock.
#[derive(Default)]
pub struct RuleStore {
    state: RwLock<RuleStoreState>,
}

impl RuleStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose first DARC is the genesis DARC, exempt from the subset
    /// rule of restricted evolution.
    pub fn with_genesis(genesis: Darc) -> Result<Self, MedchainDarcError> {
        let store = Self::new();
        let base_id = store.insert(genesis)?;
        store.state.write().genesis = Some(base_id);
        Ok(store)
    }

    /// Add a new DARC. Only version 0 may be inserted; returns its base id.
    pub fn insert(&self, darc: Darc) -> Result<Blake3Hash, MedchainDarcError> {
        if darc.version() != 0 {
            return Err(MedchainDarcError::InvalidEvolution(format!(
                "cannot insert version {}",
                darc.version()
            )));
        }
        let id = darc.id()?;
        let mut state = self.state.write();
        if state.latest.contains_key(&id) {
            return Err(MedchainDarcError::InvalidEvolution(format!("{id} already exists")));
        }
        state.versions.insert(id, darc);
        state.latest.insert(id, id);
        Ok(id)
    }

    /// Attach `project` to the DARC with `base_id`.
    pub fn attach(&self, project: &str, base_id: Blake3Hash) -> Result<(), MedchainDarcError> {
        let mut state = self.state.write();
        if !state.latest.contains_key(&base_id) {
            return Err(MedchainDarcError::NotFound(format!("darc {base_id}")));
        }
        state.projects.insert(project.to_string(), base_id);
        Ok(())
    }

    /// Latest version of a DARC.
    pub fn latest(&self, base_id: &Blake3Hash) -> Option<Darc> {
        self.state.read().resolve(base_id)
    }

    /// A specific version by its id.
    pub fn version(&self, id: &Blake3Hash) -> Option<Darc> {
        self.state.read().versions.get(id).cloned()
    }

    /// Replace the latest version of `base_id` with `proposed`, if the
    /// evolution tier allows it for `signers`.
    pub fn evolve(
        &self,
        base_id: &Blake3Hash,
        proposed: Darc,
        evolution: Evolution,
        signers: &BTreeSet<Identity>,
    ) -> Result<(), MedchainDarcError> {
        let mut state = self.state.write();
        let current = state
            .resolve(base_id)
            .ok_or_else(|| MedchainDarcError::NotFound(format!("darc {base_id}")))?;
        let genesis = state.genesis == Some(*base_id);

        evolution.check(&current, &proposed, signers, &*state, genesis)?;

        let id = proposed.id()?;
        tracing::info!(darc = %base_id, version = proposed.version(), ?evolution, "darc evolved");
        state.versions.insert(id, proposed);
        state.latest.insert(*base_id, id);
        Ok(())
    }

    /// Every version of a DARC, newest first.
    pub fn history(&self, base_id: &Blake3Hash) -> Result<Vec<Darc>, MedchainDarcError> {
        let state = self.state.read();
        let mut cursor = state.latest.get(base_id).copied();
        let mut versions = Vec::new();

        while let Some(id) = cursor {
            let darc = state
                .versions
                .get(&id)
                .ok_or_else(|| MedchainDarcError::NotFound(format!("darc version {id}")))?;
            cursor = darc.prev_id();
            versions.push(darc.clone());
        }

        if versions.is_empty() {
            return Err(MedchainDarcError::NotFound(format!("darc {base_id}")));
        }
        Ok(versions)
    }
}

impl DarcResolver for RuleStore {
    fn resolve(&self, base_id: &Blake3Hash) -> Option<Darc> {
        self.latest(base_id)
    }
}

impl RuleSource for RuleStore {
    fn lookup(&self, project: &str, action: &Action) -> Result<Expr, MedchainDarcError> {
        let state = self.state.read();
        let base_id = state
            .projects
            .get(project)
            .ok_or_else(|| MedchainDarcError::NotFound(format!("project {project}")))?;
        let darc = state
            .resolve(base_id)
            .ok_or_else(|| MedchainDarcError::NotFound(format!("darc {base_id}")))?;
        darc.rules()
            .get(action)
            .cloned()
            .ok_or_else(|| MedchainDarcError::NotFound(format!("{action} in project {project}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Rules,
        evolution::{evolve_action, evolve_unrestricted_action},
    };
    use medchain_credentials::{Ed25519Signer, Principal};
    use pretty_assertions::assert_eq;

    fn id(seed: u8) -> Identity {
        Ed25519Signer::from_seed([seed; 32]).identity()
    }

    fn project_darc(admin: &Identity, user: &Identity) -> Darc {
        Darc::new(
            "project A",
            Rules::new()
                .with(evolve_action(), Expr::identity(admin.clone()))
                .with(evolve_unrestricted_action(), Expr::identity(admin.clone()))
                .with(Action::invoke("medchain", "count_global"), Expr::identity(user.clone())),
        )
    }

    #[test_log::test]
    fn it_looks_up_project_rules() -> anyhow::Result<()> {
        let (admin, user) = (id(1), id(2));
        let store = RuleStore::new();
        let base = store.insert(project_darc(&admin, &user))?;
        store.attach("A", base)?;

        assert_eq!(
            store.lookup("A", &Action::invoke("medchain", "count_global"))?,
            Expr::identity(user)
        );
        assert!(matches!(
            store.lookup("A", &Action::invoke("medchain", "patient_list")),
            Err(MedchainDarcError::NotFound(_))
        ));
        assert!(matches!(
            store.lookup("B", &Action::invoke("medchain", "count_global")),
            Err(MedchainDarcError::NotFound(_))
        ));
        Ok(())
    }

    #[test_log::test]
    fn it_bumps_version_and_keeps_history() -> anyhow::Result<()> {
        let (admin, user, other) = (id(1), id(2), id(3));
        let store = RuleStore::new();
        let genesis = project_darc(&admin, &user);
        let base = store.insert(genesis.clone())?;
        store.attach("A", base)?;

        let mut rules = genesis.rules().clone();
        rules.set(Action::invoke("medchain", "count_global"), Expr::identity(other.clone()));
        let next = genesis.evolve_to(rules)?;
        let signers = BTreeSet::from([admin.clone()]);
        store.evolve(&base, next.clone(), Evolution::Restricted, &signers)?;

        assert_eq!(store.latest(&base), Some(next.clone()));
        assert_eq!(
            store.lookup("A", &Action::invoke("medchain", "count_global"))?,
            Expr::identity(other)
        );
        assert_eq!(store.history(&base)?, vec![next.clone(), genesis.clone()]);

        // A second proposal built on the stale version is refused.
        let stale = genesis.evolve_to(genesis.rules().clone())?;
        assert!(store.evolve(&base, stale, Evolution::Restricted, &signers).is_err());
        assert_eq!(store.latest(&base).map(|darc| darc.version()), Some(1));
        Ok(())
    }

    #[test]
    fn it_denies_evolution_by_strangers() -> anyhow::Result<()> {
        let (admin, user) = (id(1), id(2));
        let store = RuleStore::new();
        let genesis = project_darc(&admin, &user);
        let base = store.insert(genesis.clone())?;

        let next = genesis.evolve_to(Rules::new())?;
        let result = store.evolve(&base, next, Evolution::Unrestricted, &BTreeSet::from([user]));
        assert!(matches!(result, Err(MedchainDarcError::Denied(_))));
        assert_eq!(store.history(&base)?.len(), 1);
        Ok(())
    }

    #[test]
    fn genesis_is_exempt_from_the_subset_rule() -> anyhow::Result<()> {
        let (admin, user) = (id(1), id(2));
        let genesis = project_darc(&admin, &user);
        let store = RuleStore::with_genesis(genesis.clone())?;
        let base = genesis.base_id()?;

        let wider = genesis
            .rules()
            .clone()
            .with(Action::spawn("project"), Expr::identity(admin.clone()));
        store.evolve(
            &base,
            genesis.evolve_to(wider)?,
            Evolution::Restricted,
            &BTreeSet::from([admin]),
        )?;
        Ok(())
    }
}
