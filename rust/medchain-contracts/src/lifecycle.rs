//! The query status state machine.
//!
//! ```text
//! Submitted -> Authorized | Rejected
//! Authorized -> Executed
//! ```
//!
//! Deciding again rewrites the status it already has, so a repeated decide
//! with the same inputs is harmless. Nothing leaves `Rejected` or
//! `Executed`. An id the store has never seen counts as `Submitted`.

use std::collections::BTreeSet;

use medchain_credentials::Identity;
use medchain_darc::RuleSource;
use medchain_ledger::MedchainLedgerError;

use crate::{
    QueryId, QueryStatus, QueryStore,
    evaluator::{authorize, unanimous},
};

/// Whether `from -> to` is allowed. `None` means the query is not recorded
/// yet.
pub fn can_transition(from: Option<QueryStatus>, to: QueryStatus) -> bool {
    use QueryStatus::*;

    matches!(
        (from, to),
        (None, Submitted | Authorized | Rejected)
            | (Some(Submitted), Authorized | Rejected)
            | (Some(Authorized), Authorized | Executed)
            | (Some(Rejected), Rejected)
    )
}

/// Record a new query; fails if the id is already present.
pub fn spawn(
    store: &mut QueryStore,
    id: QueryId,
    status: QueryStatus,
) -> Result<(), MedchainLedgerError> {
    store.spawn(id.clone(), status)?;
    tracing::info!(query = %id, %status, "query recorded");
    Ok(())
}

/// Move `id` to `status`, checking the transition table first.
pub fn update(
    store: &mut QueryStore,
    id: QueryId,
    status: QueryStatus,
) -> Result<(), MedchainLedgerError> {
    let current = store.get(&id).map(|query| query.status);
    if !can_transition(current, status) {
        let from = current.map_or("unrecorded".to_string(), |status| status.to_string());
        tracing::warn!(query = %id, %from, to = %status, "transition refused");
        return Err(MedchainLedgerError::InvalidTransition(format!(
            "query {id} cannot go from {from} to {status}"
        )));
    }

    store.update(id.clone(), status);
    tracing::info!(query = %id, %status, "query status updated");
    Ok(())
}

/// Authorize every signer for `id` and record `Authorized` if all pass,
/// `Rejected` otherwise.
pub fn decide<R>(
    store: &mut QueryStore,
    id: QueryId,
    signers: &BTreeSet<Identity>,
    rules: &R,
) -> Result<QueryStatus, MedchainLedgerError>
where
    R: RuleSource,
{
    let verdicts = authorize(&id, signers, rules);
    let status = if unanimous(&verdicts) {
        QueryStatus::Authorized
    } else {
        QueryStatus::Rejected
    };

    tracing::debug!(
        query = %id,
        signers = verdicts.len(),
        denied = verdicts.values().filter(|allowed| !**allowed).count(),
        "query decided"
    );
    update(store, id, status)?;
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::medchain::QUERY_CONTRACT;
    use medchain_credentials::{Ed25519Signer, Principal};
    use medchain_darc::{Action, Darc, Expr, RuleStore, Rules};
    use QueryStatus::*;

    fn id(seed: u8) -> Identity {
        Ed25519Signer::from_seed([seed; 32]).identity()
    }

    fn query(text: &str) -> QueryId {
        text.parse().unwrap()
    }

    fn rules(k: &Identity) -> RuleStore {
        let store = RuleStore::new();
        let darc = Darc::new(
            "A",
            Rules::new().with(Action::invoke(QUERY_CONTRACT, "count_global"), Expr::identity(k.clone())),
        );
        let base = store.insert(darc).unwrap();
        store.attach("A", base).unwrap();
        store
    }

    #[test]
    fn it_follows_the_transition_table() {
        let allowed = [
            (None, Submitted),
            (Some(Submitted), Authorized),
            (Some(Submitted), Rejected),
            (Some(Authorized), Executed),
            (Some(Authorized), Authorized),
            (Some(Rejected), Rejected),
        ];
        for from in [None, Some(Submitted), Some(Authorized), Some(Rejected), Some(Executed)] {
            for to in [Submitted, Authorized, Rejected, Executed] {
                let expected = allowed.contains(&(from, to))
                    || (from.is_none() && matches!(to, Authorized | Rejected));
                assert_eq!(can_transition(from, to), expected, "{from:?} -> {to:?}");
            }
        }
    }

    #[test_log::test]
    fn decide_authorizes_only_when_every_signer_passes() -> anyhow::Result<()> {
        let (k, stranger) = (id(1), id(2));
        let rules = rules(&k);
        let mut store = QueryStore::new();

        spawn(&mut store, query("q1:A:count_global"), Submitted)?;
        spawn(&mut store, query("q2:A:patient_list"), Submitted)?;
        spawn(&mut store, query("q3:A:count_global"), Submitted)?;

        let only_k = BTreeSet::from([k.clone()]);
        assert_eq!(decide(&mut store, query("q1:A:count_global"), &only_k, &rules)?, Authorized);
        assert_eq!(decide(&mut store, query("q2:A:patient_list"), &only_k, &rules)?, Rejected);

        let both = BTreeSet::from([k, stranger]);
        assert_eq!(decide(&mut store, query("q3:A:count_global"), &both, &rules)?, Rejected);
        Ok(())
    }

    #[test_log::test]
    fn deciding_twice_rewrites_the_same_record() -> anyhow::Result<()> {
        let k = id(1);
        let rules = rules(&k);
        let mut store = QueryStore::new();
        let signers = BTreeSet::from([k]);

        spawn(&mut store, query("q2:A:patient_list"), Submitted)?;
        for _ in 0..2 {
            assert_eq!(decide(&mut store, query("q2:A:patient_list"), &signers, &rules)?, Rejected);
        }
        assert_eq!(store.len(), 1);
        Ok(())
    }

    #[test]
    fn terminal_states_refuse_changes() -> anyhow::Result<()> {
        let mut store = QueryStore::new();
        spawn(&mut store, query("q1:A:count_global"), Submitted)?;
        update(&mut store, query("q1:A:count_global"), Authorized)?;
        update(&mut store, query("q1:A:count_global"), Executed)?;

        for status in [Submitted, Authorized, Rejected, Executed] {
            assert!(matches!(
                update(&mut store, query("q1:A:count_global"), status),
                Err(MedchainLedgerError::InvalidTransition(_))
            ));
        }
        assert!(update(&mut store, query("q9:A:count_global"), Executed).is_err());
        Ok(())
    }
}
