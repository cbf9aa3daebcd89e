//! Per-signer authorization of queries.
//!
//! A query `token:project:action` needs the rule for
//! `invoke:medchain.<action>` in the DARC of `project`. Each signer is
//! checked on their own against that rule; a missing rule or an evaluation
//! error counts as not authorized.

use std::collections::{BTreeMap, BTreeSet};

use medchain_credentials::Identity;
use medchain_darc::{Action, RuleSource};

use crate::{QueryId, medchain::QUERY_CONTRACT};

/// The DARC action guarding `query`.
pub fn query_action(query: &QueryId) -> Action {
    Action::invoke(QUERY_CONTRACT, query.action())
}

/// Decide, for every signer, whether they alone satisfy the rule for
/// `query`. No side effects.
pub fn authorize<R>(query: &QueryId, signers: &BTreeSet<Identity>, rules: &R) -> BTreeMap<Identity, bool>
where
    R: RuleSource,
{
    let action = query_action(query);
    let rule = match rules.lookup(query.project(), &action) {
        Ok(rule) => Some(rule),
        Err(error) => {
            tracing::debug!(%query, %error, "no rule, failing closed");
            None
        }
    };

    signers
        .iter()
        .map(|signer| {
            let allowed = rule.as_ref().is_some_and(|rule| {
                rule.evaluate(&BTreeSet::from([signer.clone()]), rules)
                    .unwrap_or(false)
            });
            (signer.clone(), allowed)
        })
        .collect()
}

/// True when there is at least one verdict and every verdict is positive.
pub fn unanimous(verdicts: &BTreeMap<Identity, bool>) -> bool {
    !verdicts.is_empty() && verdicts.values().all(|allowed| *allowed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use medchain_credentials::{Ed25519Signer, Principal};
    use medchain_darc::{Darc, Expr, RuleStore, Rules};

    fn id(seed: u8) -> Identity {
        Ed25519Signer::from_seed([seed; 32]).identity()
    }

    fn store(granted: &Identity) -> RuleStore {
        let rules = Rules::new().with(
            Action::invoke(QUERY_CONTRACT, "patient_list"),
            Expr::identity(granted.clone()),
        );
        let store = RuleStore::new();
        let base = store.insert(Darc::new("project A", rules)).unwrap();
        store.attach("A", base).unwrap();
        store
    }

    #[test]
    fn it_checks_each_signer_alone() {
        let (x, y) = (id(1), id(2));
        let rules = store(&x);
        let query = "q1:A:patient_list".parse().unwrap();

        let verdicts = authorize(&query, &BTreeSet::from([x.clone()]), &rules);
        assert!(unanimous(&verdicts));

        let verdicts = authorize(&query, &BTreeSet::from([x.clone(), y.clone()]), &rules);
        assert_eq!(verdicts.get(&x), Some(&true));
        assert_eq!(verdicts.get(&y), Some(&false));
        assert!(!unanimous(&verdicts));
    }

    #[test]
    fn it_fails_closed_without_a_rule() {
        let x = id(1);
        let rules = store(&x);
        let signers = BTreeSet::from([x.clone()]);

        for query in ["q2:A:count_global", "q3:B:patient_list"] {
            let verdicts = authorize(&query.parse().unwrap(), &signers, &rules);
            assert_eq!(verdicts.get(&x), Some(&false));
        }
        assert!(!unanimous(&BTreeMap::new()));
    }
}
