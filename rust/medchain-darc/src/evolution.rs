//! Controlled evolution of DARCs.
//!
//! A plain DARC evolves whenever its `invoke:darc.evolve` rule is satisfied.
//! A secure DARC has two tiers:
//!
//! - `invoke:secure_darc.evolve` (restricted) may narrow or reassign
//!   existing rules. Outside the genesis DARC it may not introduce new
//!   actions, and it may never alter the `evolve_unrestricted` rule.
//! - `invoke:secure_darc.evolve_unrestricted` may change anything.
//!
//! Children spawned from a secure DARC may never carry `spawn:secure_darc`.

use std::collections::BTreeSet;

use medchain_credentials::Identity;

use crate::{Action, Darc, DarcResolver, MedchainDarcError, Rules};

/// Contract tag of plain DARCs.
pub const DARC_CONTRACT: &str = "darc";

/// Contract tag of secure DARCs.
pub const SECURE_DARC_CONTRACT: &str = "secure_darc";

/// `invoke:darc.evolve`
pub fn plain_evolve_action() -> Action {
    Action::invoke(DARC_CONTRACT, "evolve")
}

/// `invoke:secure_darc.evolve`
pub fn evolve_action() -> Action {
    Action::invoke(SECURE_DARC_CONTRACT, "evolve")
}

/// `invoke:secure_darc.evolve_unrestricted`
pub fn evolve_unrestricted_action() -> Action {
    Action::invoke(SECURE_DARC_CONTRACT, "evolve_unrestricted")
}

/// Which tier an evolution is checked under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evolution {
    /// Plain DARC evolution.
    Plain,
    /// Secure DARC, restricted tier.
    Restricted,
    /// Secure DARC, unrestricted tier.
    Unrestricted,
}

impl Evolution {
    /// Check `proposed` against `current` under this tier.
    ///
    /// `genesis` exempts the current DARC from the subset rule of the
    /// restricted tier.
    pub fn check(
        self,
        current: &Darc,
        proposed: &Darc,
        signers: &BTreeSet<Identity>,
        resolver: &dyn DarcResolver,
        genesis: bool,
    ) -> Result<(), MedchainDarcError> {
        match self {
            Evolution::Plain => evolve_plain(current, proposed, signers, resolver),
            Evolution::Restricted => {
                evolve_restricted(current, proposed, signers, resolver, genesis)
            }
            Evolution::Unrestricted => evolve_unrestricted(current, proposed, signers, resolver),
        }
    }
}

/// Fail with [`MedchainDarcError::Denied`] unless `signers` satisfy the
/// rule for `action` in `darc`. A missing rule denies.
pub fn authorize(
    darc: &Darc,
    action: &Action,
    signers: &BTreeSet<Identity>,
    resolver: &dyn DarcResolver,
) -> Result<(), MedchainDarcError> {
    let Some(expr) = darc.rules().get(action) else {
        return Err(MedchainDarcError::Denied(format!("no rule for {action}")));
    };
    if expr.evaluate(signers, resolver)? {
        Ok(())
    } else {
        Err(MedchainDarcError::Denied(format!(
            "signers do not satisfy {action}"
        )))
    }
}

/// Plain evolution: the evolve rule is satisfied and `proposed` is a
/// well-formed successor.
pub fn evolve_plain(
    current: &Darc,
    proposed: &Darc,
    signers: &BTreeSet<Identity>,
    resolver: &dyn DarcResolver,
) -> Result<(), MedchainDarcError> {
    authorize(current, &plain_evolve_action(), signers, resolver)?;
    current.check_successor(proposed)
}

/// Restricted evolution of a secure DARC.
pub fn evolve_restricted(
    current: &Darc,
    proposed: &Darc,
    signers: &BTreeSet<Identity>,
    resolver: &dyn DarcResolver,
    genesis: bool,
) -> Result<(), MedchainDarcError> {
    authorize(current, &evolve_action(), signers, resolver)?;
    current.check_successor(proposed)?;

    let base_id = current.base_id()?;
    if !genesis && !proposed.rules().is_subset_of(current.rules()) {
        tracing::warn!(darc = %base_id, "restricted evolution tried to add actions");
        return Err(MedchainDarcError::Denied(
            "restricted evolution cannot introduce new actions".to_string(),
        ));
    }

    let unrestricted = evolve_unrestricted_action();
    let before = current.rules().get(&unrestricted).map(|expr| expr.to_string());
    let after = proposed.rules().get(&unrestricted).map(|expr| expr.to_string());
    if before != after {
        tracing::warn!(darc = %base_id, "restricted evolution tried to change {unrestricted}");
        return Err(MedchainDarcError::Denied(format!(
            "restricted evolution cannot change {unrestricted}"
        )));
    }

    Ok(())
}

/// Unrestricted evolution of a secure DARC.
pub fn evolve_unrestricted(
    current: &Darc,
    proposed: &Darc,
    signers: &BTreeSet<Identity>,
    resolver: &dyn DarcResolver,
) -> Result<(), MedchainDarcError> {
    authorize(current, &evolve_unrestricted_action(), signers, resolver)?;
    current.check_successor(proposed)
}

/// A new secure child DARC at version 0.
///
/// Refused when `rules` would let anyone spawn another secure DARC.
pub fn spawn_child(description: &str, rules: Rules) -> Result<Darc, MedchainDarcError> {
    if rules.contains(&Action::spawn(SECURE_DARC_CONTRACT)) {
        return Err(MedchainDarcError::Denied(format!(
            "a secure DARC may not grant spawn:{SECURE_DARC_CONTRACT}"
        )));
    }
    Ok(Darc::new(description, rules))
}
