use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{Action, Expr};

/// The rule table of a DARC: one expression per action.
///
/// Setting a rule for an action that already has one replaces it.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rules(BTreeMap<Action, Expr>);

impl Rules {
    /// Empty rule table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Rules::set`].
    pub fn with(mut self, action: Action, expr: Expr) -> Self {
        self.set(action, expr);
        self
    }

    /// Set the expression for `action`, returning the one it replaced.
    pub fn set(&mut self, action: Action, expr: Expr) -> Option<Expr> {
        self.0.insert(action, expr)
    }

    /// Remove the rule for `action`.
    pub fn remove(&mut self, action: &Action) -> Option<Expr> {
        self.0.remove(action)
    }

    /// The expression governing `action`.
    pub fn get(&self, action: &Action) -> Option<&Expr> {
        self.0.get(action)
    }

    /// Whether a rule exists for `action`.
    pub fn contains(&self, action: &Action) -> bool {
        self.0.contains_key(action)
    }

    /// The set of actions with a rule.
    pub fn actions(&self) -> BTreeSet<&Action> {
        self.0.keys().collect()
    }

    /// Every action here also has a rule in `other`. Expressions are not
    /// compared.
    pub fn is_subset_of(&self, other: &Rules) -> bool {
        self.0.keys().all(|action| other.contains(action))
    }

    /// Iterate rules in action order.
    pub fn iter(&self) -> impl Iterator<Item = (&Action, &Expr)> {
        self.0.iter()
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// No rules at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Rules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.0.iter()).finish()
    }
}

impl FromIterator<(Action, Expr)> for Rules {
    fn from_iter<T: IntoIterator<Item = (Action, Expr)>>(iter: T) -> Self {
        Rules(iter.into_iter().collect())
    }
}
