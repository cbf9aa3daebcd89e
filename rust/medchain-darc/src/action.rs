use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::MedchainDarcError;

/// The action whose rule decides whether a signer set counts as a `darc:`
/// identity.
pub const SIGN_ACTION: &str = "_sign";

/// A rule key.
///
/// Actions are `spawn:<contract>`, `invoke:<contract>.<command>`,
/// `delete:<contract>` or the special [`SIGN_ACTION`].
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Action(String);

impl Action {
    /// `spawn:<contract>`
    pub fn spawn(contract: &str) -> Self {
        Action(format!("spawn:{contract}"))
    }

    /// `invoke:<contract>.<command>`
    pub fn invoke(contract: &str, command: &str) -> Self {
        Action(format!("invoke:{contract}.{command}"))
    }

    /// `delete:<contract>`
    pub fn delete(contract: &str) -> Self {
        Action(format!("delete:{contract}"))
    }

    /// The `_sign` action.
    pub fn sign() -> Self {
        Action(SIGN_ACTION.to_string())
    }

    /// Textual form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Action {
    type Err = MedchainDarcError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value == SIGN_ACTION {
            return Ok(Action::sign());
        }

        let invalid = || MedchainDarcError::InvalidAction(value.to_string());
        let (verb, target) = value.split_once(':').ok_or_else(invalid)?;
        if target.is_empty() || target.contains(char::is_whitespace) {
            return Err(invalid());
        }

        match verb {
            "spawn" | "delete" => Ok(Action(value.to_string())),
            "invoke" => match target.split_once('.') {
                Some((contract, command)) if !contract.is_empty() && !command.is_empty() => {
                    Ok(Action(value.to_string()))
                }
                _ => Err(invalid()),
            },
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Action({})", self.0)
    }
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
