use serde::{Deserialize, Serialize};

use crate::MedchainLedgerError;

/// One named argument of an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argument {
    /// Argument name
    pub name: String,
    /// Raw argument value
    #[serde(with = "serde_bytes")]
    pub value: Vec<u8>,
}

/// The named argument bag carried by spawn and invoke instructions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Arguments(Vec<Argument>);

impl Arguments {
    /// No arguments.
    pub fn new() -> Self {
        Self::default()
    }

    /// No arguments, usable in constant contexts.
    pub const fn empty() -> Self {
        Arguments(Vec::new())
    }

    /// Append an argument.
    pub fn with(mut self, name: &str, value: impl Into<Vec<u8>>) -> Self {
        self.0.push(Argument {
            name: name.to_string(),
            value: value.into(),
        });
        self
    }

    /// Value of the first argument called `name`.
    pub fn search(&self, name: &str) -> Option<&[u8]> {
        self.0
            .iter()
            .find(|argument| argument.name == name)
            .map(|argument| argument.value.as_slice())
    }

    /// Like [`Arguments::search`], but a missing argument is an error.
    pub fn require(&self, name: &str) -> Result<&[u8], MedchainLedgerError> {
        self.search(name)
            .ok_or_else(|| MedchainLedgerError::InvalidArgument(format!("missing argument '{name}'")))
    }

    /// A required argument decoded as UTF-8.
    pub fn require_str(&self, name: &str) -> Result<&str, MedchainLedgerError> {
        std::str::from_utf8(self.require(name)?)
            .map_err(|_| MedchainLedgerError::InvalidArgument(format!("argument '{name}' is not UTF-8")))
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Argument> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_finds_arguments_by_name() {
        let args = Arguments::new()
            .with("query", "q1:A:count_global")
            .with("status", "Submitted")
            .with("query", "shadowed");

        assert_eq!(args.require_str("query").unwrap(), "q1:A:count_global");
        assert_eq!(args.search("status"), Some(&b"Submitted"[..]));
        assert!(args.search("missing").is_none());
        assert!(matches!(
            args.require("missing"),
            Err(MedchainLedgerError::InvalidArgument(_))
        ));

        let binary = Arguments::new().with("raw", vec![0xff, 0xfe]);
        assert!(binary.require_str("raw").is_err());
    }
}
