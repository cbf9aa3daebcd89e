use medchain_common::{Blake3Hash, hash_cbor};
use medchain_darc::{Darc, Rules};
use serde::{Deserialize, Serialize};

use crate::MedchainLedgerError;

/// Contract tag of the configuration instance.
pub const CONFIG_CONTRACT: &str = "config";

fn default_max_instructions_per_tx() -> usize {
    32
}

fn default_darc_contract() -> String {
    "darc".to_string()
}

/// Everything needed to start a ledger.
///
/// Loadable from JSON:
///
/// ```json
/// {
///   "description": "genesis",
///   "rules": { "spawn:darc": "ed25519:..." },
///   "darc_contract": "secure_darc",
///   "max_instructions_per_tx": 32
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisConfig {
    /// Description of the genesis DARC
    pub description: String,
    /// Rules of the genesis DARC
    pub rules: Rules,
    /// Contract type the genesis DARC instance is owned by
    #[serde(default = "default_darc_contract")]
    pub darc_contract: String,
    /// Upper bound on instructions in one transaction
    #[serde(default = "default_max_instructions_per_tx")]
    pub max_instructions_per_tx: usize,
}

impl GenesisConfig {
    /// A configuration with default limits.
    pub fn new(description: &str, rules: Rules, darc_contract: &str) -> Self {
        GenesisConfig {
            description: description.to_string(),
            rules,
            darc_contract: darc_contract.to_string(),
            max_instructions_per_tx: default_max_instructions_per_tx(),
        }
    }

    /// Parse from JSON.
    pub fn from_json(json: &str) -> Result<Self, MedchainLedgerError> {
        serde_json::from_str(json)
            .map_err(|error| MedchainLedgerError::InvalidArgument(format!("genesis config: {error}")))
    }

    /// The genesis DARC this configuration describes.
    pub fn darc(&self) -> Darc {
        Darc::new(self.description.clone(), self.rules.clone())
    }
}

/// Value of the configuration instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Base id of the genesis DARC
    pub genesis_darc: Blake3Hash,
    /// Upper bound on instructions in one transaction
    pub max_instructions_per_tx: usize,
}

impl ChainConfig {
    pub(crate) fn from_genesis(genesis: &GenesisConfig) -> Result<Self, MedchainLedgerError> {
        Ok(ChainConfig {
            genesis_darc: genesis.darc().base_id()?,
            max_instructions_per_tx: genesis.max_instructions_per_tx,
        })
    }

    /// Id of the encoded configuration, used in logs.
    pub fn digest(&self) -> Result<Blake3Hash, MedchainLedgerError> {
        Ok(hash_cbor(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medchain_credentials::{Ed25519Signer, Principal};

    #[test]
    fn it_loads_from_json_with_defaults() {
        let admin = Ed25519Signer::from_seed([1; 32]).identity();
        let json = format!(
            r#"{{ "description": "genesis", "rules": {{ "spawn:darc": "{admin}" }} }}"#
        );
        let config = GenesisConfig::from_json(&json).unwrap();

        assert_eq!(config.darc_contract, "darc");
        assert_eq!(config.max_instructions_per_tx, 32);
        assert_eq!(config.rules.len(), 1);
        assert!(GenesisConfig::from_json(r#"{ "rules": {} }"#).is_err());
    }
}
