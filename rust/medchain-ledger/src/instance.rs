use std::{fmt, str::FromStr};

use medchain_common::{Blake3Hash, InvalidHash, NULL_BLAKE3_HASH};
use serde::{Deserialize, Serialize};

/// Key of an instance in ledger state.
///
/// DARC instances live at the id equal to the DARC's base id; the chain
/// configuration lives at [`InstanceId::CONFIG`].
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(Blake3Hash);

impl InstanceId {
    /// The all-zero id holding the chain configuration.
    pub const CONFIG: InstanceId = InstanceId(NULL_BLAKE3_HASH);

    /// Id of the instance holding the DARC with `base_id`.
    pub fn darc(base_id: &Blake3Hash) -> Self {
        InstanceId(*base_id)
    }

    /// Underlying hash.
    pub fn hash(&self) -> &Blake3Hash {
        &self.0
    }
}

impl From<Blake3Hash> for InstanceId {
    fn from(value: Blake3Hash) -> Self {
        InstanceId(value)
    }
}

impl FromStr for InstanceId {
    type Err = InvalidHash;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(InstanceId(value.parse()?))
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstanceId({:?})", self.0)
    }
}

/// A versioned unit of ledger state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Where the instance lives
    pub id: InstanceId,
    /// Type tag of the contract that owns the instance
    pub contract: String,
    /// Contract-defined encoded value
    #[serde(with = "serde_bytes")]
    pub value: Vec<u8>,
    /// Base id of the DARC governing the instance
    pub darc: Blake3Hash,
    /// Bumped on every update, starting at 0
    pub version: u64,
}
