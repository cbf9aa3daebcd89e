use medchain_common::{Blake3Hash, hash_cbor};
use serde::{Deserialize, Serialize};

use crate::{ClientTransaction, MedchainLedgerError, StateChange};

/// A committed transaction and the changes it made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResult {
    /// The transaction as submitted
    pub transaction: ClientTransaction,
    /// State changes in application order
    pub changes: Vec<StateChange>,
}

/// One committed step of the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the chain; the genesis block is 0
    pub index: u64,
    /// Id of the block before this one (null for genesis)
    pub previous: Blake3Hash,
    /// Committed transactions
    pub results: Vec<TxResult>,
    /// Root over all instances after this block
    pub state_root: Blake3Hash,
}

impl Block {
    /// Id of this block.
    pub fn id(&self) -> Result<Blake3Hash, MedchainLedgerError> {
        Ok(hash_cbor(self)?)
    }

    /// Every state change in the block, in order.
    pub fn changes(&self) -> impl Iterator<Item = &StateChange> {
        self.results.iter().flat_map(|result| result.changes.iter())
    }
}
