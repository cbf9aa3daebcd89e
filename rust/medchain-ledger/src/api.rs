use std::sync::Arc;

use async_trait::async_trait;
use medchain_credentials::Identity;
use tokio::sync::broadcast;

use crate::{Block, ClientTransaction, Instance, InstanceId, MedchainLedgerError, MemoryLedger, Proof};

/// The surface clients use to reach a ledger.
///
/// The in-memory ledger answers immediately; a networked implementation
/// would forward each call to a node.
#[async_trait]
pub trait LedgerApi: Send + Sync {
    /// Submit a signed transaction and wait until it is committed or
    /// rejected.
    async fn submit(&self, tx: ClientTransaction) -> Result<Block, MedchainLedgerError>;

    /// The committed instance at `id`.
    async fn instance(&self, id: &InstanceId) -> Result<Instance, MedchainLedgerError>;

    /// An inclusion proof for the instance at `id`.
    async fn proof(&self, id: &InstanceId) -> Result<Proof, MedchainLedgerError>;

    /// Last counter `identity` used.
    async fn signer_counter(&self, identity: &Identity) -> Result<u64, MedchainLedgerError>;

    /// The newest block.
    async fn latest_block(&self) -> Result<Block, MedchainLedgerError>;

    /// Blocks after `index` (all blocks when `None`), oldest first.
    async fn blocks_after(&self, index: Option<u64>) -> Result<Vec<Block>, MedchainLedgerError>;

    /// Receive blocks as they are committed.
    fn subscribe(&self) -> broadcast::Receiver<Block>;
}

#[async_trait]
impl LedgerApi for MemoryLedger {
    async fn submit(&self, tx: ClientTransaction) -> Result<Block, MedchainLedgerError> {
        MemoryLedger::submit(self, tx)
    }

    async fn instance(&self, id: &InstanceId) -> Result<Instance, MedchainLedgerError> {
        MemoryLedger::instance(self, id)
    }

    async fn proof(&self, id: &InstanceId) -> Result<Proof, MedchainLedgerError> {
        MemoryLedger::proof(self, id)
    }

    async fn signer_counter(&self, identity: &Identity) -> Result<u64, MedchainLedgerError> {
        Ok(MemoryLedger::signer_counter(self, identity))
    }

    async fn latest_block(&self) -> Result<Block, MedchainLedgerError> {
        MemoryLedger::latest_block(self)
    }

    async fn blocks_after(&self, index: Option<u64>) -> Result<Vec<Block>, MedchainLedgerError> {
        Ok(MemoryLedger::blocks_after(self, index))
    }

    fn subscribe(&self) -> broadcast::Receiver<Block> {
        MemoryLedger::subscribe(self)
    }
}

#[async_trait]
impl<T> LedgerApi for Arc<T>
where
    T: LedgerApi + ?Sized,
{
    async fn submit(&self, tx: ClientTransaction) -> Result<Block, MedchainLedgerError> {
        (**self).submit(tx).await
    }

    async fn instance(&self, id: &InstanceId) -> Result<Instance, MedchainLedgerError> {
        (**self).instance(id).await
    }

    async fn proof(&self, id: &InstanceId) -> Result<Proof, MedchainLedgerError> {
        (**self).proof(id).await
    }

    async fn signer_counter(&self, identity: &Identity) -> Result<u64, MedchainLedgerError> {
        (**self).signer_counter(identity).await
    }

    async fn latest_block(&self) -> Result<Block, MedchainLedgerError> {
        (**self).latest_block().await
    }

    async fn blocks_after(&self, index: Option<u64>) -> Result<Vec<Block>, MedchainLedgerError> {
        (**self).blocks_after(index).await
    }

    fn subscribe(&self) -> broadcast::Receiver<Block> {
        (**self).subscribe()
    }
}
