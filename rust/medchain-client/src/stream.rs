use std::collections::HashMap;

use async_stream::try_stream;
use futures_util::Stream;
use medchain_common::from_cbor;
use medchain_contracts::{
    QueryId, QueryStatus, QueryStore,
    medchain::{QUERY_CONTRACT, QueryContractState},
};
use medchain_ledger::{Block, InstanceId, LedgerApi, StateAction};
use tokio::sync::broadcast::error::RecvError;

use crate::MedchainClientError;

/// A committed change of one query's status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTransition {
    /// Block that committed the change
    pub block: u64,
    /// Query store the query lives in
    pub store: InstanceId,
    /// The query
    pub query: QueryId,
    /// Status before the block, `None` for a new record
    pub from: Option<QueryStatus>,
    /// Status after the block
    pub to: QueryStatus,
}

/// Tracks every query store's last committed records so that a block can be
/// turned into the transitions it made.
#[derive(Debug, Default)]
pub struct TransitionTracker {
    stores: HashMap<InstanceId, QueryStore>,
    last_block: Option<u64>,
}

impl TransitionTracker {
    /// A tracker that has seen no blocks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the last block applied.
    pub fn last_block(&self) -> Option<u64> {
        self.last_block
    }

    /// Apply `block` and return the transitions it committed, in change
    /// order. Blocks at or before [`Self::last_block`] yield nothing.
    pub fn apply(&mut self, block: &Block) -> Result<Vec<QueryTransition>, MedchainClientError> {
        if self.last_block.is_some_and(|last| block.index <= last) {
            return Ok(Vec::new());
        }
        self.last_block = Some(block.index);

        let mut transitions = Vec::new();
        for change in block.changes() {
            if change.contract != QUERY_CONTRACT {
                continue;
            }
            if change.action == StateAction::Remove {
                self.stores.remove(&change.instance);
                continue;
            }

            let state: QueryContractState = from_cbor(&change.value).map_err(|error| {
                MedchainClientError::Stream(format!(
                    "block {} carries an unreadable query store {}: {error}",
                    block.index, change.instance
                ))
            })?;
            let previous = self.stores.remove(&change.instance).unwrap_or_default();
            for query in state.queries.iter() {
                let from = previous.get(&query.id).map(|before| before.status);
                if from != Some(query.status) {
                    transitions.push(QueryTransition {
                        block: block.index,
                        store: change.instance,
                        query: query.id.clone(),
                        from,
                        to: query.status,
                    });
                }
            }
            self.stores.insert(change.instance, state.queries);
        }
        Ok(transitions)
    }
}

/// Every query status transition committed after block `last_seen`, in block
/// order, followed by new ones as they commit. `None` starts at genesis.
///
/// Blocks up to `last_seen` are replayed silently to learn the statuses they
/// left behind, so a client that reconnects with the last block it handled
/// sees neither gaps nor repeats. The stream ends when the ledger stops
/// publishing blocks.
pub fn query_transitions<L>(
    ledger: &L,
    last_seen: Option<u64>,
) -> impl Stream<Item = Result<QueryTransition, MedchainClientError>> + '_
where
    L: LedgerApi,
{
    try_stream! {
        let mut blocks = ledger.subscribe();
        let mut tracker = TransitionTracker::new();

        for block in ledger.blocks_after(None).await.map_err(MedchainClientError::from)? {
            let transitions = tracker.apply(&block)?;
            if last_seen.is_some_and(|seen| block.index <= seen) {
                continue;
            }
            for transition in transitions {
                yield transition;
            }
        }
        tracing::debug!(last_block = ?tracker.last_block(), "caught up, following new blocks");

        loop {
            match blocks.recv().await {
                Ok(block) => {
                    for transition in tracker.apply(&block)? {
                        yield transition;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "subscription lagged, catching up");
                    let missed = ledger
                        .blocks_after(tracker.last_block())
                        .await
                        .map_err(MedchainClientError::from)?;
                    for block in missed {
                        for transition in tracker.apply(&block)? {
                            yield transition;
                        }
                    }
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medchain_common::{NULL_BLAKE3_HASH, to_cbor};
    use medchain_ledger::{ClientTransaction, StateChange, TxResult};
    use pretty_assertions::assert_eq;

    fn block(index: u64, records: &[(&str, QueryStatus)]) -> anyhow::Result<Block> {
        let mut queries = QueryStore::new();
        for (id, status) in records {
            queries.update(id.parse()?, *status);
        }
        let state = QueryContractState {
            project: "A".to_string(),
            queries,
        };
        Ok(Block {
            index,
            previous: NULL_BLAKE3_HASH,
            results: vec![TxResult {
                transaction: ClientTransaction::new(Vec::new()),
                changes: vec![StateChange::update(
                    InstanceId::CONFIG,
                    QUERY_CONTRACT,
                    to_cbor(&state)?,
                    NULL_BLAKE3_HASH,
                )],
            }],
            state_root: NULL_BLAKE3_HASH,
        })
    }

    #[test]
    fn it_reports_only_changed_records_once() -> anyhow::Result<()> {
        let mut tracker = TransitionTracker::new();
        let first = block(1, &[("q1:A:count_global", QueryStatus::Submitted)])?;
        let second = block(
            2,
            &[
                ("q1:A:count_global", QueryStatus::Authorized),
                ("q2:A:patient_list", QueryStatus::Submitted),
            ],
        )?;

        assert_eq!(tracker.apply(&first)?.len(), 1);
        let transitions = tracker.apply(&second)?;
        assert_eq!(
            transitions
                .iter()
                .map(|transition| (transition.from, transition.to))
                .collect::<Vec<_>>(),
            vec![
                (Some(QueryStatus::Submitted), QueryStatus::Authorized),
                (None, QueryStatus::Submitted),
            ]
        );

        assert!(tracker.apply(&second)?.is_empty());
        assert!(tracker.apply(&first)?.is_empty());
        assert_eq!(tracker.last_block(), Some(2));
        Ok(())
    }

    #[test]
    fn it_fails_on_unreadable_query_stores() -> anyhow::Result<()> {
        let mut tracker = TransitionTracker::new();
        let mut broken = block(1, &[("q1:A:count_global", QueryStatus::Submitted)])?;
        broken.results[0].changes[0].value = vec![0xff, 0x00];

        assert!(matches!(
            tracker.apply(&broken),
            Err(MedchainClientError::Stream(_))
        ));
        Ok(())
    }
}
