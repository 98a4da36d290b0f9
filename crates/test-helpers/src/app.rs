//! In-memory application handler.

use hearsay_proxy::{AppHandler, CommitResponse, ProxyError};
use hearsay_types::{Block, InternalTransactionReceipt};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

#[derive(Default)]
struct AppState {
    committed: Vec<Vec<u8>>,
    last_block_index: i64,
}

/// An [`AppHandler`] that accumulates committed transactions.
///
/// The state hash is a digest over every committed payload in order, so two
/// nodes that committed the same sequence agree on it. Snapshots serialize
/// the committed sequence; restore replaces it. Every membership transaction
/// is approved.
#[derive(Default)]
pub struct SimApp {
    state: Mutex<AppState>,
}

impl SimApp {
    /// Create an empty application.
    pub fn new() -> Self {
        Self::default()
    }

    /// Transactions committed so far, in order.
    pub fn committed(&self) -> Vec<Vec<u8>> {
        self.state.lock().committed.clone()
    }

    /// Index of the last committed block, or -1.
    pub fn last_block_index(&self) -> i64 {
        self.state.lock().last_block_index
    }

    fn state_hash(committed: &[Vec<u8>]) -> Vec<u8> {
        let mut hasher = Sha256::new();
        for tx in committed {
            hasher.update(tx);
        }
        hasher.finalize().to_vec()
    }
}

impl AppHandler for SimApp {
    fn commit(&self, block: Block) -> Result<CommitResponse, ProxyError> {
        let mut state = self.state.lock();
        state.committed.extend(block.transactions.iter().cloned());
        state.last_block_index = block.index;

        let receipts = block
            .internal_transactions
            .iter()
            .map(|tx| InternalTransactionReceipt {
                transaction: tx.clone(),
                approved: true,
            })
            .collect();

        Ok(CommitResponse {
            state_hash: Self::state_hash(&state.committed),
            internal_transaction_receipts: receipts,
        })
    }

    fn snapshot(&self, _block_index: i64) -> Result<Vec<u8>, ProxyError> {
        let state = self.state.lock();
        bincode::serialize(&state.committed).map_err(|e| ProxyError::CommitFailed(e.to_string()))
    }

    fn restore(&self, snapshot: &[u8]) -> Result<(), ProxyError> {
        let committed: Vec<Vec<u8>> = bincode::deserialize(snapshot)
            .map_err(|e| ProxyError::RestoreFailed(e.to_string()))?;
        self.state.lock().committed = committed;
        Ok(())
    }
}
