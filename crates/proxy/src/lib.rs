//! Application proxy contract.
//!
//! The proxy is the node's bidirectional seam to the application it orders
//! transactions for:
//!
//! - **Inbound to the node**: [`AppProxy::submit_ch`] and
//!   [`AppProxy::submit_internal_ch`] deliver user and membership
//!   transactions for the node's background intake.
//! - **Outbound from the node**: [`AppProxy::commit_block`] is invoked when
//!   consensus finalizes a block; [`AppProxy::get_snapshot`] and
//!   [`AppProxy::restore`] support fast-forward catchup.
//!
//! [`InmemProxy`] adapts any [`AppHandler`] (the application's three
//! callbacks) into a full proxy with channel-backed submission, for
//! applications living in the same process as the node.

use crossbeam::channel::{unbounded, Receiver, Sender};
use hearsay_types::{Block, InternalTransaction, InternalTransactionReceipt};
use thiserror::Error;
use tracing::debug;

/// Errors surfaced by the application side of the proxy.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The application rejected or failed to apply a committed block.
    #[error("commit failed: {0}")]
    CommitFailed(String),

    /// No snapshot exists for the requested block.
    #[error("no snapshot for block {0}")]
    NoSnapshot(i64),

    /// The application could not restore from the given snapshot.
    #[error("restore failed: {0}")]
    RestoreFailed(String),

    /// The application has gone away.
    #[error("application disconnected")]
    Disconnected,
}

/// What the application returns for a committed block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommitResponse {
    /// Application state hash after applying the block.
    pub state_hash: Vec<u8>,
    /// Verdicts on the block's membership transactions, in block order.
    pub internal_transaction_receipts: Vec<InternalTransactionReceipt>,
}

/// The application's three callbacks.
pub trait AppHandler: Send + Sync + 'static {
    /// Apply a finalized block and return the resulting state hash plus
    /// receipts for its membership transactions.
    fn commit(&self, block: Block) -> Result<CommitResponse, ProxyError>;

    /// A snapshot of application state as of `block_index`.
    fn snapshot(&self, block_index: i64) -> Result<Vec<u8>, ProxyError>;

    /// Replace application state from a snapshot.
    fn restore(&self, snapshot: &[u8]) -> Result<(), ProxyError>;
}

/// The node's view of the application.
pub trait AppProxy: Send + Sync + 'static {
    /// Channel delivering user transaction payloads.
    fn submit_ch(&self) -> Receiver<Vec<u8>>;

    /// Channel delivering membership transactions.
    fn submit_internal_ch(&self) -> Receiver<InternalTransaction>;

    /// Called by the consensus engine when a block is finalized.
    fn commit_block(&self, block: Block) -> Result<CommitResponse, ProxyError>;

    /// Application snapshot at `block_index`, for serving fast-forwards.
    fn get_snapshot(&self, block_index: i64) -> Result<Vec<u8>, ProxyError>;

    /// Restore application state during catchup.
    fn restore(&self, snapshot: &[u8]) -> Result<(), ProxyError>;
}

impl<P: AppProxy> AppProxy for std::sync::Arc<P> {
    fn submit_ch(&self) -> Receiver<Vec<u8>> {
        (**self).submit_ch()
    }

    fn submit_internal_ch(&self) -> Receiver<InternalTransaction> {
        (**self).submit_internal_ch()
    }

    fn commit_block(&self, block: Block) -> Result<CommitResponse, ProxyError> {
        (**self).commit_block(block)
    }

    fn get_snapshot(&self, block_index: i64) -> Result<Vec<u8>, ProxyError> {
        (**self).get_snapshot(block_index)
    }

    fn restore(&self, snapshot: &[u8]) -> Result<(), ProxyError> {
        (**self).restore(snapshot)
    }
}

/// In-process proxy wrapping an [`AppHandler`].
pub struct InmemProxy<H> {
    handler: H,
    submit_tx: Sender<Vec<u8>>,
    submit_rx: Receiver<Vec<u8>>,
    submit_internal_tx: Sender<InternalTransaction>,
    submit_internal_rx: Receiver<InternalTransaction>,
}

impl<H: AppHandler> InmemProxy<H> {
    /// Wrap `handler` with fresh submit channels.
    pub fn new(handler: H) -> Self {
        let (submit_tx, submit_rx) = unbounded();
        let (submit_internal_tx, submit_internal_rx) = unbounded();
        Self {
            handler,
            submit_tx,
            submit_rx,
            submit_internal_tx,
            submit_internal_rx,
        }
    }

    /// Submit a user transaction to the node.
    pub fn submit(&self, tx: Vec<u8>) {
        let _ = self.submit_tx.send(tx);
    }

    /// Submit a membership transaction to the node.
    pub fn submit_internal(&self, tx: InternalTransaction) {
        let _ = self.submit_internal_tx.send(tx);
    }

    /// A submission handle usable from other threads.
    pub fn submitter(&self) -> Sender<Vec<u8>> {
        self.submit_tx.clone()
    }

    /// Access the wrapped handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }
}

impl<H: AppHandler> AppProxy for InmemProxy<H> {
    fn submit_ch(&self) -> Receiver<Vec<u8>> {
        self.submit_rx.clone()
    }

    fn submit_internal_ch(&self) -> Receiver<InternalTransaction> {
        self.submit_internal_rx.clone()
    }

    fn commit_block(&self, block: Block) -> Result<CommitResponse, ProxyError> {
        debug!(block_index = block.index, txs = block.transactions.len(), "commit block");
        self.handler.commit(block)
    }

    fn get_snapshot(&self, block_index: i64) -> Result<Vec<u8>, ProxyError> {
        self.handler.snapshot(block_index)
    }

    fn restore(&self, snapshot: &[u8]) -> Result<(), ProxyError> {
        self.handler.restore(snapshot)
    }
}
