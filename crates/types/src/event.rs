//! Committed blocks, frames, and membership transactions.

use crate::peer::{Peer, PeerSet};
use crate::{NodeId, WireEvent};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The kind of a membership transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    /// The peer requests admission to the cluster.
    Join,
    /// The peer leaves the cluster.
    Leave,
}

/// A transaction that modifies cluster membership, ratified by consensus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalTransaction {
    /// What the transaction does.
    pub kind: TransactionKind,
    /// The peer the transaction concerns.
    pub peer: Peer,
}

impl InternalTransaction {
    /// A join transaction for `peer`.
    pub fn join(peer: Peer) -> Self {
        Self {
            kind: TransactionKind::Join,
            peer,
        }
    }

    /// A leave transaction for `peer`.
    pub fn leave(peer: Peer) -> Self {
        Self {
            kind: TransactionKind::Leave,
            peer,
        }
    }
}

/// The application's verdict on a committed membership transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalTransactionReceipt {
    /// The transaction the receipt is for.
    pub transaction: InternalTransaction,
    /// Whether the membership change was accepted.
    pub approved: bool,
}

/// A committed block in the total order emitted by consensus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the committed sequence.
    pub index: i64,
    /// Consensus round in which the block was received.
    pub round_received: i64,
    /// Application state hash after applying the block.
    pub state_hash: Vec<u8>,
    /// Ordered user transactions.
    pub transactions: Vec<Vec<u8>>,
    /// Membership transactions committed in this block; the application
    /// returns a receipt per transaction in its commit response.
    pub internal_transactions: Vec<InternalTransaction>,
}

impl Block {
    /// Position in the committed sequence.
    pub fn index(&self) -> i64 {
        self.index
    }

    /// Consensus round in which the block was received.
    pub fn round_received(&self) -> i64 {
        self.round_received
    }
}

/// A set of events and per-creator roots sufficient to reinitialize
/// consensus at a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Round the frame reinitializes at.
    pub round: i64,
    /// Membership at that round.
    pub peers: PeerSet,
    /// Per-creator root index (last event index folded into the frame).
    pub roots: BTreeMap<NodeId, i64>,
    /// Events carried by the frame.
    pub events: Vec<WireEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_transaction_constructors() {
        let peer = Peer::new(NodeId(2), "127.0.0.1:9002", "pk2");
        assert_eq!(InternalTransaction::join(peer.clone()).kind, TransactionKind::Join);
        assert_eq!(InternalTransaction::leave(peer).kind, TransactionKind::Leave);
    }

    #[test]
    fn frame_roundtrips_through_codec() {
        let frame = Frame {
            round: 4,
            peers: PeerSet::new(vec![Peer::new(NodeId(1), "a:1", "pk1")]),
            roots: [(NodeId(1), 9)].into_iter().collect(),
            events: vec![WireEvent::empty(NodeId(1), 10)],
        };
        let bytes = bincode::serialize(&frame).unwrap();
        let decoded: Frame = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, frame);
    }
}
