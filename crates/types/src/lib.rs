//! Core types for the hearsay consensus node.
//!
//! This crate provides the foundational types used throughout the node
//! runtime:
//!
//! - **Identifiers**: [`NodeId`]
//! - **Membership**: [`Peer`], [`PeerSet`]
//! - **Knowledge**: [`KnownMap`] (per-peer highest observed event index)
//! - **Consensus payloads**: [`WireEvent`], [`Block`], [`Frame`],
//!   [`InternalTransaction`]
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not depend
//! on any other workspace crates, making it the foundation layer. Everything
//! here is a value type: cloning a [`PeerSet`] yields an independent snapshot,
//! and membership mutation produces a new set rather than editing in place.

mod event;
mod known;
mod peer;

pub use event::{Block, Frame, InternalTransaction, InternalTransactionReceipt, TransactionKind};
pub use known::{KnownMap, UNKNOWN_INDEX};
pub use peer::{Peer, PeerSet};

use serde::{Deserialize, Serialize};

/// Unique identifier of a node within the cluster.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unit of the gossip graph in its serialized, wire-stable form.
///
/// The node treats events as opaque beyond the fields it reads in logs and
/// the creator/index pair used to maintain [`KnownMap`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEvent {
    /// Creator of the event.
    pub creator: NodeId,
    /// Creator-local sequence index (0-based).
    pub index: i64,
    /// Creator of the other-parent, if any.
    pub other_parent_creator: Option<NodeId>,
    /// Index of the other-parent under its creator, if any.
    pub other_parent_index: Option<i64>,
    /// User transaction payloads carried by this event.
    pub transactions: Vec<Vec<u8>>,
    /// Membership transactions carried by this event.
    pub internal_transactions: Vec<InternalTransaction>,
}

impl WireEvent {
    /// Create an event with no other-parent and no payload.
    pub fn empty(creator: NodeId, index: i64) -> Self {
        Self {
            creator,
            index,
            other_parent_creator: None,
            other_parent_index: None,
            transactions: Vec::new(),
            internal_transactions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_display() {
        assert_eq!(NodeId(42).to_string(), "42");
    }

    #[test]
    fn wire_event_roundtrips_through_codec() {
        let event = WireEvent {
            creator: NodeId(1),
            index: 3,
            other_parent_creator: Some(NodeId(2)),
            other_parent_index: Some(7),
            transactions: vec![b"tx".to_vec()],
            internal_transactions: vec![],
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: WireEvent = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, event);
    }
}
