//! Request messages.

use hearsay_types::{KnownMap, NodeId, Peer, WireEvent};
use serde::{Deserialize, Serialize};

/// The pull half of gossip: ask a peer for the events self lacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRequest {
    /// Requesting node.
    pub from_id: NodeId,
    /// The requester's knowledge summary.
    pub known: KnownMap,
}

/// The push half of gossip: hand a peer the events it lacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EagerSyncRequest {
    /// Requesting node.
    pub from_id: NodeId,
    /// Events the target is missing.
    pub events: Vec<WireEvent>,
}

/// Bootstrap contact from a peer that is not yet a member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRequest {
    /// Requesting node.
    pub from_id: NodeId,
    /// The joiner's own peer record.
    pub peer: Peer,
}

/// Ask a peer for its anchor block, frame, and application snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FastForwardRequest {
    /// Requesting node.
    pub from_id: NodeId,
}
