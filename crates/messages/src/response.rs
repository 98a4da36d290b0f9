//! Response messages. Every response carries the responder's id.

use hearsay_types::{Block, Frame, KnownMap, NodeId, Peer, WireEvent};
use serde::{Deserialize, Serialize};

/// Reply to a [`SyncRequest`](crate::SyncRequest).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResponse {
    /// Responding node.
    pub from_id: NodeId,
    /// True when the requester has diverged beyond the sync limit and must
    /// catch up by fast-forward instead; `events` is empty in that case.
    pub sync_limit: bool,
    /// Events the requester was missing.
    pub events: Vec<WireEvent>,
    /// The responder's knowledge summary, for the requester's push step.
    pub known: KnownMap,
}

/// Reply to an [`EagerSyncRequest`](crate::EagerSyncRequest).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EagerSyncResponse {
    /// Responding node.
    pub from_id: NodeId,
    /// Whether the pushed events were applied.
    pub success: bool,
}

/// Reply to a [`JoinRequest`](crate::JoinRequest).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinResponse {
    /// Responding node.
    pub from_id: NodeId,
    /// The responder's own peer record; the joiner fast-forwards from here.
    pub peer: Peer,
}

/// Reply to a [`FastForwardRequest`](crate::FastForwardRequest).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FastForwardResponse {
    /// Responding node.
    pub from_id: NodeId,
    /// The anchor block.
    pub block: Block,
    /// The frame the anchor block closes.
    pub frame: Frame,
    /// Application snapshot at the anchor block.
    pub snapshot: Vec<u8>,
}
