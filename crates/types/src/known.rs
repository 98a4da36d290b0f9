//! Per-peer event knowledge.

use crate::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Index recorded for a peer no event has been observed from.
pub const UNKNOWN_INDEX: i64 = -1;

/// A mapping from peer id to the highest event index observed from that peer.
///
/// Summarizes local knowledge ("what I have") in a sync request, and is
/// compared against a remote's summary to compute divergence.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KnownMap(BTreeMap<NodeId, i64>);

impl KnownMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest observed index for `id`, or [`UNKNOWN_INDEX`].
    pub fn get(&self, id: NodeId) -> i64 {
        self.0.get(&id).copied().unwrap_or(UNKNOWN_INDEX)
    }

    /// Record `index` for `id`, keeping the maximum of old and new.
    pub fn observe(&mut self, id: NodeId, index: i64) {
        let entry = self.0.entry(id).or_insert(UNKNOWN_INDEX);
        *entry = (*entry).max(index);
    }

    /// Set the recorded index for `id` unconditionally.
    pub fn set(&mut self, id: NodeId, index: i64) {
        self.0.insert(id, index);
    }

    /// Iterate over `(id, highest index)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, i64)> + '_ {
        self.0.iter().map(|(id, idx)| (*id, *idx))
    }

    /// Number of peers with a recorded entry.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no peer has a recorded entry.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Count of events `self` holds beyond what `remote` has observed.
    ///
    /// This is the number of events a node with knowledge `self` would have
    /// to transfer to bring a node with knowledge `remote` up to date. It is
    /// a pure function of the two maps, so both ends of a sync agree on it
    /// given the same inputs.
    pub fn events_ahead_of(&self, remote: &KnownMap) -> u64 {
        self.iter()
            .map(|(id, mine)| mine.saturating_sub(remote.get(id)).max(0) as u64)
            .sum()
    }

    /// Whether every entry in `self` is >= the corresponding entry in `other`.
    pub fn dominates(&self, other: &KnownMap) -> bool {
        other.iter().all(|(id, theirs)| self.get(id) >= theirs)
    }
}

impl FromIterator<(NodeId, i64)> for KnownMap {
    fn from_iter<I: IntoIterator<Item = (NodeId, i64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
