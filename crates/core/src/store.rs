//! Persistence seam.

use crate::StoreError;
use hearsay_types::{Block, NodeId, Peer, PeerSet};
use std::collections::BTreeMap;

/// Persistence of peer sets and committed blocks.
///
/// Methods take `&self`; implementations synchronize internally so a single
/// store can be shared between the node and the engine via `Arc`.
pub trait Store: Send + Sync + 'static {
    /// Whether persisted state exists that the engine should rehydrate at
    /// init.
    fn needs_bootstrap(&self) -> bool;

    /// Record the membership in force starting at `round`.
    fn set_peer_set(&self, round: i64, peers: &PeerSet) -> Result<(), StoreError>;

    /// The historical union of every peer that was ever a member, by id.
    fn repertoire_by_id(&self) -> BTreeMap<NodeId, Peer>;

    /// The committed block at `index`.
    fn get_block(&self, index: i64) -> Result<Block, StoreError>;

    /// Index of the last committed block, or -1.
    fn last_block_index(&self) -> i64;

    /// The last round a peer set was recorded for, or -1.
    fn last_round(&self) -> i64;

    /// Release the store. Idempotent; reads and writes after close fail
    /// with [`StoreError::Closed`].
    fn close(&self) -> Result<(), StoreError>;
}
