//! Seams to the node's external collaborators.
//!
//! The node runtime mediates access to a consensus engine and a store it
//! does not implement itself. This crate defines those interfaces:
//!
//! - [`ConsensusCore`] — the engine: event insertion, diffing, consensus
//!   advancement, fast-forward, and the pools the node feeds.
//! - [`Store`] — persistence of peer sets and committed blocks.
//!
//! # Design
//!
//! The engine is NOT thread-safe; the node guards the single instance behind
//! one coarse lock and keeps critical sections short. Nothing in this crate
//! does I/O — transport round-trips and application snapshot calls happen in
//! the node, outside the core lock.
//!
//! [`Store`] methods take `&self` so implementations can be shared via `Arc`
//! between the node and the engine; they are expected to synchronize
//! internally.

mod error;
mod store;

pub use error::{CoreError, StoreError};
pub use store::Store;

use hearsay_types::{Block, Frame, InternalTransaction, KnownMap, PeerSet, WireEvent};

/// The consensus engine the node drives.
///
/// All access happens under the node's core lock; implementations may assume
/// exclusive access for the duration of each call.
pub trait ConsensusCore: Send + 'static {
    /// Rehydrate engine state from the store after a restart.
    fn bootstrap(&mut self) -> Result<(), CoreError>;

    /// Position the in-progress head and sequence number.
    fn set_head_and_seq(&mut self) -> Result<(), CoreError>;

    /// Summary of local knowledge: highest event index per peer.
    fn known_events(&self) -> KnownMap;

    /// Events self holds that a remote with knowledge `known` lacks.
    fn event_diff(&self, known: &KnownMap) -> Result<Vec<WireEvent>, CoreError>;

    /// Convert events to their wire form.
    fn to_wire(&self, events: Vec<WireEvent>) -> Result<Vec<WireEvent>, CoreError>;

    /// Insert remote events, creating a new head if necessary.
    fn sync(&mut self, events: Vec<WireEvent>) -> Result<(), CoreError>;

    /// Advance consensus over everything inserted so far, committing blocks.
    fn run_consensus(&mut self) -> Result<(), CoreError>;

    /// Whether bringing a remote with knowledge `known` up to self would
    /// transfer more than `limit` events.
    fn over_sync_limit(&self, known: &KnownMap, limit: u64) -> bool {
        self.known_events().events_ahead_of(known) > limit
    }

    /// Append a self-parented event carrying any pooled payload.
    ///
    /// Used to force progress when the node is alone and cannot gossip.
    fn add_self_event(&mut self) -> Result<(), CoreError>;

    /// Append user transactions to the pending pool.
    fn add_transactions(&mut self, txs: Vec<Vec<u8>>);

    /// Append membership transactions to the pending pool.
    fn add_internal_transactions(&mut self, txs: Vec<InternalTransaction>);

    /// The anchor block and its frame, served on fast-forward requests.
    fn get_anchor_block_with_frame(&self) -> Result<(Block, Frame), CoreError>;

    /// Index of the anchor block, if one is set.
    fn anchor_block(&self) -> Option<i64>;

    /// Mark the block at `index` as the anchor.
    fn set_anchor_block(&mut self, index: i64) -> Result<(), CoreError>;

    /// Replace engine state with the given block and frame, obtained from
    /// the peer identified by `pub_key_hex`.
    fn fast_forward(
        &mut self,
        pub_key_hex: &str,
        block: &Block,
        frame: &Frame,
    ) -> Result<(), CoreError>;

    /// Current membership as ratified by consensus.
    fn peers(&self) -> PeerSet;

    /// Replace the membership snapshot (join bootstrap path).
    fn set_peers(&mut self, peers: PeerSet);

    /// Events inserted but not yet processed by consensus.
    fn pending_loaded_events(&self) -> usize;

    /// Pending user transactions.
    fn transaction_pool_len(&self) -> usize;

    /// Pending membership transactions.
    fn internal_transaction_pool_len(&self) -> usize;

    /// Pending block signatures.
    fn block_signature_pool_len(&self) -> usize;

    // ── Stats ──

    /// Index of the last round consensus decided, if any.
    fn last_consensus_round(&self) -> Option<i64>;

    /// Index of the last committed block, or -1.
    fn last_block_index(&self) -> i64;

    /// Total events that reached consensus.
    fn consensus_events_count(&self) -> usize;

    /// Total transactions committed through consensus.
    fn consensus_transactions_count(&self) -> usize;

    /// Events whose round is not yet decided.
    fn undetermined_events_count(&self) -> usize;

    /// Events committed in the last decided round.
    fn last_round_events_count(&self) -> usize;
}
