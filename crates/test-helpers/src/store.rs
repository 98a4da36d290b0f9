//! In-memory store.

use hearsay_core::{Store, StoreError};
use hearsay_types::{Block, NodeId, Peer, PeerSet};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
struct StoreState {
    peer_sets: BTreeMap<i64, PeerSet>,
    blocks: BTreeMap<i64, Block>,
    repertoire: BTreeMap<NodeId, Peer>,
}

/// An internally synchronized, in-memory [`Store`].
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
    closed: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn check_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    /// Persist a committed block.
    pub fn put_block(&self, block: Block) -> Result<(), StoreError> {
        self.check_open()?;
        self.state.lock().blocks.insert(block.index, block);
        Ok(())
    }
}

impl Store for MemoryStore {
    fn needs_bootstrap(&self) -> bool {
        false
    }

    fn set_peer_set(&self, round: i64, peers: &PeerSet) -> Result<(), StoreError> {
        self.check_open()?;
        let mut state = self.state.lock();
        for peer in peers.peers() {
            state.repertoire.insert(peer.id, peer.clone());
        }
        state.peer_sets.insert(round, peers.clone());
        Ok(())
    }

    fn repertoire_by_id(&self) -> BTreeMap<NodeId, Peer> {
        self.state.lock().repertoire.clone()
    }

    fn get_block(&self, index: i64) -> Result<Block, StoreError> {
        self.check_open()?;
        self.state
            .lock()
            .blocks
            .get(&index)
            .cloned()
            .ok_or_else(|| StoreError::KeyNotFound(format!("block {index}")))
    }

    fn last_block_index(&self) -> i64 {
        self.state
            .lock()
            .blocks
            .keys()
            .next_back()
            .copied()
            .unwrap_or(-1)
    }

    fn last_round(&self) -> i64 {
        self.state
            .lock()
            .peer_sets
            .keys()
            .next_back()
            .copied()
            .unwrap_or(-1)
    }

    fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(index: i64) -> Block {
        Block {
            index,
            round_received: 0,
            state_hash: vec![],
            transactions: vec![],
            internal_transactions: vec![],
        }
    }

    #[test]
    fn blocks_roundtrip() {
        let store = MemoryStore::new();
        store.put_block(block(0)).unwrap();
        store.put_block(block(1)).unwrap();
        assert_eq!(store.get_block(1).unwrap().index, 1);
        assert_eq!(store.last_block_index(), 1);
    }

    #[test]
    fn missing_block_is_key_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.get_block(9),
            Err(StoreError::KeyNotFound(_))
        ));
    }

    #[test]
    fn closed_store_refuses_access() {
        let store = MemoryStore::new();
        store.put_block(block(0)).unwrap();
        store.close().unwrap();
        store.close().unwrap(); // idempotent
        assert!(matches!(store.get_block(0), Err(StoreError::Closed)));
    }

    #[test]
    fn repertoire_accumulates_across_peer_sets() {
        let store = MemoryStore::new();
        let a = Peer::new(NodeId(1), "a:1", "pk1");
        let b = Peer::new(NodeId(2), "b:1", "pk2");

        store.set_peer_set(0, &PeerSet::new(vec![a.clone()])).unwrap();
        store
            .set_peer_set(1, &PeerSet::new(vec![b.clone()]))
            .unwrap();

        let repertoire = store.repertoire_by_id();
        assert_eq!(repertoire.len(), 2);
        assert_eq!(store.last_round(), 1);
    }
}
