//! Deterministic consensus core over per-creator event logs.

use crate::MemoryStore;
use hearsay_core::{ConsensusCore, CoreError};
use hearsay_proxy::{CommitResponse, ProxyError};
use hearsay_types::{
    Block, Frame, InternalTransaction, KnownMap, NodeId, PeerSet, TransactionKind, WireEvent,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Commit callback: the application side of a block commit.
pub type CommitFn = Arc<dyn Fn(Block) -> Result<CommitResponse, ProxyError> + Send + Sync>;

/// A [`ConsensusCore`] for tests and simulation.
///
/// Events live in per-creator ordered logs; "consensus" commits them in
/// arrival order, which is deterministic per node and — because gossip
/// transfers events in arrival order — converges across an idle cluster.
/// Not a real Byzantine-fault-tolerant algorithm: what the node needs from
/// the seam is the knowledge/diff/sync-limit arithmetic, event and pool
/// bookkeeping, block commits through the application callback, and frame
/// adoption on fast-forward, and those contracts are honored exactly.
pub struct SimCore {
    id: NodeId,
    peers: PeerSet,
    store: Arc<MemoryStore>,
    commit: CommitFn,

    /// Per-creator event logs keyed by index. Indices need not start at
    /// zero: after a fast-forward only the frame's tail is present.
    events: BTreeMap<NodeId, BTreeMap<i64, WireEvent>>,
    /// Global arrival order of `(creator, index)`.
    arrival: Vec<(NodeId, i64)>,
    /// Arrival position up to which consensus has run.
    cursor: usize,
    /// Other-parent candidate: the last event received from a peer.
    last_received: Option<(NodeId, i64)>,

    transaction_pool: Vec<Vec<u8>>,
    internal_pool: Vec<InternalTransaction>,
    block_signature_pool: Vec<Vec<u8>>,

    blocks: BTreeMap<i64, Block>,
    anchor: Option<i64>,
    last_round: i64,
    consensus_transactions: usize,
    last_round_events: usize,
}

impl SimCore {
    /// Create a core for `id` with the given membership, store, and commit
    /// callback.
    pub fn new(id: NodeId, peers: PeerSet, store: Arc<MemoryStore>, commit: CommitFn) -> Self {
        Self {
            id,
            peers,
            store,
            commit,
            events: BTreeMap::new(),
            arrival: Vec::new(),
            cursor: 0,
            last_received: None,
            transaction_pool: Vec::new(),
            internal_pool: Vec::new(),
            block_signature_pool: Vec::new(),
            blocks: BTreeMap::new(),
            anchor: None,
            last_round: -1,
            consensus_transactions: 0,
            last_round_events: 0,
        }
    }

    /// Highest index in this creator's log, or -1.
    fn head_of(&self, creator: NodeId) -> i64 {
        self.events
            .get(&creator)
            .and_then(|log| log.keys().next_back().copied())
            .unwrap_or(-1)
    }

    fn insert_event(&mut self, event: WireEvent) -> Result<bool, CoreError> {
        let head = self.head_of(event.creator);
        if event.index <= head {
            // Already known.
            return Ok(false);
        }
        let log_empty = self
            .events
            .get(&event.creator)
            .map_or(true, |log| log.is_empty());
        if !log_empty && event.index != head + 1 {
            return Err(CoreError::OutOfOrder {
                creator: event.creator.0,
                got: event.index,
                expected: head + 1,
            });
        }

        let key = (event.creator, event.index);
        self.events
            .entry(event.creator)
            .or_default()
            .insert(event.index, event);
        self.arrival.push(key);
        Ok(true)
    }

    /// Append a self event carrying everything pooled.
    fn create_self_event(&mut self) {
        let index = self.head_of(self.id) + 1;
        let (other_parent_creator, other_parent_index) = match self.last_received {
            Some((creator, idx)) => (Some(creator), Some(idx)),
            None => (None, None),
        };
        let event = WireEvent {
            creator: self.id,
            index,
            other_parent_creator,
            other_parent_index,
            transactions: std::mem::take(&mut self.transaction_pool),
            internal_transactions: std::mem::take(&mut self.internal_pool),
        };
        self.events
            .entry(self.id)
            .or_default()
            .insert(index, event);
        self.arrival.push((self.id, index));
    }

    /// Seed `n` self events each carrying one small transaction. Test setup
    /// for divergence scenarios; call before handing the core to a node.
    pub fn seed_events(&mut self, n: usize) {
        for i in 0..n {
            self.transaction_pool.push(format!("seed-{i}").into_bytes());
            self.create_self_event();
        }
    }

    fn apply_receipts(&mut self, response: &CommitResponse) {
        for receipt in &response.internal_transaction_receipts {
            if !receipt.approved {
                continue;
            }
            match receipt.transaction.kind {
                TransactionKind::Join => {
                    self.peers = self.peers.with_new_peer(&receipt.transaction.peer);
                }
                TransactionKind::Leave => {
                    self.peers = self.peers.without_peer(receipt.transaction.peer.id);
                }
            }
        }
    }
}

impl ConsensusCore for SimCore {
    fn bootstrap(&mut self) -> Result<(), CoreError> {
        Ok(())
    }

    fn set_head_and_seq(&mut self) -> Result<(), CoreError> {
        Ok(())
    }

    fn known_events(&self) -> KnownMap {
        let mut known = KnownMap::new();
        for peer in self.peers.peers() {
            known.set(peer.id, self.head_of(peer.id));
        }
        for creator in self.events.keys() {
            known.observe(*creator, self.head_of(*creator));
        }
        known
    }

    fn event_diff(&self, known: &KnownMap) -> Result<Vec<WireEvent>, CoreError> {
        let mut diff = Vec::new();
        for (creator, index) in &self.arrival {
            if *index > known.get(*creator) {
                let event = self
                    .events
                    .get(creator)
                    .and_then(|log| log.get(index))
                    .ok_or(CoreError::UnknownParent {
                        creator: creator.0,
                        index: *index,
                    })?;
                diff.push(event.clone());
            }
        }
        Ok(diff)
    }

    fn to_wire(&self, events: Vec<WireEvent>) -> Result<Vec<WireEvent>, CoreError> {
        // Events are already in wire form here; a real engine would strip
        // in-memory annotations.
        Ok(events)
    }

    fn sync(&mut self, events: Vec<WireEvent>) -> Result<(), CoreError> {
        for event in events {
            let key = (event.creator, event.index);
            if self.insert_event(event)? {
                self.last_received = Some(key);
            }
        }

        // A new head records pooled payload; gossip with nothing pooled
        // creates no event, so an idle cluster converges.
        if !self.transaction_pool.is_empty() || !self.internal_pool.is_empty() {
            self.create_self_event();
        }
        Ok(())
    }

    fn run_consensus(&mut self) -> Result<(), CoreError> {
        let fresh: Vec<(NodeId, i64)> = self.arrival[self.cursor..].to_vec();
        if fresh.is_empty() {
            return Ok(());
        }
        self.cursor = self.arrival.len();
        self.last_round += 1;
        self.last_round_events = fresh.len();

        let mut transactions = Vec::new();
        let mut internal_transactions = Vec::new();
        for (creator, index) in &fresh {
            if let Some(event) = self.events.get(creator).and_then(|log| log.get(index)) {
                transactions.extend(event.transactions.iter().cloned());
                internal_transactions.extend(event.internal_transactions.iter().cloned());
            }
        }

        if transactions.is_empty() && internal_transactions.is_empty() {
            return Ok(());
        }

        let index = self.blocks.keys().next_back().copied().unwrap_or(-1) + 1;
        let mut block = Block {
            index,
            round_received: self.last_round,
            state_hash: Vec::new(),
            transactions,
            internal_transactions,
        };

        self.consensus_transactions += block.transactions.len();

        let response = (self.commit)(block.clone())
            .map_err(|e| CoreError::Other(format!("commit: {e}")))?;
        block.state_hash = response.state_hash.clone();
        self.apply_receipts(&response);

        self.blocks.insert(index, block.clone());
        self.store.put_block(block)?;
        Ok(())
    }

    fn add_self_event(&mut self) -> Result<(), CoreError> {
        self.create_self_event();
        Ok(())
    }

    fn add_transactions(&mut self, txs: Vec<Vec<u8>>) {
        self.transaction_pool.extend(txs);
    }

    fn add_internal_transactions(&mut self, txs: Vec<InternalTransaction>) {
        self.internal_pool.extend(txs);
    }

    fn get_anchor_block_with_frame(&self) -> Result<(Block, Frame), CoreError> {
        let anchor = self.anchor.ok_or(CoreError::NoAnchorBlock)?;
        let block = self
            .blocks
            .get(&anchor)
            .cloned()
            .ok_or(CoreError::NoSuchBlock(anchor))?;

        let roots = self
            .events
            .keys()
            .map(|creator| (*creator, self.head_of(*creator)))
            .collect();
        let events = self
            .arrival
            .iter()
            .filter_map(|(creator, index)| {
                self.events
                    .get(creator)
                    .and_then(|log| log.get(index))
                    .cloned()
            })
            .collect();

        let frame = Frame {
            round: self.last_round,
            peers: self.peers.clone(),
            roots,
            events,
        };
        Ok((block, frame))
    }

    fn anchor_block(&self) -> Option<i64> {
        self.anchor
    }

    fn set_anchor_block(&mut self, index: i64) -> Result<(), CoreError> {
        if !self.blocks.contains_key(&index) {
            return Err(CoreError::NoSuchBlock(index));
        }
        self.anchor = Some(index);
        Ok(())
    }

    fn fast_forward(
        &mut self,
        _pub_key_hex: &str,
        block: &Block,
        frame: &Frame,
    ) -> Result<(), CoreError> {
        if frame.events.is_empty() {
            return Err(CoreError::InvalidFrame("empty frame".into()));
        }

        self.events.clear();
        self.arrival.clear();
        for event in &frame.events {
            self.arrival.push((event.creator, event.index));
            self.events
                .entry(event.creator)
                .or_default()
                .insert(event.index, event.clone());
        }
        self.cursor = self.arrival.len();
        self.last_received = None;

        self.peers = frame.peers.clone();
        self.last_round = frame.round;
        self.last_round_events = 0;

        self.blocks.insert(block.index, block.clone());
        self.store.put_block(block.clone())?;
        self.anchor = Some(block.index);
        Ok(())
    }

    fn peers(&self) -> PeerSet {
        self.peers.clone()
    }

    fn set_peers(&mut self, peers: PeerSet) {
        self.peers = peers;
    }

    fn pending_loaded_events(&self) -> usize {
        self.arrival.len() - self.cursor
    }

    fn transaction_pool_len(&self) -> usize {
        self.transaction_pool.len()
    }

    fn internal_transaction_pool_len(&self) -> usize {
        self.internal_pool.len()
    }

    fn block_signature_pool_len(&self) -> usize {
        self.block_signature_pool.len()
    }

    fn last_consensus_round(&self) -> Option<i64> {
        (self.last_round >= 0).then_some(self.last_round)
    }

    fn last_block_index(&self) -> i64 {
        self.blocks.keys().next_back().copied().unwrap_or(-1)
    }

    fn consensus_events_count(&self) -> usize {
        self.cursor
    }

    fn consensus_transactions_count(&self) -> usize {
        self.consensus_transactions
    }

    fn undetermined_events_count(&self) -> usize {
        self.pending_loaded_events()
    }

    fn last_round_events_count(&self) -> usize {
        self.last_round_events
    }
}
