//! The node runtime: lifecycle, gossip, catchup, shutdown.

use crate::config::NodeConfig;
use crate::control_timer::ControlTimer;
use crate::error::NodeError;
use crate::peer_selector::{PeerSelector, RandomPeerSelector};
use crate::state::{NodeState, ShutdownSignal, StateCell, WaitGroup};
use crossbeam::channel::{bounded, Receiver, Sender};
use ed25519_dalek::SigningKey;
use hearsay_core::{ConsensusCore, CoreError, Store};
use hearsay_messages::{FastForwardRequest, JoinRequest, SyncRequest};
use hearsay_network::{RpcEnvelope, Transport};
use hearsay_proxy::AppProxy;
use hearsay_types::{Block, KnownMap, NodeId, Peer, PeerSet, WireEvent};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Capacity of the rendezvous channel a gossip task uses to tell the
/// babbling loop to exit. Buffered so the task never blocks on it.
const RETURN_CH_CAPACITY: usize = 100;

pub(crate) struct NodeInner<C, S, T, A>
where
    C: ConsensusCore,
    S: Store,
    T: Transport,
    A: AppProxy,
{
    pub(crate) config: NodeConfig,
    pub(crate) id: NodeId,
    pub(crate) pub_key_hex: String,
    #[allow(dead_code)]
    signing_key: SigningKey,

    // The engine is not reentrancy-safe: every read and write goes through
    // this one lock, and critical sections stay short. I/O happens outside.
    pub(crate) core: Mutex<C>,
    pub(crate) selector: Mutex<Box<dyn PeerSelector>>,

    pub(crate) store: Arc<S>,
    pub(crate) transport: T,
    net_rx: Receiver<RpcEnvelope>,

    pub(crate) proxy: A,
    submit_rx: Receiver<Vec<u8>>,
    submit_internal_rx: Receiver<hearsay_types::InternalTransaction>,

    pub(crate) state: StateCell,
    pub(crate) wait_group: WaitGroup,
    shutdown: ShutdownSignal,
    shutdown_done: AtomicBool,
    pub(crate) control_timer: ControlTimer,

    start: Instant,
    pub(crate) sync_requests: AtomicUsize,
    pub(crate) sync_errors: AtomicUsize,

    needs_bootstrap: bool,
}

/// A single participant in the cluster.
///
/// Cheap to clone; clones share the same underlying runtime, so one handle
/// can drive [`run`](Node::run) while another calls
/// [`shutdown`](Node::shutdown).
pub struct Node<C, S, T, A>
where
    C: ConsensusCore,
    S: Store,
    T: Transport,
    A: AppProxy,
{
    inner: Arc<NodeInner<C, S, T, A>>,
}

impl<C, S, T, A> Clone for Node<C, S, T, A>
where
    C: ConsensusCore,
    S: Store,
    T: Transport,
    A: AppProxy,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C, S, T, A> Node<C, S, T, A>
where
    C: ConsensusCore,
    S: Store,
    T: Transport,
    A: AppProxy,
{
    /// Construct a node over its collaborators.
    ///
    /// The engine's membership is replaced with `peers`, and the node starts
    /// in the Babbling state; [`run`](Self::run) moves it to Joining when a
    /// bootstrap address is supplied.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: NodeConfig,
        id: NodeId,
        signing_key: SigningKey,
        peers: PeerSet,
        mut core: C,
        store: Arc<S>,
        transport: T,
        proxy: A,
    ) -> Self {
        let pub_key_hex = hex::encode(signing_key.verifying_key().as_bytes());
        core.set_peers(peers.clone());

        let net_rx = transport.consumer();
        let submit_rx = proxy.submit_ch();
        let submit_internal_rx = proxy.submit_internal_ch();
        let needs_bootstrap = store.needs_bootstrap();

        let inner = NodeInner {
            config,
            id,
            pub_key_hex,
            signing_key,
            core: Mutex::new(core),
            selector: Mutex::new(Box::new(RandomPeerSelector::new(peers, id))),
            store,
            transport,
            net_rx,
            proxy,
            submit_rx,
            submit_internal_rx,
            state: StateCell::new(NodeState::Babbling),
            wait_group: WaitGroup::new(),
            shutdown: ShutdownSignal::new(),
            shutdown_done: AtomicBool::new(false),
            control_timer: ControlTimer::spawn(),
            start: Instant::now(),
            sync_requests: AtomicUsize::new(0),
            sync_errors: AtomicUsize::new(0),
            needs_bootstrap,
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Prepare the engine: rehydrate from the store when it holds state,
    /// then position the head.
    pub fn init(&self) -> Result<(), NodeError> {
        let mut core = self.inner.core.lock();
        if self.inner.needs_bootstrap {
            debug!(id = %self.inner.id, "bootstrapping from store");
            core.bootstrap()?;
        }
        core.set_head_and_seq()?;
        Ok(())
    }

    /// Run the lifecycle state machine on the calling thread.
    ///
    /// Blocks until the node reaches Shutdown. Resources are released by
    /// [`shutdown`](Self::shutdown), not by returning from here.
    pub fn run(&self, addr: Option<&str>, gossip: bool) {
        NodeInner::run(&self.inner, addr, gossip);
    }

    /// Run the lifecycle state machine on a dedicated thread.
    pub fn run_async(&self, addr: Option<String>, gossip: bool) -> std::thread::JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        std::thread::Builder::new()
            .name(format!("hearsay-node-{}", self.inner.id))
            .spawn(move || NodeInner::run(&inner, addr.as_deref(), gossip))
            .expect("failed to spawn node thread")
    }

    /// Stop the node and release its resources. Idempotent.
    ///
    /// Ordering is mandatory: drain background tasks first, close transport
    /// and store last, so in-flight tasks never touch closed resources.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    /// Current lifecycle state.
    pub fn state(&self) -> NodeState {
        self.inner.state.get()
    }

    /// This node's id.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// This node's membership snapshot as ratified by consensus.
    pub fn peers(&self) -> PeerSet {
        self.inner.core.lock().peers()
    }

    /// Per-peer highest event index this node has observed.
    pub fn known_events(&self) -> KnownMap {
        self.inner.core.lock().known_events()
    }

    /// The committed block at `index`.
    pub fn get_block(&self, index: i64) -> Result<Block, NodeError> {
        Ok(self.inner.store.get_block(index)?)
    }

    /// Fraction of served sync requests that succeeded (1.0 before any).
    pub fn sync_rate(&self) -> f64 {
        self.inner.sync_rate()
    }

    /// Runtime statistics as a string map.
    pub fn stats(&self) -> BTreeMap<String, String> {
        self.inner.stats()
    }
}

/// What a pull learned from the remote.
enum PullOutcome {
    /// The remote refused: self has diverged beyond the sync limit.
    SyncLimit,
    /// Events were applied; the remote's knowledge summary for the push step.
    Synced(KnownMap),
}

impl<C, S, T, A> NodeInner<C, S, T, A>
where
    C: ConsensusCore,
    S: Store,
    T: Transport,
    A: AppProxy,
{
    // ─── Lifecycle ──────────────────────────────────────────────────────

    pub(crate) fn run(node: &Arc<Self>, addr: Option<&str>, gossip: bool) {
        if addr.is_some_and(|a| !a.is_empty()) {
            node.state.set(NodeState::Joining);
        }

        // Background intake outlives every lifecycle state; it exits on the
        // shutdown broadcast.
        {
            let node = Arc::clone(node);
            std::thread::Builder::new()
                .name(format!("hearsay-intake-{}", node.id))
                .spawn(move || node.background_intake())
                .expect("failed to spawn intake thread");
        }

        loop {
            let state = node.state.get();
            debug!(id = %node.id, %state, "run loop");

            match state {
                NodeState::Babbling => Self::babble(node, gossip),
                NodeState::CatchingUp => {
                    if let Err(e) = node.fast_forward() {
                        warn!(id = %node.id, error = %e, "fast-forward failed, retrying");
                        // Back off one heartbeat, but wake on shutdown.
                        let _ = node.shutdown.listen().recv_timeout(node.config.heartbeat);
                    }
                }
                NodeState::Joining => {
                    let addr = addr.unwrap_or_default();
                    if let Err(e) = node.connect(addr) {
                        error!(id = %node.id, %addr, error = %e, "cannot join");
                    }
                }
                NodeState::Shutdown => return,
            }
        }
    }

    /// Read submit channels and feed the engine's pools.
    fn background_intake(&self) {
        let shutdown_rx = self.shutdown.listen();
        loop {
            crossbeam::select! {
                recv(self.submit_rx) -> tx => match tx {
                    Ok(tx) => {
                        debug!(id = %self.id, len = tx.len(), "adding transaction");
                        self.core.lock().add_transactions(vec![tx]);
                        self.reset_timer();
                    }
                    Err(_) => return,
                },
                recv(self.submit_internal_rx) -> tx => match tx {
                    Ok(tx) => {
                        debug!(id = %self.id, "adding internal transaction");
                        self.core.lock().add_internal_transactions(vec![tx]);
                        self.reset_timer();
                    }
                    Err(_) => return,
                },
                recv(shutdown_rx) -> _ => return,
            }
        }
    }

    /// Service RPCs and initiate gossip until the state changes.
    ///
    /// Gossip tasks run detached; one that trips the sync limit transitions
    /// the node to CatchingUp and raps on `return_rx` to end this loop.
    fn babble(node: &Arc<Self>, gossip: bool) {
        let (return_tx, return_rx) = bounded::<()>(RETURN_CH_CAPACITY);
        let tick_rx = node.control_timer.tick_ch();
        let shutdown_rx = node.shutdown.listen();

        // Prime the heartbeat: ticks fire only while armed, and a tick that
        // fired while we were away (catching up) was dropped unconsumed.
        node.reset_timer();

        loop {
            crossbeam::select! {
                recv(node.net_rx) -> envelope => match envelope {
                    Ok(envelope) => {
                        Self::spawn_tracked(node, "rpc", move |node| {
                            debug!(id = %node.id, kind = envelope.command.kind(), "processing rpc");
                            node.process_rpc(envelope);
                            node.reset_timer();
                        });
                    }
                    Err(_) => {
                        // The transport consumer is gone; nothing more to
                        // serve.
                        warn!(id = %node.id, "inbound channel closed");
                        node.state.enter_shutdown();
                        return;
                    }
                },
                recv(tick_rx) -> _ => {
                    if gossip {
                        debug!(id = %node.id, "time to gossip");
                        node.refresh_selector();
                        let peer = node.selector.lock().next();
                        match peer {
                            None => debug!(id = %node.id, "waiting for peers"),
                            Some(peer) => {
                                let return_tx = return_tx.clone();
                                Self::spawn_tracked(node, "gossip", move |node| {
                                    if let Err(e) = node.gossip(&peer, &return_tx) {
                                        warn!(id = %node.id, to = %peer.id, error = %e, "gossip failed");
                                    }
                                });
                            }
                        }
                    }
                    node.reset_timer();
                },
                recv(return_rx) -> _ => return,
                recv(shutdown_rx) -> _ => return,
            }
        }
    }

    /// Arm the heartbeat if it is not already armed.
    ///
    /// Chooses the fast interval when there is anything to gossip about and
    /// the slow one otherwise. The reset is sent while holding the core
    /// lock so the emptiness check and the arming are not interleaved with
    /// pool mutations.
    pub(crate) fn reset_timer(&self) {
        let core = self.core.lock();
        if !self.control_timer.is_set() {
            let interval = Self::next_interval(&*core, &self.config);
            self.control_timer.reset(interval);
        }
    }

    /// The heartbeat base for the engine's current fill level.
    fn next_interval(core: &C, config: &NodeConfig) -> std::time::Duration {
        let busy = core.pending_loaded_events() > 0
            || core.transaction_pool_len() > 0
            || core.block_signature_pool_len() > 0;
        if busy {
            config.heartbeat
        } else {
            config.slow_heartbeat
        }
    }

    /// Spawn a wait-group-tracked task.
    fn spawn_tracked<F>(node: &Arc<Self>, label: &str, f: F)
    where
        F: FnOnce(&Arc<Self>) + Send + 'static,
    {
        let guard = node.wait_group.enter();
        let node = Arc::clone(node);
        std::thread::Builder::new()
            .name(format!("hearsay-{label}-{}", node.id))
            .spawn(move || {
                let _guard = guard;
                f(&node);
            })
            .expect("failed to spawn tracked task");
    }

    /// Propagate membership ratified by consensus into the selector.
    fn refresh_selector(&self) {
        let peers = self.core.lock().peers();
        let mut selector = self.selector.lock();
        if selector.peers() != &peers {
            selector.set_peers(peers);
        }
    }

    /// This node's own peer record.
    pub(crate) fn own_peer(&self) -> Peer {
        Peer::new(
            self.id,
            self.transport.local_addr(),
            self.pub_key_hex.clone(),
        )
    }

    // ─── Gossip ─────────────────────────────────────────────────────────

    /// One pull-then-push round with `peer`.
    fn gossip(&self, peer: &Peer, return_tx: &Sender<()>) -> Result<(), NodeError> {
        let remote_known = match self.pull(peer)? {
            PullOutcome::SyncLimit => {
                debug!(id = %self.id, from = %peer.id, "sync limit, catching up");
                self.state.set(NodeState::CatchingUp);
                let _ = return_tx.try_send(());
                return Ok(());
            }
            PullOutcome::Synced(known) => known,
        };

        self.push(peer, &remote_known)?;

        {
            let mut selector = self.selector.lock();
            selector.update_last(peer.id);
        }

        self.log_stats();
        Ok(())
    }

    fn pull(&self, peer: &Peer) -> Result<PullOutcome, NodeError> {
        let known = self.core.lock().known_events();

        let start = Instant::now();
        let resp = self.transport.sync(
            &peer.net_addr,
            SyncRequest {
                from_id: self.id,
                known,
            },
        );
        debug!(id = %self.id, duration_us = start.elapsed().as_micros() as u64, "sync round-trip");

        let resp = match resp {
            Ok(resp) => resp,
            Err(e) => {
                error!(id = %self.id, to = %peer.id, error = %e, "sync request failed");
                return Err(e.into());
            }
        };

        debug!(
            id = %self.id,
            from_id = %resp.from_id,
            sync_limit = resp.sync_limit,
            events = resp.events.len(),
            "sync response"
        );

        if resp.sync_limit {
            return Ok(PullOutcome::SyncLimit);
        }

        {
            let mut core = self.core.lock();
            if let Err(e) = Self::sync_into(&mut core, resp.events) {
                error!(id = %self.id, error = %e, "applying pulled events");
                return Err(e.into());
            }
        }

        Ok(PullOutcome::Synced(resp.known))
    }

    fn push(&self, peer: &Peer, remote_known: &KnownMap) -> Result<(), NodeError> {
        {
            let core = self.core.lock();
            if core.over_sync_limit(remote_known, self.config.sync_limit) {
                // The remote has diverged too far; it will catch up by
                // fast-forward, not by us pushing thousands of events.
                debug!(id = %self.id, to = %peer.id, "remote over sync limit, skipping push");
                return Ok(());
            }
        }

        let start = Instant::now();
        let events = {
            let core = self.core.lock();
            let diff = core.event_diff(remote_known)?;
            core.to_wire(diff)?
        };
        debug!(id = %self.id, duration_us = start.elapsed().as_micros() as u64, events = events.len(), "diff");

        if !events.is_empty() {
            let resp = self.transport.eager_sync(
                &peer.net_addr,
                hearsay_messages::EagerSyncRequest {
                    from_id: self.id,
                    events,
                },
            )?;
            debug!(id = %self.id, from_id = %resp.from_id, success = resp.success, "eager sync response");
        }

        Ok(())
    }

    /// Insert events and advance consensus, as one unit under the caller's
    /// core lock.
    pub(crate) fn sync_into(core: &mut C, events: Vec<WireEvent>) -> Result<(), CoreError> {
        core.sync(events)?;
        core.run_consensus()
    }

    // ─── Catchup ────────────────────────────────────────────────────────

    /// Replace local state from a peer's anchor block, frame, and snapshot.
    fn fast_forward(&self) -> Result<(), NodeError> {
        debug!(id = %self.id, "catching up");

        // Let in-flight rpc/gossip tasks drain so the engine is quiescent.
        self.wait_group.wait();

        self.refresh_selector();
        let peer = self.selector.lock().next().ok_or(NodeError::NoPeers)?;

        let start = Instant::now();
        let resp = self
            .transport
            .fast_forward(&peer.net_addr, FastForwardRequest { from_id: self.id })?;
        debug!(
            id = %self.id,
            duration_us = start.elapsed().as_micros() as u64,
            from_id = %resp.from_id,
            block_index = resp.block.index(),
            block_round_received = resp.block.round_received(),
            frame_round = resp.frame.round,
            frame_events = resp.frame.events.len(),
            snapshot_len = resp.snapshot.len(),
            "fast forward response"
        );

        {
            let mut core = self.core.lock();
            core.fast_forward(&peer.pub_key_hex, &resp.block, &resp.frame)?;
        }

        // Restore runs outside the core lock: it is application I/O.
        self.proxy.restore(&resp.snapshot)?;

        info!(id = %self.id, block_index = resp.block.index(), "fast-forward complete");
        self.state.set(NodeState::Babbling);
        Ok(())
    }

    // ─── Join ───────────────────────────────────────────────────────────

    /// Contact the bootstrap peer and move to CatchingUp.
    fn connect(&self, addr: &str) -> Result<(), NodeError> {
        let resp = match self.transport.join(
            addr,
            JoinRequest {
                from_id: self.id,
                peer: self.own_peer(),
            },
        ) {
            Ok(resp) => resp,
            Err(e) => {
                // No way into the cluster; give up rather than loop on a
                // dead bootstrap address.
                self.state.enter_shutdown();
                return Err(e.into());
            }
        };

        info!(id = %self.id, via = %resp.peer.id, "joined, catching up");

        let peers = {
            let mut core = self.core.lock();
            let peers = core.peers().with_new_peer(&resp.peer);
            core.set_peers(peers.clone());
            peers
        };

        if let Err(e) = self.store.set_peer_set(1, &peers) {
            warn!(id = %self.id, error = %e, "persisting joined peer set");
        }

        {
            let mut selector = self.selector.lock();
            selector.set_peers(peers);
        }

        self.state.set(NodeState::CatchingUp);
        Ok(())
    }

    // ─── Shutdown ───────────────────────────────────────────────────────

    pub(crate) fn shutdown(&self) {
        // Idempotence is tracked separately from the state cell: a node may
        // already sit in Shutdown (failed join) with resources still open.
        if self.shutdown_done.swap(true, Ordering::AcqRel) {
            return;
        }

        debug!(id = %self.id, "shutdown");
        self.state.enter_shutdown();

        self.shutdown.trigger();
        self.wait_group.wait();
        self.control_timer.shutdown();

        // Transport and store close only once every tracked task has
        // drained; earlier would hand closed handles to in-flight work.
        self.transport.close();
        if let Err(e) = self.store.close() {
            warn!(id = %self.id, error = %e, "closing store");
        }
    }

    // ─── Stats ──────────────────────────────────────────────────────────

    pub(crate) fn sync_rate(&self) -> f64 {
        let requests = self.sync_requests.load(Ordering::Relaxed);
        if requests == 0 {
            return 1.0;
        }
        1.0 - self.sync_errors.load(Ordering::Relaxed) as f64 / requests as f64
    }

    pub(crate) fn stats(&self) -> BTreeMap<String, String> {
        let num_peers = self.selector.lock().peers().len();
        let elapsed = self.start.elapsed().as_secs_f64().max(f64::EPSILON);

        let core = self.core.lock();
        let consensus_events = core.consensus_events_count();
        let last_consensus_round = core.last_consensus_round();
        let rounds_per_second = last_consensus_round
            .map(|r| r as f64 / elapsed)
            .unwrap_or(0.0);

        let mut stats = BTreeMap::new();
        stats.insert(
            "last_consensus_round".into(),
            last_consensus_round.map_or("nil".into(), |r| r.to_string()),
        );
        stats.insert("last_block_index".into(), core.last_block_index().to_string());
        stats.insert("consensus_events".into(), consensus_events.to_string());
        stats.insert(
            "consensus_transactions".into(),
            core.consensus_transactions_count().to_string(),
        );
        stats.insert(
            "undetermined_events".into(),
            core.undetermined_events_count().to_string(),
        );
        stats.insert(
            "transaction_pool".into(),
            core.transaction_pool_len().to_string(),
        );
        stats.insert("num_peers".into(), num_peers.to_string());
        stats.insert("sync_rate".into(), format!("{:.2}", self.sync_rate()));
        stats.insert(
            "events_per_second".into(),
            format!("{:.2}", consensus_events as f64 / elapsed),
        );
        stats.insert(
            "rounds_per_second".into(),
            format!("{:.2}", rounds_per_second),
        );
        stats.insert(
            "round_events".into(),
            core.last_round_events_count().to_string(),
        );
        stats.insert("id".into(), self.id.to_string());
        stats.insert("state".into(), self.state.get().to_string());
        stats
    }

    fn log_stats(&self) {
        let stats = self.stats();
        debug!(
            id = %self.id,
            last_consensus_round = %stats["last_consensus_round"],
            last_block_index = %stats["last_block_index"],
            consensus_events = %stats["consensus_events"],
            consensus_transactions = %stats["consensus_transactions"],
            undetermined_events = %stats["undetermined_events"],
            transaction_pool = %stats["transaction_pool"],
            num_peers = %stats["num_peers"],
            sync_rate = %stats["sync_rate"],
            state = %stats["state"],
            "stats"
        );
    }
}
