//! Builders for node collaborators over a shared memory hub.

use crate::{MemoryStore, SimApp, SimCore};
use ed25519_dalek::SigningKey;
use hearsay_network_memory::{Hub, MemTransport};
use hearsay_proxy::{AppProxy, InmemProxy};
use hearsay_types::{NodeId, Peer, PeerSet};
use rand::rngs::OsRng;
use std::sync::Arc;

/// Identity material for one test node.
pub struct NodeSeed {
    /// The node's id.
    pub id: NodeId,
    /// Hub address the node's transport registers under.
    pub addr: String,
    /// Signing key.
    pub signing_key: SigningKey,
    /// The node's peer record, with the derived public-key-hex.
    pub peer: Peer,
}

/// Generate identity material for node `id`.
pub fn node_seed(id: u32) -> NodeSeed {
    let signing_key = SigningKey::generate(&mut OsRng);
    let pub_key_hex = hex::encode(signing_key.verifying_key().as_bytes());
    let addr = format!("node-{id}");
    NodeSeed {
        id: NodeId(id),
        addr: addr.clone(),
        signing_key,
        peer: Peer::new(NodeId(id), addr, pub_key_hex),
    }
}

/// The peer set containing the given seeds.
pub fn peer_set(seeds: &[&NodeSeed]) -> PeerSet {
    seeds.iter().map(|s| s.peer.clone()).collect()
}

/// Everything a node is constructed over, wired together.
pub struct Collaborators {
    /// Application proxy whose commit callback the core already holds.
    pub proxy: Arc<InmemProxy<SimApp>>,
    /// Shared store.
    pub store: Arc<MemoryStore>,
    /// The consensus core.
    pub core: SimCore,
    /// Transport registered on the hub under the seed's address.
    pub transport: MemTransport,
}

/// Build collaborators for `seed` with membership `peers`.
pub fn collaborators(hub: &Arc<Hub>, seed: &NodeSeed, peers: PeerSet) -> Collaborators {
    let proxy = Arc::new(InmemProxy::new(SimApp::new()));
    let store = Arc::new(MemoryStore::new());

    let commit_proxy = Arc::clone(&proxy);
    let core = SimCore::new(
        seed.id,
        peers,
        Arc::clone(&store),
        Arc::new(move |block| commit_proxy.commit_block(block)),
    );

    let transport = MemTransport::new(seed.id, seed.addr.clone(), Arc::clone(hub));

    Collaborators {
        proxy,
        store,
        core,
        transport,
    }
}
