//! Cluster membership types.

use crate::NodeId;
use serde::{Deserialize, Serialize};

/// A member of the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    /// Unique identifier within the cluster.
    pub id: NodeId,
    /// Network address the peer's transport listens on.
    pub net_addr: String,
    /// Hex-encoded public key.
    pub pub_key_hex: String,
}

impl Peer {
    /// Create a new peer record.
    pub fn new(id: NodeId, net_addr: impl Into<String>, pub_key_hex: impl Into<String>) -> Self {
        Self {
            id,
            net_addr: net_addr.into(),
            pub_key_hex: pub_key_hex.into(),
        }
    }
}

/// A value-typed snapshot of the cluster membership, ordered by id.
///
/// Mutation produces a new snapshot; holders of an older snapshot are never
/// affected. Duplicate ids are collapsed, last write wins.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PeerSet {
    peers: Vec<Peer>,
}

impl PeerSet {
    /// Create a peer set from the given peers, sorted by id.
    pub fn new(mut peers: Vec<Peer>) -> Self {
        peers.sort_by_key(|p| p.id);
        peers.dedup_by_key(|p| p.id);
        Self { peers }
    }

    /// Number of peers in the set.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// The peers in id order.
    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    /// All peer ids in order.
    pub fn ids(&self) -> Vec<NodeId> {
        self.peers.iter().map(|p| p.id).collect()
    }

    /// Find a peer by id.
    pub fn get(&self, id: NodeId) -> Option<&Peer> {
        self.peers.iter().find(|p| p.id == id)
    }

    /// Whether the set contains the given id.
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// A new snapshot with `peer` added (replacing any peer with the same id).
    pub fn with_new_peer(&self, peer: &Peer) -> Self {
        let mut peers: Vec<Peer> = self
            .peers
            .iter()
            .filter(|p| p.id != peer.id)
            .cloned()
            .collect();
        peers.push(peer.clone());
        Self::new(peers)
    }

    /// A new snapshot with the peer identified by `id` removed.
    pub fn without_peer(&self, id: NodeId) -> Self {
        Self {
            peers: self.peers.iter().filter(|p| p.id != id).cloned().collect(),
        }
    }

    /// The peers excluding the given id.
    pub fn excluding(&self, id: NodeId) -> Vec<&Peer> {
        self.peers.iter().filter(|p| p.id != id).collect()
    }
}

impl FromIterator<Peer> for PeerSet {
    fn from_iter<I: IntoIterator<Item = Peer>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(id: u32) -> Peer {
        Peer::new(NodeId(id), format!("127.0.0.1:{}", 9000 + id), format!("pk{id}"))
    }

    #[test]
    fn peers_sorted_by_id() {
        let set = PeerSet::new(vec![peer(3), peer(1), peer(2)]);
        assert_eq!(set.ids(), vec![NodeId(1), NodeId(2), NodeId(3)]);
    }

    #[test]
    fn with_new_peer_is_copy_on_write() {
        let original = PeerSet::new(vec![peer(1)]);
        let grown = original.with_new_peer(&peer(2));

        assert_eq!(original.len(), 1);
        assert_eq!(grown.len(), 2);
        assert!(grown.contains(NodeId(2)));
    }

    #[test]
    fn with_new_peer_replaces_same_id() {
        let set = PeerSet::new(vec![peer(1)]);
        let replacement = Peer::new(NodeId(1), "10.0.0.1:9001", "pk1b");
        let updated = set.with_new_peer(&replacement);

        assert_eq!(updated.len(), 1);
        assert_eq!(updated.get(NodeId(1)).unwrap().net_addr, "10.0.0.1:9001");
    }

    #[test]
    fn excluding_filters_id() {
        let set = PeerSet::new(vec![peer(1), peer(2), peer(3)]);
        let rest = set.excluding(NodeId(2));
        assert_eq!(rest.len(), 2);
        assert!(rest.iter().all(|p| p.id != NodeId(2)));
    }
}
