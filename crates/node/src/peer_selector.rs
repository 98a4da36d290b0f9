//! Gossip target selection.

use hearsay_types::{NodeId, Peer, PeerSet};
use rand::Rng;

/// Picks the next gossip target from the current peer set.
pub trait PeerSelector: Send {
    /// The current membership snapshot.
    fn peers(&self) -> &PeerSet;

    /// Replace the membership snapshot. The last-contacted id becomes
    /// irrelevant if it is no longer present.
    fn set_peers(&mut self, peers: PeerSet);

    /// Record the most recently contacted peer.
    fn update_last(&mut self, id: NodeId);

    /// Choose the next target: never self, and not the last-contacted peer
    /// when more than one other candidate remains. Returns `None` when the
    /// selectable set is empty.
    fn next(&self) -> Option<Peer>;
}

/// Uniform random selection with a fresh draw per call.
pub struct RandomPeerSelector {
    peers: PeerSet,
    self_id: NodeId,
    last: Option<NodeId>,
}

impl RandomPeerSelector {
    /// Create a selector for `self_id` over `peers`.
    pub fn new(peers: PeerSet, self_id: NodeId) -> Self {
        Self {
            peers,
            self_id,
            last: None,
        }
    }
}

impl PeerSelector for RandomPeerSelector {
    fn peers(&self) -> &PeerSet {
        &self.peers
    }

    fn set_peers(&mut self, peers: PeerSet) {
        self.peers = peers;
    }

    fn update_last(&mut self, id: NodeId) {
        self.last = Some(id);
    }

    fn next(&self) -> Option<Peer> {
        let mut selectable = self.peers.excluding(self.self_id);

        if selectable.len() > 1 {
            if let Some(last) = self.last {
                selectable.retain(|p| p.id != last);
            }
        }

        if selectable.is_empty() {
            return None;
        }

        let i = rand::thread_rng().gen_range(0..selectable.len());
        Some(selectable[i].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(id: u32) -> Peer {
        Peer::new(NodeId(id), format!("127.0.0.1:{}", 9000 + id), format!("pk{id}"))
    }

    fn selector(ids: &[u32], self_id: u32) -> RandomPeerSelector {
        RandomPeerSelector::new(
            PeerSet::new(ids.iter().map(|&id| peer(id)).collect()),
            NodeId(self_id),
        )
    }

    #[test]
    fn next_excludes_self() {
        let s = selector(&[1, 2], 1);
        for _ in 0..20 {
            assert_eq!(s.next().unwrap().id, NodeId(2));
        }
    }

    #[test]
    fn next_excludes_last_when_choice_remains() {
        let mut s = selector(&[1, 2, 3], 1);
        s.update_last(NodeId(2));
        for _ in 0..20 {
            let picked = s.next().unwrap().id;
            assert_ne!(picked, NodeId(1));
            assert_ne!(picked, NodeId(2));
        }
    }

    #[test]
    fn last_is_allowed_when_it_is_the_only_candidate() {
        let mut s = selector(&[1, 2], 1);
        s.update_last(NodeId(2));
        assert_eq!(s.next().unwrap().id, NodeId(2));
    }

    #[test]
    fn next_is_none_when_alone() {
        let s = selector(&[1], 1);
        assert!(s.next().is_none());
    }

    #[test]
    fn draws_cover_all_candidates() {
        let s = selector(&[1, 2, 3, 4], 1);
        let mut seen = std::collections::BTreeSet::new();
        for _ in 0..200 {
            seen.insert(s.next().unwrap().id);
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn replacing_peers_drops_stale_last() {
        let mut s = selector(&[1, 2, 3], 1);
        s.update_last(NodeId(3));
        s.set_peers(PeerSet::new(vec![peer(1), peer(4), peer(5)]));
        for _ in 0..20 {
            let picked = s.next().unwrap().id;
            assert!(picked == NodeId(4) || picked == NodeId(5));
        }
    }
}
