//! Node configuration.

use std::time::Duration;

/// Configuration for a [`Node`](crate::Node).
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Base heartbeat interval while there is something to gossip about.
    /// Each tick is drawn uniformly from `[heartbeat, 2 * heartbeat)` to
    /// break synchronization across the cluster.
    pub heartbeat: Duration,

    /// Heartbeat base used when the node has nothing pending: no loaded
    /// events, no pooled transactions, no pooled block signatures.
    pub slow_heartbeat: Duration,

    /// Divergence threshold: a pull or push is refused once bringing the
    /// other side up to date would transfer more than this many events,
    /// forcing the lagging side into fast-forward catchup.
    pub sync_limit: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            heartbeat: Duration::from_millis(500),
            slow_heartbeat: Duration::from_secs(1),
            sync_limit: 1000,
        }
    }
}
