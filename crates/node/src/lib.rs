//! The hearsay node runtime.
//!
//! A node is one participant in a Byzantine-fault-tolerant cluster. It
//! disseminates transactions among peers with pull-then-push gossip, drives
//! them through a consensus engine, and emits the committed blocks to the
//! application behind an [`AppProxy`](hearsay_proxy::AppProxy).
//!
//! The runtime is a four-state machine:
//!
//! ```text
//!  (initial) --addr given--> Joining --connect ok--> CatchingUp
//!                                                        |
//!                                    fast-forward ok     v
//!      Babbling <----------------------------------------+
//!         |                                              ^
//!         +----- pull reports sync limit ----------------+
//!
//!  any state --shutdown()--> Shutdown (terminal)
//! ```
//!
//! While Babbling, the node concurrently services inbound peer RPCs and
//! initiates outbound gossip on a randomized heartbeat. The consensus engine
//! is not thread-safe; a single coarse lock serializes every access, and all
//! I/O (transport round-trips, application snapshot calls) happens outside
//! that lock.

mod config;
mod control_timer;
mod error;
mod handlers;
mod node;
mod peer_selector;
mod state;

pub use config::NodeConfig;
pub use control_timer::ControlTimer;
pub use error::NodeError;
pub use node::Node;
pub use peer_selector::{PeerSelector, RandomPeerSelector};
pub use state::{NodeState, WaitGroup};
