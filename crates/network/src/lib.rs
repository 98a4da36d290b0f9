//! Transport interface for node-to-node RPC.
//!
//! Defines the [`Transport`] trait implemented by concrete backends
//! (in-process: `hearsay-network-memory`; a TCP backend would slot in the
//! same way), and the inbound [`RpcEnvelope`]/[`Responder`] plumbing shared
//! by all of them.
//!
//! The wire encoding itself belongs to the backend; this crate only fixes
//! the shapes that cross the seam.

mod rpc;
mod traits;

pub use rpc::{RpcEnvelope, RpcReply, Responder};
pub use traits::Transport;

use thiserror::Error;

/// Errors from a transport round-trip.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer did not answer within the backend's deadline.
    #[error("request timed out")]
    Timeout,

    /// No route to the target address.
    #[error("peer unreachable: {0}")]
    PeerUnreachable(String),

    /// The peer answered with an error.
    #[error("peer {0} returned error: {1}")]
    PeerError(String, String),

    /// The peer answered with a response of the wrong kind.
    #[error("unexpected response kind: {0}")]
    UnexpectedResponse(&'static str),

    /// Encoding or decoding failed at the wire.
    #[error("codec: {0}")]
    Codec(String),

    /// The transport has been closed.
    #[error("transport closed")]
    Closed,
}
