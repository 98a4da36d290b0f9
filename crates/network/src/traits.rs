//! The transport seam.

use crate::{RpcEnvelope, TransportError};
use crossbeam::channel::Receiver;
use hearsay_messages::{
    EagerSyncRequest, EagerSyncResponse, FastForwardRequest, FastForwardResponse, JoinRequest,
    JoinResponse, SyncRequest, SyncResponse,
};

/// Node-to-node RPC transport.
///
/// Inbound RPCs arrive on the consumer channel as [`RpcEnvelope`]s; the
/// outbound methods perform blocking round-trips bounded by the backend's
/// own deadline. Implementations are shared across the node's tasks, so all
/// methods take `&self`.
pub trait Transport: Send + Sync + 'static {
    /// The inbound RPC channel. The receiver is clonable; envelopes are
    /// consumed by whichever task receives them first.
    fn consumer(&self) -> Receiver<RpcEnvelope>;

    /// The address peers reach this transport at.
    fn local_addr(&self) -> &str;

    /// Pull: send a knowledge summary, receive missing events.
    fn sync(&self, target: &str, req: SyncRequest) -> Result<SyncResponse, TransportError>;

    /// Push: send events the target lacks.
    fn eager_sync(
        &self,
        target: &str,
        req: EagerSyncRequest,
    ) -> Result<EagerSyncResponse, TransportError>;

    /// Bootstrap contact with a member.
    fn join(&self, target: &str, req: JoinRequest) -> Result<JoinResponse, TransportError>;

    /// Request an anchor block + frame + snapshot for catchup.
    fn fast_forward(
        &self,
        target: &str,
        req: FastForwardRequest,
    ) -> Result<FastForwardResponse, TransportError>;

    /// Stop the transport. Idempotent; subsequent outbound calls fail with
    /// [`TransportError::Closed`].
    fn close(&self);
}
