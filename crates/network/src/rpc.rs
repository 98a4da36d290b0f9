//! Inbound RPC envelopes.

use crossbeam::channel::Sender;
use hearsay_messages::{RpcCommand, RpcResponse};
use hearsay_types::NodeId;

/// What a handler sends back for one RPC.
///
/// A reply may carry a body, an error, or both — a sync handler that fails
/// halfway replies with the partial body it assembled plus the error.
#[derive(Debug, Clone)]
pub struct RpcReply {
    /// The response body, if the handler produced one.
    pub body: Option<RpcResponse>,
    /// The handler's error, if any.
    pub error: Option<String>,
}

impl RpcReply {
    /// A successful reply.
    pub fn ok(body: RpcResponse) -> Self {
        Self {
            body: Some(body),
            error: None,
        }
    }

    /// An error reply with no body.
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            body: None,
            error: Some(error.into()),
        }
    }
}

/// One-shot reply channel for an inbound RPC.
///
/// `respond` consumes the responder, so every RPC is answered exactly once;
/// the type system rules out double replies and makes a dropped (unanswered)
/// envelope visible to the waiting caller as a disconnect.
#[derive(Debug)]
pub struct Responder {
    tx: Sender<RpcReply>,
}

impl Responder {
    /// Create a responder writing into `tx`.
    pub fn new(tx: Sender<RpcReply>) -> Self {
        Self { tx }
    }

    /// Send the reply. Returns false if the requester has gone away.
    pub fn respond(self, body: Option<RpcResponse>, error: Option<String>) -> bool {
        self.tx.send(RpcReply { body, error }).is_ok()
    }
}

/// An inbound RPC: the decoded command plus its one-shot reply channel.
#[derive(Debug)]
pub struct RpcEnvelope {
    /// Sender's claimed id.
    pub from: NodeId,
    /// The decoded request.
    pub command: RpcCommand,
    /// Reply channel, consumed by the handler.
    pub responder: Responder,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::bounded;
    use hearsay_messages::EagerSyncResponse;

    #[test]
    fn respond_delivers_once() {
        let (tx, rx) = bounded(1);
        let responder = Responder::new(tx);

        let body = RpcResponse::EagerSync(EagerSyncResponse {
            from_id: NodeId(1),
            success: true,
        });
        assert!(responder.respond(Some(body), None));

        let reply = rx.recv().unwrap();
        assert!(reply.error.is_none());
        assert!(matches!(reply.body, Some(RpcResponse::EagerSync(_))));
        // Responder was consumed; a second respond cannot be expressed.
    }

    #[test]
    fn respond_to_gone_requester_reports_failure() {
        let (tx, rx) = bounded::<RpcReply>(1);
        drop(rx);
        let responder = Responder::new(tx);
        assert!(!responder.respond(None, Some("late".into())));
    }
}
