//! The per-node transport handle.

use crate::Hub;
use crossbeam::channel::Receiver;
use hearsay_messages::{
    EagerSyncRequest, EagerSyncResponse, FastForwardRequest, FastForwardResponse, JoinRequest,
    JoinResponse, RpcCommand, RpcResponse, SyncRequest, SyncResponse,
};
use hearsay_network::{RpcEnvelope, Transport, TransportError};
use hearsay_types::NodeId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A [`Transport`] backed by an in-process [`Hub`].
pub struct MemTransport {
    id: NodeId,
    addr: String,
    hub: Arc<Hub>,
    consumer: Receiver<RpcEnvelope>,
    closed: AtomicBool,
}

impl MemTransport {
    /// Register `addr` on the hub and return a transport bound to it.
    pub fn new(id: NodeId, addr: impl Into<String>, hub: Arc<Hub>) -> Self {
        let addr = addr.into();
        let consumer = hub.register(&addr);
        Self {
            id,
            addr,
            hub,
            consumer,
            closed: AtomicBool::new(false),
        }
    }

    fn call(&self, target: &str, command: RpcCommand) -> Result<RpcResponse, TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }

        let reply = self.hub.request(self.id, target, command)?;

        if let Some(error) = reply.error {
            return Err(TransportError::PeerError(target.to_string(), error));
        }
        reply
            .body
            .ok_or_else(|| TransportError::PeerError(target.to_string(), "empty reply".into()))
    }
}

impl Transport for MemTransport {
    fn consumer(&self) -> Receiver<RpcEnvelope> {
        self.consumer.clone()
    }

    fn local_addr(&self) -> &str {
        &self.addr
    }

    fn sync(&self, target: &str, req: SyncRequest) -> Result<SyncResponse, TransportError> {
        match self.call(target, RpcCommand::Sync(req))? {
            RpcResponse::Sync(resp) => Ok(resp),
            other => Err(TransportError::UnexpectedResponse(kind_of(&other))),
        }
    }

    fn eager_sync(
        &self,
        target: &str,
        req: EagerSyncRequest,
    ) -> Result<EagerSyncResponse, TransportError> {
        match self.call(target, RpcCommand::EagerSync(req))? {
            RpcResponse::EagerSync(resp) => Ok(resp),
            other => Err(TransportError::UnexpectedResponse(kind_of(&other))),
        }
    }

    fn join(&self, target: &str, req: JoinRequest) -> Result<JoinResponse, TransportError> {
        match self.call(target, RpcCommand::Join(req))? {
            RpcResponse::Join(resp) => Ok(resp),
            other => Err(TransportError::UnexpectedResponse(kind_of(&other))),
        }
    }

    fn fast_forward(
        &self,
        target: &str,
        req: FastForwardRequest,
    ) -> Result<FastForwardResponse, TransportError> {
        match self.call(target, RpcCommand::FastForward(req))? {
            RpcResponse::FastForward(resp) => Ok(resp),
            other => Err(TransportError::UnexpectedResponse(kind_of(&other))),
        }
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.hub.disconnect(&self.addr);
        }
    }
}

fn kind_of(resp: &RpcResponse) -> &'static str {
    match resp {
        RpcResponse::Sync(_) => "sync",
        RpcResponse::EagerSync(_) => "eager_sync",
        RpcResponse::Join(_) => "join",
        RpcResponse::FastForward(_) => "fast_forward",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HubConfig;
    use hearsay_types::KnownMap;

    fn pair(hub: &Arc<Hub>) -> (MemTransport, MemTransport) {
        (
            MemTransport::new(NodeId(1), "a", hub.clone()),
            MemTransport::new(NodeId(2), "b", hub.clone()),
        )
    }

    #[test]
    fn typed_roundtrip_between_two_transports() {
        let hub = Hub::new(HubConfig::default());
        let (a, b) = pair(&hub);

        let inbox = b.consumer();
        let handler = std::thread::spawn(move || {
            let envelope = inbox.recv().unwrap();
            let RpcCommand::Sync(req) = envelope.command else {
                panic!("expected sync");
            };
            envelope.responder.respond(
                Some(RpcResponse::Sync(SyncResponse {
                    from_id: NodeId(2),
                    sync_limit: false,
                    events: vec![],
                    known: req.known,
                })),
                None,
            );
        });

        let resp = a
            .sync(
                "b",
                SyncRequest {
                    from_id: NodeId(1),
                    known: KnownMap::new(),
                },
            )
            .unwrap();
        assert_eq!(resp.from_id, NodeId(2));
        handler.join().unwrap();
    }

    #[test]
    fn mismatched_response_kind_is_rejected() {
        let hub = Hub::new(HubConfig::default());
        let (a, b) = pair(&hub);

        let inbox = b.consumer();
        let handler = std::thread::spawn(move || {
            let envelope = inbox.recv().unwrap();
            envelope.responder.respond(
                Some(RpcResponse::EagerSync(EagerSyncResponse {
                    from_id: NodeId(2),
                    success: true,
                })),
                None,
            );
        });

        let err = a
            .sync(
                "b",
                SyncRequest {
                    from_id: NodeId(1),
                    known: KnownMap::new(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, TransportError::UnexpectedResponse(_)));
        handler.join().unwrap();
    }

    #[test]
    fn closed_transport_refuses_outbound() {
        let hub = Hub::new(HubConfig::default());
        let (a, _b) = pair(&hub);

        a.close();
        a.close(); // idempotent

        let err = a
            .sync(
                "b",
                SyncRequest {
                    from_id: NodeId(1),
                    known: KnownMap::new(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[test]
    fn peer_error_reply_surfaces_as_peer_error() {
        let hub = Hub::new(HubConfig::default());
        let (a, b) = pair(&hub);

        let inbox = b.consumer();
        let handler = std::thread::spawn(move || {
            let envelope = inbox.recv().unwrap();
            envelope.responder.respond(None, Some("engine failure".into()));
        });

        let err = a
            .sync(
                "b",
                SyncRequest {
                    from_id: NodeId(1),
                    known: KnownMap::new(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, TransportError::PeerError(_, _)));
        handler.join().unwrap();
    }
}
