//! Envelope routing between registered addresses.

use crossbeam::channel::{bounded, unbounded, Receiver, Sender};
use hearsay_messages::RpcCommand;
use hearsay_network::{Responder, RpcEnvelope, RpcReply, TransportError};
use hearsay_types::NodeId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Configuration for the in-process hub.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Deadline for one request/response round-trip.
    pub request_timeout: Duration,

    /// When enabled, commands and replies are bincode-encoded in the hub and
    /// decoded on delivery, exercising the same serialization path a wire
    /// backend would use.
    pub codec_roundtrip: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(1),
            codec_roundtrip: true,
        }
    }
}

/// Per-kind request counts observed by the hub.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrafficStats {
    /// Sync (pull) requests routed.
    pub sync: u64,
    /// EagerSync (push) requests routed.
    pub eager_sync: u64,
    /// Join requests routed.
    pub join: u64,
    /// FastForward requests routed.
    pub fast_forward: u64,
    /// Unrecognized commands routed.
    pub unknown: u64,
}

#[derive(Default)]
struct TrafficCounters {
    sync: AtomicU64,
    eager_sync: AtomicU64,
    join: AtomicU64,
    fast_forward: AtomicU64,
    unknown: AtomicU64,
}

impl TrafficCounters {
    fn record(&self, command: &RpcCommand) {
        let counter = match command {
            RpcCommand::Sync(_) => &self.sync,
            RpcCommand::EagerSync(_) => &self.eager_sync,
            RpcCommand::Join(_) => &self.join,
            RpcCommand::FastForward(_) => &self.fast_forward,
            RpcCommand::Unknown(_) => &self.unknown,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> TrafficStats {
        TrafficStats {
            sync: self.sync.load(Ordering::Relaxed),
            eager_sync: self.eager_sync.load(Ordering::Relaxed),
            join: self.join.load(Ordering::Relaxed),
            fast_forward: self.fast_forward.load(Ordering::Relaxed),
            unknown: self.unknown.load(Ordering::Relaxed),
        }
    }
}

/// In-process router connecting [`MemTransport`](crate::MemTransport)s.
pub struct Hub {
    config: HubConfig,
    inboxes: Mutex<HashMap<String, Sender<RpcEnvelope>>>,
    traffic: TrafficCounters,
}

impl Hub {
    /// Create a hub with the given configuration.
    pub fn new(config: HubConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            inboxes: Mutex::new(HashMap::new()),
            traffic: TrafficCounters::default(),
        })
    }

    /// Register `addr` and return the inbound envelope channel for it.
    ///
    /// Re-registering an address replaces the previous inbox.
    pub(crate) fn register(&self, addr: &str) -> Receiver<RpcEnvelope> {
        let (tx, rx) = unbounded();
        self.inboxes.lock().insert(addr.to_string(), tx);
        rx
    }

    /// Remove `addr` from the routing table, simulating an unreachable peer.
    pub fn disconnect(&self, addr: &str) {
        self.inboxes.lock().remove(addr);
    }

    /// Per-kind request counts so far.
    pub fn traffic(&self) -> TrafficStats {
        self.traffic.snapshot()
    }

    /// Route one request to `target` and wait for its reply.
    ///
    /// Public so tests can inject arbitrary commands (including
    /// [`RpcCommand::Unknown`]) without a registered sender.
    pub fn request(
        &self,
        from: NodeId,
        target: &str,
        command: RpcCommand,
    ) -> Result<RpcReply, TransportError> {
        self.traffic.record(&command);

        let command = if self.config.codec_roundtrip {
            roundtrip(&command)?
        } else {
            command
        };

        let inbox = self
            .inboxes
            .lock()
            .get(target)
            .cloned()
            .ok_or_else(|| TransportError::PeerUnreachable(target.to_string()))?;

        let (reply_tx, reply_rx) = bounded(1);
        let envelope = RpcEnvelope {
            from,
            command,
            responder: Responder::new(reply_tx),
        };

        trace!(%from, target, "routing rpc");

        inbox
            .send(envelope)
            .map_err(|_| TransportError::PeerUnreachable(target.to_string()))?;

        let reply = reply_rx
            .recv_timeout(self.config.request_timeout)
            .map_err(|_| TransportError::Timeout)?;

        if self.config.codec_roundtrip {
            roundtrip_reply(reply)
        } else {
            Ok(reply)
        }
    }
}

fn roundtrip(command: &RpcCommand) -> Result<RpcCommand, TransportError> {
    let bytes = bincode::serialize(command).map_err(|e| TransportError::Codec(e.to_string()))?;
    bincode::deserialize(&bytes).map_err(|e| TransportError::Codec(e.to_string()))
}

fn roundtrip_reply(reply: RpcReply) -> Result<RpcReply, TransportError> {
    let body = match reply.body {
        Some(body) => {
            let bytes =
                bincode::serialize(&body).map_err(|e| TransportError::Codec(e.to_string()))?;
            Some(bincode::deserialize(&bytes).map_err(|e| TransportError::Codec(e.to_string()))?)
        }
        None => None,
    };
    Ok(RpcReply {
        body,
        error: reply.error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearsay_messages::{RpcResponse, SyncRequest, SyncResponse};
    use hearsay_types::KnownMap;

    fn sync_command(from: u32) -> RpcCommand {
        RpcCommand::Sync(SyncRequest {
            from_id: NodeId(from),
            known: KnownMap::new(),
        })
    }

    #[test]
    fn request_to_unregistered_address_is_unreachable() {
        let hub = Hub::new(HubConfig::default());
        let err = hub
            .request(NodeId(1), "nowhere", sync_command(1))
            .unwrap_err();
        assert!(matches!(err, TransportError::PeerUnreachable(_)));
    }

    #[test]
    fn request_reaches_inbox_and_reply_comes_back() {
        let hub = Hub::new(HubConfig::default());
        let inbox = hub.register("b");

        let handler = std::thread::spawn(move || {
            let envelope = inbox.recv().unwrap();
            assert_eq!(envelope.command.kind(), "sync");
            envelope.responder.respond(
                Some(RpcResponse::Sync(SyncResponse {
                    from_id: NodeId(2),
                    sync_limit: false,
                    events: vec![],
                    known: KnownMap::new(),
                })),
                None,
            );
        });

        let reply = hub.request(NodeId(1), "b", sync_command(1)).unwrap();
        assert!(reply.error.is_none());
        assert!(matches!(reply.body, Some(RpcResponse::Sync(_))));
        handler.join().unwrap();

        assert_eq!(hub.traffic().sync, 1);
    }

    #[test]
    fn unanswered_request_times_out() {
        let hub = Hub::new(HubConfig {
            request_timeout: Duration::from_millis(20),
            codec_roundtrip: false,
        });
        let inbox = hub.register("b");

        let err = hub.request(NodeId(1), "b", sync_command(1)).unwrap_err();
        assert!(matches!(err, TransportError::Timeout));

        // The envelope arrived; its responder was simply never consumed.
        assert!(inbox.try_recv().is_ok());
    }

    #[test]
    fn disconnect_makes_peer_unreachable() {
        let hub = Hub::new(HubConfig::default());
        let _inbox = hub.register("b");
        hub.disconnect("b");
        let err = hub.request(NodeId(1), "b", sync_command(1)).unwrap_err();
        assert!(matches!(err, TransportError::PeerUnreachable(_)));
    }
}
