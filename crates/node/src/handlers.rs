//! Inbound RPC handlers.
//!
//! Every envelope is answered exactly once, including unknown commands.
//! Handlers touch the engine only under the core lock and keep their
//! critical sections short; the one piece of I/O (the snapshot fetch for a
//! fast-forward) runs outside it.

use crate::node::NodeInner;
use hearsay_core::{ConsensusCore, CoreError, Store};
use hearsay_messages::{
    EagerSyncRequest, EagerSyncResponse, FastForwardRequest, FastForwardResponse, JoinRequest,
    JoinResponse, RpcCommand, RpcResponse, SyncRequest, SyncResponse,
};
use hearsay_network::{Responder, RpcEnvelope, Transport};
use hearsay_proxy::AppProxy;
use hearsay_types::{InternalTransaction, KnownMap};
use std::sync::atomic::Ordering;
use tracing::{debug, info, warn};

/// How many self-events a lone node manufactures to force consensus when a
/// joiner needs a frame to adopt.
const JOIN_SELF_EVENTS: usize = 10;

impl<C, S, T, A> NodeInner<C, S, T, A>
where
    C: ConsensusCore,
    S: Store,
    T: Transport,
    A: AppProxy,
{
    /// Demultiplex one inbound RPC to its handler.
    pub(crate) fn process_rpc(&self, envelope: RpcEnvelope) {
        let RpcEnvelope {
            from,
            command,
            responder,
        } = envelope;

        match command {
            RpcCommand::Sync(req) => self.handle_sync(req, responder),
            RpcCommand::EagerSync(req) => self.handle_eager_sync(req, responder),
            RpcCommand::Join(req) => self.handle_join(req, responder),
            RpcCommand::FastForward(req) => self.handle_fast_forward(req, responder),
            RpcCommand::Unknown(tag) => {
                warn!(id = %self.id, %from, %tag, "unexpected command");
                responder.respond(None, Some(format!("unexpected command: {tag}")));
            }
        }
    }

    /// Serve the pull half of gossip.
    fn handle_sync(&self, req: SyncRequest, responder: Responder) {
        debug!(id = %self.id, from = %req.from_id, known = req.known.len(), "sync request");
        self.sync_requests.fetch_add(1, Ordering::Relaxed);

        let mut resp = SyncResponse {
            from_id: self.id,
            sync_limit: false,
            events: Vec::new(),
            known: KnownMap::new(),
        };
        let mut error = None;

        {
            let core = self.core.lock();
            if core.over_sync_limit(&req.known, self.config.sync_limit) {
                debug!(id = %self.id, from = %req.from_id, "requester over sync limit");
                resp.sync_limit = true;
            } else {
                match core
                    .event_diff(&req.known)
                    .and_then(|diff| core.to_wire(diff))
                {
                    Ok(events) => resp.events = events,
                    Err(e) => error = Some(e.to_string()),
                }
            }
            resp.known = core.known_events();
        }

        if error.is_some() {
            self.sync_errors.fetch_add(1, Ordering::Relaxed);
        }

        debug!(
            id = %self.id,
            to = %req.from_id,
            events = resp.events.len(),
            sync_limit = resp.sync_limit,
            "sync response"
        );
        // Partial body plus error when the diff failed halfway.
        responder.respond(Some(RpcResponse::Sync(resp)), error);
    }

    /// Serve the push half of gossip.
    fn handle_eager_sync(&self, req: EagerSyncRequest, responder: Responder) {
        debug!(id = %self.id, from = %req.from_id, events = req.events.len(), "eager sync request");

        let result = {
            let mut core = self.core.lock();
            Self::sync_into(&mut core, req.events)
        };

        let success = result.is_ok();
        let error = result.err().map(|e| e.to_string());
        if let Some(ref e) = error {
            warn!(id = %self.id, from = %req.from_id, error = %e, "eager sync failed");
        }

        responder.respond(
            Some(RpcResponse::EagerSync(EagerSyncResponse {
                from_id: self.id,
                success,
            })),
            error,
        );
    }

    /// Serve a catchup request with the anchor block, its frame, and the
    /// application snapshot at that block.
    fn handle_fast_forward(&self, req: FastForwardRequest, responder: Responder) {
        debug!(id = %self.id, from = %req.from_id, "fast forward request");

        let anchor = {
            let core = self.core.lock();
            core.get_anchor_block_with_frame()
        };

        let (block, frame) = match anchor {
            Ok(anchor) => anchor,
            Err(e) => {
                warn!(id = %self.id, error = %e, "no anchor to serve");
                responder.respond(None, Some(e.to_string()));
                return;
            }
        };

        // Application I/O, outside the core lock.
        match self.proxy.get_snapshot(block.index()) {
            Ok(snapshot) => {
                responder.respond(
                    Some(RpcResponse::FastForward(FastForwardResponse {
                        from_id: self.id,
                        block,
                        frame,
                        snapshot,
                    })),
                    None,
                );
            }
            Err(e) => {
                warn!(id = %self.id, error = %e, "snapshot unavailable");
                responder.respond(None, Some(e.to_string()));
            }
        }
    }

    /// Serve a bootstrap contact from a prospective member.
    ///
    /// The join flows through consensus as an internal transaction. A lone
    /// node cannot witness gossip, so it manufactures self-events until
    /// consensus emits a frame the joiner can adopt.
    fn handle_join(&self, req: JoinRequest, responder: Responder) {
        info!(id = %self.id, from = %req.from_id, addr = %req.peer.net_addr, "join request");

        let error = {
            let mut core = self.core.lock();
            core.add_internal_transactions(vec![InternalTransaction::join(req.peer)]);

            let forced = (|| -> Result<(), CoreError> {
                if core.peers().len() == 1 {
                    for _ in 0..JOIN_SELF_EVENTS {
                        core.add_self_event()?;
                        core.run_consensus()?;
                        if core.last_block_index() >= 0 {
                            break;
                        }
                    }
                }
                core.run_consensus()?;

                if core.anchor_block().is_none() {
                    let last = core.last_block_index();
                    if last >= 0 {
                        core.set_anchor_block(last)?;
                    }
                }
                Ok(())
            })();

            forced.err().map(|e| e.to_string())
        };

        if let Some(ref e) = error {
            warn!(id = %self.id, from = %req.from_id, error = %e, "join handling failed");
        }

        // The reply always carries our own record; the joiner fast-forwards
        // from here once the transport round-trip succeeds.
        responder.respond(
            Some(RpcResponse::Join(JoinResponse {
                from_id: self.id,
                peer: self.own_peer(),
            })),
            error,
        );
    }
}
