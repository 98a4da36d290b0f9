//! Wire-stable RPC messages exchanged between nodes.
//!
//! Four request/response pairs make up the peer protocol:
//!
//! - **Sync** — the pull half of gossip: "here is what I know, send me what
//!   I lack".
//! - **EagerSync** — the push half: "here is what you lack".
//! - **Join** — bootstrap contact from a peer that is not yet a member.
//! - **FastForward** — catchup: anchor block + frame + application snapshot.
//!
//! Every response carries the responder's id. Requests are bundled into
//! [`RpcCommand`] and responses into [`RpcResponse`] for transport-agnostic
//! dispatch; an unrecognized wire tag surfaces as [`RpcCommand::Unknown`].

mod request;
mod response;

pub use request::{EagerSyncRequest, FastForwardRequest, JoinRequest, SyncRequest};
pub use response::{EagerSyncResponse, FastForwardResponse, JoinResponse, SyncResponse};

use serde::{Deserialize, Serialize};

/// An inbound request, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RpcCommand {
    /// Pull request.
    Sync(SyncRequest),
    /// Push request.
    EagerSync(EagerSyncRequest),
    /// Bootstrap contact.
    Join(JoinRequest),
    /// Catchup request.
    FastForward(FastForwardRequest),
    /// A wire tag this build does not recognize.
    Unknown(String),
}

impl RpcCommand {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            RpcCommand::Sync(_) => "sync",
            RpcCommand::EagerSync(_) => "eager_sync",
            RpcCommand::Join(_) => "join",
            RpcCommand::FastForward(_) => "fast_forward",
            RpcCommand::Unknown(_) => "unknown",
        }
    }
}

/// An outbound response, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RpcResponse {
    /// Reply to [`RpcCommand::Sync`].
    Sync(SyncResponse),
    /// Reply to [`RpcCommand::EagerSync`].
    EagerSync(EagerSyncResponse),
    /// Reply to [`RpcCommand::Join`].
    Join(JoinResponse),
    /// Reply to [`RpcCommand::FastForward`].
    FastForward(FastForwardResponse),
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearsay_types::{KnownMap, NodeId};

    #[test]
    fn command_kind_names() {
        let cmd = RpcCommand::Sync(SyncRequest {
            from_id: NodeId(1),
            known: KnownMap::new(),
        });
        assert_eq!(cmd.kind(), "sync");
        assert_eq!(RpcCommand::Unknown("gossip.v9".into()).kind(), "unknown");
    }

    #[test]
    fn command_roundtrips_through_codec() {
        let cmd = RpcCommand::Sync(SyncRequest {
            from_id: NodeId(3),
            known: [(NodeId(1), 4i64)].into_iter().collect(),
        });
        let bytes = bincode::serialize(&cmd).unwrap();
        let decoded: RpcCommand = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, cmd);
    }
}
