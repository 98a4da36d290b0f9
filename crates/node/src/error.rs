//! Node runtime errors.

use hearsay_core::{CoreError, StoreError};
use hearsay_network::TransportError;
use hearsay_proxy::ProxyError;
use thiserror::Error;

/// Errors from node operations.
#[derive(Debug, Error)]
pub enum NodeError {
    /// A transport round-trip failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The consensus engine failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The application proxy failed.
    #[error(transparent)]
    Proxy(#[from] ProxyError),

    /// No peer is selectable for the attempted operation.
    #[error("no selectable peer")]
    NoPeers,
}
