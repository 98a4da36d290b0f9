//! Error types for the engine and store seams.

use thiserror::Error;

/// Errors surfaced by a [`ConsensusCore`](crate::ConsensusCore).
#[derive(Debug, Error)]
pub enum CoreError {
    /// An event referenced a parent the engine has not seen.
    #[error("unknown parent for event {creator}/{index}")]
    UnknownParent {
        /// Creator of the offending event.
        creator: u32,
        /// Creator-local index of the offending event.
        index: i64,
    },

    /// An event arrived out of order for its creator.
    #[error("out-of-order event for creator {creator}: got {got}, expected {expected}")]
    OutOfOrder {
        /// Creator of the offending event.
        creator: u32,
        /// Index that arrived.
        got: i64,
        /// Index the engine expected next.
        expected: i64,
    },

    /// No anchor block is set.
    #[error("no anchor block")]
    NoAnchorBlock,

    /// The requested block does not exist.
    #[error("no block at index {0}")]
    NoSuchBlock(i64),

    /// A fast-forward frame was rejected.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// The store failed underneath the engine.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Any other engine failure.
    #[error("{0}")]
    Other(String),
}

/// Errors surfaced by a [`Store`](crate::Store).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested key does not exist.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// The store has been closed.
    #[error("store closed")]
    Closed,

    /// Backend I/O failure.
    #[error("store i/o: {0}")]
    Io(String),
}
