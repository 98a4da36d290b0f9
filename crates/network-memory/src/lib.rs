//! In-process transport backend.
//!
//! A [`Hub`] routes RPC envelopes between transports registered under string
//! addresses, standing in for a real network in tests and simulation.
//!
//! Two production-path concerns are kept honest here:
//!
//! - **Codec round-trip**: with [`HubConfig::codec_roundtrip`] enabled
//!   (the default), every command and reply is serialized and deserialized
//!   through `bincode`, exercising the same serde derives a wire backend
//!   would use.
//! - **Traffic accounting**: the hub counts requests per kind, so tests can
//!   assert not just on outcomes but on what was (or was not) sent.

mod hub;
mod transport;

pub use hub::{Hub, HubConfig, TrafficStats};
pub use transport::MemTransport;
