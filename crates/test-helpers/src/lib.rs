//! Deterministic fixtures for node tests.
//!
//! - [`SimCore`] — a [`ConsensusCore`](hearsay_core::ConsensusCore) over
//!   per-creator ordered event logs. Not a real consensus algorithm (that
//!   stays external to the node), but faithful to the knowledge, diff, and
//!   sync-limit contracts the node depends on, and deterministic.
//! - [`SimApp`] — an [`AppHandler`](hearsay_proxy::AppHandler) accumulating
//!   committed transactions with snapshot/restore.
//! - [`MemoryStore`] — an internally synchronized in-memory store.
//! - [`fixtures`] — keypair/peer/node builders over a shared memory hub.

mod app;
pub mod fixtures;
mod sim_core;
mod store;

pub use app::SimApp;
pub use sim_core::SimCore;
pub use store::MemoryStore;

use std::sync::Once;
use std::time::{Duration, Instant};

static INIT_TRACING: Once = Once::new();

/// Install a test tracing subscriber honoring `RUST_LOG`. Safe to call from
/// every test.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Poll `condition` every few milliseconds until it holds or `timeout`
/// elapses. Returns whether the condition held.
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}
