//! Randomized heartbeat timer.

use crossbeam::channel::{after, bounded, Receiver, Sender};
use parking_lot::Mutex;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::trace;

/// A scoped heartbeat generator.
///
/// The timer is driven through its reset channel: sending a base interval
/// arms it, and after a randomized delay it emits one tick on the tick
/// channel and disarms. Ticks use a rendezvous channel, so a tick nobody is
/// waiting for is dropped rather than queued. The armed flag is observable
/// via [`is_set`](Self::is_set) so callers can avoid redundant resets.
///
/// Delays are drawn uniformly from `[base, 2 * base)` to break heartbeat
/// synchronization across the cluster.
pub struct ControlTimer {
    tick_rx: Receiver<()>,
    reset_tx: Sender<Duration>,
    set: Arc<AtomicBool>,
    stop: Mutex<Option<Sender<()>>>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl ControlTimer {
    /// Spawn the timer driver thread. The driver idles until the first
    /// reset arrives.
    pub fn spawn() -> Self {
        let (tick_tx, tick_rx) = bounded(0);
        let (reset_tx, reset_rx) = bounded::<Duration>(1);
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let set = Arc::new(AtomicBool::new(false));

        let armed_flag = Arc::clone(&set);
        let driver = std::thread::Builder::new()
            .name("control-timer".to_string())
            .spawn(move || drive(tick_tx, reset_rx, stop_rx, armed_flag))
            .expect("failed to spawn control-timer thread");

        Self {
            tick_rx,
            reset_tx,
            set,
            stop: Mutex::new(Some(stop_tx)),
            driver: Mutex::new(Some(driver)),
        }
    }

    /// The tick channel. Receivers that are not waiting when a tick fires
    /// miss it.
    pub fn tick_ch(&self) -> Receiver<()> {
        self.tick_rx.clone()
    }

    /// Whether the timer is currently armed.
    pub fn is_set(&self) -> bool {
        self.set.load(Ordering::Acquire)
    }

    /// Arm the timer with the given base interval.
    pub fn reset(&self, base: Duration) {
        let _ = self.reset_tx.send(base);
    }

    /// Stop the driver thread. Idempotent.
    pub fn shutdown(&self) {
        self.stop.lock().take();
        if let Some(handle) = self.driver.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ControlTimer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn drive(
    tick_tx: Sender<()>,
    reset_rx: Receiver<Duration>,
    stop_rx: Receiver<()>,
    set: Arc<AtomicBool>,
) {
    // Armed state lives entirely on this thread; the atomic mirrors it for
    // observers.
    let mut deadline: Option<Receiver<std::time::Instant>> = None;

    loop {
        if let Some(timer) = deadline.clone() {
            crossbeam::select! {
                recv(reset_rx) -> base => match base {
                    Ok(base) => {
                        deadline = Some(after(randomized(base)));
                        set.store(true, Ordering::Release);
                    }
                    Err(_) => return,
                },
                recv(timer) -> _ => {
                    set.store(false, Ordering::Release);
                    deadline = None;
                    // Rendezvous send: a tick with no waiting consumer is
                    // dropped.
                    if tick_tx.try_send(()).is_err() {
                        trace!("tick dropped, no consumer waiting");
                    }
                }
                recv(stop_rx) -> _ => return,
            }
        } else {
            crossbeam::select! {
                recv(reset_rx) -> base => match base {
                    Ok(base) => {
                        deadline = Some(after(randomized(base)));
                        set.store(true, Ordering::Release);
                    }
                    Err(_) => return,
                },
                recv(stop_rx) -> _ => return,
            }
        }
    }
}

/// Draw uniformly from `[base, 2 * base)`.
fn randomized(base: Duration) -> Duration {
    if base.is_zero() {
        return base;
    }
    let extra = rand::thread_rng().gen_range(0..base.as_nanos().max(1));
    base + Duration::from_nanos(extra as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn tick_arrives_after_at_least_base_interval() {
        let timer = ControlTimer::spawn();
        let ticks = timer.tick_ch();
        let base = Duration::from_millis(20);

        let start = Instant::now();
        timer.reset(base);
        ticks.recv_timeout(Duration::from_secs(1)).unwrap();

        assert!(Instant::now().duration_since(start) >= base);
        assert!(!timer.is_set());
    }

    #[test]
    fn armed_flag_tracks_reset() {
        let timer = ControlTimer::spawn();
        let ticks = timer.tick_ch();

        timer.reset(Duration::from_millis(50));
        // The driver arms before the tick fires.
        let armed_at_some_point = (0..50).any(|_| {
            std::thread::sleep(Duration::from_millis(1));
            timer.is_set()
        });
        assert!(armed_at_some_point);

        ticks.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(!timer.is_set());
    }

    #[test]
    fn unconsumed_tick_is_dropped() {
        let timer = ControlTimer::spawn();
        let ticks = timer.tick_ch();

        timer.reset(Duration::from_millis(5));
        // Nobody receives; the tick fires into the void.
        std::thread::sleep(Duration::from_millis(40));
        assert!(!timer.is_set());
        assert!(ticks.try_recv().is_err());
    }

    #[test]
    fn shutdown_is_idempotent() {
        let timer = ControlTimer::spawn();
        timer.shutdown();
        timer.shutdown();
    }

    #[test]
    fn randomized_stays_in_window() {
        let base = Duration::from_millis(100);
        for _ in 0..100 {
            let d = randomized(base);
            assert!(d >= base && d < base * 2);
        }
    }
}
