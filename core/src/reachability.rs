//! Network reachability.
//!
//! The client consults [`Reachability::is_connected`] synchronously before
//! every dispatch and refuses to send while it reports `false`.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;
use tracing::{debug, info};

pub trait Reachability: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Begin observing. Called once when a client is built.
    fn start(&self) {}

    /// Stop observing. Called once when the last client handle goes away.
    fn stop(&self) {}
}

/// Reports connectivity unconditionally.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysReachable;

impl Reachability for AlwaysReachable {
    fn is_connected(&self) -> bool {
        true
    }
}

/// Connectivity flag fed by the host platform.
///
/// Whatever observes the real network calls [`NetworkMonitor::set_connected`]
/// from any thread. Updates arriving while the monitor is stopped are
/// ignored, so a stopped monitor keeps reporting its last known state.
#[derive(Debug)]
pub struct NetworkMonitor {
    status: watch::Sender<bool>,
    running: AtomicBool,
}

impl NetworkMonitor {
    pub fn new(initially_connected: bool) -> Self {
        let (status, _) = watch::channel(initially_connected);
        Self {
            status,
            running: AtomicBool::new(false),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        if !self.is_running() {
            debug!(connected, "network monitor stopped, ignoring update");
            return;
        }
        let previous = self.status.send_replace(connected);
        if previous != connected {
            info!(connected, "network reachability changed");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Watch connectivity changes.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.status.subscribe()
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Reachability for NetworkMonitor {
    fn is_connected(&self) -> bool {
        *self.status.borrow()
    }

    fn start(&self) {
        if !self.running.swap(true, Ordering::AcqRel) {
            debug!("network monitor started");
        }
    }

    fn stop(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            debug!("network monitor stopped");
        }
    }
}
