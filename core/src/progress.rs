//! Per-call progress correlation.
//!
//! Every dispatched call gets a fresh [`CallToken`]. When the caller asks
//! for progress, the token is registered in the client's [`ProgressTable`]
//! together with the caller's sink; the transport reports through the
//! [`CallContext`] it receives and never sees the sink directly. The entry
//! is removed when the call completes or is cancelled, whichever happens
//! first.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::trace;
use uuid::Uuid;

/// Receives fractions in `[0.0, 1.0]` for one call, in transport order.
pub type ProgressSink = mpsc::UnboundedSender<f64>;

/// Identity of one dispatched call.
///
/// Distinct from the request's id: the same request value may be sent
/// several times and each send is tracked on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallToken(Uuid);

impl CallToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for CallToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Default)]
pub struct ProgressTable {
    sinks: Mutex<HashMap<CallToken, ProgressSink>>,
}

impl ProgressTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route progress for `token` to `sink` until the returned guard drops.
    pub fn register(self: &Arc<Self>, token: CallToken, sink: ProgressSink) -> ProgressRegistration {
        self.sinks.lock().insert(token, sink);
        trace!(%token, "progress sink registered");
        ProgressRegistration {
            table: Arc::clone(self),
            token,
        }
    }

    /// Returns `true` if an entry was removed.
    pub fn deregister(&self, token: CallToken) -> bool {
        let removed = self.sinks.lock().remove(&token).is_some();
        if removed {
            trace!(%token, "progress sink removed");
        }
        removed
    }

    pub fn contains(&self, token: CallToken) -> bool {
        self.sinks.lock().contains_key(&token)
    }

    pub fn len(&self) -> usize {
        self.sinks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.lock().is_empty()
    }

    fn dispatch(&self, token: CallToken, fraction: f64) {
        let mut sinks = self.sinks.lock();
        let Some(sink) = sinks.get(&token) else {
            return;
        };
        // Receiver gone: nobody is listening any more.
        if sink.send(fraction).is_err() {
            sinks.remove(&token);
        }
    }
}

/// Removes its table entry on drop.
#[derive(Debug)]
pub struct ProgressRegistration {
    table: Arc<ProgressTable>,
    token: CallToken,
}

impl Drop for ProgressRegistration {
    fn drop(&mut self) {
        self.table.deregister(self.token);
    }
}

/// Handed to the transport for one call.
#[derive(Debug, Clone)]
pub struct CallContext {
    table: Arc<ProgressTable>,
    token: CallToken,
}

impl CallContext {
    pub fn new(table: Arc<ProgressTable>, token: CallToken) -> Self {
        Self { table, token }
    }

    pub fn token(&self) -> CallToken {
        self.token
    }

    /// Report completion `fraction`, clamped to `[0.0, 1.0]`. A no-op once
    /// the call has completed or been cancelled.
    pub fn report(&self, fraction: f64) {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        self.table.dispatch(self.token, fraction);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_reach_the_registered_sink_in_order() {
        let table = Arc::new(ProgressTable::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let token = CallToken::new();
        let _registration = table.register(token, tx);

        let context = CallContext::new(Arc::clone(&table), token);
        context.report(0.25);
        context.report(0.5);
        context.report(7.0);

        assert_eq!(rx.try_recv().unwrap(), 0.25);
        assert_eq!(rx.try_recv().unwrap(), 0.5);
        assert_eq!(rx.try_recv().unwrap(), 1.0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn concurrent_calls_are_isolated() {
        let table = Arc::new(ProgressTable::new());
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let (a, b) = (CallToken::new(), CallToken::new());
        let _ra = table.register(a, tx_a);
        let _rb = table.register(b, tx_b);

        CallContext::new(Arc::clone(&table), b).report(0.75);

        assert!(rx_a.try_recv().is_err());
        assert_eq!(rx_b.try_recv().unwrap(), 0.75);
    }

    #[test]
    fn dropping_registration_removes_entry() {
        let table = Arc::new(ProgressTable::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let token = CallToken::new();

        let registration = table.register(token, tx);
        assert!(table.contains(token));
        drop(registration);
        assert!(table.is_empty());

        CallContext::new(Arc::clone(&table), token).report(0.5);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn deregister_is_idempotent() {
        let table = Arc::new(ProgressTable::new());
        let (tx, _rx) = mpsc::unbounded_channel();
        let token = CallToken::new();
        let registration = table.register(token, tx);

        assert!(table.deregister(token));
        assert!(!table.deregister(token));
        drop(registration);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn closed_receiver_drops_entry() {
        let table = Arc::new(ProgressTable::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let token = CallToken::new();
        let _registration = table.register(token, tx);
        drop(rx);

        CallContext::new(Arc::clone(&table), token).report(0.1);
        assert!(!table.contains(token));
    }
}
