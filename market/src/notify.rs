// market/src/notify.rs

//! Transient payment-notification slot.
//!
//! A single outstanding notification drives the UI banner: publishing a
//! new one replaces the previous one (which may truncate its visible
//! window), and each notification auto-expires after its display window.
//!
//! Expiry is a spawned, abortable sleep task rather than a detached
//! fire-and-forget timer: replacement aborts the previous timer, a
//! sequence number stops a stale timer from clearing a newer
//! notification, and `shutdown` cancels the outstanding timer with the
//! owning context.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::types::PaymentNotification;

#[derive(Default)]
struct Slot {
    seq: u64,
    current: Option<PaymentNotification>,
    timer: Option<JoinHandle<()>>,
}

/// Holder of the single transient notification.
#[derive(Default)]
pub struct NotificationCenter {
    slot: Mutex<Slot>,
}

impl NotificationCenter {
    /// Creates an empty notification center.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a notification, replacing any outstanding one, and
    /// schedules its expiry after `ttl`.
    ///
    /// Must be called from within a tokio runtime (the expiry timer is a
    /// spawned task).
    pub fn publish(self: &Arc<Self>, notification: PaymentNotification, ttl: Duration) {
        let mut slot = self.slot.lock().expect("notification lock poisoned");

        slot.seq += 1;
        let seq = slot.seq;

        if let Some(timer) = slot.timer.take() {
            timer.abort();
        }

        slot.current = Some(notification);

        let center = Arc::clone(self);
        slot.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            center.expire(seq);
        }));
    }

    /// Returns a copy of the outstanding notification, if any.
    pub fn current(&self) -> Option<PaymentNotification> {
        self.slot
            .lock()
            .expect("notification lock poisoned")
            .current
            .clone()
    }

    /// Explicitly clears the outstanding notification (viewer dismissal).
    pub fn clear(&self) {
        let mut slot = self.slot.lock().expect("notification lock poisoned");
        slot.current = None;
        if let Some(timer) = slot.timer.take() {
            timer.abort();
        }
    }

    /// Cancels the outstanding timer and clears the slot. Called on
    /// context teardown so no timer fires against a disposed context.
    pub fn shutdown(&self) {
        self.clear();
    }

    /// Clears the slot only if `seq` still identifies the outstanding
    /// notification; a stale timer observing a newer sequence is a no-op.
    fn expire(&self, seq: u64) {
        let mut slot = self.slot.lock().expect("notification lock poisoned");
        if slot.seq == seq {
            slot.current = None;
            slot.timer = None;
        }
    }
}
