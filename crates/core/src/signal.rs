//! Observable state cells
//!
//! A [`Signal`] is a mutable cell with change notification. Writers keep the
//! `Signal`; readers get either a snapshot via [`Signal::get`] or a
//! `watch::Receiver` that wakes on every change.

use tokio::sync::watch;

/// Mutable cell with change notification, backed by a `watch` channel
///
/// The sender side keeps the current value even when nobody is subscribed,
/// so reads never depend on receivers being alive.
#[derive(Debug)]
pub(crate) struct Signal<T> {
    tx: watch::Sender<T>,
}

impl<T> Signal<T> {
    /// Create a signal holding `initial`
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Replace the value and notify subscribers
    pub fn set(&self, value: T) {
        self.tx.send_replace(value);
    }

    /// Subscribe to changes
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}

impl<T: Clone> Signal<T> {
    /// Snapshot of the current value
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }
}

impl<T: PartialEq> Signal<T> {
    /// Store `value`, notifying subscribers only if it differs
    pub fn set_if_changed(&self, value: T) {
        self.tx.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }
}
