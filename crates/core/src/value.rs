//! Debounced value binding
//!
//! Keeps what the UI shows (updated on every write) apart from what has been
//! committed through the deferred callback (coalesced).

use crate::debounce::Debouncer;
use crate::signal::Signal;
use std::fmt;
use std::time::Duration;
use tokio::sync::watch;

/// A value whose reads are immediate and whose change callback is debounced
pub struct DebouncedValue<T> {
    value: Signal<T>,
    debouncer: Debouncer<T>,
}

impl<T> DebouncedValue<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Bind `initial` to a callback that fires `delay` after the last write
    ///
    /// The callback does not run for the initial value.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn new<F>(initial: T, delay: Duration, callback: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self {
            value: Signal::new(initial),
            debouncer: Debouncer::new(delay, callback),
        }
    }

    /// Update the value now and schedule the callback with it
    pub fn set_value(&self, value: T) {
        self.value.set(value.clone());
        self.debouncer.invoke(value);
    }

    /// Latest value passed to [`DebouncedValue::set_value`]
    pub fn value(&self) -> T {
        self.value.get()
    }

    /// Subscribe to every write of the value
    pub fn watch_value(&self) -> watch::Receiver<T> {
        self.value.subscribe()
    }

    pub fn pending(&self) -> bool {
        self.debouncer.pending()
    }

    pub fn watch_pending(&self) -> watch::Receiver<bool> {
        self.debouncer.watch_pending()
    }

    /// Drop the scheduled callback; the current value is kept
    pub fn cancel(&self) {
        self.debouncer.cancel();
    }

    /// Run the scheduled callback now; returns whether it ran
    pub fn flush(&self) -> bool {
        self.debouncer.flush().is_some()
    }
}

impl<T: fmt::Debug + Clone> fmt::Debug for DebouncedValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebouncedValue")
            .field("value", &self.value.get())
            .field("debouncer", &self.debouncer)
            .finish()
    }
}
