//! Coalescing scheduler
//!
//! Delays an action until its caller has been quiet for `delay`. Every
//! [`Debouncer::invoke`] replaces the buffered arguments and restarts the
//! timer, so a burst of calls collapses into a single execution carrying the
//! arguments of the last call. Earlier arguments are discarded, never queued.
//!
//! Timers are Tokio tasks on the runtime captured at construction. Each armed
//! timer carries a generation number, and a timer that wakes up after it was
//! replaced, cancelled or flushed does nothing. At most one timer is live per
//! instance and `pending` is true exactly while one is.

use crate::presets::{DelayPreset, DEFAULT_DELAY};
use crate::signal::Signal;
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

type Action<A, R> = Box<dyn Fn(A) -> R + Send + Sync>;

/// Stand-in deadline for delays too large to add to the clock
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Debounced wrapper around a single logical action
///
/// `A` is the argument tuple the action receives; `R` is whatever the action
/// returns, handed back only by [`Debouncer::flush`] since timer fires have
/// no caller to return to.
///
/// Clones share the same instance: invoking any clone restarts the same
/// timer. The action may invoke its own debouncer (through a clone); the new
/// invocation simply arms a fresh timer.
pub struct Debouncer<A, R = ()> {
    inner: Arc<Inner<A, R>>,
}

struct Inner<A, R> {
    delay: Duration,
    runtime: Handle,
    action: Action<A, R>,
    state: Mutex<State<A>>,
    pending: Signal<bool>,
}

struct State<A> {
    /// Live timer task, if any
    timer: Option<AbortHandle>,
    /// Arguments of the most recent invoke
    last_args: Option<A>,
    /// Bumped every time a timer is armed
    generation: u64,
}

impl<A, R> Debouncer<A, R>
where
    A: Send + 'static,
    R: 'static,
{
    /// Create a debouncer on the current Tokio runtime
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime; use
    /// [`Debouncer::with_handle`] to bind to an explicit runtime.
    pub fn new<F>(delay: Duration, action: F) -> Self
    where
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        Self::with_handle(Handle::current(), delay, action)
    }

    /// Create a debouncer using [`DEFAULT_DELAY`]
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn with_default_delay<F>(action: F) -> Self
    where
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        Self::new(DEFAULT_DELAY, action)
    }

    /// Create a debouncer whose delay comes from the installed preset table
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn with_preset<F>(preset: DelayPreset, action: F) -> Self
    where
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        Self::new(preset.delay(), action)
    }

    /// Create a debouncer that arms its timers on `runtime`
    pub fn with_handle<F>(runtime: Handle, delay: Duration, action: F) -> Self
    where
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                delay,
                runtime,
                action: Box::new(action),
                state: Mutex::new(State {
                    timer: None,
                    last_args: None,
                    generation: 0,
                }),
                pending: Signal::new(false),
            }),
        }
    }

    /// Configured coalescing delay
    pub fn delay(&self) -> Duration {
        self.inner.delay
    }

    /// Buffer `args` and (re)start the timer
    ///
    /// Never runs the action synchronously, even with a zero delay.
    pub fn invoke(&self, args: A) {
        let deadline = deadline_after(self.inner.delay);
        let mut state = self.inner.state.lock();

        state.last_args = Some(args);
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.generation = state.generation.wrapping_add(1);

        let generation = state.generation;
        let weak = Arc::downgrade(&self.inner);
        let task = self.inner.runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            Inner::fire(&weak, generation);
        });

        state.timer = Some(task.abort_handle());
        self.inner.pending.set_if_changed(true);
        trace!(generation, delay_ms = self.inner.delay.as_millis() as u64, "Armed debounce timer");
    }

    /// Drop the outstanding timer without running the action
    ///
    /// No-op when nothing is pending. Buffered arguments stay buffered until
    /// the next invoke replaces them.
    pub fn cancel(&self) {
        let mut state = self.inner.state.lock();
        if let Some(timer) = state.timer.take() {
            timer.abort();
            self.inner.pending.set_if_changed(false);
            debug!(generation = state.generation, "Cancelled debounced call");
        }
    }

    /// Run the pending action now with the latest arguments
    ///
    /// Returns the action's result, or `None` if nothing was pending. The
    /// action runs on the caller's thread, so a panic in it propagates here.
    pub fn flush(&self) -> Option<R> {
        let args = {
            let mut state = self.inner.state.lock();
            if state.last_args.is_none() {
                return None;
            }
            let timer = state.timer.take()?;
            timer.abort();
            self.inner.pending.set_if_changed(false);
            debug!(generation = state.generation, "Flushing debounced call");
            state.last_args.take()
        }?;

        Some((self.inner.action)(args))
    }

    /// Whether a coalesced execution is scheduled
    pub fn pending(&self) -> bool {
        self.inner.pending.get()
    }

    /// Subscribe to changes of [`Debouncer::pending`]
    pub fn watch_pending(&self) -> watch::Receiver<bool> {
        self.inner.pending.subscribe()
    }
}

/// `now + delay`, saturating to a far-future instant on overflow
fn deadline_after(delay: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(delay)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

impl<A, R> Inner<A, R> {
    /// Timer callback
    ///
    /// Clears the timer and `pending` before calling the action so that the
    /// action observes a clean state and may re-invoke.
    fn fire(weak: &Weak<Self>, generation: u64) {
        // Owner dropped: nothing left to notify
        let Some(inner) = weak.upgrade() else {
            return;
        };

        let args = {
            let mut state = inner.state.lock();
            if state.generation != generation || state.timer.is_none() {
                trace!(generation, "Ignoring superseded debounce timer");
                return;
            }
            state.timer = None;
            inner.pending.set_if_changed(false);
            state.last_args.take()
        };

        if let Some(args) = args {
            debug!(generation, "Debounce timer fired");
            let _ = (inner.action)(args);
        }
    }
}

impl<A, R> Drop for Inner<A, R> {
    fn drop(&mut self) {
        if let Some(timer) = self.state.get_mut().timer.take() {
            timer.abort();
        }
    }
}

impl<A, R> Clone for Debouncer<A, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A, R> fmt::Debug for Debouncer<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.inner.delay)
            .field("pending", &self.inner.pending.get())
            .finish()
    }
}
