//! Debounced async calls with loading and error tracking
//!
//! [`DebouncedTask`] decorates the action a [`Debouncer`] eventually runs; it
//! never touches timers itself. `pending` covers the coalescing delay,
//! `loading` covers the in-flight call. They only meet at the instant the
//! timer fires.

use crate::debounce::Debouncer;
use crate::error::CallError;
use crate::presets::DelayPreset;
use crate::signal::Signal;
use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, warn};

/// Message stored in `error` when a failure has nothing better to say
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Debounced async action
///
/// `call` is fire-and-forget: results are observed through `loading`,
/// `error` and whatever side effects the action performs. Timer-fired calls
/// run on their own Tokio task; a failure there is recorded in `error`,
/// logged, and becomes that task's output. [`DebouncedTask::flush`] makes
/// the caller the firing context and hands the outcome back directly.
pub struct DebouncedTask<A, T, E> {
    debouncer: Debouncer<A, JoinHandle<Result<T, E>>>,
    status: Arc<CallStatus>,
}

/// Loading/error bookkeeping shared between the task and its in-flight calls
struct CallStatus {
    loading: Signal<bool>,
    error: Signal<Option<String>>,
    in_flight: Mutex<InFlight>,
}

#[derive(Default)]
struct InFlight {
    next_id: u64,
    /// Calls that have started and not yet settled
    calls: HashMap<u64, CallSlot>,
}

/// A started call; its task handle arrives once the call is spawned
#[derive(Default)]
struct CallSlot {
    handle: Option<AbortHandle>,
    /// `abort` ran before the handle was attached
    abort_requested: bool,
}

impl<A, T, E> DebouncedTask<A, T, E>
where
    A: Send + 'static,
    T: Send + 'static,
    E: Display + Send + 'static,
{
    /// Wrap `call` so it runs `delay` after the last [`DebouncedTask::call`]
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn new<F, Fut>(delay: Duration, call: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let runtime = Handle::current();
        let status = Arc::new(CallStatus {
            loading: Signal::new(false),
            error: Signal::new(None),
            in_flight: Mutex::new(InFlight::default()),
        });

        let adapter = {
            let status = status.clone();
            let runtime = runtime.clone();
            move |args: A| -> JoinHandle<Result<T, E>> {
                let guard = CallGuard::begin(&status);
                let id = guard.id;
                let fut = call(args);

                let task = runtime.spawn(async move {
                    let result = match AssertUnwindSafe(fut).catch_unwind().await {
                        Ok(result) => result,
                        Err(payload) => {
                            warn!(call = guard.id, "Debounced call panicked");
                            guard.status.error.set(Some(GENERIC_ERROR_MESSAGE.to_string()));
                            drop(guard);
                            panic::resume_unwind(payload);
                        }
                    };
                    if let Err(e) = &result {
                        let message = failure_message(e);
                        warn!(call = guard.id, error = %message, "Debounced call failed");
                        guard.status.error.set(Some(message));
                    }
                    // Loading clears after the error is recorded
                    drop(guard);
                    result
                });

                status.register(id, task.abort_handle());
                task
            }
        };

        Self {
            debouncer: Debouncer::with_handle(runtime, delay, adapter),
            status,
        }
    }

    /// Like [`DebouncedTask::new`] with the delay taken from the preset table
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn with_preset<F, Fut>(preset: DelayPreset, call: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::new(preset.delay(), call)
    }

    /// Schedule the action with `args`, replacing any pending arguments
    pub fn call(&self, args: A) {
        self.debouncer.invoke(args);
    }

    /// Drop a call still waiting out the delay
    ///
    /// Calls already in flight keep running; see [`DebouncedTask::abort`].
    pub fn cancel(&self) {
        self.debouncer.cancel();
    }

    /// Start the pending call now and wait for it to settle
    ///
    /// Goes through the same loading/error bookkeeping as a timer fire.
    /// Returns `None` when nothing was pending.
    pub async fn flush(&self) -> Option<Result<T, CallError<E>>> {
        let handle = self.debouncer.flush()?;
        Some(settle(handle).await)
    }

    /// Cancel the pending call and abort every call in flight
    ///
    /// Aborted calls clear `loading` and leave `error` untouched.
    pub fn abort(&self) {
        self.debouncer.cancel();
        let calls = self.status.abort_all();
        debug!(calls, "Aborted in-flight debounced calls");
    }

    pub fn delay(&self) -> Duration {
        self.debouncer.delay()
    }

    /// Whether a call is waiting out the coalescing delay
    pub fn pending(&self) -> bool {
        self.debouncer.pending()
    }

    /// Whether a call is in flight
    pub fn loading(&self) -> bool {
        self.status.loading.get()
    }

    /// Message of the last failure, cleared when the next call starts
    pub fn error(&self) -> Option<String> {
        self.status.error.get()
    }

    pub fn watch_pending(&self) -> watch::Receiver<bool> {
        self.debouncer.watch_pending()
    }

    pub fn watch_loading(&self) -> watch::Receiver<bool> {
        self.status.loading.subscribe()
    }

    pub fn watch_error(&self) -> watch::Receiver<Option<String>> {
        self.status.error.subscribe()
    }
}

impl<A, T, E> Clone for DebouncedTask<A, T, E> {
    fn clone(&self) -> Self {
        Self {
            debouncer: self.debouncer.clone(),
            status: self.status.clone(),
        }
    }
}

impl<A, T, E> fmt::Debug for DebouncedTask<A, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebouncedTask")
            .field("debouncer", &self.debouncer)
            .field("loading", &self.status.loading.get())
            .field("error", &self.status.error.get())
            .finish()
    }
}

impl CallStatus {
    /// Attach the abort handle of a call that has not settled yet
    ///
    /// A call that `abort_all` reached before its handle existed is aborted
    /// here instead.
    fn register(&self, id: u64, handle: AbortHandle) {
        let abort_now = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.calls.get_mut(&id) {
                Some(slot) if slot.abort_requested => Some(handle),
                Some(slot) => {
                    slot.handle = Some(handle);
                    None
                }
                // Already settled
                None => None,
            }
        };
        if let Some(handle) = abort_now {
            debug!(call = id, "Aborting call started during abort");
            handle.abort();
        }
    }

    /// Abort every in-flight call; returns how many were reached
    fn abort_all(&self) -> usize {
        let (reached, handles) = {
            let mut in_flight = self.in_flight.lock();
            let mut handles = Vec::with_capacity(in_flight.calls.len());
            for slot in in_flight.calls.values_mut() {
                match &slot.handle {
                    Some(handle) => handles.push(handle.clone()),
                    None => slot.abort_requested = true,
                }
            }
            (in_flight.calls.len(), handles)
        };
        for handle in &handles {
            handle.abort();
        }
        reached
    }
}

/// Marks one call as in flight until dropped
///
/// Dropping clears `loading` once no other call is in flight, whether the
/// call succeeded, failed, panicked or was aborted.
struct CallGuard {
    status: Arc<CallStatus>,
    id: u64,
}

impl CallGuard {
    fn begin(status: &Arc<CallStatus>) -> Self {
        let mut in_flight = status.in_flight.lock();
        let id = in_flight.next_id;
        in_flight.next_id += 1;
        in_flight.calls.insert(id, CallSlot::default());

        status.loading.set_if_changed(true);
        status.error.set_if_changed(None);
        debug!(call = id, in_flight = in_flight.calls.len(), "Debounced call started");

        Self {
            status: status.clone(),
            id,
        }
    }
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        // `call` itself panicked before its future existed
        if std::thread::panicking() {
            warn!(call = self.id, "Debounced call panicked");
            self.status.error.set(Some(GENERIC_ERROR_MESSAGE.to_string()));
        }

        let mut in_flight = self.status.in_flight.lock();
        in_flight.calls.remove(&self.id);
        if in_flight.calls.is_empty() {
            self.status.loading.set_if_changed(false);
        }
    }
}

/// Human-readable message for a failure
fn failure_message<E: Display>(error: &E) -> String {
    let message = error.to_string();
    if message.trim().is_empty() {
        GENERIC_ERROR_MESSAGE.to_string()
    } else {
        message
    }
}

async fn settle<T, E>(handle: JoinHandle<Result<T, E>>) -> Result<T, CallError<E>> {
    match handle.await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(CallError::Failed(e)),
        Err(join_err) if join_err.is_panic() => {
            Err(CallError::Panicked(panic_message(join_err.into_panic())))
        }
        Err(_) => Err(CallError::Aborted),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        GENERIC_ERROR_MESSAGE.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debounce::tests::advance;
    use tokio::sync::Notify;

    type Lookup = DebouncedTask<String, usize, String>;

    /// Task whose calls record their argument and wait on `gate`
    fn gated(delay_ms: u64) -> (Lookup, Arc<Notify>, Arc<Mutex<Vec<String>>>) {
        let gate = Arc::new(Notify::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let task = {
            let gate = gate.clone();
            let seen = seen.clone();
            DebouncedTask::new(Duration::from_millis(delay_ms), move |query: String| {
                seen.lock().push(query.clone());
                let gate = gate.clone();
                async move {
                    gate.notified().await;
                    if query == "boom" {
                        Err(query)
                    } else {
                        Ok(query.len())
                    }
                }
            })
        };
        (task, gate, seen)
    }

    fn failing(delay_ms: u64, message: &'static str) -> Lookup {
        DebouncedTask::new(Duration::from_millis(delay_ms), move |_: String| async move {
            Err::<usize, _>(message.to_string())
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_spans_only_the_call() {
        let (task, gate, seen) = gated(300);
        assert!(!task.loading());

        task.call("x".into());
        assert!(task.pending());
        assert!(!task.loading());

        advance(299).await;
        assert!(!task.loading());
        assert!(seen.lock().is_empty());

        advance(1).await;
        assert!(!task.pending());
        assert!(task.loading());
        assert_eq!(*seen.lock(), vec!["x".to_string()]);

        gate.notify_one();
        advance(0).await;
        assert!(!task.loading());
        assert_eq!(task.error(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_sets_error_and_clears_loading() {
        let task = failing(300, "boom");

        task.call("x".into());
        advance(300).await;

        assert_eq!(task.error().as_deref(), Some("boom"));
        assert!(!task.loading());
        assert!(!task.pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_failure_uses_generic_message() {
        let task = failing(100, "  ");

        task.call("x".into());
        advance(100).await;

        assert_eq!(task.error().as_deref(), Some(GENERIC_ERROR_MESSAGE));
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_call_clears_error() {
        let (task, gate, _seen) = gated(100);

        task.call("boom".into());
        advance(100).await;
        gate.notify_one();
        advance(0).await;
        assert_eq!(task.error().as_deref(), Some("boom"));

        task.call("ok".into());
        // Error survives the coalescing delay
        assert_eq!(task.error().as_deref(), Some("boom"));
        advance(100).await;
        assert_eq!(task.error(), None);
        assert!(task.loading());

        gate.notify_one();
        advance(0).await;
        assert!(!task.loading());
        assert_eq!(task.error(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_returns_outcome() {
        let task: DebouncedTask<u32, u32, String> =
            DebouncedTask::new(Duration::from_millis(300), |n: u32| async move {
                if n == 0 {
                    Err("zero".to_string())
                } else {
                    Ok(n * 2)
                }
            });

        assert!(task.flush().await.is_none());

        task.call(1);
        task.call(21);
        let outcome = task.flush().await.unwrap();
        assert_eq!(outcome.unwrap(), 42);
        assert!(!task.pending());
        assert!(!task.loading());

        task.call(0);
        let outcome = task.flush().await.unwrap();
        assert_eq!(outcome.unwrap_err().into_failure().as_deref(), Some("zero"));
        assert_eq!(task.error().as_deref(), Some("zero"));
        assert!(!task.loading());

        // The flushed timer never fires again
        advance(1000).await;
        assert_eq!(task.error().as_deref(), Some("zero"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_delay() {
        let (task, _gate, seen) = gated(300);

        task.call("x".into());
        task.cancel();
        task.cancel();
        advance(1000).await;

        assert!(seen.lock().is_empty());
        assert!(!task.loading());
        assert!(!task.pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_does_not_stop_in_flight_call() {
        let (task, gate, _seen) = gated(100);

        task.call("x".into());
        advance(100).await;
        assert!(task.loading());

        task.cancel();
        assert!(task.loading());

        gate.notify_one();
        advance(0).await;
        assert!(!task.loading());
        assert_eq!(task.error(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_stops_in_flight_call() {
        let (task, _gate, _seen) = gated(100);

        task.call("x".into());
        let flusher = task.clone();
        let flushed = tokio::spawn(async move { flusher.flush().await });
        advance(0).await;
        assert!(task.loading());

        task.abort();
        advance(0).await;
        assert!(!task.loading());
        assert_eq!(task.error(), None);

        let outcome = flushed.await.unwrap().unwrap();
        assert!(matches!(outcome, Err(CallError::Aborted)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_call_is_reported() {
        let task: DebouncedTask<bool, (), String> =
            DebouncedTask::new(Duration::from_millis(100), |explode: bool| async move {
                if explode {
                    panic!("lookup exploded");
                }
                Ok(())
            });

        task.call(true);
        let outcome = task.flush().await.unwrap();
        match outcome {
            Err(CallError::Panicked(message)) => assert_eq!(message, "lookup exploded"),
            other => panic!("unexpected outcome: {:?}", other.is_ok()),
        }
        assert!(!task.loading());
        assert_eq!(task.error().as_deref(), Some(GENERIC_ERROR_MESSAGE));
    }

    #[tokio::test(start_paused = true)]
    async fn test_synchronous_panic_in_call_clears_loading() {
        let task: DebouncedTask<bool, (), String> =
            DebouncedTask::new(Duration::from_millis(100), |explode: bool| {
                if explode {
                    panic!("could not build request");
                }
                async move { Ok(()) }
            });

        task.call(true);
        advance(100).await;

        assert!(!task.pending());
        assert!(!task.loading());
        assert_eq!(task.error().as_deref(), Some(GENERIC_ERROR_MESSAGE));

        // The next call starts clean
        task.call(false);
        let outcome = task.flush().await.unwrap();
        assert!(outcome.is_ok());
        assert_eq!(task.error(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_reaches_call_registered_late() {
        let status = Arc::new(CallStatus {
            loading: Signal::new(false),
            error: Signal::new(None),
            in_flight: Mutex::new(InFlight::default()),
        });

        // Started but not yet spawned when abort runs
        let guard = CallGuard::begin(&status);
        let id = guard.id;
        assert_eq!(status.abort_all(), 1);

        let call = tokio::spawn(async move {
            let _guard = guard;
            std::future::pending::<()>().await;
        });
        status.register(id, call.abort_handle());

        assert!(call.await.unwrap_err().is_cancelled());
        assert!(!status.loading.get());
        assert!(status.in_flight.lock().calls.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_holds_while_any_call_in_flight() {
        let (task, gate, seen) = gated(100);

        task.call("first".into());
        advance(100).await;
        task.call("second".into());
        advance(100).await;
        assert_eq!(seen.lock().len(), 2);
        assert!(task.loading());

        gate.notify_one();
        advance(0).await;
        assert!(task.loading());

        gate.notify_one();
        advance(0).await;
        assert!(!task.loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_loading_notifies() {
        let (task, gate, _seen) = gated(100);
        let mut loading = task.watch_loading();

        task.call("x".into());
        assert!(!loading.has_changed().unwrap());

        advance(100).await;
        assert!(loading.has_changed().unwrap());
        assert!(*loading.borrow_and_update());

        gate.notify_one();
        advance(0).await;
        assert!(!*loading.borrow_and_update());
    }
}
