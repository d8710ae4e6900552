//! Call-rate shaping: trailing debounce and leading-edge throttle.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// == Debouncer ==
/// Collapses bursts of calls into one trailing invocation.
///
/// Each [`Debouncer::call`] restarts the window; the wrapped function runs
/// once the window passes without another call, with the latest argument.
/// Calls must be made from within a Tokio runtime.
pub struct Debouncer<A> {
    window: Duration,
    action: Arc<dyn Fn(A) + Send + Sync>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl<A: Send + 'static> Debouncer<A> {
    pub fn new<F>(window: Duration, action: F) -> Self
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        Self {
            window,
            action: Arc::new(action),
            pending: Mutex::new(None),
        }
    }

    pub fn call(&self, arg: A) {
        let action = Arc::clone(&self.action);
        let window = self.window;

        let mut pending = lock(&self.pending);
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            action(arg);
        }));
    }

    /// Drops the pending invocation, if any.
    pub fn cancel(&self) {
        if let Some(previous) = lock(&self.pending).take() {
            previous.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.pending)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl<A> Drop for Debouncer<A> {
    fn drop(&mut self) {
        if let Some(pending) = lock(&self.pending).take() {
            pending.abort();
        }
    }
}

// == Throttle ==
/// Lets at most one call through per window.
///
/// The first call fires immediately; calls inside the window are dropped,
/// not queued.
pub struct Throttle<F> {
    window: Duration,
    action: F,
    last_fired: Mutex<Option<Instant>>,
}

impl<F> Throttle<F> {
    pub fn new(window: Duration, action: F) -> Self {
        Self {
            window,
            action,
            last_fired: Mutex::new(None),
        }
    }

    /// Invokes the wrapped function unless throttled. Returns `None` when
    /// the call was dropped.
    pub fn call<A, R>(&self, arg: A) -> Option<R>
    where
        F: Fn(A) -> R,
    {
        let now = Instant::now();
        {
            let mut last = lock(&self.last_fired);
            if last.is_some_and(|at| now.duration_since(at) < self.window) {
                return None;
            }
            *last = Some(now);
        }
        Some((self.action)(arg))
    }
}
