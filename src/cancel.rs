//! Cancellation signal shared between a caller, the request pool, retry
//! backoff sleeps, and the transport (spec.md §5 "Cancellation &
//! timeouts").
//!
//! A request's logical signal is the combination of the caller's own
//! [`CancelToken`] (if supplied) and an internal deadline timer installed
//! when a total timeout is configured — whichever fires first aborts,
//! matching spec.md §4.2.1.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

struct Inner {
    aborted: AtomicBool,
    lock: Mutex<()>,
    cond: Condvar,
}

impl Default for CancelToken {
    fn default() -> Self {
        CancelToken::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken {
            inner: Arc::new(Inner {
                aborted: AtomicBool::new(false),
                lock: Mutex::new(()),
                cond: Condvar::new(),
            }),
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.inner.aborted.load(Ordering::SeqCst)
    }

    /// Aborts the token and wakes every thread blocked in [`Self::wait_timeout`].
    pub fn abort(&self) {
        self.inner.aborted.store(true, Ordering::SeqCst);
        let _guard = self.inner.lock.lock().unwrap();
        self.inner.cond.notify_all();
    }

    /// Blocks up to `timeout`, returning early if the token is aborted.
    /// Returns `true` if the wait ended because of abort, `false` on plain
    /// timeout elapse.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_aborted() {
            return true;
        }
        let guard = self.inner.lock.lock().unwrap();
        let deadline = Instant::now() + timeout;
        let mut guard = guard;
        loop {
            if self.is_aborted() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (g, result) = self.inner.cond.wait_timeout(guard, deadline - now).unwrap();
            guard = g;
            if result.timed_out() && !self.is_aborted() {
                return false;
            }
        }
    }

    /// Combines `self` with a deadline: returns a token that is aborted
    /// when either the original token is aborted, or `duration` elapses.
    /// A background thread drives the timer; it exits as soon as either
    /// side fires.
    pub fn with_deadline(&self, duration: Duration) -> CancelToken {
        let combined = CancelToken::new();
        let upstream = self.clone();
        let downstream = combined.clone();
        std::thread::spawn(move || {
            // Fires on whichever happens first: the caller's own abort, or
            // the deadline elapsing (wait_timeout's return value doesn't
            // matter — either way the combined token must now abort).
            upstream.wait_timeout(duration);
            downstream.abort();
        });
        combined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abort_wakes_waiters_immediately() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = std::thread::spawn(move || waiter.wait_timeout(Duration::from_secs(5)));
        std::thread::sleep(Duration::from_millis(20));
        token.abort();
        assert!(handle.join().unwrap());
    }

    #[test]
    fn wait_timeout_elapses_without_abort() {
        let token = CancelToken::new();
        let start = Instant::now();
        let aborted = token.wait_timeout(Duration::from_millis(30));
        assert!(!aborted);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn deadline_token_aborts_on_its_own() {
        let token = CancelToken::new();
        let combined = token.with_deadline(Duration::from_millis(20));
        assert!(combined.wait_timeout(Duration::from_secs(5)));
    }
}
