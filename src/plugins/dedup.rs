//! Single-flight dedup plugin (spec.md §4.8). Concurrent requests sharing a
//! method+URL+body-digest key collapse onto one downstream call; subscribers
//! block on the in-flight result and each receive their own clone of it.
//!
//! Grounded on `rust-dd-tako`'s idempotency plugin (`plugins/idempotency.rs`,
//! `Entry::InFlight`/`Entry::Completed` plus a `Notify` to wake waiters) —
//! adapted from its async `DashMap`+`tokio::sync::Notify` pair to a blocking
//! `Mutex<HashMap>`+`Condvar`, since this crate's transport is synchronous.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::WayfarerError;
use crate::middleware::{BoxHandler, Handler, Middleware};
use crate::request::Request;
use crate::response::Response;

enum Slot {
    InFlight,
    Completed {
        result: Result<Response, WayfarerError>,
        completed_at: Instant,
    },
}

struct Shared {
    lock: Mutex<HashMap<String, Slot>>,
    cond: Condvar,
}

#[derive(Clone)]
pub struct DedupConfig {
    /// How long a completed result stays addressable after the leader
    /// finishes, so a micro-burst arriving just after completion still
    /// collapses (spec.md §4.8). `Duration::ZERO` disables this window.
    pub completed_ttl: Duration,
}

impl Default for DedupConfig {
    fn default() -> Self {
        DedupConfig {
            completed_ttl: Duration::ZERO,
        }
    }
}

pub struct DedupMiddleware {
    config: DedupConfig,
    shared: Arc<Shared>,
}

impl DedupMiddleware {
    pub fn new(config: DedupConfig) -> Self {
        DedupMiddleware {
            config,
            shared: Arc::new(Shared {
                lock: Mutex::new(HashMap::new()),
                cond: Condvar::new(),
            }),
        }
    }
}

impl Middleware for DedupMiddleware {
    fn wrap(&self, inner: BoxHandler) -> BoxHandler {
        let shared = Arc::clone(&self.shared);
        let completed_ttl = self.config.completed_ttl;
        crate::middleware::fn_handler(move |req: Request| {
            let key = req.fingerprint();
            let mut guard = shared.lock.lock().unwrap();
            loop {
                match guard.get(&key) {
                    Some(Slot::Completed { result, completed_at })
                        if completed_at.elapsed() < completed_ttl =>
                    {
                        return clone_result(result);
                    }
                    Some(Slot::Completed { .. }) => {
                        guard.remove(&key);
                        break;
                    }
                    Some(Slot::InFlight) => {
                        guard = shared.cond.wait(guard).unwrap();
                    }
                    None => break,
                }
            }
            guard.insert(key.clone(), Slot::InFlight);
            drop(guard);

            let outcome = inner.handle(req);
            let to_store = clone_result(&outcome);

            let mut guard = shared.lock.lock().unwrap();
            if completed_ttl.is_zero() {
                guard.remove(&key);
            } else {
                guard.insert(
                    key,
                    Slot::Completed {
                        result: to_store,
                        completed_at: Instant::now(),
                    },
                );
            }
            drop(guard);
            shared.cond.notify_all();

            outcome
        })
    }
}

/// Responses clone cheaply once realized; a streaming response or a
/// non-cloneable error variant degrades to reporting the same error kind to
/// every subscriber rather than literally sharing the one live stream.
fn clone_result(result: &Result<Response, WayfarerError>) -> Result<Response, WayfarerError> {
    match result {
        Ok(res) => match res.try_clone() {
            Some(clone) => Ok(clone),
            None => Err(WayfarerError::Plugin(
                "dedup: response body already consumed by a streaming leader".into(),
            )),
        },
        Err(err) => Err(dedup_clone_error(err)),
    }
}

fn dedup_clone_error(err: &WayfarerError) -> WayfarerError {
    WayfarerError::Plugin(format!("dedup: leader request failed: {err}"))
}
