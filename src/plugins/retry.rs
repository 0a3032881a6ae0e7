//! Retry plugin (spec.md §4.6): exponential backoff with jitter, a
//! configurable attempt cap, `Retry-After` honored when present, and
//! `onRetry` firing on every attempt. Same clone-or-bail structure and
//! doubling backoff as a plain layered retry handler, generalized to
//! jittered exponential decay, status-code/error-class conditions, and
//! deadline/cancellation awareness.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::error::WayfarerError;
use crate::hooks::{OnRetryHook, RetryOutcome};
use crate::middleware::{BoxHandler, Handler, Middleware};
use crate::request::Request;
use crate::response::Response;

/// A retry condition: given the request method and the response (`Ok`) or
/// the terminal error (`Err`), decide whether another attempt should be
/// made. The method is passed through so a custom predicate can fold
/// idempotency into its own policy rather than being pre-empted by a
/// built-in gate.
pub type ShouldRetry =
    Arc<dyn Fn(&http::Method, Result<&Response, &WayfarerError>) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Full-jitter factor in `[0, 1]`: the actual delay is drawn uniformly
    /// from `[(1 - jitter) * delay, delay]`.
    pub jitter: f64,
    pub should_retry: ShouldRetry,
    pub honor_retry_after: bool,
}

/// Default predicate (spec.md §4.6: "idempotent methods by default"):
/// retry on network/connect/response timeouts, and on 5xx/429 responses,
/// but only for methods the HTTP spec defines as idempotent. A caller who
/// installs a custom `should_retry` is free to retry non-idempotent methods
/// too — this gate only applies to the default.
fn default_should_retry(method: &http::Method, outcome: Result<&Response, &WayfarerError>) -> bool {
    if !is_idempotent(method) {
        return false;
    }
    match outcome {
        Ok(res) => res.status().as_u16() == 429 || res.status().is_server_error(),
        Err(err) => err.is_retryable_by_default(),
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            jitter: 0.5,
            should_retry: Arc::new(default_should_retry),
            honor_retry_after: true,
        }
    }
}

fn is_idempotent(method: &http::Method) -> bool {
    matches!(
        *method,
        http::Method::GET
            | http::Method::HEAD
            | http::Method::PUT
            | http::Method::DELETE
            | http::Method::OPTIONS
            | http::Method::TRACE
    )
}

/// Wraps the next handler with retry behavior. Backoff sleeps go through
/// [`crate::cancel::CancelToken::wait_timeout`] rather than a plain
/// `thread::sleep`: an abort fired mid-sleep wakes the waiting thread
/// immediately instead of finishing out the delay.
pub struct RetryMiddleware {
    config: RetryConfig,
    on_retry: Vec<OnRetryHook>,
}

impl RetryMiddleware {
    pub fn new(config: RetryConfig, on_retry: Vec<OnRetryHook>) -> Self {
        RetryMiddleware { config, on_retry }
    }
}

impl Middleware for RetryMiddleware {
    fn wrap(&self, inner: BoxHandler) -> BoxHandler {
        let config = self.config.clone();
        let on_retry = self.on_retry.clone();
        crate::middleware::fn_handler(move |req: Request| {
            let method = req.method.clone();
            let mut attempt = 0u32;
            loop {
                let Some(attempt_req) = req.try_clone() else {
                    return inner.handle(req);
                };
                let cancel = attempt_req.cancel.clone();
                let result = inner.handle(attempt_req);
                let should_retry = attempt + 1 < config.max_attempts
                    && !cancel.is_aborted()
                    && match &result {
                        Ok(res) => (config.should_retry)(&method, Ok(res)),
                        Err(err) => (config.should_retry)(&method, Err(err)),
                    };
                if !should_retry {
                    return result;
                }

                let delay = match &result {
                    Ok(res) if config.honor_retry_after => {
                        retry_after_delay(res).unwrap_or_else(|| backoff(&config, attempt))
                    }
                    _ => backoff(&config, attempt),
                };

                let outcome = match &result {
                    Ok(res) => RetryOutcome::Response(res),
                    Err(err) => RetryOutcome::Error(err),
                };
                for hook in &on_retry {
                    hook(attempt, match &outcome {
                        RetryOutcome::Error(e) => RetryOutcome::Error(e),
                        RetryOutcome::Response(r) => RetryOutcome::Response(r),
                    }, delay);
                }

                if cancel.wait_timeout(delay) {
                    return result;
                }
                attempt += 1;
            }
        })
    }
}

fn backoff(config: &RetryConfig, attempt: u32) -> Duration {
    let exp = config.initial_delay.as_millis() as u64 * 2u64.saturating_pow(attempt);
    let capped = exp.min(config.max_delay.as_millis() as u64);
    if config.jitter <= 0.0 {
        return Duration::from_millis(capped);
    }
    let floor = (capped as f64 * (1.0 - config.jitter)) as u64;
    let jittered = rand::rng().random_range(floor..=capped.max(floor));
    Duration::from_millis(jittered)
}

fn retry_after_delay(res: &Response) -> Option<Duration> {
    let raw = res.headers().get(http::header::RETRY_AFTER)?.to_str().ok()?;
    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = chrono::DateTime::parse_from_rfc2822(raw).ok()?;
    let now = chrono::Utc::now();
    let delta = at.with_timezone(&chrono::Utc) - now;
    delta.to_std().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{compose, fn_handler};
    use http::Method;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use url::Url;

    fn req() -> Request {
        Request::new(Method::GET, Url::parse("https://x/y").unwrap())
    }

    fn status(code: u16) -> Response {
        Response::new(
            http::StatusCode::from_u16(code).unwrap(),
            http::HeaderMap::new(),
            Vec::new(),
        )
    }

    #[test]
    fn scenario_s1_retries_twice_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let base = fn_handler(move |_req| {
            let n = c.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Ok(status(503))
            } else {
                Ok(Response::new(
                    http::StatusCode::OK,
                    http::HeaderMap::new(),
                    b"ok".to_vec(),
                ))
            }
        });
        let retries_seen = Arc::new(Mutex::new(0u32));
        let r = Arc::clone(&retries_seen);
        let on_retry: OnRetryHook = Arc::new(move |_attempt, _outcome, _delay| {
            *r.lock().unwrap() += 1;
        });
        let config = RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter: 0.0,
            honor_retry_after: false,
            ..RetryConfig::default()
        };
        let mw = RetryMiddleware::new(config, vec![on_retry]);
        let chain = compose(base, vec![Box::new(mw)]);
        let res = chain.handle(req()).unwrap();
        assert_eq!(res.text().unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(*retries_seen.lock().unwrap(), 2);
    }

    #[test]
    fn non_idempotent_methods_are_not_retried_by_default() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let base = fn_handler(move |_req| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(status(503))
        });
        let mw = RetryMiddleware::new(RetryConfig::default(), Vec::new());
        let chain = compose(base, vec![Box::new(mw)]);
        let post = Request::new(Method::POST, Url::parse("https://x/y").unwrap());
        chain.handle(post).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn custom_should_retry_can_override_the_idempotency_default() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let base = fn_handler(move |_req| {
            let n = c.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Ok(status(503))
            } else {
                Ok(Response::new(http::StatusCode::OK, http::HeaderMap::new(), Vec::new()))
            }
        });
        let config = RetryConfig {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter: 0.0,
            honor_retry_after: false,
            should_retry: Arc::new(|_method, outcome| match outcome {
                Ok(res) => res.status().is_server_error(),
                Err(_) => false,
            }),
            ..RetryConfig::default()
        };
        let mw = RetryMiddleware::new(config, Vec::new());
        let chain = compose(base, vec![Box::new(mw)]);
        let post = Request::new(Method::POST, Url::parse("https://x/y").unwrap());
        let res = chain.handle(post).unwrap();
        assert_eq!(res.status(), http::StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn aborted_signal_stops_retrying() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let base = fn_handler(move |_req| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(status(503))
        });
        let config = RetryConfig {
            initial_delay: Duration::from_millis(500),
            ..RetryConfig::default()
        };
        let mw = RetryMiddleware::new(config, Vec::new());
        let chain = compose(base, vec![Box::new(mw)]);
        let mut r = req();
        r.cancel.abort();
        chain.handle(r).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
