//! User-registered hooks (spec.md §4.1): `beforeRequest`, `afterResponse`,
//! `onError`, `onRetry`, `onUrlResolved`. When any hook is registered, a
//! single synthetic middleware is spliced at the head of the chain that
//! dispatches to all of them in registration order.

use std::sync::Arc;

use crate::error::WayfarerError;
use crate::middleware::{BoxHandler, Handler, Middleware};
use crate::request::Request;
use crate::response::Response;
use url::Url;

pub type BeforeRequestHook = Arc<dyn Fn(Request) -> Request + Send + Sync>;
pub type AfterResponseHook = Arc<dyn Fn(&Request, Response) -> Response + Send + Sync>;
/// Returning `Some` substitutes a fallback response; `None` propagates the
/// error (spec.md §4.1).
pub type OnErrorHook = Arc<dyn Fn(&WayfarerError, &Request) -> Option<Response> + Send + Sync>;
pub type OnRetryHook = Arc<dyn Fn(u32, RetryOutcome<'_>, std::time::Duration) + Send + Sync>;
pub type OnUrlResolvedHook = Arc<dyn Fn(&Url) + Send + Sync>;
pub type OnHttp3Hook = Arc<dyn Fn(Http3Event) + Send + Sync>;

/// What triggered a retry: either a terminal error or a response that
/// matched a retry condition (e.g. a 503).
pub enum RetryOutcome<'a> {
    Error(&'a WayfarerError),
    Response(&'a Response),
}

/// Fired by the HTTP/3 discovery plugin after each response it observes
/// (spec.md §4.14: "emit `http3Discovered`/`http3Unsupported` events").
#[derive(Debug, Clone)]
pub enum Http3Event {
    /// The response's `Alt-Svc` header advertised one or more live `h3`
    /// endpoints for `origin`.
    Discovered {
        origin: String,
        endpoints: Vec<crate::plugins::http3::Http3Endpoint>,
    },
    /// The response carried no usable `h3` advertisement for `origin`.
    Unsupported { origin: String },
}

#[derive(Default, Clone)]
pub struct HookSet {
    pub before_request: Vec<BeforeRequestHook>,
    pub after_response: Vec<AfterResponseHook>,
    pub on_error: Vec<OnErrorHook>,
    pub on_retry: Vec<OnRetryHook>,
    pub on_url_resolved: Vec<OnUrlResolvedHook>,
    pub on_http3: Vec<OnHttp3Hook>,
}

impl HookSet {
    pub fn is_empty(&self) -> bool {
        self.before_request.is_empty()
            && self.after_response.is_empty()
            && self.on_error.is_empty()
    }

    pub(crate) fn fire_url_resolved(&self, url: &Url) {
        for hook in &self.on_url_resolved {
            hook(url);
        }
    }

    pub(crate) fn fire_retry(&self, attempt: u32, outcome: RetryOutcome<'_>, delay: std::time::Duration) {
        for hook in &self.on_retry {
            hook(attempt, match &outcome {
                RetryOutcome::Error(e) => RetryOutcome::Error(e),
                RetryOutcome::Response(r) => RetryOutcome::Response(r),
            }, delay);
        }
    }
}

struct HookMiddleware {
    hooks: HookSet,
}

impl Middleware for HookMiddleware {
    fn wrap(&self, inner: BoxHandler) -> BoxHandler {
        let before = self.hooks.before_request.clone();
        let after = self.hooks.after_response.clone();
        let on_error = self.hooks.on_error.clone();
        crate::middleware::fn_handler(move |req| {
            let mut req = req;
            for hook in &before {
                req = hook(req);
            }
            // `afterResponse`/`onError` both need to inspect the request
            // that was actually sent; clone it before handing it to
            // `inner` (which consumes it).
            let req_for_hooks = req.try_clone();
            match inner.handle(req) {
                Ok(mut res) => {
                    if let Some(req_ref) = &req_for_hooks {
                        for hook in &after {
                            res = hook(req_ref, res);
                        }
                    }
                    Ok(res)
                }
                Err(err) => {
                    if let Some(req_ref) = &req_for_hooks {
                        for hook in &on_error {
                            if let Some(fallback) = hook(&err, req_ref) {
                                return Ok(fallback);
                            }
                        }
                    }
                    Err(err)
                }
            }
        })
    }
}

/// Builds the synthetic hook middleware described in spec.md §4.1, or
/// `None` when no hook has been registered (so nothing is spliced in).
pub fn hook_middleware(hooks: HookSet) -> Option<Box<dyn Middleware>> {
    if hooks.is_empty() && hooks.on_retry.is_empty() && hooks.on_url_resolved.is_empty() {
        return None;
    }
    Some(Box::new(HookMiddleware { hooks }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::compose;
    use http::Method;
    use std::sync::Mutex;

    fn req() -> Request {
        Request::new(Method::GET, Url::parse("https://x/y").unwrap())
    }

    fn ok() -> Response {
        Response::new(http::StatusCode::OK, http::HeaderMap::new(), b"hi".to_vec())
    }

    #[test]
    fn before_request_hook_threads_its_return_value() {
        let mut hooks = HookSet::default();
        hooks.before_request.push(Arc::new(|req: Request| {
            req.with_header("x-injected", "1")
        }));
        let seen_header = Arc::new(Mutex::new(false));
        let seen = Arc::clone(&seen_header);
        let base = crate::middleware::fn_handler(move |req: Request| {
            *seen.lock().unwrap() = req.headers.contains_key("x-injected");
            Ok(ok())
        });
        let mw = hook_middleware(hooks).unwrap();
        let chain = compose(base, vec![mw]);
        chain.handle(req()).unwrap();
        assert!(*seen_header.lock().unwrap());
    }

    #[test]
    fn on_error_hook_can_substitute_a_fallback_response() {
        let mut hooks = HookSet::default();
        hooks
            .on_error
            .push(Arc::new(|_err, _req| Some(ok())));
        let base = crate::middleware::fn_handler(|_req| Err(WayfarerError::Cancellation));
        let mw = hook_middleware(hooks).unwrap();
        let chain = compose(base, vec![mw]);
        let res = chain.handle(req()).unwrap();
        assert_eq!(res.text().unwrap(), "hi");
    }

    #[test]
    fn no_hooks_means_no_middleware_is_spliced() {
        assert!(hook_middleware(HookSet::default()).is_none());
    }
}
