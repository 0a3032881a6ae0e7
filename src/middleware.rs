//! # Middleware System
//!
//! This module provides the middleware system that the client pipeline is
//! built from (spec.md §4.1). Middleware can intercept and modify requests
//! and responses: cross-cutting concerns such as retries, logging,
//! authentication, and caching are all expressed as middlewares riding the
//! same pipeline.
//!
//! ## Core Concepts
//!
//! ### Handler: Request → Response
//! A [`Handler`] is a function that transforms a [`Request`] into a
//! [`Response`]. This is the fundamental abstraction every piece of
//! pipeline logic implements, down to the `Transport` at the bottom.
//!
//! ### Middleware: Handler Wrapping
//! A [`Middleware`] wraps one `Handler` to produce another, adding
//! behavior before and/or after the inner handler runs. Stacking
//! middlewares builds a chain:
//!
//! ```ignore
//! client_builder
//!     .use_middleware(RetryMiddleware::new(...))
//!     .use_middleware(LoggingMiddleware::new())
//!     .build()
//! ```
//!
//! produces a handler stack `LoggingMiddleware(RetryMiddleware(Transport))`
//! (outermost first, per the registration order documented on
//! `ClientBuilder::use_middleware`). Requests flow outer → inner; responses
//! flow inner → outer. A middleware MAY: inspect and replace the request,
//! call the inner handler zero, one, or many times (retries), transform the
//! response, catch an error and substitute a fallback response, or
//! propagate an error.
//!
//! Composition happens once, at [`crate::client::ClientBuilder::build`]
//! time, so steady-state dispatch performs no per-request chain
//! construction — the fixed ordering from spec.md §4.1 is:
//!
//! `logging → pool limiter → retry → dedup → cache → user-added →
//! compression → xsrf → cookies → max-size guard → HTTP-error-raiser →
//! transport`

use crate::error::WayfarerError;
use crate::request::Request;
use crate::response::Response;

/// Transforms a `Request` into a `Response`. Implemented by every stage of
/// the pipeline, including the terminal transport adapter.
pub trait Handler: Send + Sync {
    fn handle(&self, req: Request) -> Result<Response, WayfarerError>;
}

/// A boxed, dynamically-dispatched handler — what the built pipeline is
/// made of. Dynamic dispatch is used here because which middlewares are
/// installed is a runtime decision driven by `ClientOptions` (e.g. the pool
/// limiter is entirely omitted when both concurrency limits are unbounded —
/// spec.md §4.4).
pub type BoxHandler = Box<dyn Handler>;

impl<F> Handler for F
where
    F: Fn(Request) -> Result<Response, WayfarerError> + Send + Sync,
{
    fn handle(&self, req: Request) -> Result<Response, WayfarerError> {
        self(req)
    }
}

/// Wraps an `Fn` closure as a [`Handler`] trait object.
pub fn fn_handler<F>(f: F) -> BoxHandler
where
    F: Fn(Request) -> Result<Response, WayfarerError> + Send + Sync + 'static,
{
    Box::new(f)
}

/// A middleware: wraps an inner handler to produce an outer one. This is
/// the trait every built-in plugin (retry, cache, dedup, ...) and every
/// user-supplied `client.use_middleware(...)` implements.
pub trait Middleware: Send + Sync + 'static {
    fn wrap(&self, inner: BoxHandler) -> BoxHandler;
}

impl<F> Middleware for F
where
    F: Fn(BoxHandler) -> BoxHandler + Send + Sync + 'static,
{
    fn wrap(&self, inner: BoxHandler) -> BoxHandler {
        self(inner)
    }
}

/// Applies middlewares to `base` in order: the first middleware in
/// `middlewares` ends up outermost.
pub fn compose(base: BoxHandler, middlewares: Vec<Box<dyn Middleware>>) -> BoxHandler {
    middlewares
        .into_iter()
        .rev()
        .fold(base, |inner, mw| mw.wrap(inner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use url::Url;

    fn ok_response() -> Response {
        Response::new(http::StatusCode::OK, http::HeaderMap::new(), Vec::new())
    }

    fn req() -> Request {
        Request::new(Method::GET, Url::parse("https://x/y").unwrap())
    }

    struct Tag(&'static str, Arc<std::sync::Mutex<Vec<&'static str>>>);

    impl Middleware for Tag {
        fn wrap(&self, inner: BoxHandler) -> BoxHandler {
            let name = self.0;
            let log = Arc::clone(&self.1);
            fn_handler(move |req| {
                log.lock().unwrap().push(name);
                inner.handle(req)
            })
        }
    }

    #[test]
    fn middlewares_run_outermost_first_on_the_way_in() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let base = fn_handler(|_req| Ok(ok_response()));
        let chain = compose(
            base,
            vec![
                Box::new(Tag("a", Arc::clone(&order))),
                Box::new(Tag("b", Arc::clone(&order))),
            ],
        );
        chain.handle(req()).unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn a_middleware_can_call_the_inner_handler_more_than_once() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let base = fn_handler(move |_req| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(ok_response())
        });
        let retry_twice = fn_handler(move |req| {
            // Minimal stand-in for a retry middleware: call `next` 3 times.
            base.handle(req.try_clone().unwrap())?;
            base.handle(req.try_clone().unwrap())?;
            base.handle(req)
        });
        retry_twice.handle(req()).unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
