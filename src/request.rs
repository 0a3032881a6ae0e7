//! The [`Request`] value (spec.md §3): immutable-after-dispatch, carrying
//! everything a middleware or the transport needs. Middlewares mutate it
//! only through explicit copy-on-write (`with_*` methods that consume and
//! return a new `Request`).

use std::sync::Arc;
use std::time::Duration;

use http::{HeaderMap, HeaderValue, Method};
use url::Url;

use crate::body::Body;
use crate::cancel::CancelToken;

/// Per-request timeout: either one overall wall-clock budget, or a
/// structured breakdown per phase (spec.md §4.2.1).
#[derive(Clone, Debug, Default)]
pub enum Timeout {
    #[default]
    None,
    Total(Duration),
    Phased(PhasedTimeout),
}

#[derive(Clone, Debug, Default)]
pub struct PhasedTimeout {
    pub lookup: Option<Duration>,
    pub connect: Option<Duration>,
    pub secure_connect: Option<Duration>,
    pub send: Option<Duration>,
    pub response: Option<Duration>,
    pub request: Option<Duration>,
}

impl Timeout {
    /// The connect-phase budget: `connect` if set, else `secureConnect`,
    /// else `lookup` (spec.md §4.2.1: "Map connect/secureConnect →
    /// connect-phase timeout").
    pub fn connect_phase(&self) -> Option<Duration> {
        match self {
            Timeout::Phased(p) => p.connect.or(p.secure_connect).or(p.lookup),
            _ => None,
        }
    }

    pub fn response_phase(&self) -> Option<Duration> {
        match self {
            Timeout::Phased(p) => p.response,
            _ => None,
        }
    }

    pub fn send_phase(&self) -> Option<Duration> {
        match self {
            Timeout::Phased(p) => p.send,
            _ => None,
        }
    }

    /// The overall wall-clock deadline, whether expressed as `Total` or as
    /// the `request` field of a `Phased` timeout.
    pub fn total(&self) -> Option<Duration> {
        match self {
            Timeout::Total(d) => Some(*d),
            Timeout::Phased(p) => p.request,
            Timeout::None => None,
        }
    }
}

/// Upload/download progress callback payload (spec.md §4.2.3/§4.2.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upload,
    Download,
}

#[derive(Debug, Clone, Copy)]
pub struct ProgressEvent {
    pub loaded: u64,
    pub total: Option<u64>,
    pub direction: Direction,
}

pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Passed to a `beforeRedirect` callback (spec.md §3 `RedirectContext`).
#[derive(Debug, Clone)]
pub struct RedirectContext {
    pub from: Url,
    pub to: Url,
    pub status: u16,
    pub headers: HeaderMap,
}

/// What a `beforeRedirect` callback decided.
pub enum RedirectDecision {
    /// Follow `to`, optionally overridden to a different URL.
    Follow(Option<Url>),
    /// Stop following and return the 3xx response as-is.
    Stop,
}

pub type BeforeRedirectCallback = Arc<dyn Fn(&RedirectContext) -> RedirectDecision + Send + Sync>;

/// An outgoing HTTP request. See module docs and spec.md §3.
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Body,
    pub cancel: CancelToken,
    pub timeout: Timeout,
    pub throw_on_http_error: bool,
    pub follow_redirects: bool,
    pub max_redirects: u32,
    pub http2: Option<bool>,
    pub max_response_size: Option<u64>,
    pub on_upload_progress: Option<ProgressCallback>,
    pub on_download_progress: Option<ProgressCallback>,
    pub before_redirect: Option<BeforeRedirectCallback>,
    /// Opaque side-channel for plugin-internal bookkeeping (dedup keys,
    /// retry attempt counters, cache disposition) — spec.md §3 "opaque
    /// side-channel for internal hooks and plugin dispatchers".
    pub extensions: http::Extensions,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Request {
            method,
            url,
            headers: HeaderMap::new(),
            body: Body::None,
            cancel: CancelToken::new(),
            timeout: Timeout::None,
            throw_on_http_error: true,
            follow_redirects: true,
            max_redirects: 20,
            http2: None,
            max_response_size: None,
            on_upload_progress: None,
            on_download_progress: None,
            before_redirect: None,
            extensions: http::Extensions::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            http::HeaderName::try_from(name),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    /// Deep-clones the request for a retry/dedup-fanout attempt. Returns
    /// `None` if the body is a non-cloneable stream (spec.md §4.6: "Only
    /// requests with cloneable bodies can be retried").
    pub fn try_clone(&self) -> Option<Request> {
        let body = self.body.try_clone()?;
        Some(Request {
            method: self.method.clone(),
            url: self.url.clone(),
            headers: self.headers.clone(),
            body,
            cancel: self.cancel.clone(),
            timeout: self.timeout.clone(),
            throw_on_http_error: self.throw_on_http_error,
            follow_redirects: self.follow_redirects,
            max_redirects: self.max_redirects,
            http2: self.http2,
            max_response_size: self.max_response_size,
            on_upload_progress: self.on_upload_progress.clone(),
            on_download_progress: self.on_download_progress.clone(),
            before_redirect: self.before_redirect.clone(),
            extensions: http::Extensions::new(),
        })
    }

    /// Fingerprint used by the dedup/cache plugins: method + URL + body
    /// digest. The URL's query string is canonicalized (sorted keys) via
    /// [`crate::url::canonical_query`] so that two requests differing only
    /// in query-parameter order collide into the same fingerprint (spec.md
    /// §9, cache-key canonicalization). Vary-header selection for the cache
    /// plugin is layered on top of this in `plugins::cache`.
    pub fn fingerprint(&self) -> String {
        format!(
            "{} {}{}?{} #{:x}",
            self.method,
            crate::url::origin(&self.url),
            self.url.path(),
            crate::url::canonical_query(&self.url),
            self.body.digest()
        )
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req() -> Request {
        Request::new(Method::GET, Url::parse("https://x/y").unwrap())
    }

    #[test]
    fn phased_timeout_prefers_connect_over_secure_connect_and_lookup() {
        let t = Timeout::Phased(PhasedTimeout {
            lookup: Some(Duration::from_millis(1)),
            connect: Some(Duration::from_millis(2)),
            secure_connect: Some(Duration::from_millis(3)),
            ..Default::default()
        });
        assert_eq!(t.connect_phase(), Some(Duration::from_millis(2)));
    }

    #[test]
    fn falls_back_to_secure_connect_then_lookup() {
        let t = Timeout::Phased(PhasedTimeout {
            lookup: Some(Duration::from_millis(1)),
            secure_connect: Some(Duration::from_millis(3)),
            ..Default::default()
        });
        assert_eq!(t.connect_phase(), Some(Duration::from_millis(3)));
    }

    #[test]
    fn send_phase_reads_the_send_field() {
        let t = Timeout::Phased(PhasedTimeout {
            send: Some(Duration::from_millis(7)),
            ..Default::default()
        });
        assert_eq!(t.send_phase(), Some(Duration::from_millis(7)));
        assert_eq!(Timeout::None.send_phase(), None);
    }

    #[test]
    fn fingerprint_is_stable_across_clones() {
        let r = req().with_body(Body::text("hi"));
        let clone = r.try_clone().unwrap();
        assert_eq!(r.fingerprint(), clone.fingerprint());
    }

    #[test]
    fn fingerprint_ignores_query_parameter_order() {
        let a = Request::new(Method::GET, Url::parse("https://x/y?b=2&a=1").unwrap());
        let b = Request::new(Method::GET, Url::parse("https://x/y?a=1&b=2").unwrap());
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn stream_bodies_refuse_clone() {
        let r = req().with_body(Body::stream(std::io::Cursor::new(vec![1])));
        assert!(r.try_clone().is_none());
    }
}
