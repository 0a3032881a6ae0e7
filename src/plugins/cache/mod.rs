//! Cache plugin (spec.md §4.7). Fresh hits are served without calling the
//! inner handler; stale-while-revalidate hits are served immediately while a
//! background thread refreshes the entry; stale-if-error hits are served
//! when the downstream call fails outright. Conditional revalidation attaches
//! `If-None-Match`/`If-Modified-Since` and, on a 304, refreshes the stored
//! freshness window without re-fetching the body.
//!
//! Shaped as a plain middleware stage, with the in-flight-vs-completed store
//! split borrowed from `rust-dd-tako`'s idempotency plugin
//! (`Entry::InFlight`/`Entry::Completed`) and adapted from an async
//! `DashMap` to a blocking `CacheStorage` trait so a `Memory` and a `File`
//! back-end can share one middleware.

pub mod file;
pub mod memory;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use http::Method;
use serde::{Deserialize, Serialize};

use crate::error::WayfarerError;
use crate::middleware::{BoxHandler, Handler, Middleware};
use crate::request::Request;
use crate::response::{CacheDisposition, Response};

pub use file::FileCache;
pub use memory::MemoryCache;

/// A stored cache entry (spec.md §3 `CacheEntry`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub fresh_until: Option<DateTime<Utc>>,
    pub stale_while_revalidate_until: Option<DateTime<Utc>>,
    pub stale_if_error_until: Option<DateTime<Utc>>,
    /// Header names named by the stored response's `Vary`, and the values
    /// those headers carried on the request that produced this entry — a
    /// later request only matches if its values agree (RFC 7234 §4.1).
    pub vary: Vec<String>,
    pub vary_values: Vec<(String, Option<String>)>,
}

/// Pluggable cache back-end (spec.md §4.7: `{ get(key), set(key, entry, ttl),
/// delete(key) }`).
pub trait CacheStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, WayfarerError>;
    fn set(&self, key: &str, entry: CacheEntry, ttl: Option<Duration>) -> Result<(), WayfarerError>;
    fn delete(&self, key: &str) -> Result<(), WayfarerError>;
}

#[derive(Clone)]
pub struct CacheConfig {
    pub storage: Arc<dyn CacheStorage>,
    pub cacheable_methods: Vec<Method>,
    /// Used only when the response carries no explicit freshness
    /// information (no `Cache-Control: max-age` / `Expires`).
    pub default_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            storage: Arc::new(MemoryCache::new()),
            cacheable_methods: vec![Method::GET, Method::HEAD],
            default_ttl: Duration::ZERO,
        }
    }
}

pub struct CacheMiddleware {
    config: CacheConfig,
}

impl CacheMiddleware {
    pub fn new(config: CacheConfig) -> Self {
        CacheMiddleware { config }
    }
}

impl Middleware for CacheMiddleware {
    fn wrap(&self, inner: BoxHandler) -> BoxHandler {
        let config = self.config.clone();
        let inner = Arc::new(inner);
        crate::middleware::fn_handler(move |req: Request| {
            if !config.cacheable_methods.contains(&req.method) {
                return inner.handle(req);
            }
            let key = req.fingerprint();
            let stored = config
                .storage
                .get(&key)
                .ok()
                .flatten()
                .filter(|entry| vary_matches(entry, &req));
            let now = Utc::now();

            if let Some(entry) = &stored {
                if is_fresh(entry, now) {
                    return Ok(response_from_entry(entry, CacheDisposition::Hit));
                }
                if is_stale_but_usable(entry.stale_while_revalidate_until, now) {
                    if let Some(revalidate_req) = req.try_clone() {
                        let bg_inner = Arc::clone(&inner);
                        let bg_storage = Arc::clone(&config.storage);
                        let bg_key = key.clone();
                        let sample_req = revalidate_req.try_clone();
                        let revalidate_req = attach_validators(revalidate_req, entry);
                        std::thread::spawn(move || {
                            if let Ok(res) = bg_inner.handle(revalidate_req) {
                                if let Some(sample) = &sample_req {
                                    if let Some(fresh) =
                                        entry_from_response(&res, sample, Utc::now())
                                    {
                                        let _ = bg_storage.set(&bg_key, fresh, None);
                                    }
                                }
                            }
                        });
                    }
                    return Ok(response_from_entry(entry, CacheDisposition::Stale));
                }
            }

            let sample_req = req.try_clone();
            let dispatch_req = match &stored {
                Some(entry) => attach_validators(req, entry),
                None => req,
            };

            match inner.handle(dispatch_req) {
                Ok(mut res) => {
                    if res.status().as_u16() == 304 {
                        if let Some(entry) = stored {
                            let refreshed = refresh_entry(entry, res.headers(), Utc::now());
                            let out = response_from_entry(&refreshed, CacheDisposition::Revalidated);
                            let _ = config.storage.set(&key, refreshed, None);
                            return Ok(out);
                        }
                    }
                    if is_cacheable_response(&res) {
                        if let Some(sample) = &sample_req {
                            if let Some(entry) =
                                entry_from_response_with_ttl(&res, sample, now, config.default_ttl)
                            {
                                let _ = config.storage.set(&key, entry, None);
                            }
                        }
                    }
                    res.disposition = Some(CacheDisposition::Miss);
                    Ok(res)
                }
                Err(err) => {
                    if let Some(entry) = &stored {
                        if is_stale_but_usable(entry.stale_if_error_until, now) {
                            return Ok(response_from_entry(entry, CacheDisposition::Stale));
                        }
                    }
                    Err(err)
                }
            }
        })
    }
}

fn is_fresh(entry: &CacheEntry, now: DateTime<Utc>) -> bool {
    entry.fresh_until.is_some_and(|t| t > now)
}

fn is_stale_but_usable(until: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    until.is_some_and(|t| t > now)
}

fn vary_matches(entry: &CacheEntry, req: &Request) -> bool {
    entry.vary_values.iter().all(|(name, value)| {
        let current = req
            .headers
            .get(name.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        &current == value
    })
}

fn attach_validators(req: Request, entry: &CacheEntry) -> Request {
    let mut req = req;
    if let Some(etag) = &entry.etag {
        req = req.with_header("if-none-match", etag);
    }
    if let Some(last_modified) = &entry.last_modified {
        req = req.with_header("if-modified-since", last_modified);
    }
    req
}

fn is_cacheable_response(res: &Response) -> bool {
    if !res.is_success() {
        return false;
    }
    let cc = parse_cache_control(res.headers());
    !cc.no_store
}

struct CacheControl {
    no_store: bool,
    no_cache: bool,
    max_age: Option<i64>,
    stale_while_revalidate: Option<i64>,
    stale_if_error: Option<i64>,
}

fn parse_cache_control(headers: &http::HeaderMap) -> CacheControl {
    let mut cc = CacheControl {
        no_store: false,
        no_cache: false,
        max_age: None,
        stale_while_revalidate: None,
        stale_if_error: None,
    };
    let Some(raw) = headers
        .get(http::header::CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
    else {
        return cc;
    };
    for directive in raw.split(',') {
        let directive = directive.trim();
        let (name, value) = match directive.split_once('=') {
            Some((n, v)) => (n.trim(), Some(v.trim().trim_matches('"'))),
            None => (directive, None),
        };
        match name {
            "no-store" => cc.no_store = true,
            "no-cache" => cc.no_cache = true,
            "max-age" => cc.max_age = value.and_then(|v| v.parse().ok()),
            "stale-while-revalidate" => {
                cc.stale_while_revalidate = value.and_then(|v| v.parse().ok())
            }
            "stale-if-error" => cc.stale_if_error = value.and_then(|v| v.parse().ok()),
            _ => {}
        }
    }
    cc
}

fn entry_from_response(res: &Response, req: &Request, now: DateTime<Utc>) -> Option<CacheEntry> {
    entry_from_response_with_ttl(res, req, now, Duration::ZERO)
}

fn entry_from_response_with_ttl(
    res: &Response,
    req: &Request,
    now: DateTime<Utc>,
    default_ttl: Duration,
) -> Option<CacheEntry> {
    let cc = parse_cache_control(res.headers());
    if cc.no_store || cc.no_cache {
        return None;
    }
    let max_age = cc.max_age.unwrap_or(default_ttl.as_secs() as i64);
    if max_age <= 0 && cc.max_age.is_some() {
        return None;
    }
    let fresh_until = now + chrono::Duration::seconds(max_age.max(0));
    let stale_while_revalidate_until = cc
        .stale_while_revalidate
        .map(|s| fresh_until + chrono::Duration::seconds(s));
    let stale_if_error_until = cc
        .stale_if_error
        .map(|s| fresh_until + chrono::Duration::seconds(s));
    let body = res.bytes().ok()?.to_vec();
    let etag = header_str(res.headers(), http::header::ETAG);
    let last_modified = header_str(res.headers(), http::header::LAST_MODIFIED);
    let vary: Vec<String> = header_str(res.headers(), http::header::VARY)
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| s != "*")
                .collect()
        })
        .unwrap_or_default();
    let vary_values = vary
        .iter()
        .map(|name| {
            let value = req
                .headers
                .get(name.as_str())
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            (name.clone(), value)
        })
        .collect();
    let headers = res
        .headers()
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_owned()))
        .collect();
    Some(CacheEntry {
        status: res.status().as_u16(),
        headers,
        body,
        etag,
        last_modified,
        fresh_until: Some(fresh_until),
        stale_while_revalidate_until,
        stale_if_error_until,
        vary,
        vary_values,
    })
}

fn refresh_entry(
    mut entry: CacheEntry,
    revalidation_headers: &http::HeaderMap,
    now: DateTime<Utc>,
) -> CacheEntry {
    let cc = parse_cache_control(revalidation_headers);
    let max_age = cc.max_age.unwrap_or(0).max(0);
    entry.fresh_until = Some(now + chrono::Duration::seconds(max_age));
    entry.stale_while_revalidate_until = cc
        .stale_while_revalidate
        .map(|s| now + chrono::Duration::seconds(max_age + s));
    entry.stale_if_error_until = cc
        .stale_if_error
        .map(|s| now + chrono::Duration::seconds(max_age + s));
    entry
}

fn header_str(headers: &http::HeaderMap, name: http::header::HeaderName) -> Option<String> {
    headers.get(name)?.to_str().ok().map(str::to_owned)
}

fn response_from_entry(entry: &CacheEntry, disposition: CacheDisposition) -> Response {
    let mut headers = http::HeaderMap::new();
    for (k, v) in &entry.headers {
        if let (Ok(name), Ok(value)) = (
            http::HeaderName::try_from(k.as_str()),
            http::HeaderValue::from_str(v),
        ) {
            headers.append(name, value);
        }
    }
    let status = http::StatusCode::from_u16(entry.status).unwrap_or(http::StatusCode::OK);
    let mut res = Response::new(status, headers, entry.body.clone());
    res.disposition = Some(disposition);
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{compose, fn_handler};
    use http::HeaderValue;
    use std::sync::atomic::{AtomicU32, Ordering};
    use url::Url;

    fn req() -> Request {
        Request::new(Method::GET, Url::parse("https://x/y").unwrap())
    }

    fn ok_with_cache_control(cc: &str, body: &[u8]) -> Response {
        let mut headers = http::HeaderMap::new();
        headers.insert(
            http::header::CACHE_CONTROL,
            HeaderValue::from_str(cc).unwrap(),
        );
        Response::new(http::StatusCode::OK, headers, body.to_vec())
    }

    #[test]
    fn fresh_hit_never_calls_downstream_again() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let base = fn_handler(move |_req| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(ok_with_cache_control("max-age=60", b"hello"))
        });
        let mw = CacheMiddleware::new(CacheConfig::default());
        let chain = compose(base, vec![Box::new(mw)]);
        chain.handle(req()).unwrap();
        let res = chain.handle(req()).unwrap();
        assert_eq!(res.text().unwrap(), "hello");
        assert_eq!(res.disposition, Some(CacheDisposition::Hit));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn no_store_response_is_never_cached() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let base = fn_handler(move |_req| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(ok_with_cache_control("no-store", b"x"))
        });
        let mw = CacheMiddleware::new(CacheConfig::default());
        let chain = compose(base, vec![Box::new(mw)]);
        chain.handle(req()).unwrap();
        chain.handle(req()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn non_cacheable_method_bypasses_the_store_entirely() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let base = fn_handler(move |_req| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(ok_with_cache_control("max-age=60", b"posted"))
        });
        let mw = CacheMiddleware::new(CacheConfig::default());
        let chain = compose(base, vec![Box::new(mw)]);
        let post = Request::new(Method::POST, Url::parse("https://x/y").unwrap());
        chain.handle(post.try_clone().unwrap()).unwrap();
        chain.handle(post).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn expired_entry_revalidates_and_refreshes_on_304() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let base = fn_handler(move |req: Request| {
            let n = c.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                let mut headers = http::HeaderMap::new();
                headers.insert(
                    http::header::CACHE_CONTROL,
                    HeaderValue::from_static("max-age=0"),
                );
                headers.insert(http::header::ETAG, HeaderValue::from_static("\"v1\""));
                Ok(Response::new(http::StatusCode::OK, headers, b"body".to_vec()))
            } else {
                assert!(req.headers.contains_key("if-none-match"));
                let mut headers = http::HeaderMap::new();
                headers.insert(
                    http::header::CACHE_CONTROL,
                    HeaderValue::from_static("max-age=60"),
                );
                Ok(Response::new(http::StatusCode::NOT_MODIFIED, headers, Vec::new()))
            }
        });
        let mw = CacheMiddleware::new(CacheConfig::default());
        let chain = compose(base, vec![Box::new(mw)]);
        chain.handle(req()).unwrap();
        let res = chain.handle(req()).unwrap();
        assert_eq!(res.disposition, Some(CacheDisposition::Revalidated));
        assert_eq!(res.text().unwrap(), "body");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
