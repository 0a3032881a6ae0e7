//! The transport adapter (spec.md §4.2): the terminal `Handler` that
//! performs exactly one wire transaction per hop, handles redirects
//! explicitly, maps per-phase timeouts, instruments upload/download
//! progress, and translates engine errors into the `wayfarer` taxonomy.
//!
//! Built on `ureq::Agent`, with `max_redirects(0)` configured on every pool
//! so the engine never auto-follows a 3xx — `wayfarer` always performs the
//! redirect loop itself, per spec.md §4.2.2. `connect`/`response`/`send`
//! phase timeouts map onto `timeout_connect`/`timeout_recv_response`/
//! `timeout_send_body` on the per-call config builder.

use std::io::Read;
use std::time::{Duration, Instant};

use http::{HeaderMap, Method, StatusCode};
use url::Url;

use crate::agent::AgentManager;
use crate::body::Body;
use crate::error::{TimeoutPhase, WayfarerError};
use crate::middleware::Handler;
use crate::request::{Direction, ProgressEvent, Request, RedirectContext, RedirectDecision};
use crate::response::{ConnectionInfo, Response, Timings};

/// Explicit per-request diagnostic context, threaded through the dispatch
/// call rather than populated via thread-local storage (spec.md §9 "Per-request
/// context without thread-locals"). The original relies on an out-of-band
/// diagnostic channel; this is the direct-field-write replacement.
#[derive(Default)]
struct DispatchContext {
    started_at: Option<Instant>,
    headers_at: Option<Instant>,
    body_at: Option<Instant>,
    connection: ConnectionInfo,
}

impl DispatchContext {
    fn timings(&self, total_start: Instant) -> Timings {
        Timings {
            queuing: None,
            dns: None,
            tcp: None,
            tls: None,
            first_byte: self
                .started_at
                .zip(self.headers_at)
                .map(|(s, h)| h.saturating_duration_since(s)),
            content: self
                .headers_at
                .zip(self.body_at)
                .map(|(h, b)| b.saturating_duration_since(h)),
            total: Some(total_start.elapsed()),
        }
    }
}

/// The `ureq`-backed transport. Implements [`Handler`], so it can sit as
/// the innermost stage of the composed pipeline.
pub struct UreqTransport {
    agents: AgentManager,
    observability: bool,
}

impl UreqTransport {
    pub fn new(agents: AgentManager, observability: bool) -> Self {
        UreqTransport {
            agents,
            observability,
        }
    }

    fn dispatch_once(
        &self,
        method: &Method,
        url: &Url,
        headers: &HeaderMap,
        body: &Body,
        req: &Request,
    ) -> Result<Response, WayfarerError> {
        if req.cancel.is_aborted() {
            return Err(WayfarerError::Cancellation);
        }

        let handle = self.agents.agent_for_url(url)?;
        let total_start = Instant::now();
        let mut ctx = DispatchContext {
            started_at: Some(total_start),
            ..Default::default()
        };

        let mut builder = handle.agent.request(method.as_str(), url.as_str());
        for (name, value) in headers.iter() {
            if let Ok(v) = value.to_str() {
                builder = builder.header(name.as_str(), v);
            }
        }
        if let Some(connect_timeout) = req.timeout.connect_phase() {
            builder = builder.config().timeout_connect(Some(connect_timeout)).build();
        }
        if let Some(response_timeout) = req.timeout.response_phase() {
            builder = builder
                .config()
                .timeout_recv_response(Some(response_timeout))
                .build();
        }
        if let Some(send_timeout) = req.timeout.send_phase() {
            builder = builder.config().timeout_send_body(Some(send_timeout)).build();
        }

        let send_result = match body {
            Body::None => builder.call(),
            Body::Bytes(bytes) => {
                let instrumented = instrument_upload(bytes.clone(), req);
                builder.send(instrumented)
            }
            Body::Stream(_) => {
                // Half-duplex: the stream must be fully sent before the
                // response begins arriving (spec.md §4.2.3). ureq's `send`
                // already serializes upload-then-response for a reader
                // body. The reader is taken out of the body on first use;
                // a second attempt (e.g. a 307 redirect trying to resend
                // it) finds it already gone and fails loudly instead of
                // silently sending nothing.
                match body.take_stream() {
                    Some(reader) => builder.send(reader),
                    None => {
                        return Err(WayfarerError::Validation {
                            field: "body".into(),
                            value: "streaming request body already consumed by a previous hop"
                                .into(),
                        });
                    }
                }
            }
        };

        ctx.headers_at = Some(Instant::now());

        let ureq_response = match send_result {
            Ok(r) => r,
            Err(e) => return Err(translate_engine_error(e, req)),
        };

        capture_connection_info(&ureq_response, &mut ctx.connection);

        let status =
            StatusCode::from_u16(ureq_response.status().as_u16()).unwrap_or(StatusCode::OK);
        let mut out_headers = HeaderMap::new();
        for (name, value) in ureq_response.headers().iter() {
            if let (Ok(n), Ok(v)) = (
                http::HeaderName::from_bytes(name.as_str().as_bytes()),
                http::HeaderValue::from_bytes(value.as_bytes()),
            ) {
                out_headers.append(n, v);
            }
        }

        enforce_content_length_limit(&out_headers, req.max_response_size)?;

        let body_bytes = read_body_with_limits(ureq_response.into_body(), req)?;
        ctx.body_at = Some(Instant::now());

        let mut response = Response::new(status, out_headers, body_bytes);
        response.timings = ctx.timings(total_start);
        if self.observability {
            response.connection = ctx.connection;
        }
        Ok(response)
    }
}

/// A single-wire-transaction dispatcher: exactly the seam spec.md §4.2
/// describes Transport as owning. Factored out of [`UreqTransport`] so the
/// redirect loop below can be exercised in tests against a scripted
/// dispatcher instead of a real socket.
pub(crate) trait HopDispatcher {
    fn dispatch_hop(
        &self,
        method: &Method,
        url: &Url,
        headers: &HeaderMap,
        body: &Body,
        req: &Request,
    ) -> Result<Response, WayfarerError>;
}

impl HopDispatcher for UreqTransport {
    fn dispatch_hop(
        &self,
        method: &Method,
        url: &Url,
        headers: &HeaderMap,
        body: &Body,
        req: &Request,
    ) -> Result<Response, WayfarerError> {
        self.dispatch_once(method, url, headers, body, req)
    }
}

/// The manual redirect loop (spec.md §4.2.2): iterates up to
/// `req.max_redirects` hops, resolving `Location` against the current URL,
/// honoring `beforeRedirect`, and rewriting method/body for 303 and
/// 301/302-on-non-GET/HEAD while preserving them for 307/308.
pub(crate) fn dispatch_with_redirects<D: HopDispatcher>(
    dispatcher: &D,
    mut req: Request,
) -> Result<Response, WayfarerError> {
    let mut current_url = req.url.clone();
    let mut method = req.method.clone();
    // Moved out of `req` once, by value, so a streaming body reaches the
    // first hop intact instead of being discarded by a failed clone
    // attempt. `dispatch_hop` only ever borrows `body`, so it is reused
    // by reference on every subsequent hop without needing to re-clone it.
    let mut body = std::mem::replace(&mut req.body, Body::None);
    let mut headers = req.headers.clone();
    let mut hops: u32 = 0;

    loop {
        let response = dispatcher.dispatch_hop(&method, &current_url, &headers, &body, &req)?;

        if !req.follow_redirects || !response.is_redirect() || hops >= req.max_redirects {
            return Ok(response);
        }

        let Some(location) = response
            .headers()
            .get(http::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
        else {
            return Ok(response);
        };

        let to = match current_url.join(&location) {
            Ok(u) => u,
            Err(_) => return Ok(response),
        };

        if let Some(callback) = &req.before_redirect {
            let decision = callback(&RedirectContext {
                from: current_url.clone(),
                to: to.clone(),
                status: response.status().as_u16(),
                headers: response.headers().clone(),
            });
            match decision {
                RedirectDecision::Stop => return Ok(response),
                RedirectDecision::Follow(Some(override_url)) => {
                    current_url = override_url;
                }
                RedirectDecision::Follow(None) => {
                    current_url = to;
                }
            }
        } else {
            current_url = to;
        }

        let status = response.status().as_u16();
        let rewrite_to_get = status == 303
            || ((status == 301 || status == 302) && method != Method::GET && method != Method::HEAD);
        if rewrite_to_get {
            method = Method::GET;
            body = Body::None;
            headers.remove(http::header::CONTENT_TYPE);
            headers.remove(http::header::CONTENT_LENGTH);
        }
        // 307/308 (and GET/HEAD 301/302) preserve method and body as-is.

        hops += 1;
    }
}

impl Handler for UreqTransport {
    fn handle(&self, req: Request) -> Result<Response, WayfarerError> {
        dispatch_with_redirects(self, req)
    }
}

fn instrument_upload(bytes: std::sync::Arc<[u8]>, req: &Request) -> std::io::Cursor<Vec<u8>> {
    if let Some(cb) = &req.on_upload_progress {
        let total = bytes.len() as u64;
        cb(ProgressEvent {
            loaded: total,
            total: Some(total),
            direction: Direction::Upload,
        });
    }
    std::io::Cursor::new(bytes.to_vec())
}

/// Enforces spec.md §4.12: "After receiving headers, if `Content-Length`
/// exceeds limit, raise `MaxSizeExceededError` before consuming body."
/// The max-size guard *plugin* only negotiates the effective limit
/// (request override vs. client default); the transport is the only stage
/// with access to the raw headers/stream before buffering, so it performs
/// the actual enforcement.
fn enforce_content_length_limit(
    headers: &HeaderMap,
    limit: Option<u64>,
) -> Result<(), WayfarerError> {
    let Some(limit) = limit else { return Ok(()) };
    if let Some(len) = headers
        .get(http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
    {
        if len > limit {
            return Err(WayfarerError::MaxSize {
                limit,
                observed: len,
            });
        }
    }
    Ok(())
}

/// Reads the response body, enforcing `max_response_size` against the
/// running byte count for chunked responses (no `Content-Length`) and
/// emitting download-progress events, per spec.md §4.2.4/§4.12.
fn read_body_with_limits(
    body: ureq::Body,
    req: &Request,
) -> Result<Vec<u8>, WayfarerError> {
    let content_length = body.content_length();
    let mut reader = body.into_reader();
    let mut buf = Vec::new();
    let mut chunk = [0u8; 16 * 1024];
    let mut total: u64 = 0;
    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        total += n as u64;
        if let Some(limit) = req.max_response_size {
            if total > limit {
                return Err(WayfarerError::MaxSize {
                    limit,
                    observed: total,
                });
            }
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(cb) = &req.on_download_progress {
            cb(ProgressEvent {
                loaded: total,
                total: content_length.map(|l| l as u64),
                direction: Direction::Download,
            });
        }
    }
    Ok(buf)
}

fn capture_connection_info(response: &ureq::http::Response<ureq::Body>, info: &mut ConnectionInfo) {
    // ureq's public API does not expose socket-level peer address/cipher
    // directly on the response; `reused` and `protocol` are approximated
    // from response metadata that is available without unsafe downcasts.
    info.protocol = Some(format!("{:?}", response.version()));
}

/// Maps an engine-level error to the `wayfarer` taxonomy (spec.md §4.2.5).
fn translate_engine_error(err: ureq::Error, req: &Request) -> WayfarerError {
    match &err {
        ureq::Error::Timeout(_) => {
            let phase = if req.timeout.total().is_some() {
                TimeoutPhase::Request
            } else if req.timeout.connect_phase().is_some() {
                TimeoutPhase::Connect
            } else if req.timeout.send_phase().is_some() {
                TimeoutPhase::Send
            } else if req.timeout.response_phase().is_some() {
                TimeoutPhase::Response
            } else {
                TimeoutPhase::Request
            };
            WayfarerError::timeout(
                phase,
                req.timeout
                    .connect_phase()
                    .or(req.timeout.send_phase())
                    .or(req.timeout.response_phase())
                    .or(req.timeout.total())
                    .unwrap_or(Duration::ZERO),
            )
        }
        _ => {
            if req.cancel.is_aborted() {
                return WayfarerError::Cancellation;
            }
            WayfarerError::from(err)
        }
    }
}
