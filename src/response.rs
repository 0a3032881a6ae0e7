//! The [`Response`] value (spec.md §3): status, headers, a body realized at
//! most once, and the two observability side-panels (`Timings`,
//! `ConnectionInfo`).

use std::io::Read;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::WayfarerError;

/// Per-phase request timings (spec.md §3).
#[derive(Debug, Clone, Copy, Default)]
pub struct Timings {
    pub queuing: Option<Duration>,
    pub dns: Option<Duration>,
    pub tcp: Option<Duration>,
    pub tls: Option<Duration>,
    pub first_byte: Option<Duration>,
    pub content: Option<Duration>,
    pub total: Option<Duration>,
}

/// Connection-level observability data (spec.md §3).
#[derive(Debug, Clone, Default)]
pub struct ConnectionInfo {
    pub remote_addr: Option<SocketAddr>,
    pub local_addr: Option<SocketAddr>,
    pub protocol: Option<String>,
    pub cipher: Option<String>,
    pub reused: bool,
    pub extras: std::collections::HashMap<String, String>,
}

/// Cache disposition attached to a response by the cache plugin (spec.md
/// §4.7 "populates a response attribute indicating cache disposition").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDisposition {
    Hit,
    Miss,
    Revalidated,
    Stale,
}

enum BodyState {
    /// Not yet read; still backed by a live reader (only when the caller
    /// opted into a true streaming response).
    Pending(Box<dyn Read + Send>),
    /// Fully realized in memory — the common case, and the only state a
    /// `Response` can be cloned from (spec.md §3 "cloning required for
    /// multi-consumption").
    Bytes(Arc<[u8]>),
    /// Consumed via [`Response::into_reader`]/[`Response::sse`]; any
    /// further body access is an error.
    Taken,
}

/// An HTTP response. See module docs and spec.md §3.
pub struct Response {
    status: StatusCode,
    reason: Option<String>,
    headers: HeaderMap,
    body: Mutex<BodyState>,
    pub timings: Timings,
    pub connection: ConnectionInfo,
    pub disposition: Option<CacheDisposition>,
}

impl Response {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
        Response {
            status,
            reason: None,
            headers,
            body: Mutex::new(BodyState::Bytes(Arc::from(body.into_boxed_slice()))),
            timings: Timings::default(),
            connection: ConnectionInfo::default(),
            disposition: None,
        }
    }

    pub fn from_reader(
        status: StatusCode,
        headers: HeaderMap,
        reader: Box<dyn Read + Send>,
    ) -> Self {
        Response {
            status,
            reason: None,
            headers,
            body: Mutex::new(BodyState::Pending(reader)),
            timings: Timings::default(),
            connection: ConnectionInfo::default(),
            disposition: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn set_reason(&mut self, reason: Option<String>) {
        self.reason = reason;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_redirect(&self) -> bool {
        self.status.is_redirection()
    }

    pub fn is_client_or_server_error(&self) -> bool {
        self.status.is_client_error() || self.status.is_server_error()
    }

    /// The parsed `Content-Type`, if present and well-formed.
    pub fn content_type(&self) -> Option<mime::Mime> {
        self.headers
            .get(http::header::CONTENT_TYPE)?
            .to_str()
            .ok()?
            .parse()
            .ok()
    }

    /// Realizes the body into memory, reading the pending stream exactly
    /// once if needed. Cheap on subsequent calls.
    pub fn bytes(&self) -> Result<Arc<[u8]>, WayfarerError> {
        let mut guard = self.body.lock().unwrap();
        match &*guard {
            BodyState::Bytes(b) => Ok(Arc::clone(b)),
            BodyState::Taken => Err(WayfarerError::Validation {
                field: "body".into(),
                value: "already consumed as a stream".into(),
            }),
            BodyState::Pending(_) => {
                let BodyState::Pending(mut reader) =
                    std::mem::replace(&mut *guard, BodyState::Taken)
                else {
                    unreachable!()
                };
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf)?;
                let arc: Arc<[u8]> = Arc::from(buf.into_boxed_slice());
                *guard = BodyState::Bytes(Arc::clone(&arc));
                Ok(arc)
            }
        }
    }

    pub fn text(&self) -> Result<String, WayfarerError> {
        let bytes = self.bytes()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| WayfarerError::validation("body", e.to_string()))
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, WayfarerError> {
        let bytes = self.bytes()?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Consumes `self` and returns a reader over the body. Works whether
    /// the body is already realized (wraps the bytes in a `Cursor`) or
    /// still pending (hands over the live reader directly, which is the
    /// zero-copy streaming path).
    pub fn into_reader(self) -> Box<dyn Read + Send> {
        let mut guard = self.body.lock().unwrap();
        let taken = std::mem::replace(&mut *guard, BodyState::Taken);
        match taken {
            BodyState::Bytes(b) => Box::new(std::io::Cursor::new(b.to_vec())),
            BodyState::Pending(r) => r,
            BodyState::Taken => Box::new(std::io::Cursor::new(Vec::new())),
        }
    }

    /// A single parsed Server-Sent Events frame.
    pub fn sse(self) -> SseEvents {
        SseEvents::new(self.into_reader())
    }

    /// `true` if the body has been realized into memory and the response
    /// can therefore be cheaply cloned for dedup fan-out (spec.md §4.8).
    pub fn is_cloneable(&self) -> bool {
        matches!(&*self.body.lock().unwrap(), BodyState::Bytes(_))
    }

    pub fn try_clone(&self) -> Option<Response> {
        let guard = self.body.lock().unwrap();
        let BodyState::Bytes(b) = &*guard else {
            return None;
        };
        Some(Response {
            status: self.status,
            reason: self.reason.clone(),
            headers: self.headers.clone(),
            body: Mutex::new(BodyState::Bytes(Arc::clone(b))),
            timings: self.timings,
            connection: self.connection.clone(),
            disposition: self.disposition,
        })
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("disposition", &self.disposition)
            .finish_non_exhaustive()
    }
}

/// One Server-Sent-Events frame: `data` is the concatenation of all `data:`
/// lines in the frame (joined by `\n`), `event`/`id` are the optional
/// `event:`/`id:` fields.
#[derive(Debug, Clone, Default)]
pub struct SseEvent {
    pub event: Option<String>,
    pub id: Option<String>,
    pub data: String,
}

/// A pull-based iterator over Server-Sent-Events frames, splitting on blank
/// lines per the SSE wire format.
pub struct SseEvents {
    lines: std::io::Lines<std::io::BufReader<Box<dyn Read + Send>>>,
}

impl SseEvents {
    fn new(reader: Box<dyn Read + Send>) -> Self {
        use std::io::BufRead;
        SseEvents {
            lines: std::io::BufReader::new(reader).lines(),
        }
    }
}

impl Iterator for SseEvents {
    type Item = std::io::Result<SseEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut event = SseEvent::default();
        let mut data_lines: Vec<String> = Vec::new();
        let mut saw_any_field = false;
        for line in self.lines.by_ref() {
            let line = match line {
                Ok(l) => l,
                Err(e) => return Some(Err(e)),
            };
            if line.is_empty() {
                if saw_any_field {
                    event.data = data_lines.join("\n");
                    return Some(Ok(event));
                }
                continue;
            }
            saw_any_field = true;
            if let Some(rest) = line.strip_prefix("data:") {
                data_lines.push(rest.trim_start().to_owned());
            } else if let Some(rest) = line.strip_prefix("event:") {
                event.event = Some(rest.trim_start().to_owned());
            } else if let Some(rest) = line.strip_prefix("id:") {
                event.id = Some(rest.trim_start().to_owned());
            }
        }
        if saw_any_field {
            event.data = data_lines.join("\n");
            Some(Ok(event))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resp(body: &str) -> Response {
        Response::new(StatusCode::OK, HeaderMap::new(), body.as_bytes().to_vec())
    }

    #[test]
    fn bytes_then_text_reuses_realized_body() {
        let r = resp("hello");
        assert_eq!(r.bytes().unwrap().as_ref(), b"hello");
        assert_eq!(r.text().unwrap(), "hello");
    }

    #[test]
    fn json_parses_body() {
        let r = resp(r#"{"a":1}"#);
        let v: serde_json::Value = r.json().unwrap();
        assert_eq!(v["a"], 1);
    }

    #[test]
    fn bytes_response_clones() {
        let r = resp("x");
        let clone = r.try_clone().unwrap();
        assert_eq!(clone.text().unwrap(), "x");
    }

    #[test]
    fn pending_stream_response_does_not_clone_until_realized() {
        let r = Response::from_reader(
            StatusCode::OK,
            HeaderMap::new(),
            Box::new(std::io::Cursor::new(b"abc".to_vec())),
        );
        assert!(!r.is_cloneable());
        assert!(r.try_clone().is_none());
        assert_eq!(r.text().unwrap(), "abc");
        assert!(r.is_cloneable());
    }

    #[test]
    fn content_type_parses_the_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            "application/json; charset=utf-8".parse().unwrap(),
        );
        let r = Response::new(StatusCode::OK, headers, Vec::new());
        let mime = r.content_type().unwrap();
        assert_eq!(mime.type_(), "application");
        assert_eq!(mime.subtype(), "json");
    }

    #[test]
    fn sse_splits_on_blank_lines() {
        let r = Response::new(
            StatusCode::OK,
            HeaderMap::new(),
            b"event: ping\ndata: one\n\ndata: two\ndata: three\n\n".to_vec(),
        );
        let events: Vec<SseEvent> = r.sse().map(|e| e.unwrap()).collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event.as_deref(), Some("ping"));
        assert_eq!(events[0].data, "one");
        assert_eq!(events[1].data, "two\nthree");
    }
}
