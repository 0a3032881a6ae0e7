//! HAR player plugin (spec.md §4.13). Loaded once at construction from a
//! serialized HTTP Archive; replays recorded responses for matching
//! requests instead of dispatching for real. Useful for deterministic
//! integration tests and demos that replay fixture JSON instead of hitting
//! a live remote API.

use std::sync::Arc;

use http::Method;
use serde::Deserialize;

use crate::error::WayfarerError;
use crate::middleware::{BoxHandler, Handler, Middleware};
use crate::request::Request;
use crate::response::Response;

/// Minimal subset of the HAR 1.2 `log.entries[]` shape this player reads.
#[derive(Debug, Deserialize)]
struct HarRoot {
    log: HarLog,
}

#[derive(Debug, Deserialize)]
struct HarLog {
    entries: Vec<HarEntry>,
}

#[derive(Debug, Deserialize)]
struct HarEntry {
    request: HarRequest,
    response: HarResponse,
}

#[derive(Debug, Deserialize)]
struct HarRequest {
    method: String,
    url: String,
    #[serde(rename = "postData")]
    post_data: Option<HarPostData>,
}

#[derive(Debug, Deserialize)]
struct HarPostData {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HarResponse {
    status: u16,
    content: HarContent,
    headers: Vec<HarHeader>,
}

#[derive(Debug, Deserialize)]
struct HarContent {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HarHeader {
    name: String,
    value: String,
}

struct Recording {
    method: Method,
    url: String,
    body: Option<String>,
    status: u16,
    headers: Vec<(String, String)>,
    body_text: String,
}

fn find<'a>(recordings: &'a [Recording], req: &Request, body_text: Option<&str>) -> Option<&'a Recording> {
    recordings.iter().find(|r| {
        r.method == req.method
            && r.url == req.url.as_str()
            && match (&r.body, body_text) {
                (Some(expected), Some(actual)) => expected == actual,
                (None, _) => true,
                (Some(_), None) => false,
            }
    })
}

fn synthesize(recording: &Recording) -> Response {
    let mut headers = http::HeaderMap::new();
    for (name, value) in &recording.headers {
        if let (Ok(name), Ok(value)) = (
            http::HeaderName::try_from(name.as_str()),
            http::HeaderValue::from_str(value),
        ) {
            headers.append(name, value);
        }
    }
    let status = http::StatusCode::from_u16(recording.status).unwrap_or(http::StatusCode::OK);
    Response::new(status, headers, recording.body_text.clone().into_bytes())
}

/// Replays a loaded HAR archive as a middleware. On a miss: forwards to the
/// downstream handler unless `strict`, in which case it raises
/// `WayfarerError::Plugin` naming the unmatched request.
pub struct HarPlayer {
    recordings: Arc<Vec<Recording>>,
    strict: bool,
}

impl HarPlayer {
    /// Parses a HAR document's JSON text. First-entry-wins: recordings are
    /// tried in archive order and the first method+URL(+body) match serves
    /// the response.
    pub fn load(har_json: &str, strict: bool) -> Result<Self, WayfarerError> {
        let root: HarRoot = serde_json::from_str(har_json)
            .map_err(|e| WayfarerError::Plugin(format!("invalid HAR document: {e}")))?;
        let recordings = root
            .log
            .entries
            .into_iter()
            .filter_map(|entry| {
                let method = entry.request.method.parse().ok()?;
                Some(Recording {
                    method,
                    url: entry.request.url,
                    body: entry.request.post_data.and_then(|p| p.text),
                    status: entry.response.status,
                    headers: entry
                        .response
                        .headers
                        .into_iter()
                        .map(|h| (h.name, h.value))
                        .collect(),
                    body_text: entry.response.content.text.unwrap_or_default(),
                })
            })
            .collect();
        Ok(HarPlayer {
            recordings: Arc::new(recordings),
            strict,
        })
    }
}

impl Middleware for HarPlayer {
    fn wrap(&self, inner: BoxHandler) -> BoxHandler {
        let recordings = Arc::clone(&self.recordings);
        let strict = self.strict;
        crate::middleware::fn_handler(move |req: Request| {
            let body_text = match &req.body {
                crate::body::Body::Bytes(b) => std::str::from_utf8(b).ok().map(str::to_owned),
                _ => None,
            };
            match find(&recordings, &req, body_text.as_deref()) {
                Some(recording) => Ok(synthesize(recording)),
                None if strict => Err(WayfarerError::Plugin(format!(
                    "no matching HAR recording for {} {}",
                    req.method, req.url
                ))),
                None => inner.handle(req),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{compose, fn_handler};
    use url::Url;

    fn sample_har() -> String {
        r#"{
            "log": {
                "entries": [
                    {
                        "request": { "method": "GET", "url": "https://x/y" },
                        "response": {
                            "status": 200,
                            "headers": [{"name": "content-type", "value": "text/plain"}],
                            "content": { "text": "recorded" }
                        }
                    }
                ]
            }
        }"#
        .to_owned()
    }

    #[test]
    fn replays_a_matching_recording() {
        let player = HarPlayer::load(&sample_har(), false).unwrap();
        let base = fn_handler(|_req| panic!("should not reach downstream"));
        let chain = compose(base, vec![Box::new(player)]);
        let req = Request::new(Method::GET, Url::parse("https://x/y").unwrap());
        let res = chain.handle(req).unwrap();
        assert_eq!(res.text().unwrap(), "recorded");
    }

    #[test]
    fn non_strict_miss_forwards_downstream() {
        let player = HarPlayer::load(&sample_har(), false).unwrap();
        let base = fn_handler(|_req| {
            Ok(Response::new(http::StatusCode::OK, http::HeaderMap::new(), b"live".to_vec()))
        });
        let chain = compose(base, vec![Box::new(player)]);
        let req = Request::new(Method::GET, Url::parse("https://x/other").unwrap());
        let res = chain.handle(req).unwrap();
        assert_eq!(res.text().unwrap(), "live");
    }

    #[test]
    fn strict_miss_raises_an_error() {
        let player = HarPlayer::load(&sample_har(), true).unwrap();
        let base = fn_handler(|_req| panic!("should not reach downstream"));
        let chain = compose(base, vec![Box::new(player)]);
        let req = Request::new(Method::GET, Url::parse("https://x/other").unwrap());
        assert!(chain.handle(req).is_err());
    }
}
