//! Request and response body representations (spec.md §3 `Request`/`Response`).
//!
//! A request body is one of `none | bytes | text | form-encoded | multipart |
//! streaming`. Bytes bodies are reference-counted so retry/dedup/cache
//! plugins can cheaply clone a request for a second attempt; streaming
//! bodies cannot be cloned, which is why the retry plugin refuses to retry
//! them (spec.md §4.6).

use std::hash::{Hash, Hasher};
use std::io::Read;
use std::sync::{Arc, Mutex};

use rand::RngCore;

/// The body of an outgoing [`crate::request::Request`].
pub enum Body {
    /// No body at all (GET, HEAD, ...).
    None,
    /// In-memory bytes, cheaply cloneable across retries/dedup fan-out.
    Bytes(Arc<[u8]>),
    /// A caller-supplied stream. Sets the "half-duplex" semantic from
    /// spec.md §4.2.3: the request body must finish uploading before the
    /// response starts arriving. Not cloneable, so not retryable. The
    /// `Mutex<Option<_>>` lets the transport take the reader out through a
    /// shared `&Body` (the dispatch loop only ever sees a reference);
    /// taking it twice — e.g. a 307 redirect attempting to resend an
    /// already-consumed stream — fails instead of silently sending nothing.
    Stream(Mutex<Option<Box<dyn Read + Send>>>),
}

impl Body {
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Body::Bytes(Arc::from(data.into().into_boxed_slice()))
    }

    pub fn text(s: impl Into<String>) -> Self {
        Body::bytes(s.into().into_bytes())
    }

    pub fn stream(reader: impl Read + Send + 'static) -> Self {
        Body::Stream(Mutex::new(Some(Box::new(reader))))
    }

    /// Takes the inner reader out, leaving the variant empty. Returns
    /// `None` if this isn't a stream body or the stream was already taken.
    pub(crate) fn take_stream(&self) -> Option<Box<dyn Read + Send>> {
        match self {
            Body::Stream(cell) => cell.lock().unwrap().take(),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Body::None)
    }

    /// Best-effort clone: bytes bodies clone cheaply (shared `Arc`),
    /// streaming bodies cannot be cloned and this method returns `None`.
    pub fn try_clone(&self) -> Option<Body> {
        match self {
            Body::None => Some(Body::None),
            Body::Bytes(b) => Some(Body::Bytes(Arc::clone(b))),
            Body::Stream(_) => None,
        }
    }

    /// Digest used as part of cache/dedup fingerprints (spec.md §4.7/§4.8).
    /// Streaming bodies digest to a sentinel since they cannot be
    /// inspected without consuming them; such requests are simply never
    /// deduplicated/cache-keyed consistently, matching the non-cloneable
    /// retry behavior.
    pub fn digest(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        match self {
            Body::None => 0u8.hash(&mut hasher),
            Body::Bytes(b) => {
                1u8.hash(&mut hasher);
                b.hash(&mut hasher);
            }
            Body::Stream(_) => 2u8.hash(&mut hasher),
        }
        hasher.finish()
    }

    pub fn len(&self) -> Option<u64> {
        match self {
            Body::None => Some(0),
            Body::Bytes(b) => Some(b.len() as u64),
            Body::Stream(_) => None,
        }
    }
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Body::None => write!(f, "Body::None"),
            Body::Bytes(b) => write!(f, "Body::Bytes({} bytes)", b.len()),
            Body::Stream(_) => write!(f, "Body::Stream(..)"),
        }
    }
}

/// A single field of a `multipart/form-data` body.
pub enum MultipartField {
    Text { name: String, value: String },
    File {
        name: String,
        filename: String,
        content_type: String,
        data: Vec<u8>,
    },
}

/// Builds a `multipart/form-data` body. Serialized once into an in-memory
/// buffer at [`MultipartForm::finish`] (spec.md §4.2.3: "Multipart form
/// inputs are serialized once"), so the resulting `Content-Length` and
/// body digest are both known up front.
#[derive(Default)]
pub struct MultipartForm {
    fields: Vec<MultipartField>,
}

impl MultipartForm {
    pub fn new() -> Self {
        MultipartForm::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(MultipartField::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        self.fields.push(MultipartField::File {
            name: name.into(),
            filename: filename.into(),
            content_type: content_type.into(),
            data: data.into(),
        });
        self
    }

    /// Returns `(content_type_header, body)`; the boundary is embedded in
    /// the content-type value.
    pub fn finish(self) -> (String, Body) {
        let mut rng = rand::rng();
        let boundary = format!("wayfarer-{:016x}{:016x}", rng.next_u64(), rng.next_u64());
        let mut out = Vec::new();
        for field in &self.fields {
            out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            match field {
                MultipartField::Text { name, value } => {
                    out.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n")
                            .as_bytes(),
                    );
                    out.extend_from_slice(value.as_bytes());
                }
                MultipartField::File {
                    name,
                    filename,
                    content_type,
                    data,
                } => {
                    out.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    out.extend_from_slice(data);
                }
            }
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        let content_type = format!("multipart/form-data; boundary={boundary}");
        (content_type, Body::bytes(out))
    }
}

/// URL-encodes `pairs` the way a `<form>` submission would
/// (`application/x-www-form-urlencoded`).
pub fn form_urlencode(pairs: &[(String, String)]) -> Vec<u8> {
    let mut out = String::new();
    for (i, (k, v)) in pairs.iter().enumerate() {
        if i > 0 {
            out.push('&');
        }
        out.push_str(&percent_encoding::utf8_percent_encode(
            k,
            percent_encoding::NON_ALPHANUMERIC,
        ).to_string());
        out.push('=');
        out.push_str(&percent_encoding::utf8_percent_encode(
            v,
            percent_encoding::NON_ALPHANUMERIC,
        ).to_string());
    }
    out.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_body_clones_cheaply() {
        let body = Body::bytes(b"hello".to_vec());
        let clone = body.try_clone().expect("bytes body should clone");
        assert_eq!(body.digest(), clone.digest());
    }

    #[test]
    fn stream_body_does_not_clone() {
        let body = Body::stream(std::io::Cursor::new(vec![1, 2, 3]));
        assert!(body.try_clone().is_none());
    }

    #[test]
    fn multipart_embeds_boundary_in_content_type() {
        let (content_type, body) = MultipartForm::new()
            .text("a", "1")
            .file("f", "x.txt", "text/plain", b"data".to_vec())
            .finish();
        assert!(content_type.starts_with("multipart/form-data; boundary="));
        let boundary = content_type.trim_start_matches("multipart/form-data; boundary=");
        if let Body::Bytes(b) = body {
            let text = String::from_utf8(b.to_vec()).unwrap();
            assert!(text.contains(boundary));
            assert!(text.contains("name=\"a\""));
            assert!(text.contains("filename=\"x.txt\""));
        } else {
            panic!("expected bytes body");
        }
    }

    #[test]
    fn form_urlencode_escapes_reserved_characters() {
        let encoded = form_urlencode(&[("a b".to_owned(), "c&d".to_owned())]);
        assert_eq!(String::from_utf8(encoded).unwrap(), "a%20b=c%26d");
    }
}
