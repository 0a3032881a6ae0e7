//! Compression plugin (spec.md §4.10): compresses the outgoing request body
//! for `POST`/`PUT`/`PATCH` when the content-type is on the compressible
//! allowlist, the body is at least `min_size`, and no `Content-Encoding` is
//! already set. Skips (sends uncompressed) when the compressed form ends up
//! larger, unless `force`; any encoder failure also falls back to plain.
//!
//! Gzip/deflate via `flate2::write::{GzEncoder, DeflateEncoder}`, brotli via
//! `brotli::CompressorReader` — both carried from `rust-dd-tako`'s response
//! compression plugin (`plugins/compression.rs`), here applied to request
//! bodies instead of responses.

use std::io::{Read, Write};

use http::Method;

use crate::body::Body;
use crate::middleware::{BoxHandler, Handler, Middleware};
use crate::request::Request;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Gzip,
    Deflate,
    Brotli,
}

impl Encoding {
    fn header_value(self) -> &'static str {
        match self {
            Encoding::Gzip => "gzip",
            Encoding::Deflate => "deflate",
            Encoding::Brotli => "br",
        }
    }
}

#[derive(Clone)]
pub struct CompressionConfig {
    pub encoding: Encoding,
    pub min_size: usize,
    pub gzip_level: u32,
    pub deflate_level: u32,
    pub brotli_level: u32,
    /// Compressible `Content-Type` prefixes; a request whose content-type
    /// doesn't start with one of these is left alone.
    pub compressible_prefixes: Vec<String>,
    /// Install the encoded body even if it's larger than the original.
    pub force: bool,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        CompressionConfig {
            encoding: Encoding::Gzip,
            min_size: 1024,
            gzip_level: 6,
            deflate_level: 6,
            brotli_level: 5,
            compressible_prefixes: vec![
                "text/".to_owned(),
                "application/json".to_owned(),
                "application/xml".to_owned(),
                "application/x-www-form-urlencoded".to_owned(),
            ],
            force: false,
        }
    }
}

pub struct CompressionMiddleware {
    config: CompressionConfig,
}

impl CompressionMiddleware {
    pub fn new(config: CompressionConfig) -> Self {
        CompressionMiddleware { config }
    }
}

impl Middleware for CompressionMiddleware {
    fn wrap(&self, inner: BoxHandler) -> BoxHandler {
        let config = self.config.clone();
        crate::middleware::fn_handler(move |req: Request| {
            let req = maybe_compress(req, &config);
            inner.handle(req)
        })
    }
}

fn maybe_compress(req: Request, config: &CompressionConfig) -> Request {
    if !matches!(req.method, Method::POST | Method::PUT | Method::PATCH) {
        return req;
    }
    if req.headers.contains_key(http::header::CONTENT_ENCODING) {
        return req;
    }
    let content_type = req
        .headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !config
        .compressible_prefixes
        .iter()
        .any(|p| content_type.starts_with(p.as_str()))
    {
        return req;
    }
    let Body::Bytes(bytes) = &req.body else {
        return req;
    };
    if bytes.len() < config.min_size {
        return req;
    }
    let Ok(compressed) = compress(bytes, config.encoding, config) else {
        return req;
    };
    if compressed.len() >= bytes.len() && !config.force {
        return req;
    }
    let len = compressed.len();
    req.with_body(Body::bytes(compressed))
        .with_header("content-encoding", config.encoding.header_value())
        .with_header("content-length", &len.to_string())
}

fn compress(
    data: &[u8],
    encoding: Encoding,
    config: &CompressionConfig,
) -> std::io::Result<Vec<u8>> {
    match encoding {
        Encoding::Gzip => {
            let mut enc = flate2::write::GzEncoder::new(
                Vec::new(),
                flate2::Compression::new(config.gzip_level),
            );
            enc.write_all(data)?;
            enc.finish()
        }
        Encoding::Deflate => {
            let mut enc = flate2::write::DeflateEncoder::new(
                Vec::new(),
                flate2::Compression::new(config.deflate_level),
            );
            enc.write_all(data)?;
            enc.finish()
        }
        Encoding::Brotli => {
            let mut out = Vec::new();
            brotli::CompressorReader::new(data, 4096, config.brotli_level, 22)
                .read_to_end(&mut out)?;
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn req_with_body(body: Vec<u8>, content_type: &str) -> Request {
        Request::new(Method::POST, Url::parse("https://x/y").unwrap())
            .with_body(Body::bytes(body))
            .with_header("content-type", content_type)
    }

    #[test]
    fn compresses_large_compressible_bodies() {
        let body = vec![b'a'; 4096];
        let req = req_with_body(body, "text/plain");
        let config = CompressionConfig::default();
        let compressed = maybe_compress(req, &config);
        assert_eq!(
            compressed.headers.get("content-encoding").unwrap(),
            "gzip"
        );
        let Body::Bytes(out) = &compressed.body else {
            panic!("expected bytes body");
        };
        assert!(out.len() < 4096);
    }

    #[test]
    fn leaves_small_bodies_uncompressed() {
        let req = req_with_body(b"tiny".to_vec(), "text/plain");
        let config = CompressionConfig::default();
        let out = maybe_compress(req, &config);
        assert!(!out.headers.contains_key("content-encoding"));
    }

    #[test]
    fn leaves_non_compressible_content_types_alone() {
        let req = req_with_body(vec![0u8; 4096], "image/png");
        let config = CompressionConfig::default();
        let out = maybe_compress(req, &config);
        assert!(!out.headers.contains_key("content-encoding"));
    }

    #[test]
    fn respects_an_existing_content_encoding() {
        let req = req_with_body(vec![b'a'; 4096], "text/plain")
            .with_header("content-encoding", "identity");
        let config = CompressionConfig::default();
        let out = maybe_compress(req, &config);
        assert_eq!(out.headers.get("content-encoding").unwrap(), "identity");
    }
}
