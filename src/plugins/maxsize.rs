//! Max-size guard (spec.md §4.12). The transport already enforces
//! `Request::max_response_size` against `Content-Length` and, for chunked
//! bodies, a running tally (`transport::enforce_content_length_limit`,
//! `transport::read_body_with_limits`). This plugin's only job is to supply
//! a client-wide default when a request doesn't carry a per-request
//! override, so the enforcement point stays singular.

use crate::middleware::{BoxHandler, Handler, Middleware};
use crate::request::Request;

#[derive(Clone, Copy, Default)]
pub struct MaxSizeConfig {
    pub default_limit: Option<u64>,
}

pub struct MaxSizeMiddleware {
    config: MaxSizeConfig,
}

impl MaxSizeMiddleware {
    pub fn new(config: MaxSizeConfig) -> Self {
        MaxSizeMiddleware { config }
    }
}

impl Middleware for MaxSizeMiddleware {
    fn wrap(&self, inner: BoxHandler) -> BoxHandler {
        let config = self.config;
        crate::middleware::fn_handler(move |req: Request| {
            let mut req = req;
            if req.max_response_size.is_none() {
                req.max_response_size = config.default_limit;
            }
            inner.handle(req)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{compose, fn_handler};
    use crate::response::Response;
    use http::Method;
    use url::Url;

    #[test]
    fn fills_in_the_client_default_when_unset() {
        let mw = MaxSizeMiddleware::new(MaxSizeConfig {
            default_limit: Some(1024),
        });
        let base = fn_handler(|req: Request| {
            assert_eq!(req.max_response_size, Some(1024));
            Ok(Response::new(http::StatusCode::OK, http::HeaderMap::new(), Vec::new()))
        });
        let chain = compose(base, vec![Box::new(mw)]);
        let req = Request::new(Method::GET, Url::parse("https://x/y").unwrap());
        chain.handle(req).unwrap();
    }

    #[test]
    fn a_per_request_override_is_left_untouched() {
        let mw = MaxSizeMiddleware::new(MaxSizeConfig {
            default_limit: Some(1024),
        });
        let base = fn_handler(|req: Request| {
            assert_eq!(req.max_response_size, Some(16));
            Ok(Response::new(http::StatusCode::OK, http::HeaderMap::new(), Vec::new()))
        });
        let chain = compose(base, vec![Box::new(mw)]);
        let mut req = Request::new(Method::GET, Url::parse("https://x/y").unwrap());
        req.max_response_size = Some(16);
        chain.handle(req).unwrap();
    }
}
