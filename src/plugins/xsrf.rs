//! XSRF plugin (spec.md §4.11): copies a configured cookie's value into a
//! configured header on state-changing requests, the common
//! double-submit-cookie pattern (Angular/Axios call this `xsrfCookieName`/
//! `xsrfHeaderName`).

use std::sync::Arc;

use http::Method;

use crate::middleware::{BoxHandler, Handler, Middleware};
use crate::plugins::cookies::CookieJar;
use crate::request::Request;

#[derive(Clone)]
pub struct XsrfConfig {
    pub cookie_name: String,
    pub header_name: String,
    pub state_changing_methods: Vec<Method>,
}

impl Default for XsrfConfig {
    fn default() -> Self {
        XsrfConfig {
            cookie_name: "XSRF-TOKEN".to_owned(),
            header_name: "X-XSRF-TOKEN".to_owned(),
            state_changing_methods: vec![
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
            ],
        }
    }
}

pub struct XsrfMiddleware {
    config: XsrfConfig,
    jar: Arc<CookieJar>,
}

impl XsrfMiddleware {
    pub fn new(config: XsrfConfig, jar: Arc<CookieJar>) -> Self {
        XsrfMiddleware { config, jar }
    }
}

impl Middleware for XsrfMiddleware {
    fn wrap(&self, inner: BoxHandler) -> BoxHandler {
        let config = self.config.clone();
        let jar = Arc::clone(&self.jar);
        crate::middleware::fn_handler(move |req: Request| {
            if !config.state_changing_methods.contains(&req.method) {
                return inner.handle(req);
            }
            let mut req = req;
            if let Some(token) = jar.value_for(&req.url, &config.cookie_name) {
                req = req.with_header(&config.header_name, &token);
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
    use url::Url;

    #[test]
    fn copies_token_cookie_into_header_on_post() {
        let jar = Arc::new(CookieJar::new());
        jar.store_set_cookie("x", "XSRF-TOKEN=tok123", false).unwrap();
        let mw = XsrfMiddleware::new(XsrfConfig::default(), jar);
        let seen = Arc::new(std::sync::Mutex::new(None));
        let s = Arc::clone(&seen);
        let base = fn_handler(move |req: Request| {
            *s.lock().unwrap() = req.headers.get("x-xsrf-token").and_then(|v| v.to_str().ok().map(str::to_owned));
            Ok(Response::new(http::StatusCode::OK, http::HeaderMap::new(), Vec::new()))
        });
        let chain = compose(base, vec![Box::new(mw)]);
        let req = Request::new(Method::POST, Url::parse("https://x/y").unwrap());
        chain.handle(req).unwrap();
        assert_eq!(seen.lock().unwrap().as_deref(), Some("tok123"));
    }

    #[test]
    fn get_requests_are_left_untouched() {
        let jar = Arc::new(CookieJar::new());
        jar.store_set_cookie("x", "XSRF-TOKEN=tok123", false).unwrap();
        let mw = XsrfMiddleware::new(XsrfConfig::default(), jar);
        let base = fn_handler(move |req: Request| {
            assert!(!req.headers.contains_key("x-xsrf-token"));
            Ok(Response::new(http::StatusCode::OK, http::HeaderMap::new(), Vec::new()))
        });
        let chain = compose(base, vec![Box::new(mw)]);
        let req = Request::new(Method::GET, Url::parse("https://x/y").unwrap());
        chain.handle(req).unwrap();
    }
}
