//! Cookie jar plugin (spec.md §4.9). Before `next`: matches stored cookies
//! by domain/path/secure and merges them into the outgoing `Cookie` header.
//! After `next`: parses `Set-Cookie`, splitting a comma-joined header only
//! on commas that precede what looks like the next cookie's `name=`
//! (`Expires` dates embed commas of their own), and stores each cookie
//! subject to validation.
//!
//! Parsing itself rides the `cookie` crate (already in the dependency
//! table); this module owns only the storage/matching policy, which the
//! crate doesn't provide an off-the-shelf client-side jar for.

use std::collections::HashMap;
use std::sync::Mutex;

use cookie::{Cookie as ParsedCookie, Expiration, SameSite};
use url::Url;

use crate::error::WayfarerError;
use crate::middleware::{BoxHandler, Handler, Middleware};
use crate::request::Request;

#[derive(Debug, Clone)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub expires_at: Option<i64>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
}

impl StoredCookie {
    fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|t| t <= now)
    }
}

#[derive(Default)]
pub struct CookieJar {
    entries: Mutex<HashMap<(String, String, String), StoredCookie>>,
}

impl CookieJar {
    pub fn new() -> Self {
        CookieJar::default()
    }

    /// Stores every cookie parsed out of one `Set-Cookie` header value
    /// (possibly holding several comma-joined cookies). Invalid cookies are
    /// dropped when `ignore_invalid` is set, else the first failure is
    /// returned.
    pub fn store_set_cookie(
        &self,
        origin_host: &str,
        raw_header: &str,
        ignore_invalid: bool,
    ) -> Result<(), WayfarerError> {
        for raw in split_set_cookie_values(raw_header) {
            match ParsedCookie::parse(raw.clone()) {
                Ok(parsed) => self.store_one(origin_host, &parsed),
                Err(e) if ignore_invalid => {
                    log::debug!(target: "wayfarer", "ignoring invalid Set-Cookie {raw:?}: {e}");
                }
                Err(e) => {
                    return Err(WayfarerError::Plugin(format!(
                        "invalid Set-Cookie header {raw:?}: {e}"
                    )));
                }
            }
        }
        Ok(())
    }

    fn store_one(&self, origin_host: &str, parsed: &ParsedCookie<'_>) {
        let domain = parsed
            .domain()
            .map(|d| d.trim_start_matches('.').to_ascii_lowercase())
            .unwrap_or_else(|| origin_host.to_ascii_lowercase());
        let path = parsed.path().unwrap_or("/").to_owned();
        let expires_at = match parsed.expires() {
            Some(Expiration::DateTime(dt)) => Some(dt.unix_timestamp()),
            Some(Expiration::Session) | None => None,
        };
        let key = (domain.clone(), path.clone(), parsed.name().to_owned());
        let mut guard = self.entries.lock().unwrap();
        if expires_at.is_some_and(|t| t <= cookie::time::OffsetDateTime::now_utc().unix_timestamp())
        {
            guard.remove(&key);
            return;
        }
        guard.insert(
            key,
            StoredCookie {
                name: parsed.name().to_owned(),
                value: parsed.value().to_owned(),
                domain,
                path,
                expires_at,
                secure: parsed.secure().unwrap_or(false),
                http_only: parsed.http_only().unwrap_or(false),
                same_site: parsed.same_site(),
            },
        );
    }

    /// The `Cookie:` header value for `url`, or `None` if nothing matches.
    pub fn header_value_for(&self, url: &Url) -> Option<String> {
        let host = url.host_str()?.to_ascii_lowercase();
        let path = url.path();
        let secure = url.scheme() == "https";
        let now = cookie::time::OffsetDateTime::now_utc().unix_timestamp();
        let guard = self.entries.lock().unwrap();
        let mut matches: Vec<&StoredCookie> = guard
            .values()
            .filter(|c| !c.is_expired(now))
            .filter(|c| domain_matches(&host, &c.domain))
            .filter(|c| path_matches(path, &c.path))
            .filter(|c| !c.secure || secure)
            .collect();
        if matches.is_empty() {
            return None;
        }
        // Longest path first, per RFC 6265 §5.4.
        matches.sort_by(|a, b| b.path.len().cmp(&a.path.len()));
        Some(
            matches
                .iter()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Looks up a single cookie's value by exact name, for any domain/path
    /// matching `url` — used by the XSRF plugin to copy a token cookie into
    /// a header.
    pub fn value_for(&self, url: &Url, name: &str) -> Option<String> {
        let host = url.host_str()?.to_ascii_lowercase();
        let path = url.path();
        let now = cookie::time::OffsetDateTime::now_utc().unix_timestamp();
        self.entries
            .lock()
            .unwrap()
            .values()
            .find(|c| {
                c.name == name
                    && !c.is_expired(now)
                    && domain_matches(&host, &c.domain)
                    && path_matches(path, &c.path)
            })
            .map(|c| c.value.clone())
    }
}

fn domain_matches(host: &str, cookie_domain: &str) -> bool {
    host == cookie_domain || host.ends_with(&format!(".{cookie_domain}"))
}

fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    if cookie_path == "/" || request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/') || request_path[cookie_path.len()..].starts_with('/'))
}

/// Splits a comma-joined `Set-Cookie` header into individual cookie strings.
/// A comma only separates cookies when followed by what looks like the next
/// cookie's `name=` — plain commas inside `Expires=Wed, 09 Jun ...` fail
/// that lookahead and are kept inline.
fn split_set_cookie_values(raw: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut start = 0;
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b',' {
            let mut j = i + 1;
            while j < bytes.len() && bytes[j] == b' ' {
                j += 1;
            }
            if starts_with_cookie_name(&raw[j..]) {
                parts.push(raw[start..i].trim().to_owned());
                start = j;
                i = j;
                continue;
            }
        }
        i += 1;
    }
    let tail = raw[start..].trim();
    if !tail.is_empty() {
        parts.push(tail.to_owned());
    }
    parts
}

fn starts_with_cookie_name(s: &str) -> bool {
    let mut saw_token_char = false;
    for c in s.chars() {
        if c == '=' {
            return saw_token_char;
        }
        if c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c) {
            saw_token_char = true;
        } else {
            return false;
        }
    }
    false
}

pub struct CookieMiddleware {
    jar: std::sync::Arc<CookieJar>,
    ignore_invalid: bool,
}

impl CookieMiddleware {
    pub fn new(jar: std::sync::Arc<CookieJar>, ignore_invalid: bool) -> Self {
        CookieMiddleware { jar, ignore_invalid }
    }
}

impl Middleware for CookieMiddleware {
    fn wrap(&self, inner: BoxHandler) -> BoxHandler {
        let jar = std::sync::Arc::clone(&self.jar);
        let ignore_invalid = self.ignore_invalid;
        crate::middleware::fn_handler(move |req: Request| {
            let mut req = req;
            if let Some(header) = jar.header_value_for(&req.url) {
                req = req.with_header("cookie", &header);
            }
            let host = req.url.host_str().map(str::to_owned);
            let res = inner.handle(req)?;
            if let Some(host) = host {
                for raw in res.headers().get_all(http::header::SET_COOKIE) {
                    if let Ok(raw) = raw.to_str() {
                        jar.store_set_cookie(&host, raw, ignore_invalid)?;
                    }
                }
            }
            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_comma_joined_set_cookie_but_not_inside_expires() {
        let raw = "a=1; Expires=Wed, 09 Jun 2027 10:18:14 GMT, b=2";
        let parts = split_set_cookie_values(raw);
        assert_eq!(parts.len(), 2);
        assert!(parts[0].starts_with("a=1"));
        assert!(parts[1].starts_with("b=2"));
    }

    #[test]
    fn stores_and_matches_by_domain_and_path() {
        let jar = CookieJar::new();
        jar.store_set_cookie("example.com", "sid=abc; Path=/app", false)
            .unwrap();
        let url = Url::parse("https://example.com/app/page").unwrap();
        assert_eq!(jar.header_value_for(&url), Some("sid=abc".to_owned()));
        let other = Url::parse("https://example.com/other").unwrap();
        assert_eq!(jar.header_value_for(&other), None);
    }

    #[test]
    fn secure_cookie_is_withheld_from_plain_http() {
        let jar = CookieJar::new();
        jar.store_set_cookie("example.com", "sid=abc; Secure", false)
            .unwrap();
        let https = Url::parse("https://example.com/").unwrap();
        let http = Url::parse("http://example.com/").unwrap();
        assert_eq!(jar.header_value_for(&https), Some("sid=abc".to_owned()));
        assert_eq!(jar.header_value_for(&http), None);
    }

    #[test]
    fn invalid_cookie_is_ignored_when_configured() {
        let jar = CookieJar::new();
        assert!(jar.store_set_cookie("example.com", "", true).is_ok());
    }
}
