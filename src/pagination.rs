//! Pagination over a `Client` (spec.md §4.15): `paginate` yields items,
//! `pages` yields page envelopes, `page(n)` fetches one page directly.
//! Pull-based — built on [`Iterator`] rather than an async sequence, per the
//! synchronous design decision recorded in SPEC_FULL.md §10.1.

use serde_json::Value;
use url::Url;

use crate::error::WayfarerError;
use crate::response::Response;

/// Normalized `pagination{...}` client option (spec.md §6).
#[derive(Clone, Debug)]
pub struct PaginationConfig {
    pub page_param: String,
    pub limit_param: String,
    /// Dot-separated path to the items array within the parsed JSON body;
    /// `None` means the body itself is the array.
    pub results_path: Option<String>,
    /// Dot-separated path to the next-cursor value, used by the `Cursor`
    /// strategy.
    pub next_cursor_path: Option<String>,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        PaginationConfig {
            page_param: "page".into(),
            limit_param: "limit".into(),
            results_path: None,
            next_cursor_path: None,
        }
    }
}

/// How the next page is located (spec.md §4.15 "strategies").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaginationStrategy {
    /// `Link: <url>; rel="next"`, falling back to a `next` URL field in the
    /// parsed body.
    LinkOrNextUrl,
    /// A cursor value read from the body at `next_cursor_path` and passed
    /// back as a query parameter on the following request.
    Cursor,
    /// An incrementing `page_param` query parameter.
    PageNumber,
}

/// What the next fetch should target; built by [`Pages`] and interpreted by
/// the caller-supplied fetch closure (typically `Client::request` building a
/// request from the base path plus these overrides).
pub enum PageTarget {
    /// Page-number strategy: set `page_param=n`.
    Number(u64),
    /// Cursor strategy: set the cursor query parameter to this value (`None`
    /// on the first page).
    Cursor(Option<String>),
    /// Link/next-URL strategy: dispatch this absolute URL directly.
    Url(Url),
}

/// One fetched page: the raw response plus its extracted items.
pub struct PageEnvelope {
    pub response: Response,
    pub items: Vec<Value>,
}

type Fetch<'a> = Box<dyn FnMut(PageTarget) -> Result<Response, WayfarerError> + 'a>;

/// A pull-based iterator over page envelopes (`client.pages(...)`).
pub struct Pages<'a> {
    fetch: Fetch<'a>,
    config: PaginationConfig,
    strategy: PaginationStrategy,
    next: Option<PageTarget>,
    page_number: u64,
    pages_fetched: u32,
    max_pages: Option<u32>,
    done: bool,
}

impl<'a> Pages<'a> {
    /// `fetch` is called once per page with the target describing what to
    /// request; `start` is the first page's target (e.g. `PageTarget::Number(1)`
    /// for page-number pagination, `PageTarget::Cursor(None)` for cursor
    /// pagination, or `PageTarget::Url(base)` for link-following).
    pub fn new(
        fetch: Fetch<'a>,
        config: PaginationConfig,
        strategy: PaginationStrategy,
        start: PageTarget,
        max_pages: Option<u32>,
    ) -> Self {
        let page_number = match &start {
            PageTarget::Number(n) => *n,
            _ => 1,
        };
        Pages {
            fetch,
            config,
            strategy,
            next: Some(start),
            page_number,
            pages_fetched: 0,
            max_pages,
            done: false,
        }
    }
}

impl<'a> Iterator for Pages<'a> {
    type Item = Result<PageEnvelope, WayfarerError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(max) = self.max_pages {
            if self.pages_fetched >= max {
                self.done = true;
                return None;
            }
        }
        let target = self.next.take()?;
        let response = match (self.fetch)(target) {
            Ok(r) => r,
            Err(err) => {
                self.done = true;
                return Some(Err(err));
            }
        };
        self.pages_fetched += 1;

        let items = match extract_items(&response, self.config.results_path.as_deref()) {
            Ok(items) => items,
            Err(err) => {
                self.done = true;
                return Some(Err(err));
            }
        };
        if items.is_empty() {
            self.done = true;
            return Some(Ok(PageEnvelope { response, items }));
        }

        self.next = match self.strategy {
            PaginationStrategy::PageNumber => {
                self.page_number += 1;
                Some(PageTarget::Number(self.page_number))
            }
            PaginationStrategy::Cursor => {
                let body: Value = response.json().unwrap_or(Value::Null);
                let path = self.config.next_cursor_path.as_deref().unwrap_or("next");
                match json_path(&body, path) {
                    Some(Value::String(s)) => Some(PageTarget::Cursor(Some(s.clone()))),
                    _ => None,
                }
            }
            PaginationStrategy::LinkOrNextUrl => next_url_from(&response),
        };
        if self.next.is_none() {
            self.done = true;
        }
        Some(Ok(PageEnvelope { response, items }))
    }
}

/// `client.paginate(...)`: flattens [`Pages`] into a plain item iterator.
pub struct Paginate<'a> {
    pages: Pages<'a>,
    buffer: std::vec::IntoIter<Value>,
}

impl<'a> Paginate<'a> {
    pub fn new(pages: Pages<'a>) -> Self {
        Paginate {
            pages,
            buffer: Vec::new().into_iter(),
        }
    }
}

impl<'a> Iterator for Paginate<'a> {
    type Item = Result<Value, WayfarerError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.next() {
                return Some(Ok(item));
            }
            match self.pages.next()? {
                Ok(page) => self.buffer = page.items.into_iter(),
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

/// `client.getAll(...)`: eagerly collects `paginate` into a `Vec`, stopping
/// at the first error.
pub fn get_all(paginate: Paginate<'_>) -> Result<Vec<Value>, WayfarerError> {
    paginate.collect()
}

/// `client.page(n, ...)`: fetches exactly one page, independent of the
/// configured strategy — `page_param` is always a valid override regardless
/// of how sequential iteration locates its *next* page.
pub fn page_one(
    mut fetch: impl FnMut(PageTarget) -> Result<Response, WayfarerError>,
    config: &PaginationConfig,
    n: u64,
) -> Result<PageEnvelope, WayfarerError> {
    let response = fetch(PageTarget::Number(n))?;
    let items = extract_items(&response, config.results_path.as_deref())?;
    Ok(PageEnvelope { response, items })
}

fn extract_items(response: &Response, results_path: Option<&str>) -> Result<Vec<Value>, WayfarerError> {
    let body: Value = response.json()?;
    let target = match results_path {
        Some(path) => json_path(&body, path).cloned().unwrap_or(Value::Null),
        None => body,
    };
    match target {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        other => Ok(vec![other]),
    }
}

fn json_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |v, segment| v.get(segment))
}

/// Extracts the next-page target from a `Link: <url>; rel="next"` header,
/// falling back to a `next` field in the JSON body.
fn next_url_from(response: &Response) -> Option<PageTarget> {
    if let Some(link) = response.headers().get(http::header::LINK).and_then(|v| v.to_str().ok()) {
        if let Some(url) = parse_link_next(link) {
            return Some(PageTarget::Url(url));
        }
    }
    let body: Value = response.json().ok()?;
    match json_path(&body, "next") {
        Some(Value::String(s)) => Url::parse(s).ok().map(PageTarget::Url),
        _ => None,
    }
}

/// Parses the `rel="next"` entry out of an RFC 8288 `Link` header value:
/// `<https://x/y?page=2>; rel="next", <https://x/y?page=9>; rel="last"`.
fn parse_link_next(header: &str) -> Option<Url> {
    for entry in header.split(',') {
        let entry = entry.trim();
        let (url_part, rest) = entry.split_once('>')?;
        let url_part = url_part.trim_start_matches('<');
        if rest.contains("rel=\"next\"") || rest.contains("rel=next") {
            return Url::parse(url_part).ok();
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, StatusCode};

    fn json_response(body: &str) -> Response {
        Response::new(StatusCode::OK, HeaderMap::new(), body.as_bytes().to_vec())
    }

    #[test]
    fn page_number_strategy_increments_until_empty_page() {
        let mut call = 0u64;
        let fetch: Fetch<'_> = Box::new(move |_target| {
            call += 1;
            Ok(match call {
                1 => json_response(r#"{"items":[1,2]}"#),
                2 => json_response(r#"{"items":[3]}"#),
                _ => json_response(r#"{"items":[]}"#),
            })
        });
        let config = PaginationConfig {
            results_path: Some("items".into()),
            ..Default::default()
        };
        let pages = Pages::new(
            fetch,
            config,
            PaginationStrategy::PageNumber,
            PageTarget::Number(1),
            None,
        );
        let all: Vec<Value> = Paginate::new(pages).map(|r| r.unwrap()).collect();
        assert_eq!(all, vec![Value::from(1), Value::from(2), Value::from(3)]);
    }

    #[test]
    fn max_pages_stops_iteration_early() {
        let fetch: Fetch<'_> = Box::new(|_target| Ok(json_response(r#"{"items":[1]}"#)));
        let config = PaginationConfig {
            results_path: Some("items".into()),
            ..Default::default()
        };
        let pages = Pages::new(
            fetch,
            config,
            PaginationStrategy::PageNumber,
            PageTarget::Number(1),
            Some(3),
        );
        assert_eq!(pages.count(), 3);
    }

    #[test]
    fn cursor_strategy_follows_next_cursor_path_until_null() {
        let mut call = 0u64;
        let fetch: Fetch<'_> = Box::new(move |_target| {
            call += 1;
            Ok(match call {
                1 => json_response(r#"{"items":[1],"cursor":{"next":"abc"}}"#),
                2 => json_response(r#"{"items":[2],"cursor":{"next":null}}"#),
                _ => panic!("should not fetch a third page"),
            })
        });
        let config = PaginationConfig {
            results_path: Some("items".into()),
            next_cursor_path: Some("cursor.next".into()),
            ..Default::default()
        };
        let pages = Pages::new(
            fetch,
            config,
            PaginationStrategy::Cursor,
            PageTarget::Cursor(None),
            None,
        );
        assert_eq!(pages.count(), 2);
    }

    #[test]
    fn link_header_next_url_is_followed() {
        let mut call = 0u64;
        let fetch: Fetch<'_> = Box::new(move |_target| {
            call += 1;
            let mut headers = HeaderMap::new();
            if call == 1 {
                headers.insert(
                    http::header::LINK,
                    "<https://x.test/items?page=2>; rel=\"next\"".parse().unwrap(),
                );
            }
            Ok(Response::new(
                StatusCode::OK,
                headers,
                br#"{"items":[1]}"#.to_vec(),
            ))
        });
        let config = PaginationConfig {
            results_path: Some("items".into()),
            ..Default::default()
        };
        let pages = Pages::new(
            fetch,
            config,
            PaginationStrategy::LinkOrNextUrl,
            PageTarget::Url(Url::parse("https://x.test/items?page=1").unwrap()),
            None,
        );
        assert_eq!(pages.count(), 2);
    }

    #[test]
    fn parses_rel_next_among_multiple_link_entries() {
        let header =
            r#"<https://x/y?page=2>; rel="next", <https://x/y?page=9>; rel="last""#;
        assert_eq!(
            parse_link_next(header),
            Some(Url::parse("https://x/y?page=2").unwrap())
        );
    }

    #[test]
    fn page_one_fetches_a_specific_page_directly() {
        let fetch = |target: PageTarget| {
            let PageTarget::Number(n) = target else {
                panic!("expected number target")
            };
            Ok(json_response(&format!(r#"{{"items":[{n}]}}"#)))
        };
        let config = PaginationConfig {
            results_path: Some("items".into()),
            ..Default::default()
        };
        let page = page_one(fetch, &config, 7).unwrap();
        assert_eq!(page.items, vec![Value::from(7)]);
    }
}
