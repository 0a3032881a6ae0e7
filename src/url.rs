//! URL construction: base + path join, `:name` path-parameter substitution,
//! and query-parameter canonicalization (spec.md §4.16, §9 cache-key note).

use std::collections::BTreeMap;

use url::Url;

use crate::error::WayfarerError;

/// Builds the final request URL from a client's `base_url`, a caller-given
/// `path`, path parameters, and query parameters.
///
/// Fast path: if `path` contains no `:name` segments, it is resolved against
/// `base` by plain joining and `query` is appended. Slow path: `:name`
/// segments are substituted from `params` (falling back to client-level
/// defaults supplied by the caller before calling this function); any
/// `params` entries *not* consumed as path segments are appended as query
/// parameters, per spec.md §4.16.
pub fn build_url(
    base: &Url,
    path: &str,
    params: &BTreeMap<String, String>,
    query: &[(String, String)],
) -> Result<Url, WayfarerError> {
    let has_path_params = path.split('/').any(|seg| seg.starts_with(':'));

    let mut consumed: Vec<&str> = Vec::new();
    let resolved_path = if has_path_params {
        let mut out = String::new();
        for (i, seg) in path.split('/').enumerate() {
            if i > 0 {
                out.push('/');
            }
            if let Some(name) = seg.strip_prefix(':') {
                let value = params
                    .get(name)
                    .ok_or_else(|| WayfarerError::validation("params", name.to_owned()))?;
                out.push_str(value);
                consumed.push(name);
            } else {
                out.push_str(seg);
            }
        }
        out
    } else {
        path.to_owned()
    };

    let mut url = join(base, &resolved_path)?;

    {
        let mut pairs = url.query_pairs_mut();
        for (k, v) in query {
            pairs.append_pair(k, v);
        }
        for (k, v) in params {
            if !consumed.contains(&k.as_str()) {
                pairs.append_pair(k, v);
            }
        }
    }
    strip_trailing_bare_query(&mut url);
    Ok(url)
}

fn join(base: &Url, path: &str) -> Result<Url, WayfarerError> {
    if let Ok(absolute) = Url::parse(path) {
        return Ok(absolute);
    }
    let mut base = base.clone();
    let trimmed = path.trim_start_matches('/');
    let base_path = base.path().trim_end_matches('/').to_owned();
    base.set_path(&format!("{base_path}/{trimmed}"));
    Ok(base)
}

fn strip_trailing_bare_query(url: &mut Url) {
    if url.query() == Some("") {
        url.set_query(None);
    }
}

/// Canonicalizes a URL's query string by sorting parameter keys, so that
/// `?b=2&a=1` and `?a=1&b=2` produce the same cache key (spec.md §9 open
/// question, resolved in favor of sorted-key canonicalization).
pub fn canonical_query(url: &Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// The `scheme://host:port` portion of a URL, used as an [`crate::agent::AgentKey`]
/// when per-domain pooling is enabled.
pub fn origin(url: &Url) -> String {
    let scheme = url.scheme();
    let host = url.host_str().unwrap_or_default();
    match url.port_or_known_default() {
        Some(port) => format!("{scheme}://{host}:{port}"),
        None => format!("{scheme}://{host}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://api.example.com/v1").unwrap()
    }

    #[test]
    fn fast_path_concatenates_path_and_query() {
        let url = build_url(&base(), "/users", &BTreeMap::new(), &[("q".into(), "1".into())])
            .unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/users?q=1");
    }

    #[test]
    fn substitutes_path_parameters_and_appends_remainder_as_query() {
        let mut params = BTreeMap::new();
        params.insert("id".to_owned(), "42".to_owned());
        params.insert("expand".to_owned(), "owner".to_owned());
        let url = build_url(&base(), "/users/:id", &params, &[]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/v1/users/42?expand=owner"
        );
    }

    #[test]
    fn missing_path_parameter_is_a_validation_error() {
        let err = build_url(&base(), "/users/:id", &BTreeMap::new(), &[]).unwrap_err();
        assert!(matches!(err, WayfarerError::Validation { .. }));
    }

    #[test]
    fn canonical_query_sorts_keys() {
        let a = Url::parse("https://x/y?b=2&a=1").unwrap();
        let b = Url::parse("https://x/y?a=1&b=2").unwrap();
        assert_eq!(canonical_query(&a), canonical_query(&b));
    }

    #[test]
    fn origin_includes_default_port() {
        let url = Url::parse("https://example.com/a").unwrap();
        assert_eq!(origin(&url), "https://example.com:443");
    }
}
