//! # Integration tests for wayfarer
//!
//! Exercises the `Client` facade end-to-end — building a client, dispatching
//! requests, batching, and paginating — against an in-process HAR-backed
//! mock transport instead of a live remote API. These run on every
//! `cargo test` invocation since `wayfarer`'s transport seam is mockable
//! without a live account.
//!
//! ## Test scenarios
//!
//! - `full_request_lifecycle_with_retry_and_cache`: a client wired with
//!   retry, cache, and logging serves a GET through the full pipeline.
//! - `pagination_walks_every_page_until_exhausted`: `client.get_all` collects
//!   every item across a page-number-paginated recording.
//! - `batch_dispatches_every_item_and_preserves_order`: `client.batch` runs
//!   several requests concurrently and reports results in input order.

use wayfarer::client::{ClientBuilder, RequestOptions};
use wayfarer::pagination::{PageTarget, PaginationConfig, PaginationStrategy};
use wayfarer::plugins::cache::{CacheConfig, MemoryCache};
use wayfarer::plugins::har::HarPlayer;

fn har(entries: &str) -> HarPlayer {
    let doc = format!(r#"{{"log":{{"entries":[{entries}]}}}}"#);
    HarPlayer::load(&doc, true).unwrap()
}

#[test]
fn full_request_lifecycle_with_retry_and_cache() {
    let recording = r#"{
        "request": {"method": "GET", "url": "https://api.wayfarer.test/v1/widgets/1"},
        "response": {
            "status": 200,
            "headers": [{"name": "content-type", "value": "application/json"}],
            "content": {"text": "{\"id\":1,\"name\":\"sprocket\"}"}
        }
    }"#;
    let client = ClientBuilder::new(url::Url::parse("https://api.wayfarer.test/v1").unwrap())
        .debug(true)
        .cache(CacheConfig {
            storage: std::sync::Arc::new(MemoryCache::new()),
            ..CacheConfig::default()
        })
        .har(har(recording))
        .build()
        .unwrap();

    let res = client.get("/widgets/:id", RequestOptions::new().param("id", "1")).unwrap();
    assert!(res.is_success());
    let body: serde_json::Value = res.json().unwrap();
    assert_eq!(body["name"], "sprocket");
}

#[test]
fn pagination_walks_every_page_until_exhausted() {
    let recordings = r#"
        {"request": {"method": "GET", "url": "https://api.wayfarer.test/v1/items?page=1"},
         "response": {"status": 200, "headers": [], "content": {"text": "{\"items\":[1,2]}"}}},
        {"request": {"method": "GET", "url": "https://api.wayfarer.test/v1/items?page=2"},
         "response": {"status": 200, "headers": [], "content": {"text": "{\"items\":[3]}"}}},
        {"request": {"method": "GET", "url": "https://api.wayfarer.test/v1/items?page=3"},
         "response": {"status": 200, "headers": [], "content": {"text": "{\"items\":[]}"}}}
    "#;
    let client = ClientBuilder::new(url::Url::parse("https://api.wayfarer.test/v1").unwrap())
        .pagination(PaginationConfig {
            results_path: Some("items".to_owned()),
            ..PaginationConfig::default()
        })
        .har(har(recordings))
        .build()
        .unwrap();

    let items = client
        .get_all(
            "/items",
            RequestOptions::new(),
            PaginationStrategy::PageNumber,
            PageTarget::Number(1),
            Some(10),
        )
        .unwrap();
    assert_eq!(items, vec![
        serde_json::json!(1),
        serde_json::json!(2),
        serde_json::json!(3),
    ]);
}

#[test]
fn batch_dispatches_every_item_and_preserves_order() {
    let recordings = r#"
        {"request": {"method": "GET", "url": "https://api.wayfarer.test/v1/widgets/1"},
         "response": {"status": 200, "headers": [], "content": {"text": "one"}}},
        {"request": {"method": "GET", "url": "https://api.wayfarer.test/v1/widgets/2"},
         "response": {"status": 200, "headers": [], "content": {"text": "two"}}},
        {"request": {"method": "GET", "url": "https://api.wayfarer.test/v1/widgets/3"},
         "response": {"status": 200, "headers": [], "content": {"text": "three"}}}
    "#;
    let client = ClientBuilder::new(url::Url::parse("https://api.wayfarer.test/v1").unwrap())
        .har(har(recordings))
        .build()
        .unwrap();

    let ids: Vec<u32> = vec![1, 2, 3];
    let result = client.batch(
        ids,
        |id| (http::Method::GET, format!("/widgets/{id}"), RequestOptions::new()),
        |res| res.text().unwrap(),
    );
    assert_eq!(result.stats.total, 3);
    assert_eq!(result.stats.successful, 3);
    let texts: Vec<String> = result.results.into_iter().map(|r| r.unwrap()).collect();
    assert_eq!(texts, vec!["one", "two", "three"]);
}
