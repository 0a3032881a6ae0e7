//! The client facade (spec.md §4.16): builds the fixed middleware pipeline
//! once at construction time and exposes the external request surface —
//! method helpers, batch dispatch, pagination, and hook/plugin registration.
//!
//! A consuming builder assembles a layered handler once; thin per-operation
//! methods then all funnel through one dispatch path.

use std::collections::BTreeMap;
use std::sync::Arc;

use http::{HeaderMap, HeaderValue, Method};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::agent::{AgentConfig, AgentManager, ProxyConfig};
use crate::body::Body;
use crate::cancel::CancelToken;
use crate::error::{HttpError, WayfarerError};
use crate::hooks::{
    AfterResponseHook, BeforeRequestHook, HookSet, OnErrorHook, OnHttp3Hook, OnRetryHook,
    OnUrlResolvedHook, hook_middleware,
};
use crate::logger::{Field, LogFacadeLogger, Logger, NullLogger};
use crate::middleware::{BoxHandler, Handler, Middleware, compose, fn_handler};
use crate::pagination::{self, PageEnvelope, PageTarget, Pages, Paginate, PaginationConfig, PaginationStrategy};
use crate::plugins::cache::{CacheConfig, CacheMiddleware};
use crate::plugins::compression::{CompressionConfig, CompressionMiddleware};
use crate::plugins::cookies::{CookieJar, CookieMiddleware};
use crate::plugins::dedup::{DedupConfig, DedupMiddleware};
use crate::plugins::har::HarPlayer;
use crate::plugins::http3::{Http3Manager, Http3Middleware};
use crate::plugins::maxsize::{MaxSizeConfig, MaxSizeMiddleware};
use crate::plugins::retry::{RetryConfig, RetryMiddleware};
use crate::plugins::xsrf::{XsrfConfig, XsrfMiddleware};
use crate::pool::{ConcurrencyLimits, system_pool};
use crate::request::{BeforeRedirectCallback, ProgressCallback, Request as WfRequest, Timeout};
use crate::response::Response;
use crate::runner::{BatchResult, RequestRunner, RunnerConfig};
use crate::transport::UreqTransport;
use crate::url::build_url;

/// The request-body value actually sent, and the `Content-Type` that goes
/// with it (unless the caller already set one): `form > json > xml >`
/// explicit `body` (spec.md §4.16).
fn resolve_body(
    body: Option<Body>,
    json: Option<Value>,
    form: Option<Vec<(String, String)>>,
    xml: Option<String>,
) -> Result<(Body, Option<&'static str>), WayfarerError> {
    if let Some(pairs) = form {
        let encoded = crate::body::form_urlencode(&pairs);
        return Ok((Body::bytes(encoded), Some("application/x-www-form-urlencoded")));
    }
    if let Some(value) = json {
        let bytes = serde_json::to_vec(&value)?;
        return Ok((Body::bytes(bytes), Some("application/json")));
    }
    if let Some(xml) = xml {
        return Ok((Body::text(xml), Some("application/xml")));
    }
    Ok((body.unwrap_or(Body::None), None))
}

/// Per-request overrides layered on top of a `Client`'s defaults
/// (spec.md §6 per-request options).
#[derive(Default)]
pub struct RequestOptions {
    pub headers: HeaderMap,
    pub params: BTreeMap<String, String>,
    pub query: Vec<(String, String)>,
    pub body: Option<Body>,
    pub json: Option<Value>,
    pub form: Option<Vec<(String, String)>>,
    pub xml: Option<String>,
    pub timeout: Timeout,
    pub cancel: Option<CancelToken>,
    pub follow_redirects: Option<bool>,
    pub max_redirects: Option<u32>,
    pub before_redirect: Option<BeforeRedirectCallback>,
    pub http2: Option<bool>,
    pub on_upload_progress: Option<ProgressCallback>,
    pub on_download_progress: Option<ProgressCallback>,
    pub throw_on_http_error: Option<bool>,
    pub max_response_size: Option<u64>,
}

impl RequestOptions {
    pub fn new() -> Self {
        RequestOptions::default()
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            http::HeaderName::try_from(name),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, value: impl Serialize) -> Result<Self, WayfarerError> {
        self.json = Some(serde_json::to_value(value)?);
        Ok(self)
    }

    pub fn form(mut self, pairs: Vec<(String, String)>) -> Self {
        self.form = Some(pairs);
        self
    }

    pub fn xml(mut self, body: impl Into<String>) -> Self {
        self.xml = Some(body.into());
        self
    }

    pub fn body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    /// Serializes `form` once and installs its boundary-bearing
    /// `Content-Type` (spec.md §4.2.3). Takes precedence the same way an
    /// explicit `body()` does: [`resolve_body`] only reaches `body` when
    /// `form`/`json`/`xml` are all unset, and this sets exactly those two.
    pub fn multipart(mut self, form: crate::body::MultipartForm) -> Self {
        let (content_type, body) = form.finish();
        self.body = Some(body);
        self = self.header("Content-Type", &content_type);
        self
    }

    pub fn timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn follow_redirects(mut self, v: bool) -> Self {
        self.follow_redirects = Some(v);
        self
    }

    pub fn max_redirects(mut self, n: u32) -> Self {
        self.max_redirects = Some(n);
        self
    }

    pub fn throw_on_http_error(mut self, v: bool) -> Self {
        self.throw_on_http_error = Some(v);
        self
    }

    pub fn max_response_size(mut self, n: u64) -> Self {
        self.max_response_size = Some(n);
        self
    }

    /// A fresh options value carrying only headers/params/query, for a
    /// pagination fetch closure that runs more than once from a single
    /// `RequestOptions` the caller supplied up front.
    fn clone_shared(&self) -> RequestOptions {
        RequestOptions {
            headers: self.headers.clone(),
            params: self.params.clone(),
            query: self.query.clone(),
            ..RequestOptions::default()
        }
    }
}

/// Whether cookie storage/attachment is turned on, independent of whether an
/// XSRF token copy is also configured (a jar is created for either need).
#[derive(Clone, Copy, Debug, Default)]
pub struct CookiesConfig {
    pub enabled: bool,
    pub ignore_invalid: bool,
}

/// A private logging stage, spliced outermost in the fixed pipeline
/// (`middleware.rs`'s module docs). Routes through this crate's own
/// [`Logger`] contract rather than printing directly, so the same
/// `debug`/custom-`logger` configuration that governs every other log line
/// also governs this one.
struct LoggingMiddleware {
    logger: Arc<dyn Logger>,
}

impl Middleware for LoggingMiddleware {
    fn wrap(&self, inner: BoxHandler) -> BoxHandler {
        let logger = Arc::clone(&self.logger);
        fn_handler(move |req: WfRequest| {
            logger.debug(
                &[
                    Field::new("method", req.method.as_str()),
                    Field::new("url", req.url.as_str()),
                ],
                "request",
            );
            let result = inner.handle(req);
            match &result {
                Ok(res) => logger.debug(&[Field::new("status", res.status().as_u16())], "response"),
                Err(err) => logger.warn(&[], &err.to_string()),
            }
            result
        })
    }
}

/// The HTTP-error-raiser (spec.md §4.2.5/§7): the pipeline's innermost
/// stage before the transport. Turns a 4xx/5xx final response into
/// `WayfarerError::Http` when `throw_on_http_error` is set. Sits after
/// redirects are resolved, so a 3xx that ran out of `max_redirects` is
/// never raised here (spec.md §9: "3xx followed is never treated as an
/// error"), and 304 is never a client/server error status either.
struct HttpErrorMiddleware;

impl Middleware for HttpErrorMiddleware {
    fn wrap(&self, inner: BoxHandler) -> BoxHandler {
        fn_handler(move |req: WfRequest| {
            let method = req.method.clone();
            let url = req.url.to_string();
            let throw = req.throw_on_http_error;
            let res = inner.handle(req)?;
            if throw && res.is_client_or_server_error() {
                return Err(WayfarerError::Http(HttpError {
                    method,
                    url,
                    response: res,
                }));
            }
            Ok(res)
        })
    }
}

/// Construction-time configuration (spec.md §6 client-construction
/// options), assembled via a consuming builder.
pub struct ClientBuilder {
    base_url: Url,
    headers: HeaderMap,
    default_params: BTreeMap<String, String>,
    pagination: PaginationConfig,
    concurrency: ConcurrencyLimits,
    agent: AgentConfig,
    compression: Option<CompressionConfig>,
    xsrf: Option<XsrfConfig>,
    cookies: CookiesConfig,
    max_response_size: Option<u64>,
    debug: bool,
    logger: Option<Arc<dyn Logger>>,
    plugins: Vec<Box<dyn Middleware>>,
    retry: Option<RetryConfig>,
    cache: Option<CacheConfig>,
    dedup: Option<DedupConfig>,
    http3: bool,
    har: Option<HarPlayer>,
    observability: bool,
    hooks: HookSet,
    runner: RunnerConfig,
}

impl ClientBuilder {
    pub fn new(base_url: Url) -> Self {
        ClientBuilder {
            base_url,
            headers: HeaderMap::new(),
            default_params: BTreeMap::new(),
            pagination: PaginationConfig::default(),
            concurrency: ConcurrencyLimits::default(),
            agent: AgentConfig::default(),
            compression: None,
            xsrf: None,
            cookies: CookiesConfig::default(),
            max_response_size: None,
            debug: false,
            logger: None,
            plugins: Vec::new(),
            retry: None,
            cache: None,
            dedup: None,
            http3: false,
            har: None,
            observability: false,
            hooks: HookSet::default(),
            runner: RunnerConfig::default(),
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            http::HeaderName::try_from(name),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// Installs a default `Authorization: Basic ...` header.
    pub fn basic_auth(self, username: &str, password: &str) -> Self {
        use base64::Engine;
        let token = base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
        self.header("Authorization", &format!("Basic {token}"))
    }

    pub fn default_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_params.insert(key.into(), value.into());
        self
    }

    pub fn pagination(mut self, config: PaginationConfig) -> Self {
        self.pagination = config;
        self
    }

    pub fn concurrency(mut self, limits: ConcurrencyLimits) -> Self {
        self.concurrency = limits;
        self
    }

    pub fn agent(mut self, config: AgentConfig) -> Self {
        self.agent = config;
        self
    }

    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.agent.proxy = Some(proxy);
        self
    }

    pub fn compression(mut self, config: CompressionConfig) -> Self {
        self.compression = Some(config);
        self
    }

    pub fn xsrf(mut self, config: XsrfConfig) -> Self {
        self.xsrf = Some(config);
        self
    }

    pub fn cookies(mut self, enabled: bool, ignore_invalid: bool) -> Self {
        self.cookies = CookiesConfig {
            enabled,
            ignore_invalid,
        };
        self
    }

    pub fn max_response_size(mut self, n: u64) -> Self {
        self.max_response_size = Some(n);
        self
    }

    pub fn debug(mut self, on: bool) -> Self {
        self.debug = on;
        self
    }

    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Registers a user plugin. Installed between the built-in cache stage
    /// and the built-in compression stage, in registration order (spec.md
    /// §4.1's fixed ordering: `... cache -> user-added -> compression ...`).
    pub fn use_middleware(mut self, middleware: impl Middleware) -> Self {
        self.plugins.push(Box::new(middleware));
        self
    }

    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = Some(config);
        self
    }

    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache = Some(config);
        self
    }

    pub fn dedup(mut self, config: DedupConfig) -> Self {
        self.dedup = Some(config);
        self
    }

    pub fn http3(mut self, on: bool) -> Self {
        self.http3 = on;
        self
    }

    pub fn har(mut self, player: HarPlayer) -> Self {
        self.har = Some(player);
        self
    }

    pub fn observability(mut self, on: bool) -> Self {
        self.observability = on;
        self
    }

    pub fn before_request(mut self, hook: BeforeRequestHook) -> Self {
        self.hooks.before_request.push(hook);
        self
    }

    pub fn after_response(mut self, hook: AfterResponseHook) -> Self {
        self.hooks.after_response.push(hook);
        self
    }

    pub fn on_error(mut self, hook: OnErrorHook) -> Self {
        self.hooks.on_error.push(hook);
        self
    }

    pub fn on_retry(mut self, hook: OnRetryHook) -> Self {
        self.hooks.on_retry.push(hook);
        self
    }

    pub fn on_url_resolved(mut self, hook: OnUrlResolvedHook) -> Self {
        self.hooks.on_url_resolved.push(hook);
        self
    }

    /// Registers a callback fired by the HTTP/3 discovery plugin with each
    /// `http3Discovered`/`http3Unsupported` event (spec.md §4.14). Only
    /// takes effect when `.http3(true)` is also set.
    pub fn on_http3(mut self, hook: OnHttp3Hook) -> Self {
        self.hooks.on_http3.push(hook);
        self
    }

    pub fn runner(mut self, config: RunnerConfig) -> Self {
        self.runner = config;
        self
    }

    /// Assembles the fixed pipeline and returns a ready-to-use [`Client`].
    /// Composition happens exactly once here, matching `middleware.rs`'s
    /// module docs ("Composition happens once, at `ClientBuilder::build`
    /// time").
    pub fn build(self) -> Result<Client, WayfarerError> {
        if let Some(proxy) = &self.agent.proxy {
            if proxy.url.scheme().starts_with("socks") {
                return Err(WayfarerError::Config(format!(
                    "SOCKS proxies are not supported: {}",
                    proxy.url
                )));
            }
        }

        let logger: Arc<dyn Logger> = self.logger.clone().unwrap_or_else(|| {
            if self.debug {
                Arc::new(LogFacadeLogger::default())
            } else {
                Arc::new(NullLogger)
            }
        });

        let needs_jar = self.cookies.enabled || self.xsrf.is_some();
        let jar = needs_jar.then(|| Arc::new(CookieJar::new()));

        let on_retry_hooks = self.hooks.on_retry.clone();
        let on_url_resolved = self.hooks.on_url_resolved.clone();
        let on_http3_hooks = self.hooks.on_http3.clone();

        let mut middlewares: Vec<Box<dyn Middleware>> = Vec::new();

        if let Some(hook_mw) = hook_middleware(self.hooks) {
            middlewares.push(hook_mw);
        }
        middlewares.push(Box::new(LoggingMiddleware {
            logger: Arc::clone(&logger),
        }));
        if let Some(pool) = system_pool(self.concurrency.clone()) {
            middlewares.push(Box::new(pool));
        }
        if let Some(retry_cfg) = self.retry {
            middlewares.push(Box::new(RetryMiddleware::new(retry_cfg, on_retry_hooks)));
        }
        if let Some(dedup_cfg) = self.dedup {
            middlewares.push(Box::new(DedupMiddleware::new(dedup_cfg)));
        }
        if let Some(cache_cfg) = self.cache {
            middlewares.push(Box::new(CacheMiddleware::new(cache_cfg)));
        }
        middlewares.extend(self.plugins);
        if self.http3 {
            middlewares.push(Box::new(Http3Middleware::with_hooks(
                Http3Manager::new(),
                on_http3_hooks,
            )));
        }
        if let Some(compression_cfg) = self.compression {
            middlewares.push(Box::new(CompressionMiddleware::new(compression_cfg)));
        }
        if let Some(xsrf_cfg) = self.xsrf {
            let jar = jar.clone().expect("xsrf configuration implies a cookie jar");
            middlewares.push(Box::new(XsrfMiddleware::new(xsrf_cfg, jar)));
        }
        if self.cookies.enabled {
            let jar = jar.clone().expect("cookies.enabled implies a cookie jar");
            middlewares.push(Box::new(CookieMiddleware::new(jar, self.cookies.ignore_invalid)));
        }
        middlewares.push(Box::new(MaxSizeMiddleware::new(MaxSizeConfig {
            default_limit: self.max_response_size,
        })));
        if let Some(har) = self.har {
            middlewares.push(Box::new(har));
        }
        middlewares.push(Box::new(HttpErrorMiddleware));

        let agent_manager = AgentManager::new(self.agent, self.concurrency.max_in_flight);
        let transport: BoxHandler = Box::new(UreqTransport::new(agent_manager, self.observability));
        let handler = compose(transport, middlewares);

        Ok(Client {
            base_url: self.base_url,
            default_headers: self.headers,
            default_params: self.default_params,
            handler,
            pagination: self.pagination,
            runner: RequestRunner::new(self.runner),
            on_url_resolved,
        })
    }
}

/// The composed client (spec.md §4.16). Every method funnels through
/// [`Client::dispatch`], which is the single place a [`WfRequest`] is built
/// and handed to the pipeline.
pub struct Client {
    base_url: Url,
    default_headers: HeaderMap,
    default_params: BTreeMap<String, String>,
    handler: BoxHandler,
    pagination: PaginationConfig,
    runner: RequestRunner,
    on_url_resolved: Vec<OnUrlResolvedHook>,
}

impl Client {
    fn dispatch(&self, method: Method, url: Url, options: RequestOptions) -> Result<Response, WayfarerError> {
        for hook in &self.on_url_resolved {
            hook(&url);
        }

        let mut req = WfRequest::new(method, url);
        for (name, value) in self.default_headers.iter() {
            req.headers.append(name.clone(), value.clone());
        }
        for (name, value) in options.headers.iter() {
            req.headers.append(name.clone(), value.clone());
        }

        let (body, content_type) = resolve_body(options.body, options.json, options.form, options.xml)?;
        req.body = body;
        if let Some(ct) = content_type {
            if !req.headers.contains_key(http::header::CONTENT_TYPE) {
                req.headers
                    .insert(http::header::CONTENT_TYPE, HeaderValue::from_static(ct));
            }
        }

        req.timeout = options.timeout;
        if let Some(cancel) = options.cancel {
            req.cancel = cancel;
        }
        // A total deadline is lazily turned into a combined cancellation
        // controller only when one actually applies (spec.md §4.16: "lazily
        // constructs a cancellation controller only when timeout/signal/
        // progress needs it").
        if let Some(total) = req.timeout.total() {
            req.cancel = req.cancel.with_deadline(total);
        }
        if let Some(v) = options.follow_redirects {
            req.follow_redirects = v;
        }
        if let Some(v) = options.max_redirects {
            req.max_redirects = v;
        }
        req.before_redirect = options.before_redirect;
        if let Some(v) = options.http2 {
            req.http2 = Some(v);
        }
        req.on_upload_progress = options.on_upload_progress;
        req.on_download_progress = options.on_download_progress;
        if let Some(v) = options.throw_on_http_error {
            req.throw_on_http_error = v;
        }
        if let Some(v) = options.max_response_size {
            req.max_response_size = Some(v);
        }

        self.handler.handle(req)
    }

    /// Builds the final URL from `base_url`, `path`, the client's default
    /// params, and the per-request params/query, then dispatches
    /// (spec.md §4.16: fast-path concatenation or `:name` substitution).
    pub fn request(&self, method: Method, path: &str, options: RequestOptions) -> Result<Response, WayfarerError> {
        let mut params = self.default_params.clone();
        params.extend(options.params.clone());
        let url = build_url(&self.base_url, path, &params, &options.query)?;
        self.dispatch(method, url, options)
    }

    pub fn get(&self, path: &str, options: RequestOptions) -> Result<Response, WayfarerError> {
        self.request(Method::GET, path, options)
    }

    pub fn post(&self, path: &str, options: RequestOptions) -> Result<Response, WayfarerError> {
        self.request(Method::POST, path, options)
    }

    pub fn put(&self, path: &str, options: RequestOptions) -> Result<Response, WayfarerError> {
        self.request(Method::PUT, path, options)
    }

    pub fn patch(&self, path: &str, options: RequestOptions) -> Result<Response, WayfarerError> {
        self.request(Method::PATCH, path, options)
    }

    pub fn delete(&self, path: &str, options: RequestOptions) -> Result<Response, WayfarerError> {
        self.request(Method::DELETE, path, options)
    }

    pub fn head(&self, path: &str, options: RequestOptions) -> Result<Response, WayfarerError> {
        self.request(Method::HEAD, path, options)
    }

    pub fn options(&self, path: &str, options: RequestOptions) -> Result<Response, WayfarerError> {
        self.request(Method::OPTIONS, path, options)
    }

    pub fn trace(&self, path: &str, options: RequestOptions) -> Result<Response, WayfarerError> {
        self.request(Method::TRACE, path, options)
    }

    pub fn connect(&self, path: &str, options: RequestOptions) -> Result<Response, WayfarerError> {
        self.request(Method::CONNECT, path, options)
    }

    pub fn purge(&self, path: &str, options: RequestOptions) -> Result<Response, WayfarerError> {
        self.request(Method::from_bytes(b"PURGE").expect("PURGE is a valid token"), path, options)
    }

    pub fn propfind(&self, path: &str, options: RequestOptions) -> Result<Response, WayfarerError> {
        self.request(Method::from_bytes(b"PROPFIND").expect("PROPFIND is a valid token"), path, options)
    }

    pub fn proppatch(&self, path: &str, options: RequestOptions) -> Result<Response, WayfarerError> {
        self.request(Method::from_bytes(b"PROPPATCH").expect("PROPPATCH is a valid token"), path, options)
    }

    pub fn mkcol(&self, path: &str, options: RequestOptions) -> Result<Response, WayfarerError> {
        self.request(Method::from_bytes(b"MKCOL").expect("MKCOL is a valid token"), path, options)
    }

    pub fn copy(&self, path: &str, options: RequestOptions) -> Result<Response, WayfarerError> {
        self.request(Method::from_bytes(b"COPY").expect("COPY is a valid token"), path, options)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn mv(&self, path: &str, options: RequestOptions) -> Result<Response, WayfarerError> {
        self.request(Method::from_bytes(b"MOVE").expect("MOVE is a valid token"), path, options)
    }

    pub fn lock(&self, path: &str, options: RequestOptions) -> Result<Response, WayfarerError> {
        self.request(Method::from_bytes(b"LOCK").expect("LOCK is a valid token"), path, options)
    }

    pub fn unlock(&self, path: &str, options: RequestOptions) -> Result<Response, WayfarerError> {
        self.request(Method::from_bytes(b"UNLOCK").expect("UNLOCK is a valid token"), path, options)
    }

    /// Runs `items` through `build`+`map_response` with the runner's bounded
    /// worker pool and per-item retries (spec.md §4.5). `build` turns an
    /// item into the method/path/options that describe its request.
    pub fn batch<I, T>(
        &self,
        items: Vec<I>,
        build: impl Fn(&I) -> (Method, String, RequestOptions) + Send + Sync,
        map_response: impl Fn(Response) -> T + Send + Sync,
    ) -> BatchResult<T>
    where
        I: Clone + Send,
        T: Send,
    {
        self.runner.run(items, |item| {
            let (method, path, options) = build(&item);
            let res = self.request(method, &path, options)?;
            Ok(map_response(res))
        })
    }

    /// Alias for [`Client::batch`] (spec.md §6: "`client.multi`").
    pub fn multi<I, T>(
        &self,
        items: Vec<I>,
        build: impl Fn(&I) -> (Method, String, RequestOptions) + Send + Sync,
        map_response: impl Fn(Response) -> T + Send + Sync,
    ) -> BatchResult<T>
    where
        I: Clone + Send,
        T: Send,
    {
        self.batch(items, build, map_response)
    }

    /// A pull-based iterator over page envelopes (spec.md §4.15
    /// `client.pages`). `options` supplies the headers/params/query shared
    /// by every page fetch; `start`/`strategy` describe how the next page is
    /// located.
    pub fn pages<'a>(
        &'a self,
        path: &'a str,
        options: RequestOptions,
        strategy: PaginationStrategy,
        start: PageTarget,
        max_pages: Option<u32>,
    ) -> Pages<'a> {
        let config = self.pagination.clone();
        let page_param = config.page_param.clone();
        let fetch = Box::new(move |target: PageTarget| -> Result<Response, WayfarerError> {
            let mut opts = options.clone_shared();
            match target {
                PageTarget::Number(n) => {
                    opts.params.insert(page_param.clone(), n.to_string());
                }
                PageTarget::Cursor(Some(cursor)) => {
                    opts.params.insert("cursor".to_owned(), cursor);
                }
                PageTarget::Cursor(None) => {}
                PageTarget::Url(url) => {
                    return self.dispatch(Method::GET, url, opts);
                }
            }
            self.request(Method::GET, path, opts)
        });
        Pages::new(fetch, config, strategy, start, max_pages)
    }

    /// Flattens [`Client::pages`] into a plain item iterator
    /// (spec.md §4.15 `client.paginate`).
    pub fn paginate<'a>(
        &'a self,
        path: &'a str,
        options: RequestOptions,
        strategy: PaginationStrategy,
        start: PageTarget,
        max_pages: Option<u32>,
    ) -> Paginate<'a> {
        Paginate::new(self.pages(path, options, strategy, start, max_pages))
    }

    /// Eagerly collects [`Client::paginate`] (spec.md §4.15 `client.getAll`).
    pub fn get_all(
        &self,
        path: &str,
        options: RequestOptions,
        strategy: PaginationStrategy,
        start: PageTarget,
        max_pages: Option<u32>,
    ) -> Result<Vec<Value>, WayfarerError> {
        pagination::get_all(self.paginate(path, options, strategy, start, max_pages))
    }

    /// Fetches exactly page `n`, independent of the configured strategy
    /// (spec.md §4.15 `client.page`).
    pub fn page(&self, path: &str, n: u64, options: RequestOptions) -> Result<PageEnvelope, WayfarerError> {
        let config = self.pagination.clone();
        pagination::page_one(
            |target| {
                let mut opts = options.clone_shared();
                if let PageTarget::Number(n) = target {
                    opts.params.insert(config.page_param.clone(), n.to_string());
                }
                self.request(Method::GET, path, opts)
            },
            &config,
            n,
        )
    }

    /// Resolves `path` against `base_url` with the scheme substituted for
    /// its `ws`/`wss` counterpart (spec.md §4.17); the WebSocket state
    /// machine itself is out of scope here.
    pub fn ws_url(&self, path: &str) -> Result<Url, WayfarerError> {
        let mut url = build_url(&self.base_url, path, &self.default_params, &[])?;
        let scheme = match url.scheme() {
            "https" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|_| WayfarerError::validation("url", "cannot derive a ws/wss scheme"))?;
        Ok(url)
    }

    /// The client's default headers, for a caller establishing a WebSocket
    /// handshake itself (spec.md §4.17: "merges client-default headers").
    pub fn ws_headers(&self) -> HeaderMap {
        self.default_headers.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn base() -> Url {
        Url::parse("https://api.example.test/v1").unwrap()
    }

    #[test]
    fn json_body_sets_content_type() {
        let opts = RequestOptions::new().json(serde_json::json!({"a": 1})).unwrap();
        let (body, ct) = resolve_body(opts.body, opts.json, opts.form, opts.xml).unwrap();
        assert_eq!(ct, Some("application/json"));
        match body {
            Body::Bytes(b) => assert_eq!(&*b, br#"{"a":1}"#),
            _ => panic!("expected bytes body"),
        }
    }

    #[test]
    fn form_takes_priority_over_json_and_xml() {
        let (body, ct) = resolve_body(
            Some(Body::text("ignored")),
            Some(serde_json::json!({"a": 1})),
            Some(vec![("x".to_owned(), "1".to_owned())]),
            Some("<a/>".to_owned()),
        )
        .unwrap();
        assert_eq!(ct, Some("application/x-www-form-urlencoded"));
        match body {
            Body::Bytes(b) => assert_eq!(&*b, b"x=1"),
            _ => panic!("expected bytes body"),
        }
    }

    #[test]
    fn socks_proxy_is_rejected_at_build_time() {
        let builder = ClientBuilder::new(base()).proxy(ProxyConfig {
            url: Url::parse("socks5://localhost:1080").unwrap(),
            headers: Vec::new(),
        });
        let err = builder.build().unwrap_err();
        assert!(matches!(err, WayfarerError::Config(_)));
    }

    #[test]
    fn ws_url_substitutes_scheme() {
        let client = ClientBuilder::new(base()).build().unwrap();
        let url = client.ws_url("/socket").unwrap();
        assert_eq!(url.scheme(), "wss");
    }

    #[test]
    fn batch_preserves_ordering_and_runs_every_item() {
        let har = r#"{"log":{"entries":[
            {"request":{"method":"GET","url":"https://api.example.test/v1/items/0"},
             "response":{"status":200,"headers":[],"content":{"text":"0"}}},
            {"request":{"method":"GET","url":"https://api.example.test/v1/items/1"},
             "response":{"status":200,"headers":[],"content":{"text":"1"}}},
            {"request":{"method":"GET","url":"https://api.example.test/v1/items/2"},
             "response":{"status":200,"headers":[],"content":{"text":"2"}}}
        ]}}"#;
        let client = ClientBuilder::new(base())
            .har(HarPlayer::load(har, true).unwrap())
            .build()
            .unwrap();
        let items: Vec<u32> = vec![0, 1, 2];
        let result = client.batch(
            items,
            |n| (Method::GET, format!("/items/{n}"), RequestOptions::new()),
            |res| res.text().unwrap(),
        );
        let texts: Vec<String> = result.results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(texts, vec!["0", "1", "2"]);
    }

    #[test]
    fn retry_middleware_is_wired_through_the_pipeline() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let har = HarPlayer::load(
            r#"{"log":{"entries":[
                {"request":{"method":"GET","url":"https://api.example.test/v1/flaky"},
                 "response":{"status":200,"headers":[],"content":{"text":"ok"}}}
            ]}}"#,
            false,
        )
        .unwrap();
        let client = ClientBuilder::new(base())
            .retry(RetryConfig {
                max_attempts: 2,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
                jitter: 0.0,
                ..RetryConfig::default()
            })
            .use_middleware(move |inner: BoxHandler| -> BoxHandler {
                let c = Arc::clone(&c);
                fn_handler(move |req| {
                    c.fetch_add(1, Ordering::SeqCst);
                    inner.handle(req)
                })
            })
            .har(har)
            .build()
            .unwrap();
        let res = client.get("/flaky", RequestOptions::new()).unwrap();
        assert_eq!(res.text().unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn path_params_and_query_are_both_applied() {
        let har = r#"{"log":{"entries":[
            {"request":{"method":"GET","url":"https://api.example.test/v1/widgets/42?expand=owner"},
             "response":{"status":200,"headers":[],"content":{"text":"ok"}}}
        ]}}"#;
        let client = ClientBuilder::new(base())
            .har(HarPlayer::load(har, true).unwrap())
            .build()
            .unwrap();
        let res = client
            .get(
                "/widgets/:id",
                RequestOptions::new().param("id", "42").query("expand", "owner"),
            )
            .unwrap();
        assert_eq!(res.text().unwrap(), "ok");
    }

    #[test]
    fn basic_auth_sets_a_base64_authorization_header() {
        let client = ClientBuilder::new(base()).basic_auth("alice", "secret").build().unwrap();
        assert_eq!(
            client.default_headers.get("Authorization").unwrap(),
            "Basic YWxpY2U6c2VjcmV0"
        );
    }

    #[test]
    fn multipart_installs_a_boundary_bearing_content_type() {
        let har = r#"{"log":{"entries":[
            {"request":{"method":"POST","url":"https://api.example.test/v1/upload"},
             "response":{"status":200,"headers":[],"content":{"text":"ok"}}}
        ]}}"#;
        let client = ClientBuilder::new(base())
            .har(HarPlayer::load(har, false).unwrap())
            .build()
            .unwrap();
        let form = crate::body::MultipartForm::new().text("a", "1");
        let res = client
            .post("/upload", RequestOptions::new().multipart(form))
            .unwrap();
        assert_eq!(res.text().unwrap(), "ok");
    }
}
