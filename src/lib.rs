//! `wayfarer` — a programmable HTTP(S) client with a composable middleware
//! pipeline, concurrency shaping, retries, caching, and dedup.
//!
//! **WARNING**: This library is under development and is likely to undergo
//! incompatible changes in the future.
//!
//! ## Installation
//!
//! Add the following line to your `Cargo.toml` under the `[dependencies]`
//! section:
//!
//! ```toml
//! wayfarer = { git = "https://github.com/wayfarer-rs/wayfarer" }
//! ```
//!
//! ## Usage
//!
//! A [`client::Client`] is built once from a [`client::ClientBuilder`] and
//! reused for every request; construction is where the middleware pipeline
//! (logging, retry, cache, dedup, compression, cookies, ...) is assembled,
//! so steady-state requests pay no per-call setup cost.
//!
//! ### Basic example
//!
//! ```no_run
//! use wayfarer::client::{ClientBuilder, RequestOptions};
//! use url::Url;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ClientBuilder::new(Url::parse("https://api.example.com/v1")?)
//!         .header("Authorization", "Bearer your-token")
//!         .build()?;
//!
//!     let response = client.get("/widgets/:id", RequestOptions::new().param("id", "42"))?;
//!     println!("status: {}", response.status());
//!     println!("body: {}", response.text()?);
//!
//!     Ok(())
//! }
//! ```
//!
//! ### Batching and pagination
//!
//! ```no_run
//! # use wayfarer::client::{ClientBuilder, RequestOptions};
//! # use wayfarer::pagination::{PageTarget, PaginationStrategy};
//! # use url::Url;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let client = ClientBuilder::new(Url::parse("https://api.example.com/v1")?).build()?;
//! let ids = vec![1u32, 2, 3];
//! let batch = client.batch(
//!     ids,
//!     |id| (http::Method::GET, format!("/widgets/{id}"), RequestOptions::new()),
//!     |res| res.status(),
//! );
//! println!("{} of {} succeeded", batch.stats.successful, batch.stats.total);
//!
//! let items = client.get_all(
//!     "/widgets",
//!     RequestOptions::new(),
//!     PaginationStrategy::PageNumber,
//!     PageTarget::Number(1),
//!     None,
//! )?;
//! println!("fetched {} items across all pages", items.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module map
//!
//! | Concern | Module |
//! |---|---|
//! | Client facade | [`client`] |
//! | Middleware chain | [`middleware`] |
//! | Lifecycle hooks | [`hooks`] |
//! | Connection pooling | [`agent`] |
//! | Concurrency limiting | [`pool`] |
//! | Batch runner | [`runner`] |
//! | Pagination | [`pagination`] |
//! | Transport adapter | [`transport`] |
//! | Built-in policy plugins | [`plugins`] |
//! | Requests/responses | [`request`], [`response`] |
//! | Request bodies | [`body`] |
//! | URL building | [`url`] |
//! | Cancellation | [`cancel`] |
//! | Logging | [`logger`] |
//! | Errors | [`error`] |
//! | Time source | [`clock`] |

pub mod agent;
pub mod body;
pub mod cancel;
pub mod client;
pub mod clock;
pub mod error;
pub mod hooks;
pub mod logger;
pub mod middleware;
pub mod pagination;
pub mod plugins;
pub mod pool;
pub mod request;
pub mod response;
pub mod runner;
pub mod transport;
pub mod url;
