//! Fetch capability and its outcome types
//!
//! A [`Fetcher`] turns a URL into a [`FetchOutcome`]. The upstream source
//! implements it, and so does [`CachedFetcher`](crate::cache::CachedFetcher),
//! which makes the cache a drop-in replacement for the source it wraps.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// Response headers attached to a successful fetch
pub type Headers = HashMap<String, String>;

/// Result of a single fetch, from upstream or from the store
pub type FetchOutcome = std::result::Result<Fetched, FetchError>;

/// Body of a successful fetch
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Raw bytes (tiles, images, anything opaque)
    Binary(Bytes),

    /// UTF-8 text
    Text(String),

    /// Structured document, stored as JSON text
    Json(serde_json::Value),
}

impl Payload {
    /// An empty binary body, used when upstream returns no payload
    pub fn empty() -> Self {
        Payload::Binary(Bytes::new())
    }

    /// Length of the body in bytes as it would be stored
    pub fn len(&self) -> usize {
        match self {
            Payload::Binary(b) => b.len(),
            Payload::Text(s) => s.len(),
            Payload::Json(v) => v.to_string().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Bytes> for Payload {
    fn from(b: Bytes) -> Self {
        Payload::Binary(b)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(v: Vec<u8>) -> Self {
        Payload::Binary(Bytes::from(v))
    }
}

impl From<&'static [u8]> for Payload {
    fn from(v: &'static [u8]) -> Self {
        Payload::Binary(Bytes::from_static(v))
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Text(s)
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::Text(s.to_string())
    }
}

impl From<serde_json::Value> for Payload {
    fn from(v: serde_json::Value) -> Self {
        Payload::Json(v)
    }
}

/// A successful fetch: body plus optional headers
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub payload: Payload,
    pub headers: Option<Headers>,
}

impl Fetched {
    /// Create a fetch result without headers
    pub fn new(payload: impl Into<Payload>) -> Self {
        Self {
            payload: payload.into(),
            headers: None,
        }
    }

    /// Attach response headers
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = Some(headers);
        self
    }
}

/// Failure of a fetch
///
/// `NotFound` and `Forbidden` are classified outcomes and can be cached.
/// Everything else is opaque and always goes back to upstream next time.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Upstream reported 404. `cached` is set when the outcome came from the store.
    #[error("Not found")]
    NotFound { cached: bool },

    /// Upstream reported 403. `cached` is set when the outcome came from the store.
    #[error("Forbidden")]
    Forbidden { cached: bool },

    /// The URL handed to the fetcher could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Any other upstream failure, passed through untouched
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FetchError {
    pub fn not_found() -> Self {
        FetchError::NotFound { cached: false }
    }

    pub fn forbidden() -> Self {
        FetchError::Forbidden { cached: false }
    }

    /// HTTP status for classified failures
    pub fn status_code(&self) -> Option<u16> {
        match self {
            FetchError::NotFound { .. } => Some(404),
            FetchError::Forbidden { .. } => Some(403),
            _ => None,
        }
    }

    /// Whether this outcome was served from the store
    pub fn is_cached(&self) -> bool {
        matches!(
            self,
            FetchError::NotFound { cached: true } | FetchError::Forbidden { cached: true }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound { .. })
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, FetchError::Forbidden { .. })
    }
}

/// Anything that can fetch a URL
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> FetchOutcome;
}

#[async_trait]
impl<T: Fetcher + ?Sized> Fetcher for Arc<T> {
    async fn fetch(&self, url: &str) -> FetchOutcome {
        (**self).fetch(url).await
    }
}

/// Adapter turning an async closure into a [`Fetcher`]
pub struct FnFetcher<F> {
    f: F,
}

impl<F> fmt::Debug for FnFetcher<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnFetcher").finish_non_exhaustive()
    }
}

/// Wrap a closure `Fn(String) -> impl Future<Output = FetchOutcome>`
///
/// ```
/// use fetch_cache::{fetch_fn, Fetched, Fetcher};
///
/// # tokio_test::block_on(async {
/// let source = fetch_fn(|url: String| async move { Ok(Fetched::new(url)) });
/// let fetched = source.fetch("https://a.com/x").await.unwrap();
/// assert_eq!(fetched, Fetched::new("https://a.com/x"));
/// # });
/// ```
pub fn fetch_fn<F, Fut>(f: F) -> FnFetcher<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = FetchOutcome> + Send,
{
    FnFetcher { f }
}

#[async_trait]
impl<F, Fut> Fetcher for FnFetcher<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = FetchOutcome> + Send,
{
    async fn fetch(&self, url: &str) -> FetchOutcome {
        (self.f)(url.to_string()).await
    }
}
