// src/fetch/mod.rs
// =============================================================================
// This module defines the fetch contract the crawler consumes.
//
// The crawler never talks to the network itself. It asks a `Fetcher` for a
// page and gets back the page content plus the links found on it, or an error.
//
// Submodules:
// - fixture: canned pages held in memory (the golang.org tour fixture)
// - http: live pages over HTTP, links pulled out of the HTML
// =============================================================================

mod fixture;
mod http;

pub use fixture::FixtureFetcher;
pub use http::{extract_links, HttpFetcher};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A successfully fetched page: its body and its outbound links, in page order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub content: String,
    #[serde(default)]
    pub links: Vec<String>,
}

impl Page {
    pub fn new(content: impl Into<String>, links: Vec<String>) -> Self {
        Self {
            content: content.into(),
            links,
        }
    }
}

/// Why a URL could not be fetched.
///
/// Every variant is terminal for that URL within one crawl run.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The backing source has no page for this URL
    #[error("not found: {url}")]
    NotFound { url: String },

    /// The server answered with a non-success status
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// The request never produced a response (DNS, TLS, timeout, ...)
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The fetcher panicked while handling this URL
    #[error("fetcher panicked on {url}: {message}")]
    Panicked { url: String, message: String },
}

impl FetchError {
    /// The URL the failed fetch was for
    pub fn url(&self) -> &str {
        match self {
            FetchError::NotFound { url }
            | FetchError::Status { url, .. }
            | FetchError::Http { url, .. }
            | FetchError::Panicked { url, .. } => url,
        }
    }
}

/// Anything that can turn a URL into a `Page`.
///
/// Implementations must be safe to call from many crawl tasks at once.
/// A panic inside `fetch` is caught by the crawler and reported as
/// `FetchError::Panicked` for that URL; the rest of the crawl carries on.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Page, FetchError>;
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why #[async_trait]?
//    - The crawler stores the fetcher as Arc<dyn Fetcher> so any
//      implementation can be plugged in at runtime
//    - A plain `async fn` in a trait cannot be used through `dyn` yet
//    - async_trait rewrites it to return Pin<Box<dyn Future + Send>>
//
// 2. What does thiserror do?
//    - #[derive(Error)] implements std::error::Error for our enum
//    - #[error("...")] becomes the Display text, so
//      FetchError::NotFound prints as "not found: <url>"
//    - #[source] keeps the underlying reqwest error in the chain
//
// 3. Why `Send + Sync` on the trait?
//    - Crawl tasks run on any tokio worker thread and share one fetcher
// -----------------------------------------------------------------------------
