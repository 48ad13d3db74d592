// src/fetch/http.rs
// =============================================================================
// A fetcher that downloads live pages and pulls links out of their HTML.
//
// How it works:
// 1. GET the URL with a shared reqwest client (timeout applies per request)
// 2. Map 404/410 to NotFound, any other non-2xx to Status
// 3. Parse the body with `scraper` and collect every <a href>
// 4. Resolve relative hrefs against the page URL, keep only http(s)
// 5. Optionally drop links that leave the seed's domain
//
// The crawler treats whatever comes back as opaque: no normalization happens
// here beyond what `Url::join` does when resolving a relative link.
// =============================================================================

use super::{FetchError, Fetcher, Page};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use std::time::Duration;
use url::Url;

pub struct HttpFetcher {
    client: Client,
    // Only links on this domain are returned when set
    domain: Option<String>,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            domain: None,
        })
    }

    /// Restricts returned links to the domain of `seed_url`
    pub fn same_domain_as(mut self, seed_url: &str) -> Result<Self> {
        let seed = Url::parse(seed_url).map_err(|e| anyhow!("Invalid URL '{}': {}", seed_url, e))?;
        let domain = seed
            .domain()
            .ok_or_else(|| anyhow!("URL has no domain: {}", seed_url))?;
        self.domain = Some(domain.to_string());
        Ok(self)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Page, FetchError> {
        let http_error = |source| FetchError::Http {
            url: url.to_string(),
            source,
        };

        // send() only fails when no response came back at all (connection
        // refused, DNS, TLS, timeout). A 404 is still an Ok(response) here.
        let response = self.client.get(url).send().await.map_err(http_error)?;
        let status = response.status();

        // 404 Not Found or 410 Gone - the page does not exist
        if matches!(status, StatusCode::NOT_FOUND | StatusCode::GONE) {
            return Err(FetchError::NotFound {
                url: url.to_string(),
            });
        }
        // Anything else that is not 2xx (500, 403, ...). Redirects never get
        // here: the client follows up to 5 of them itself.
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let html = response.text().await.map_err(http_error)?;
        let links = extract_links(&html, url, self.domain.as_deref());
        Ok(Page {
            content: html,
            links,
        })
    }
}

/// Extracts absolute http(s) links from `html`, in document order.
///
/// Relative hrefs are resolved against `page_url`. When `domain` is given,
/// links to other domains are dropped. Duplicates are kept; the crawler's
/// visited set is what collapses them.
pub fn extract_links(html: &str, page_url: &str, domain: Option<&str>) -> Vec<String> {
    let base = match Url::parse(page_url) {
        Ok(url) => url,
        Err(_) => return Vec::new(),
    };

    let document = Html::parse_document(html);
    let selector = match Selector::parse("a[href]") {
        Ok(selector) => selector,
        Err(_) => return Vec::new(),
    };

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_link(&base, href))
        .filter(|link| match domain {
            Some(domain) => link.domain() == Some(domain),
            None => true,
        })
        .map(String::from)
        .collect()
}

// Resolves a (possibly relative) href, skipping anchors and non-http schemes
fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    if href.starts_with('#') {
        return None;
    }

    let url = base.join(href).ok()?;
    match url.scheme() {
        "http" | "https" => Some(url),
        _ => None,
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why is extract_links a separate, non-async function?
//    - scraper's Html document is not Send
//    - Keeping it inside a plain fn means it is dropped before fetch()'s
//      future could be moved to another thread at an .await
//
// 2. What does Url::join do?
//    - Resolves a link the way a browser would
//    - "https://example.com/page/" + "../about" = "https://example.com/about"
//
// 3. Why `let http_error = |source| ...`?
//    - A small closure reused by both map_err calls
//    - It only borrows `url`, so it is Copy and can be passed twice
// -----------------------------------------------------------------------------
