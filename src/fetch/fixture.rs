// src/fetch/fixture.rs
// =============================================================================
// A fetcher that serves canned pages from memory.
//
// Used for the `fixture` subcommand and for tests. The default fixture is the
// four-page golang.org graph from the Go tour:
//
//   /          -> /pkg/, /cmd/
//   /pkg/      -> /, /cmd/, /pkg/fmt/, /pkg/os/
//   /pkg/fmt/  -> /, /pkg/
//   /pkg/os/   -> /, /pkg/
//   /cmd/      (missing, every fetch of it fails with NotFound)
//
// Fixtures can also be loaded from JSON shaped like:
//   { "http://a/": { "content": "A", "links": ["http://b/"] } }
// =============================================================================

use super::{FetchError, Fetcher, Page};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct FixtureFetcher {
    pages: HashMap<String, Page>,
}

impl FixtureFetcher {
    pub fn new(pages: HashMap<String, Page>) -> Self {
        Self { pages }
    }

    /// Parses a JSON object mapping URL -> page
    pub fn from_json(json: &str) -> Result<Self> {
        let pages: HashMap<String, Page> =
            serde_json::from_str(json).context("fixture must be a JSON object of url -> page")?;
        Ok(Self::new(pages))
    }

    /// The golang.org fixture the crawler is demonstrated against
    pub fn golang_org() -> Self {
        let mut fixture = Self::default();
        fixture.insert(
            "http://golang.org/",
            "The Go Programming Language",
            &["http://golang.org/pkg/", "http://golang.org/cmd/"],
        );
        fixture.insert(
            "http://golang.org/pkg/",
            "Packages",
            &[
                "http://golang.org/",
                "http://golang.org/cmd/",
                "http://golang.org/pkg/fmt/",
                "http://golang.org/pkg/os/",
            ],
        );
        fixture.insert(
            "http://golang.org/pkg/fmt/",
            "Package fmt",
            &["http://golang.org/", "http://golang.org/pkg/"],
        );
        fixture.insert(
            "http://golang.org/pkg/os/",
            "Package os",
            &["http://golang.org/", "http://golang.org/pkg/"],
        );
        fixture
    }

    /// Adds (or replaces) a canned page
    pub fn insert(&mut self, url: &str, content: &str, links: &[&str]) {
        let links = links.iter().map(|link| link.to_string()).collect();
        self.pages.insert(url.to_string(), Page::new(content, links));
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

#[async_trait]
impl Fetcher for FixtureFetcher {
    async fn fetch(&self, url: &str) -> Result<Page, FetchError> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                url: url.to_string(),
            })
    }
}
