// src/lib.rs
// =============================================================================
// Library root for depth-crawler.
//
// - crawl: the depth-bounded traversal, visited set and completion tracking
// - fetch: the Fetcher contract plus fixture and HTTP implementations
//
// Typical use:
//
//   let fetcher = Arc::new(FixtureFetcher::golang_org());
//   let report = run_crawl("http://golang.org/", 4, fetcher, CrawlOptions::default()).await;
// =============================================================================

pub mod crawl;
pub mod fetch;

pub use crawl::{
    run_crawl, CompletionTracker, CrawlEvent, CrawlOptions, CrawlReport, DedupePolicy,
    DispatchMode, TaskGuard, VisitedSet,
};
pub use fetch::{FetchError, Fetcher, FixtureFetcher, HttpFetcher, Page};
