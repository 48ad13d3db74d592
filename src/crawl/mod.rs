// src/crawl/mod.rs
// =============================================================================
// This module handles depth-bounded crawling.
//
// Features:
// - Recursive crawl from a seed URL, one depth unit spent per link hop
// - Each URL fetched at most once per run (see DedupePolicy for the caveat)
// - Sequential or concurrent dispatch of discovered links
// - The caller waits for every spawned task before getting the report
//
// Submodules:
// - visited: the per-run set of URLs already dispatched
// - tracker: counts outstanding crawl tasks and waits for them
// - coordinator: the traversal itself
// =============================================================================

mod coordinator;
mod tracker;
mod visited;

pub use coordinator::run_crawl;
pub use tracker::{CompletionTracker, TaskGuard};
pub use visited::VisitedSet;

use serde::Serialize;

/// How links found on a page are crawled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Recurse into each link in turn, in the order the fetcher returned them
    Sequential,
    /// Spawn one task per link; the parent does not wait for its children
    #[default]
    Concurrent,
}

/// How the visited check and the visited mark are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DedupePolicy {
    /// One locked test-and-insert before the fetch. A URL is fetched at most
    /// once per run.
    #[default]
    Atomic,
    /// Check before the fetch, mark after it. Concurrent tasks that reach the
    /// same URL at the same moment may all fetch it.
    CheckThenMark,
}

/// Knobs for one crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlOptions {
    pub mode: DispatchMode,
    pub dedupe: DedupePolicy,
    /// Upper bound on fetches in flight at once
    pub max_concurrency: usize,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            mode: DispatchMode::Concurrent,
            dedupe: DedupePolicy::Atomic,
            max_concurrency: 16,
        }
    }
}

/// Something that happened to one URL during a crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CrawlEvent {
    /// The page was fetched. `depth` is the budget it was fetched with.
    Discovered {
        url: String,
        content: String,
        depth: usize,
    },
    /// The fetch failed; the URL stays visited and is not retried
    Failed { url: String, error: String },
}

impl CrawlEvent {
    pub fn url(&self) -> &str {
        match self {
            CrawlEvent::Discovered { url, .. } | CrawlEvent::Failed { url, .. } => url,
        }
    }
}

/// Everything a finished crawl run produced.
///
/// Event order follows completion order; it is only deterministic in
/// sequential mode.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub seed: String,
    pub max_depth: usize,
    pub mode: DispatchMode,
    pub dedupe: DedupePolicy,
    /// Number of times the fetcher was called
    pub fetches: usize,
    pub events: Vec<CrawlEvent>,
}

impl CrawlReport {
    /// `(url, content)` of every fetched page
    pub fn discovered(&self) -> impl Iterator<Item = (&str, &str)> {
        self.events.iter().filter_map(|event| match event {
            CrawlEvent::Discovered { url, content, .. } => Some((url.as_str(), content.as_str())),
            CrawlEvent::Failed { .. } => None,
        })
    }

    /// `(url, error)` of every failed fetch
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.events.iter().filter_map(|event| match event {
            CrawlEvent::Failed { url, error } => Some((url.as_str(), error.as_str())),
            CrawlEvent::Discovered { .. } => None,
        })
    }

    pub fn discovered_count(&self) -> usize {
        self.discovered().count()
    }

    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }
}
