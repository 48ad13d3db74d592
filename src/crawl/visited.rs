// src/crawl/visited.rs
// =============================================================================
// The set of URLs already dispatched for fetching during one crawl run.
//
// One instance per run, shared between crawl tasks through an Arc. URLs are
// only ever inserted, never removed. The lock is held for a single HashSet
// operation and never across a fetch.
//
// Two ways to use it:
// - is_visited() then mark_visited(): two separate critical sections. Two
//   tasks can both see "not visited" before either marks the URL.
// - check_and_mark(): one write-locked test-and-insert. Exactly one caller
//   gets `true` for a given URL.
// =============================================================================

use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Default)]
pub struct VisitedSet {
    urls: RwLock<HashSet<String>>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-locked membership test
    pub fn is_visited(&self, url: &str) -> bool {
        self.urls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(url)
    }

    /// Write-locked insert
    pub fn mark_visited(&self, url: &str) {
        self.urls
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.to_string());
    }

    /// Inserts `url` and reports whether this call was the one that added it.
    pub fn check_and_mark(&self, url: &str) -> bool {
        // Test and insert under the SAME write guard. Doing it as
        // is_visited() + mark_visited() would drop the lock in between.
        let mut urls = self.urls.write().unwrap_or_else(PoisonError::into_inner);
        if urls.contains(url) {
            return false;
        }
        urls.insert(url.to_string())
    }

    pub fn len(&self) -> usize {
        self.urls.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the visited URLs, sorted
    pub fn snapshot(&self) -> Vec<String> {
        let mut urls: Vec<String> = self
            .urls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();
        urls.sort();
        urls
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. RwLock vs Mutex?
//    - RwLock allows many readers OR one writer at a time
//    - is_visited() only reads, so many tasks can check at once
//
// 2. What is PoisonError::into_inner?
//    - If a thread panics while holding a std lock, the lock is "poisoned"
//    - into_inner() takes the data anyway; a HashSet of strings cannot be
//      left half-updated by a panic, so that is safe here
// -----------------------------------------------------------------------------
