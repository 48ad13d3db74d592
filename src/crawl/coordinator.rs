// src/crawl/coordinator.rs
// =============================================================================
// The crawl traversal.
//
// For one (url, depth) task:
// 1. Skip if the URL is already visited
// 2. Skip if the depth budget is spent (the URL is NOT marked, so a shorter
//    path reaching it later with budget left still fetches it)
// 3. Fetch it, and mark it visited whatever the outcome
// 4. On failure: log the error and stop this branch
// 5. On success: record the page, then crawl every link with depth - 1
//
// With DedupePolicy::Atomic, steps 1 and 3's mark collapse into a single
// check_and_mark() before the fetch.
//
// Concurrent mode registers each child with the CompletionTracker before
// spawning it, then returns. run_crawl() waits on the tracker, so it only
// returns once every task spawned during the run has finished.
// =============================================================================

use super::{
    CompletionTracker, CrawlEvent, CrawlOptions, CrawlReport, DedupePolicy, DispatchMode,
    VisitedSet,
};
use crate::fetch::{FetchError, Fetcher, Page};
use futures::future::{BoxFuture, FutureExt};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Crawls everything reachable from `seed` within `max_depth` link hops.
///
/// `max_depth` counts fetch levels: 0 fetches nothing, 1 fetches only the seed.
/// Failed fetches are reported in the returned `CrawlReport`; they never make
/// the run itself fail. Each call starts from an empty visited set.
pub async fn run_crawl(
    seed: &str,
    max_depth: usize,
    fetcher: Arc<dyn Fetcher>,
    options: CrawlOptions,
) -> CrawlReport {
    info!(
        seed,
        max_depth,
        mode = ?options.mode,
        dedupe = ?options.dedupe,
        "starting crawl"
    );

    let crawler = Arc::new(Crawler::new(fetcher, options));

    // The seed runs on the caller's task. Anything it spawns is registered
    // with the tracker before the seed returns, so by the time we call
    // wait() the count already covers the whole first level.
    Arc::clone(&crawler).crawl(seed.to_string(), max_depth).await;
    crawler.tracker.wait().await;

    let report = CrawlReport {
        seed: seed.to_string(),
        max_depth,
        mode: options.mode,
        dedupe: options.dedupe,
        fetches: crawler.fetches.load(Ordering::SeqCst),
        events: crawler.take_events(),
    };

    info!(
        fetches = report.fetches,
        discovered = report.discovered_count(),
        failed = report.failed_count(),
        visited = crawler.visited.len(),
        "crawl finished"
    );
    debug!(visited = ?crawler.visited.snapshot(), "visited urls");
    report
}

// State shared by every task of one run
struct Crawler {
    fetcher: Arc<dyn Fetcher>,
    options: CrawlOptions,
    visited: VisitedSet,
    tracker: CompletionTracker,
    fetch_slots: Semaphore,
    fetches: AtomicUsize,
    events: Mutex<Vec<CrawlEvent>>,
}

impl Crawler {
    fn new(fetcher: Arc<dyn Fetcher>, options: CrawlOptions) -> Self {
        let slots = options.max_concurrency.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            fetcher,
            options,
            visited: VisitedSet::new(),
            tracker: CompletionTracker::new(),
            fetch_slots: Semaphore::new(slots),
            fetches: AtomicUsize::new(0),
            events: Mutex::new(Vec::new()),
        }
    }

    // Boxed so sequential mode can recurse and concurrent mode can spawn it
    fn crawl(self: Arc<Self>, url: String, depth: usize) -> BoxFuture<'static, ()> {
        async move {
            if !self.claim(&url, depth) {
                return;
            }

            let result = self.fetch(&url).await;

            // Two-step mode marks after the attempt, success or not, so a
            // URL that failed is never retried in this run. Atomic mode
            // already marked it inside claim().
            if self.options.dedupe == DedupePolicy::CheckThenMark {
                self.visited.mark_visited(&url);
            }

            match result {
                Ok(page) => {
                    info!(url = %url, depth, bytes = page.content.len(), "found");
                    let Page { content, links } = page;
                    self.record(CrawlEvent::Discovered {
                        url,
                        content,
                        depth,
                    });
                    self.dispatch(links, depth - 1).await;
                }
                Err(err) => {
                    warn!(url = err.url(), error = %err, "fetch failed");
                    self.record(CrawlEvent::Failed {
                        url,
                        error: err.to_string(),
                    });
                }
            }
        }
        .boxed()
    }

    // Decides whether this task gets to fetch `url`
    fn claim(&self, url: &str, depth: usize) -> bool {
        if self.visited.is_visited(url) {
            debug!(url, depth, "already visited");
            return false;
        }
        if depth == 0 {
            debug!(url, "depth budget spent");
            return false;
        }

        match self.options.dedupe {
            DedupePolicy::CheckThenMark => true,
            DedupePolicy::Atomic => {
                let won = self.visited.check_and_mark(url);
                if !won {
                    debug!(url, depth, "claimed by another task");
                }
                won
            }
        }
    }

    // Calls the fetcher while holding one of the fetch slots. No lock on the
    // visited set is held here.
    async fn fetch(&self, url: &str) -> Result<Page, FetchError> {
        // The semaphore is never closed, so acquire() cannot fail
        let _permit = self.fetch_slots.acquire().await.ok();
        self.fetches.fetch_add(1, Ordering::SeqCst);

        // A panicking fetcher becomes a failed fetch for this URL instead of
        // a task that silently disappears from the report
        match AssertUnwindSafe(self.fetcher.fetch(url)).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(FetchError::Panicked {
                url: url.to_string(),
                message: panic_message(payload.as_ref()),
            }),
        }
    }

    async fn dispatch(self: &Arc<Self>, links: Vec<String>, depth: usize) {
        match self.options.mode {
            DispatchMode::Sequential => {
                // Depth-first, in the order the page listed its links. Each
                // child finishes (with all of its own children) before the
                // next sibling starts.
                for link in links {
                    Arc::clone(self).crawl(link, depth).await;
                }
            }
            DispatchMode::Concurrent => {
                for link in links {
                    // Register HERE, in the parent, before the spawn. If the
                    // child registered itself, the tracker could read zero
                    // while the child is spawned but not yet polled, and
                    // run_crawl() would return early.
                    let guard = self.tracker.register();
                    let crawler = Arc::clone(self);

                    // The JoinHandle is dropped on purpose: nobody joins a
                    // crawl task. Completion is reported through the guard,
                    // which is dropped when the task ends on any path.
                    tokio::spawn(async move {
                        let _guard = guard;
                        crawler.crawl(link, depth).await;
                    });
                }
                // The parent returns now; its children run on their own
            }
        }
    }

    fn record(&self, event: CrawlEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    fn take_events(&self) -> Vec<CrawlEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

// Panic payloads are usually a &str or a String; anything else gets a placeholder
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why does crawl() return a BoxFuture instead of being an `async fn`?
//    - An async fn that awaits itself would have a future type that contains
//      itself, which has infinite size
//    - Boxing puts the child future on the heap, so the size is known
//    - .boxed() (from futures::FutureExt) also requires the future to be Send,
//      which tokio::spawn needs anyway
//
// 2. What is `self: Arc<Self>`?
//    - The method takes ownership of one Arc pointing at the crawler
//    - Spawned tasks must be 'static, so they cannot borrow the crawler;
//      each one gets its own Arc clone instead
//
// 3. What does AssertUnwindSafe do?
//    - catch_unwind() only accepts values the compiler can prove are safe to
//      observe after a panic
//    - AssertUnwindSafe is us promising that: the fetcher's future is dropped
//      after the panic and never polled again
//
// 4. Why a Semaphore?
//    - Spawning a task is cheap, but every fetch may hold a network connection
//    - acquire() waits while max_concurrency fetches are already running
//    - The permit is released when `_permit` goes out of scope
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FixtureFetcher;
    use async_trait::async_trait;
    use std::collections::{BTreeSet, HashMap};
    use std::time::Duration;

    const ROOT: &str = "http://golang.org/";
    const PKG: &str = "http://golang.org/pkg/";
    const CMD: &str = "http://golang.org/cmd/";
    const FMT: &str = "http://golang.org/pkg/fmt/";
    const OS: &str = "http://golang.org/pkg/os/";

    // Wraps a fixture, counting calls per URL and optionally sleeping first
    struct CountingFetcher {
        inner: FixtureFetcher,
        calls: Mutex<HashMap<String, usize>>,
        started: AtomicUsize,
        finished: AtomicUsize,
        sleep: bool,
    }

    impl CountingFetcher {
        fn new(inner: FixtureFetcher) -> Arc<Self> {
            Arc::new(Self::build(inner, false))
        }

        fn sleepy(inner: FixtureFetcher) -> Arc<Self> {
            Arc::new(Self::build(inner, true))
        }

        fn build(inner: FixtureFetcher, sleep: bool) -> Self {
            Self {
                inner,
                calls: Mutex::new(HashMap::new()),
                started: AtomicUsize::new(0),
                finished: AtomicUsize::new(0),
                sleep,
            }
        }

        fn calls(&self, url: &str) -> usize {
            self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
        }

        fn total_calls(&self) -> usize {
            self.calls.lock().unwrap().values().sum()
        }
    }

    #[async_trait]
    impl Fetcher for CountingFetcher {
        async fn fetch(&self, url: &str) -> Result<Page, FetchError> {
            *self.calls.lock().unwrap().entry(url.to_string()).or_default() += 1;
            self.started.fetch_add(1, Ordering::SeqCst);
            if self.sleep {
                // 1..=20ms, varied per URL and per call
                let n = self.started.load(Ordering::SeqCst) + url.len();
                tokio::time::sleep(Duration::from_millis(1 + (n * 7 % 20) as u64)).await;
            }
            let result = self.inner.fetch(url).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            result
        }
    }

    fn options(mode: DispatchMode, dedupe: DedupePolicy) -> CrawlOptions {
        CrawlOptions {
            mode,
            dedupe,
            ..CrawlOptions::default()
        }
    }

    fn discovered_set(report: &CrawlReport) -> BTreeSet<String> {
        report.discovered().map(|(url, _)| url.to_string()).collect()
    }

    fn set(urls: &[&str]) -> BTreeSet<String> {
        urls.iter().map(|url| url.to_string()).collect()
    }

    // a -> b -> c -> ... chain, last page has no links
    fn chain(urls: &[&str]) -> FixtureFetcher {
        let mut fixture = FixtureFetcher::default();
        for (i, url) in urls.iter().enumerate() {
            let next: Vec<&str> = urls.get(i + 1).into_iter().copied().collect();
            fixture.insert(url, &url.to_uppercase(), &next);
        }
        fixture
    }

    #[tokio::test]
    async fn test_golang_fixture_sequential_order() {
        let fetcher = CountingFetcher::new(FixtureFetcher::golang_org());
        let report = run_crawl(
            ROOT,
            4,
            fetcher.clone(),
            options(DispatchMode::Sequential, DedupePolicy::CheckThenMark),
        )
        .await;

        let urls: Vec<&str> = report.events.iter().map(|event| event.url()).collect();
        assert_eq!(urls, vec![ROOT, PKG, CMD, FMT, OS]);
        assert_eq!(
            report.failures().collect::<Vec<_>>(),
            vec![(CMD, "not found: http://golang.org/cmd/")]
        );
        assert_eq!(report.fetches, 5);
        assert_eq!(fetcher.total_calls(), 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_golang_fixture_concurrent_atomic() {
        let fetcher = CountingFetcher::new(FixtureFetcher::golang_org());
        let report = run_crawl(ROOT, 4, fetcher.clone(), CrawlOptions::default()).await;

        assert_eq!(discovered_set(&report), set(&[ROOT, PKG, FMT, OS]));
        assert_eq!(report.discovered_count(), 4);
        assert_eq!(report.failed_count(), 1);
        for url in [ROOT, PKG, CMD, FMT, OS] {
            assert_eq!(fetcher.calls(url), 1, "{} fetched more than once", url);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_golang_fixture_concurrent_check_then_mark() {
        let fetcher = CountingFetcher::new(FixtureFetcher::golang_org());
        let report = run_crawl(
            ROOT,
            4,
            fetcher.clone(),
            options(DispatchMode::Concurrent, DedupePolicy::CheckThenMark),
        )
        .await;

        // Duplicate fetches are allowed here, missing pages are not
        assert_eq!(discovered_set(&report), set(&[ROOT, PKG, FMT, OS]));
        assert!(report.failed_count() >= 1);
        assert!(report.failures().all(|(url, _)| url == CMD));
        assert!(fetcher.calls(CMD) >= 1);
    }

    #[tokio::test]
    async fn test_depth_zero_fetches_nothing() {
        for mode in [DispatchMode::Sequential, DispatchMode::Concurrent] {
            let fetcher = CountingFetcher::new(FixtureFetcher::golang_org());
            let report = run_crawl(
                ROOT,
                0,
                fetcher.clone(),
                options(mode, DedupePolicy::Atomic),
            )
            .await;
            assert!(report.events.is_empty());
            assert_eq!(report.fetches, 0);
            assert_eq!(fetcher.total_calls(), 0);
        }
    }

    #[tokio::test]
    async fn test_depth_one_fetches_only_seed() {
        for mode in [DispatchMode::Sequential, DispatchMode::Concurrent] {
            let fetcher = CountingFetcher::new(FixtureFetcher::golang_org());
            let report = run_crawl(
                ROOT,
                1,
                fetcher.clone(),
                options(mode, DedupePolicy::Atomic),
            )
            .await;
            assert_eq!(discovered_set(&report), set(&[ROOT]));
            assert_eq!(report.failed_count(), 0);
            assert_eq!(fetcher.total_calls(), 1);
            assert_eq!(fetcher.calls(PKG), 0);
            assert_eq!(fetcher.calls(CMD), 0);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_no_fetch_past_depth_budget() {
        let fixture = chain(&["http://a/", "http://b/", "http://c/", "http://d/"]);
        for mode in [DispatchMode::Sequential, DispatchMode::Concurrent] {
            let fetcher = CountingFetcher::new(fixture.clone());
            let report = run_crawl(
                "http://a/",
                2,
                fetcher.clone(),
                options(mode, DedupePolicy::Atomic),
            )
            .await;
            assert_eq!(discovered_set(&report), set(&["http://a/", "http://b/"]));
            assert_eq!(fetcher.calls("http://c/"), 0);
            assert_eq!(fetcher.calls("http://d/"), 0);
        }
    }

    #[tokio::test]
    async fn test_boundary_url_not_marked_visited() {
        // a -> [b, c], b -> d, d -> e, c -> e
        // With depth 3, e is first reached from d with no budget left, then
        // from c with budget 1. It must be fetched the second time.
        let mut fixture = FixtureFetcher::default();
        fixture.insert("http://a/", "A", &["http://b/", "http://c/"]);
        fixture.insert("http://b/", "B", &["http://d/"]);
        fixture.insert("http://d/", "D", &["http://e/"]);
        fixture.insert("http://c/", "C", &["http://e/"]);
        fixture.insert("http://e/", "E", &[]);

        for dedupe in [DedupePolicy::Atomic, DedupePolicy::CheckThenMark] {
            let fetcher = CountingFetcher::new(fixture.clone());
            let report = run_crawl(
                "http://a/",
                3,
                fetcher.clone(),
                options(DispatchMode::Sequential, dedupe),
            )
            .await;
            let urls: Vec<&str> = report.events.iter().map(|event| event.url()).collect();
            assert_eq!(
                urls,
                vec!["http://a/", "http://b/", "http://d/", "http://c/", "http://e/"]
            );
            assert_eq!(fetcher.calls("http://e/"), 1);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failure_does_not_stop_siblings() {
        let mut fixture = FixtureFetcher::default();
        fixture.insert(
            "http://root/",
            "root",
            &["http://missing/", "http://left/", "http://right/"],
        );
        fixture.insert("http://left/", "left", &["http://left/deep/"]);
        fixture.insert("http://left/deep/", "deep", &[]);
        fixture.insert("http://right/", "right", &["http://missing/"]);

        for mode in [DispatchMode::Sequential, DispatchMode::Concurrent] {
            let fetcher = CountingFetcher::new(fixture.clone());
            let report = run_crawl(
                "http://root/",
                3,
                fetcher.clone(),
                options(mode, DedupePolicy::Atomic),
            )
            .await;
            assert_eq!(
                discovered_set(&report),
                set(&["http://root/", "http://left/", "http://left/deep/", "http://right/"])
            );
            // Failed URLs are marked visited and never retried
            let failed: Vec<&str> = report.failures().map(|(url, _)| url).collect();
            assert_eq!(failed, vec!["http://missing/"]);
            assert_eq!(fetcher.calls("http://missing/"), 1);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_run_waits_for_every_task() {
        let fetcher = CountingFetcher::sleepy(FixtureFetcher::golang_org());
        let report = run_crawl(ROOT, 4, fetcher.clone(), CrawlOptions::default()).await;

        let started = fetcher.started.load(Ordering::SeqCst);
        let finished = fetcher.finished.load(Ordering::SeqCst);
        assert_eq!(started, finished);
        assert_eq!(finished, report.fetches);
        assert_eq!(report.events.len(), report.fetches);
        assert_eq!(discovered_set(&report), set(&[ROOT, PKG, FMT, OS]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_atomic_dedupe_under_heavy_fan_in() {
        // Every page links to every page, so each URL is dispatched many times
        let urls: Vec<String> = (0..30).map(|i| format!("http://mesh/{}", i)).collect();
        let refs: Vec<&str> = urls.iter().map(String::as_str).collect();
        let mut fixture = FixtureFetcher::default();
        for url in &refs {
            fixture.insert(url, url, &refs);
        }

        let fetcher = CountingFetcher::sleepy(fixture);
        let report = run_crawl(
            refs[0],
            3,
            fetcher.clone(),
            CrawlOptions {
                max_concurrency: 64,
                ..CrawlOptions::default()
            },
        )
        .await;

        assert_eq!(report.discovered_count(), 30);
        assert_eq!(fetcher.total_calls(), 30);
        assert!(refs.iter().all(|url| fetcher.calls(url) == 1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_single_fetch_slot_still_completes() {
        let fetcher = CountingFetcher::sleepy(FixtureFetcher::golang_org());
        let report = run_crawl(
            ROOT,
            4,
            fetcher.clone(),
            CrawlOptions {
                max_concurrency: 0,
                ..CrawlOptions::default()
            },
        )
        .await;
        assert_eq!(discovered_set(&report), set(&[ROOT, PKG, FMT, OS]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_runs_do_not_share_visited_state() {
        let fetcher: Arc<dyn Fetcher> = Arc::new(FixtureFetcher::golang_org());
        let (first, second) = tokio::join!(
            run_crawl(ROOT, 4, Arc::clone(&fetcher), CrawlOptions::default()),
            run_crawl(ROOT, 4, Arc::clone(&fetcher), CrawlOptions::default()),
        );
        assert_eq!(discovered_set(&first), set(&[ROOT, PKG, FMT, OS]));
        assert_eq!(discovered_set(&second), set(&[ROOT, PKG, FMT, OS]));

        let third = run_crawl(ROOT, 4, fetcher, CrawlOptions::default()).await;
        assert_eq!(third.discovered_count(), 4);
    }

    // Fails loudly on one URL, serves the fixture for the rest
    struct PanickyFetcher {
        inner: FixtureFetcher,
        panic_on: &'static str,
    }

    #[async_trait]
    impl Fetcher for PanickyFetcher {
        async fn fetch(&self, url: &str) -> Result<Page, FetchError> {
            if url == self.panic_on {
                panic!("cannot fetch {}", url);
            }
            self.inner.fetch(url).await
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_panicking_fetch_reported_as_failure() {
        let mut fixture = FixtureFetcher::default();
        fixture.insert("http://a/", "A", &["http://b/", "http://c/"]);
        fixture.insert("http://c/", "C", &[]);

        for mode in [DispatchMode::Sequential, DispatchMode::Concurrent] {
            let fetcher = Arc::new(PanickyFetcher {
                inner: fixture.clone(),
                panic_on: "http://b/",
            });
            let report = run_crawl(
                "http://a/",
                3,
                fetcher,
                options(mode, DedupePolicy::Atomic),
            )
            .await;

            assert_eq!(report.fetches, 3);
            assert_eq!(report.events.len(), 3);
            assert_eq!(discovered_set(&report), set(&["http://a/", "http://c/"]));
            let failed: Vec<(&str, &str)> = report.failures().collect();
            assert_eq!(
                failed,
                vec![("http://b/", "fetcher panicked on http://b/: cannot fetch http://b/")]
            );
        }
    }

    #[tokio::test]
    async fn test_missing_seed_reports_one_failure() {
        let fetcher = CountingFetcher::new(FixtureFetcher::golang_org());
        let report = run_crawl(
            "http://nowhere/",
            4,
            fetcher.clone(),
            CrawlOptions::default(),
        )
        .await;
        assert_eq!(report.discovered_count(), 0);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(fetcher.total_calls(), 1);
    }
}
