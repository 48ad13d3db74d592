// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Two subcommands, one per fetcher:
// - fixture: crawl canned pages (built-in golang.org graph or a JSON file)
// - site:    crawl live pages over HTTP
//
// Both share the crawl flags in `CrawlArgs`, which turn into `CrawlOptions`.
// =============================================================================

use clap::{Args, Parser, Subcommand};
use depth_crawler::{CrawlOptions, DedupePolicy, DispatchMode};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "depth-crawler",
    version,
    about = "Crawl pages up to a depth limit, fetching each URL at most once",
    long_about = "depth-crawler starts from a seed URL, follows every link it finds up to \
                  --max-depth hops, and reports each page it fetched and each fetch that failed."
)]
pub struct Cli {
    /// Log every skip and fetch decision (to stderr)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl canned pages held in memory
    ///
    /// Example: depth-crawler fixture --max-depth 4
    Fixture {
        /// Where to start
        #[arg(long, default_value = "http://golang.org/")]
        seed: String,

        /// Maximum crawl depth (0 fetches nothing, 1 fetches only the seed)
        #[arg(long, default_value_t = 4)]
        max_depth: usize,

        /// JSON file mapping url -> {"content": ..., "links": [...]}
        /// (defaults to the built-in golang.org pages)
        #[arg(long)]
        file: Option<PathBuf>,

        #[command(flatten)]
        crawl: CrawlArgs,
    },

    /// Crawl a live website
    ///
    /// Example: depth-crawler site https://example.com --max-depth 2 --same-domain
    Site {
        /// Website URL to start from (e.g., https://example.com)
        website_url: String,

        /// Maximum crawl depth (0 fetches nothing, 1 fetches only the seed)
        #[arg(long, default_value_t = 2)]
        max_depth: usize,

        /// Only follow links on the seed's domain
        #[arg(long)]
        same_domain: bool,

        /// Per-request timeout in seconds
        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,

        #[command(flatten)]
        crawl: CrawlArgs,
    },
}

/// Flags shared by every crawl
#[derive(Args, Debug)]
pub struct CrawlArgs {
    /// Follow links one at a time instead of spawning a task per link
    #[arg(long)]
    pub sequential: bool,

    /// How visited checks are done; check-then-mark may fetch a URL twice
    /// when tasks race for it
    #[arg(long, value_enum, default_value_t = DedupePolicy::Atomic)]
    pub dedupe: DedupePolicy,

    /// Maximum fetches in flight at once
    #[arg(long, default_value_t = 16)]
    pub max_concurrency: usize,

    /// Output the report as JSON instead of text
    #[arg(long)]
    pub json: bool,
}

impl CrawlArgs {
    pub fn options(&self) -> CrawlOptions {
        CrawlOptions {
            mode: if self.sequential {
                DispatchMode::Sequential
            } else {
                DispatchMode::Concurrent
            },
            dedupe: self.dedupe,
            max_concurrency: self.max_concurrency,
        }
    }
}
