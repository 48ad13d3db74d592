// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Set up logging (tracing, to stderr so stdout stays clean for results)
// 3. Build the fetcher the subcommand asks for
// 4. Run the crawl and print the report
// 5. Exit with proper code (0 = crawl finished, 2 = error before crawling)
//
// Failed fetches do not change the exit code: a crawl that ran to the end
// is a successful crawl, however many pages were missing.
// =============================================================================

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, CrawlArgs};
use depth_crawler::{run_crawl, CrawlEvent, CrawlReport, Fetcher, FixtureFetcher, HttpFetcher};
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;

// Live pages are long; text output only shows the start of each one
const CONTENT_PREVIEW_CHARS: usize = 60;

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    let json = match &cli.command {
        Commands::Fixture { crawl, .. } | Commands::Site { crawl, .. } => crawl.json,
    };
    init_logging(cli.verbose, json);

    match cli.command {
        Commands::Fixture {
            seed,
            max_depth,
            file,
            crawl,
        } => {
            let fixture = match file {
                Some(path) => {
                    let json = std::fs::read_to_string(&path)
                        .with_context(|| format!("failed to read fixture {}", path.display()))?;
                    FixtureFetcher::from_json(&json)
                        .with_context(|| format!("invalid fixture {}", path.display()))?
                }
                None => FixtureFetcher::golang_org(),
            };
            handle_crawl(&seed, max_depth, Arc::new(fixture), &crawl).await
        }
        Commands::Site {
            website_url,
            max_depth,
            same_domain,
            timeout_secs,
            crawl,
        } => {
            let mut fetcher = HttpFetcher::new(Duration::from_secs(timeout_secs))?;
            if same_domain {
                fetcher = fetcher.same_domain_as(&website_url)?;
            }
            handle_crawl(&website_url, max_depth, Arc::new(fetcher), &crawl).await
        }
    }
}

// Logs go to stderr. Default level is INFO; --verbose adds the DEBUG skip
// decisions, --json keeps stderr to warnings so the report stands alone.
fn init_logging(verbose: bool, json: bool) {
    let level = if verbose {
        Level::DEBUG
    } else if json {
        Level::WARN
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn handle_crawl(
    seed: &str,
    max_depth: usize,
    fetcher: Arc<dyn Fetcher>,
    args: &CrawlArgs,
) -> Result<i32> {
    let report = run_crawl(seed, max_depth, fetcher, args.options()).await;
    print_report(&report, args.json)?;
    Ok(0)
}

fn print_report(report: &CrawlReport, json: bool) -> Result<()> {
    if json {
        let json_output = serde_json::to_string_pretty(report)?;
        println!("{}", json_output);
    } else {
        print_text(report);
    }
    Ok(())
}

fn print_text(report: &CrawlReport) {
    for event in &report.events {
        match event {
            CrawlEvent::Discovered { url, content, .. } => {
                println!("found: {} {:?}", url, preview(content));
            }
            CrawlEvent::Failed { error, .. } => {
                println!("{}", error);
            }
        }
    }

    println!();
    println!("Summary:");
    println!("   Found:   {}", report.discovered_count());
    println!("   Failed:  {}", report.failed_count());
    println!("   Fetches: {}", report.fetches);
}

fn preview(content: &str) -> String {
    if content.chars().count() > CONTENT_PREVIEW_CHARS {
        let head: String = content.chars().take(CONTENT_PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        content.to_string()
    }
}
