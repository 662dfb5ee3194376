//! Sitelore main entry point
//!
//! This is the command-line interface for the Sitelore site crawler.

use anyhow::Context;
use clap::{Parser, Subcommand};
use sitelore::config::{load_config_with_hash, Config};
use sitelore::crawler::JobRegistry;
use sitelore::Progress;
use sitelore::render::{build_http_client, HttpRenderer};
use sitelore::robots::PolicyGuard;
use sitelore::storage::{DocumentStore, SqliteDocumentStore, SqliteStoreProvider};
use sitelore::url::{site_id, SiteScope};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Sitelore: a polite site crawler feeding a retrieval index
///
/// Sitelore crawls every page of one website while respecting robots.txt
/// and crawl delays, extracts each page's main content and stores it in a
/// local SQLite index that can be searched afterwards.
#[derive(Parser, Debug)]
#[command(name = "sitelore")]
#[command(version)]
#[command(about = "A polite site crawler feeding a retrieval index", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(short, long, value_name = "CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl one site into the document store
    Crawl {
        /// Base URL of the site; only URLs under it are followed
        url: String,

        /// Maximum number of pages to visit
        #[arg(long)]
        max_pages: Option<usize>,

        /// Maximum number of concurrent page fetches
        #[arg(long)]
        concurrency: Option<usize>,

        /// Ignore robots.txt
        #[arg(long)]
        override_robots: bool,

        /// Show the effective configuration and robots decision without crawling
        #[arg(long)]
        dry_run: bool,
    },

    /// Search the stored pages of one site
    Search {
        /// Site identifier or any URL of the site
        site: String,

        /// Keywords to look for
        query: String,

        /// Number of hits to return
        #[arg(long, default_value_t = sitelore::storage::DEFAULT_TOP_K)]
        top_k: usize,

        /// Leave out hits scoring below this value (0.0 to 1.0)
        #[arg(long)]
        min_score: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = load(cli.config.as_deref())?;

    match cli.command {
        Command::Crawl {
            url,
            max_pages,
            concurrency,
            override_robots,
            dry_run,
        } => {
            let override_robots = override_robots.then_some(true);
            if dry_run {
                handle_dry_run(&config, &url, override_robots).await
            } else {
                handle_crawl(config, &url, max_pages, concurrency, override_robots).await
            }
        }
        Command::Search {
            site,
            query,
            top_k,
            min_score,
        } => handle_search(&config, &site, &query, top_k, min_score).await,
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sitelore=info,warn"),
            1 => EnvFilter::new("sitelore=debug,info"),
            2 => EnvFilter::new("sitelore=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn load(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        tracing::info!("No configuration file given, using defaults");
        return Ok(Config::default());
    };

    tracing::info!("Loading configuration from: {}", path.display());
    let (config, hash) = load_config_with_hash(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);
    Ok(config)
}

/// Prints the effective configuration and whether the seed may be fetched
async fn handle_dry_run(
    config: &Config,
    url: &str,
    override_robots: Option<bool>,
) -> anyhow::Result<()> {
    let scope = SiteScope::new(url)?;
    let override_robots = override_robots.unwrap_or(config.crawler.override_robots);

    println!("=== Sitelore Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  User agent: {}", config.crawler.user_agent);
    println!("  Max pages: {}", config.crawler.max_pages);
    println!("  Concurrency: {}", config.crawler.concurrency);
    println!("  Default crawl delay: {}ms", config.crawler.crawl_delay_ms);
    println!("  Override robots: {}", override_robots);

    println!("\nExtraction:");
    println!("  Main selectors: {}", config.extraction.main_selectors.join(", "));
    println!(
        "  Excluded selectors: {}",
        config.extraction.excluded_selectors.join(", ")
    );

    println!("\nStore:");
    println!("  Database: {}", config.store.database_path);
    println!("  Collection: {}", scope.site_id());

    let client = build_http_client(
        &config.crawler.user_agent,
        Duration::from_secs(config.crawler.request_timeout_secs),
    )?;
    let guard =
        PolicyGuard::fetch(&client, scope, &config.crawler.user_agent, override_robots).await;
    let seed = guard.scope().seed_url();

    println!("\nRobots:");
    println!(
        "  {} -> {}",
        seed,
        if guard.may_fetch(&seed) { "allowed" } else { "disallowed" }
    );
    match guard.crawl_delay(&config.crawler.user_agent) {
        Some(delay) => println!("  Crawl delay from robots.txt: {:?}", delay),
        None => println!("  No crawl delay in robots.txt"),
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Runs one crawl job to completion, stopping it on Ctrl-C
async fn handle_crawl(
    config: Config,
    url: &str,
    max_pages: Option<usize>,
    concurrency: Option<usize>,
    override_robots: Option<bool>,
) -> anyhow::Result<()> {
    let interval = Duration::from_secs(config.crawler.progress_interval_secs.max(1));
    let renderer = Arc::new(HttpRenderer::new(Duration::from_secs(
        config.crawler.request_timeout_secs,
    )));
    let stores = Arc::new(SqliteStoreProvider::new(
        &config.store.database_path,
        config.store.chunk_size,
        config.store.chunk_overlap,
    ));
    let registry = JobRegistry::new(config, renderer, stores);

    let job = registry
        .start(url, max_pages, concurrency, override_robots)
        .await?;
    tracing::info!("Crawl started for {}", job.site_id());

    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;

    let settled = job.wait_settled();
    tokio::pin!(settled);
    loop {
        tokio::select! {
            state = &mut settled => {
                tracing::info!("Crawl for {} settled: {}", job.site_id(), state);
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("Interrupt received, stopping crawl");
                job.stop().await;
            }
            _ = ticker.tick() => {
                for progress in registry.statuses().await {
                    log_progress(&progress);
                }
            }
        }
    }

    registry.join_all().await;

    let progress = job.progress();
    println!("{}", format_progress(&progress));
    Ok(())
}

fn log_progress(progress: &Progress) {
    tracing::info!(
        "[{}] {}: {} visited, {} remaining",
        progress.site_id,
        progress.state,
        progress.visited_count,
        progress.remaining_count
    );
}

fn format_progress(progress: &Progress) -> String {
    let started = progress
        .last_run_started_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());
    format!(
        "site: {}\nstate: {}\nvisited: {}\nremaining: {}\nlast run started: {}",
        progress.site_id, progress.state, progress.visited_count, progress.remaining_count, started
    )
}

/// Prints the best matching chunks of one site
async fn handle_search(
    config: &Config,
    site: &str,
    query: &str,
    top_k: usize,
    min_score: Option<f64>,
) -> anyhow::Result<()> {
    let collection = if site.contains("://") {
        site_id(site)?
    } else {
        site.to_lowercase()
    };

    let store = SqliteDocumentStore::open(
        Path::new(&config.store.database_path),
        &collection,
        config.store.chunk_size,
        config.store.chunk_overlap,
    )
    .with_context(|| format!("Failed to open {}", config.store.database_path))?;

    let hits = store.search(query, top_k, min_score).await?;
    if hits.is_empty() {
        println!("No results for \"{}\" in {}", query, collection);
    }
    for (rank, hit) in hits.iter().enumerate() {
        println!("{}. {} ({:.2})", rank + 1, hit.title, hit.score);
        println!("   {}", hit.url);
        println!("   {}\n", hit.text.replace('\n', " "));
    }

    store.close().await;
    Ok(())
}
