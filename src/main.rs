mod cli;
mod config;
mod crawler;
mod database;
mod error;
mod extractor;
mod filter;
mod mode;
mod output;
mod patterns;
mod product;
mod rate_limit;
mod sitemap;

use cli::{parse_args, DescriptionArg};
use colored::*;
use config::RunConfig;
use crawler::Crawler;
use database::{CacheStore, SqliteStore};
use extractor::{DescriptionStrategy, ProductExtractor};
use mode::{Mode, ModeController};
use output::JsonFileSink;
use reqwest::Client;
use sitemap::SitemapDiscoverer;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = parse_args();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = RunConfig::from_args(&args)?;
    let mode = config.mode();

    println!("{}", "Jula Scraper v0.1.0".bold());
    println!("==========================");
    println!("Mode: {}", mode.to_string().cyan());
    println!("Keyword: \"{}\"", config.keyword);
    println!("Category: \"{}\"", config.category);
    println!(
        "Max products: {}",
        if config.full_index { "unlimited".to_string() } else { config.max_products.to_string() }
    );
    println!("Cache: {}", args.db);
    println!();

    let client = Client::builder()
        .user_agent(sitemap::SITEMAP_USER_AGENT)
        .timeout(Duration::from_millis(args.timeout))
        .build()?;

    let description = match args.description_strategy {
        DescriptionArg::Paragraphs => DescriptionStrategy::Paragraphs,
        DescriptionArg::Summary => DescriptionStrategy::Summary,
    };

    let discoverer = SitemapDiscoverer::new(client.clone(), &args.base_url);
    let crawler = Crawler::new(
        client,
        ProductExtractor::new(description)?,
        args.workers,
        args.requests_per_minute,
    );
    let cache = CacheStore::new(SqliteStore::open(&args.db)?);
    let sink = JsonFileSink::new(&args.output);

    let mut controller = ModeController::new(discoverer, crawler, cache, sink);

    let start_time = Instant::now();
    let summary = controller.run(&config).await?;
    let elapsed = start_time.elapsed();

    println!();
    println!("==========================");
    println!("{}", "=== DONE ===".green().bold());
    println!("Time elapsed: {:.2}s", elapsed.as_secs_f64());
    if summary.mode != Mode::SearchOnly {
        println!("Catalog URLs discovered: {}", summary.discovered);
        println!("Selected for scraping: {}", summary.selected);
    }
    println!("Products emitted: {}", summary.emitted.to_string().green());
    match &summary.metadata {
        Some(metadata) => println!(
            "Cache: {} products (last updated {})",
            metadata.total_products, metadata.last_updated
        ),
        None => println!("{}", "Cache not updated".yellow()),
    }
    println!("Results saved to: {}", args.output);

    Ok(())
}
