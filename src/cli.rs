use clap::{Parser, ValueEnum};

/// Jula Scraper - sync a local catalog of jula.no products
#[derive(Parser, Debug, Clone)]
#[command(name = "jula-scraper")]
#[command(author = "Arthur")]
#[command(version = "0.1.0")]
#[command(about = "Discover, scrape and cache jula.no product pages", long_about = None)]
pub struct Args {
    /// Keyword the product URL (or cached record) must match
    #[arg(short, long)]
    pub keyword: Option<String>,

    /// Maximum number of products per run (ignored by --full-index)
    #[arg(short, long)]
    pub max_products: Option<usize>,

    /// Category substring the product URL must contain
    #[arg(short, long)]
    pub category: Option<String>,

    /// Scrape every matching product, no cap
    #[arg(long, default_value_t = false)]
    pub full_index: bool,

    /// Only scrape products that are not cached yet
    #[arg(long, default_value_t = false)]
    pub update_only: bool,

    /// Answer from the cache only, no network access
    #[arg(long, default_value_t = false)]
    pub search_only: bool,

    /// JSON input document ({"keyword": ..., "maxProducts": ...} or a bare string)
    #[arg(long)]
    pub input: Option<String>,

    /// SQLite cache path
    #[arg(long, default_value = "jula_cache.db")]
    pub db: String,

    /// File the run's products are written to
    #[arg(short, long, default_value = "products.json")]
    pub output: String,

    /// Number of async workers
    #[arg(short, long, default_value_t = 4)]
    pub workers: usize,

    /// Request ceiling for product pages
    #[arg(long, default_value_t = 30)]
    pub requests_per_minute: u32,

    /// HTTP request timeout in milliseconds
    #[arg(short = 't', long, default_value_t = 30000)]
    pub timeout: u64,

    /// Site root the sitemaps are read from
    #[arg(long, default_value = "https://www.jula.no")]
    pub base_url: String,

    /// Do not merge scraped products into the cache (update-only always merges)
    #[arg(long, default_value_t = false)]
    pub no_cache_merge: bool,

    /// How product descriptions are extracted
    #[arg(long, value_enum, default_value_t = DescriptionArg::Paragraphs)]
    pub description_strategy: DescriptionArg,

    /// Verbose output
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptionArg {
    /// Join all body paragraphs
    Paragraphs,
    /// First "description" block, truncated
    Summary,
}

pub fn parse_args() -> Args {
    Args::parse()
}
