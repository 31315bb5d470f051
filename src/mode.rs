use crate::config::RunConfig;
use crate::crawler::PageScraper;
use crate::database::{CacheMetadata, CacheStore, KeyValueStore, SearchQuery};
use crate::error::Result;
use crate::filter::{exclude_cached, UrlFilter};
use crate::output::OutputSink;
use crate::sitemap::CandidateSource;
use std::fmt;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    SearchOnly,
    FullIndex,
    UpdateOnly,
    FilteredScrape,
}

impl Mode {
    /// `searchOnly` wins outright. Otherwise the label follows `updateOnly`,
    /// then `fullIndex`; both flags still apply through [`SelectionPlan`].
    pub fn select(config: &RunConfig) -> Mode {
        if config.search_only {
            Mode::SearchOnly
        } else if config.update_only {
            Mode::UpdateOnly
        } else if config.full_index {
            Mode::FullIndex
        } else {
            Mode::FilteredScrape
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::SearchOnly => "search-only",
            Mode::FullIndex => "full-index",
            Mode::UpdateOnly => "update-only",
            Mode::FilteredScrape => "filtered-scrape",
        };
        f.write_str(name)
    }
}

/// How a scraping run selects and persists, derived from the flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionPlan {
    pub cap: bool,
    pub skip_cached: bool,
    pub merge: bool,
}

impl SelectionPlan {
    pub fn from_config(config: &RunConfig) -> Self {
        SelectionPlan {
            cap: !config.full_index,
            skip_cached: config.update_only,
            merge: config.update_only || config.save_to_cache,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub mode: Mode,
    pub discovered: usize,
    pub selected: usize,
    pub emitted: usize,
    pub metadata: Option<CacheMetadata>,
}

/// Wires discovery, filtering, scraping, the cache and the output sink
/// together for one run.
pub struct ModeController<D, P, S, O>
where
    D: CandidateSource,
    P: PageScraper,
    S: KeyValueStore,
    O: OutputSink,
{
    discoverer: D,
    scraper: P,
    cache: CacheStore<S>,
    sink: O,
}

impl<D, P, S, O> ModeController<D, P, S, O>
where
    D: CandidateSource,
    P: PageScraper,
    S: KeyValueStore,
    O: OutputSink,
{
    pub fn new(discoverer: D, scraper: P, cache: CacheStore<S>, sink: O) -> Self {
        ModeController {
            discoverer,
            scraper,
            cache,
            sink,
        }
    }

    #[cfg(test)]
    pub fn cache(&self) -> &CacheStore<S> {
        &self.cache
    }

    #[cfg(test)]
    pub fn sink(&self) -> &O {
        &self.sink
    }

    pub async fn run(&mut self, config: &RunConfig) -> Result<RunSummary> {
        let mode = config.mode();
        info!(
            "Starting {} run - keyword: \"{}\", category: \"{}\", max: {}",
            mode, config.keyword, config.category, config.max_products
        );

        match mode {
            Mode::SearchOnly => self.search(config),
            _ => self.scrape(mode, config).await,
        }
    }

    fn search(&mut self, config: &RunConfig) -> Result<RunSummary> {
        let results = self.cache.search(&SearchQuery {
            keyword: config.keyword.clone(),
            category: config.category.clone(),
            max_results: config.max_products,
        })?;
        info!("Found {} cached products", results.len());
        self.sink.push(&results)?;

        Ok(RunSummary {
            mode: Mode::SearchOnly,
            discovered: 0,
            selected: 0,
            emitted: results.len(),
            metadata: self.cache.get_metadata()?,
        })
    }

    async fn scrape(&mut self, mode: Mode, config: &RunConfig) -> Result<RunSummary> {
        let plan = SelectionPlan::from_config(config);

        let candidates = self.discoverer.discover().await;
        let filter = UrlFilter::new(
            &config.keyword,
            &config.category,
            config.max_products,
            !plan.cap,
        );
        let mut selected = filter.select(&candidates);

        if plan.skip_cached {
            let cached = self.cache.cached_urls()?;
            let before = selected.len();
            selected = exclude_cached(selected, &cached);
            info!("Skipping {} already cached products", before - selected.len());
        }
        info!("Will scrape {} products", selected.len());

        let selected_count = selected.len();
        let records = self.scraper.scrape(selected).await;
        self.sink.push(&records)?;

        let metadata = if plan.merge {
            Some(self.cache.merge(&records)?)
        } else {
            None
        };

        Ok(RunSummary {
            mode,
            discovered: candidates.len(),
            selected: selected_count,
            emitted: records.len(),
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::SqliteStore;
    use crate::output::MemorySink;
    use crate::product::ProductRecord;
    use std::cell::{Cell, RefCell};

    struct StubSource {
        urls: Vec<String>,
        calls: Cell<usize>,
    }

    impl CandidateSource for StubSource {
        async fn discover(&self) -> Vec<String> {
            self.calls.set(self.calls.get() + 1);
            self.urls.clone()
        }
    }

    #[derive(Default)]
    struct StubScraper {
        requested: RefCell<Vec<String>>,
    }

    impl PageScraper for StubScraper {
        async fn scrape(&self, urls: Vec<String>) -> Vec<ProductRecord> {
            self.requested.borrow_mut().extend(urls.iter().cloned());
            // Reverse to mimic unordered completion
            urls.iter()
                .rev()
                .map(|url| {
                    let mut record = ProductRecord::empty(url);
                    record.name = url.rsplit('/').nth(1).map(str::to_string);
                    record
                })
                .collect()
        }
    }

    type TestController = ModeController<StubSource, StubScraper, SqliteStore, MemorySink>;

    fn catalog() -> Vec<String> {
        [
            "veggfeste-a",
            "veggfester-b",
            "stativ-c",
            "veggfeste-d",
            "veggfeste-e",
            "veggfesteer-f",
            "veggfeste-g",
            "veggfeste-h",
        ]
        .iter()
        .map(|slug| format!("https://www.jula.no/catalog/tv/{}/", slug))
        .collect()
    }

    fn controller() -> TestController {
        ModeController::new(
            StubSource {
                urls: catalog(),
                calls: Cell::new(0),
            },
            StubScraper::default(),
            CacheStore::new(SqliteStore::open_in_memory().unwrap()),
            MemorySink::default(),
        )
    }

    fn config(keyword: &str, max: usize) -> RunConfig {
        RunConfig {
            keyword: keyword.to_string(),
            max_products: max,
            ..RunConfig::default()
        }
    }

    #[test]
    fn test_mode_precedence() {
        let mut c = config("", 5);
        assert_eq!(c.mode(), Mode::FilteredScrape);
        c.full_index = true;
        assert_eq!(c.mode(), Mode::FullIndex);
        c.update_only = true;
        assert_eq!(c.mode(), Mode::UpdateOnly);
        c.search_only = true;
        assert_eq!(c.mode(), Mode::SearchOnly);
    }

    #[tokio::test]
    async fn test_filtered_scrape_caps_and_merges() {
        let mut controller = controller();
        let summary = controller.run(&config("veggfeste", 5)).await.unwrap();

        assert_eq!(summary.mode, Mode::FilteredScrape);
        assert_eq!(summary.discovered, 8);
        assert_eq!(summary.selected, 5);
        assert_eq!(summary.emitted, 5);

        let requested = controller.scraper.requested.borrow().clone();
        assert!(requested.iter().all(|url| catalog().contains(url)));
        assert!(!requested.iter().any(|url| url.contains("stativ")));
        assert_eq!(controller.sink().batches[0].len(), 5);
        assert_eq!(controller.cache().get_all_records().unwrap().len(), 5);
        assert_eq!(summary.metadata.unwrap().total_products, 5);
    }

    #[tokio::test]
    async fn test_filtered_scrape_without_merge() {
        let mut controller = controller();
        let mut c = config("veggfeste", 2);
        c.save_to_cache = false;
        let summary = controller.run(&c).await.unwrap();

        assert_eq!(summary.emitted, 2);
        assert!(summary.metadata.is_none());
        assert!(controller.cache().get_all_records().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_full_index_has_no_cap() {
        let mut controller = controller();
        let mut c = config("veggfeste", 2);
        c.full_index = true;
        let summary = controller.run(&c).await.unwrap();

        assert_eq!(summary.mode, Mode::FullIndex);
        assert_eq!(summary.selected, 7);
    }

    #[tokio::test]
    async fn test_update_only_skips_cached_and_always_merges() {
        let mut controller = controller();
        controller
            .cache()
            .merge(&[
                ProductRecord::empty("https://www.jula.no/catalog/tv/veggfeste-a/"),
                ProductRecord::empty("https://www.jula.no/catalog/tv/veggfester-b/"),
            ])
            .unwrap();

        let mut c = config("veggfeste", 4);
        c.update_only = true;
        c.save_to_cache = false;
        let summary = controller.run(&c).await.unwrap();

        assert_eq!(summary.mode, Mode::UpdateOnly);
        // Cap applies before cached URLs are removed
        assert_eq!(summary.selected, 2);
        let requested = controller.scraper.requested.borrow().clone();
        assert_eq!(
            requested,
            vec![
                "https://www.jula.no/catalog/tv/veggfeste-d/".to_string(),
                "https://www.jula.no/catalog/tv/veggfeste-e/".to_string(),
            ]
        );
        assert_eq!(summary.metadata.unwrap().total_products, 4);
    }

    #[tokio::test]
    async fn test_full_index_with_update_only() {
        let mut controller = controller();
        controller
            .cache()
            .merge(&[ProductRecord::empty("https://www.jula.no/catalog/tv/veggfeste-a/")])
            .unwrap();

        let mut c = config("veggfeste", 1);
        c.full_index = true;
        c.update_only = true;
        let summary = controller.run(&c).await.unwrap();

        assert_eq!(summary.selected, 6);
        assert!(!controller
            .scraper
            .requested
            .borrow()
            .contains(&"https://www.jula.no/catalog/tv/veggfeste-a/".to_string()));
    }

    #[tokio::test]
    async fn test_search_only_uses_cache_without_discovery() {
        let mut controller = controller();
        let mut mount = ProductRecord::empty("https://www.jula.no/catalog/tv/veggfeste-a/");
        mount.name = Some("Veggfeste for TV".to_string());
        controller.cache().merge(&[mount]).unwrap();

        let mut c = config("veggfeste", 10);
        c.search_only = true;
        let summary = controller.run(&c).await.unwrap();
        assert_eq!(summary.mode, Mode::SearchOnly);
        assert_eq!(summary.emitted, 1);

        let mut c = config("hagemøbler", 10);
        c.search_only = true;
        let summary = controller.run(&c).await.unwrap();
        assert_eq!(summary.emitted, 0);
        assert!(controller.sink().batches[1].is_empty());

        assert_eq!(controller.discoverer.calls.get(), 0);
        assert!(controller.scraper.requested.borrow().is_empty());
    }
}
