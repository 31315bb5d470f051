use crate::error::{Result, ScraperError};
use crate::extractor::ProductExtractor;
use crate::product::ProductRecord;
use crate::rate_limit::RateLimiter;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

/// Anything that turns a list of product URLs into records.
///
/// The result order is unspecified.
pub trait PageScraper {
    async fn scrape(&self, urls: Vec<String>) -> Vec<ProductRecord>;
}

/// Worker pool fetching product pages under a requests-per-minute ceiling.
pub struct Crawler {
    client: Client,
    extractor: Arc<ProductExtractor>,
    limiter: Arc<RateLimiter>,
    workers: usize,
    show_progress: bool,
}

impl Crawler {
    pub fn new(
        client: Client,
        extractor: ProductExtractor,
        workers: usize,
        requests_per_minute: u32,
    ) -> Self {
        Crawler {
            client,
            extractor: Arc::new(extractor),
            limiter: Arc::new(RateLimiter::per_minute(requests_per_minute)),
            workers: workers.max(1),
            show_progress: true,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}

impl PageScraper for Crawler {
    async fn scrape(&self, urls: Vec<String>) -> Vec<ProductRecord> {
        if urls.is_empty() {
            return Vec::new();
        }

        let total = urls.len();
        let (tx, rx) = mpsc::channel::<String>(1000);
        let rx = Arc::new(Mutex::new(rx));
        let results = Arc::new(Mutex::new(Vec::with_capacity(total)));
        let progress = self.progress_bar(total);

        let mut handles = vec![];
        for worker_id in 0..self.workers.min(total) {
            let worker = PageWorker {
                id: worker_id,
                client: self.client.clone(),
                extractor: self.extractor.clone(),
                limiter: self.limiter.clone(),
                rx: rx.clone(),
                results: results.clone(),
                progress: progress.clone(),
            };
            handles.push(tokio::spawn(async move { worker.run().await }));
        }

        for url in urls {
            if tx.send(url).await.is_err() {
                break;
            }
        }
        // Closing the channel lets workers exit once the queue is drained
        drop(tx);

        for outcome in futures::future::join_all(handles).await {
            if let Err(e) = outcome {
                error!("Worker panicked: {:?}", e);
            }
        }
        progress.finish_and_clear();

        let records = std::mem::take(&mut *results.lock().await);
        info!("Scraped {} of {} products", records.len(), total);
        records
    }
}

struct PageWorker {
    id: usize,
    client: Client,
    extractor: Arc<ProductExtractor>,
    limiter: Arc<RateLimiter>,
    rx: Arc<Mutex<mpsc::Receiver<String>>>,
    results: Arc<Mutex<Vec<ProductRecord>>>,
    progress: ProgressBar,
}

impl PageWorker {
    async fn run(&self) {
        loop {
            let url = {
                let mut rx = self.rx.lock().await;
                rx.recv().await
            };

            match url {
                Some(url) => {
                    self.process(&url).await;
                    self.progress.inc(1);
                }
                None => break,
            }
        }
    }

    async fn process(&self, url: &str) {
        self.limiter.acquire().await;
        debug!("[Worker {}] Fetching {}", self.id, url);

        let html = match self.fetch_page(url).await {
            Ok(html) => html,
            Err(e) => {
                warn!("Failed: {} - {}", url, e);
                return;
            }
        };

        let record = self.extractor.extract(&html, url);
        debug!(
            "[Worker {}] {} - {} kr",
            self.id,
            record.name.as_deref().unwrap_or("<no name>"),
            record.price.map(|p| p.to_string()).unwrap_or_else(|| "?".to_string())
        );
        self.results.lock().await.push(record);
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(ScraperError::UnexpectedStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.text().await?)
    }
}
