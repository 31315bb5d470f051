//! Candidate discovery from the site's numbered sitemap documents.

use crate::error::{Result, ScraperError};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const SITEMAP_COUNT: usize = 25;
pub const CATALOG_MARKER: &str = "/catalog/";
pub const SITEMAP_USER_AGENT: &str = "Mozilla/5.0 (compatible; JulaScraper/1.0)";
const SITEMAP_DELAY: Duration = Duration::from_millis(500);

/// Anything that can produce candidate product URLs for a run.
pub trait CandidateSource {
    async fn discover(&self) -> Vec<String>;
}

pub struct SitemapDiscoverer {
    client: Client,
    base_url: String,
    count: usize,
    delay: Duration,
}

impl SitemapDiscoverer {
    pub fn new(client: Client, base_url: &str) -> Self {
        SitemapDiscoverer {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            count: SITEMAP_COUNT,
            delay: SITEMAP_DELAY,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// `{base}/sitemap.1.xml` ..= `{base}/sitemap.25.xml`
    pub fn index_urls(&self) -> Vec<String> {
        (1..=self.count)
            .map(|i| format!("{}/sitemap.{}.xml", self.base_url, i))
            .collect()
    }

    async fn fetch_index(&self, sitemap_url: &str) -> Result<Vec<String>> {
        let response = self
            .client
            .get(sitemap_url)
            .header(reqwest::header::USER_AGENT, SITEMAP_USER_AGENT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ScraperError::UnexpectedStatus {
                status: response.status().as_u16(),
                url: sitemap_url.to_string(),
            });
        }

        let xml = response.text().await?;
        let locations = parse_locations(&xml).map_err(|e| match e {
            ScraperError::MissingUrlset { .. } => ScraperError::MissingUrlset {
                url: sitemap_url.to_string(),
            },
            other => other,
        })?;

        Ok(locations
            .into_iter()
            .filter(|loc| loc.contains(CATALOG_MARKER))
            .collect())
    }
}

impl CandidateSource for SitemapDiscoverer {
    /// Fetch every sitemap in turn. A failing sitemap is skipped, so a fully
    /// unreachable site yields an empty list rather than an error.
    async fn discover(&self) -> Vec<String> {
        let mut all_urls = Vec::new();

        for sitemap_url in self.index_urls() {
            debug!("Fetching {}...", sitemap_url);
            match self.fetch_index(&sitemap_url).await {
                Ok(urls) => {
                    info!("{}: found {} product URLs", sitemap_url, urls.len());
                    all_urls.extend(urls);
                    tokio::time::sleep(self.delay).await;
                }
                Err(ScraperError::UnexpectedStatus { status, .. }) => {
                    debug!("{}: HTTP {}, skipping", sitemap_url, status);
                }
                Err(e) => {
                    warn!("{}: failed: {}", sitemap_url, e);
                }
            }
        }

        info!("Total product URLs found: {}", all_urls.len());
        all_urls
    }
}

/// All `<loc>` values of a `<urlset>` document, in document order.
pub fn parse_locations(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut locations = Vec::new();
    let mut saw_urlset = false;
    let mut in_loc = false;
    let mut current = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"urlset" => saw_urlset = true,
                b"loc" => {
                    in_loc = true;
                    current.clear();
                }
                _ => {}
            },
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"urlset" {
                    saw_urlset = true;
                }
            }
            Event::Text(e) if in_loc => {
                current.push_str(&e.unescape()?);
            }
            Event::CData(e) if in_loc => {
                current.push_str(&String::from_utf8_lossy(e.as_ref()));
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"loc" && in_loc {
                    in_loc = false;
                    let loc = current.trim();
                    if saw_urlset && !loc.is_empty() {
                        locations.push(loc.to_string());
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_urlset {
        return Err(ScraperError::MissingUrlset { url: String::new() });
    }
    Ok(locations)
}
