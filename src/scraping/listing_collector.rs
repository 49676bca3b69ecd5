// src/scraping/listing_collector.rs
use super::{build_http_client, ScrapeConfig};
use crate::events::EventSink;
use anyhow::{Context, Result};
use rand::Rng;
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, warn};

/// Ordered, de-duplicated job identifiers from the search result pages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectedIds {
    pub ids: Vec<String>,
    pub pages_fetched: u32,
    /// Set when a page request failed and collection stopped early.
    pub warning: Option<String>,
}

/// What one results page contained.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingPage {
    pub items: usize,
    pub job_ids: Vec<String>,
}

pub struct ListingCollector {
    client: Client,
    config: ScrapeConfig,
}

impl ListingCollector {
    pub fn new(config: &ScrapeConfig) -> Result<Self> {
        let client = build_http_client(config.list_timeout_secs)?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: &ScrapeConfig) -> Self {
        Self {
            client,
            config: config.clone(),
        }
    }

    /// Walks result pages until one is empty, a request fails, or the budget runs out.
    pub async fn collect(
        &self,
        title: &str,
        location: &str,
        page_budget: u32,
        events: &EventSink,
    ) -> CollectedIds {
        let mut collected = CollectedIds::default();
        let mut seen = HashSet::new();
        let mut start = 0u32;

        while collected.pages_fetched < page_budget {
            let page = match self.fetch_page(title, location, start).await {
                Ok(html) => parse_listing_page(&html),
                Err(e) => {
                    let message = format!(
                        "Failed to fetch a job list page. Stopping ID collection. Error: {:#}",
                        e
                    );
                    warn!(start, "{}", message);
                    events.warning(message.clone());
                    collected.warning = Some(message);
                    break;
                }
            };

            if page.items == 0 {
                info!(start, "Empty results page, stopping ID collection");
                break;
            }

            for job_id in page.job_ids {
                if seen.insert(job_id.clone()) {
                    collected.ids.push(job_id);
                }
            }

            collected.pages_fetched += 1;
            start += self.config.page_step;

            events.progress(
                collected.pages_fetched as f32 / page_budget as f32,
                format!(
                    "Part 1/2: Collecting Job IDs... Found {} IDs across {} page(s).",
                    collected.ids.len(),
                    collected.pages_fetched
                ),
            );

            if collected.pages_fetched < page_budget {
                tokio::time::sleep(self.politeness_delay()).await;
            }
        }

        info!(
            ids = collected.ids.len(),
            pages = collected.pages_fetched,
            "Finished collecting job IDs"
        );
        collected
    }

    async fn fetch_page(&self, title: &str, location: &str, start: u32) -> Result<String> {
        let start = start.to_string();
        let response = self
            .client
            .get(&self.config.list_url)
            .query(&[
                ("keywords", title),
                ("location", location),
                ("start", start.as_str()),
            ])
            .send()
            .await
            .context("Failed to fetch job list page")?;

        if !response.status().is_success() {
            anyhow::bail!("HTTP error: {}", response.status());
        }

        response
            .text()
            .await
            .context("Failed to read job list page")
    }

    fn politeness_delay(&self) -> Duration {
        let low = self.config.politeness_delay_min_ms;
        let high = self.config.politeness_delay_max_ms.max(low);
        Duration::from_millis(rand::thread_rng().gen_range(low..=high))
    }
}

/// Pulls job ids out of `data-entity-urn="urn:li:jobPosting:<id>"` on each list item.
pub fn parse_listing_page(html: &str) -> ListingPage {
    let fragment = Html::parse_fragment(html);
    let (Ok(item_selector), Ok(card_selector)) =
        (Selector::parse("li"), Selector::parse("div.base-card"))
    else {
        return ListingPage::default();
    };

    let mut page = ListingPage::default();
    for item in fragment.select(&item_selector) {
        page.items += 1;

        let job_id = item
            .select(&card_selector)
            .next()
            .and_then(|card| card.value().attr("data-entity-urn"))
            .and_then(|urn| urn.rsplit(':').next())
            .unwrap_or_default();

        if !job_id.is_empty() {
            page.job_ids.push(job_id.to_string());
        }
    }
    page
}
