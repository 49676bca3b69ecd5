// src/scraping/orchestrator.rs
use super::{JobRecord, JobScraper, ListingCollector, ScrapeConfig};
use crate::events::EventSink;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq)]
pub enum ScrapeOutcome {
    /// Nothing came back. Not an error: the search simply had no usable results.
    NoData { warning: Option<String> },
    Jobs {
        jobs: Vec<JobRecord>,
        /// Unique identifiers collected before the detail phase.
        expected: usize,
        warning: Option<String>,
    },
}

impl ScrapeOutcome {
    pub fn jobs(&self) -> &[JobRecord] {
        match self {
            ScrapeOutcome::NoData { .. } => &[],
            ScrapeOutcome::Jobs { jobs, .. } => jobs,
        }
    }

    pub fn warning(&self) -> Option<&str> {
        match self {
            ScrapeOutcome::NoData { warning } | ScrapeOutcome::Jobs { warning, .. } => {
                warning.as_deref()
            }
        }
    }
}

/// Two-phase scrape: collect ids page by page, then fetch details in parallel.
pub struct ScrapeOrchestrator {
    collector: ListingCollector,
    scraper: Arc<JobScraper>,
    concurrency: usize,
}

impl ScrapeOrchestrator {
    pub fn new(config: &ScrapeConfig) -> Result<Self> {
        Ok(Self::from_parts(
            ListingCollector::new(config)?,
            JobScraper::new(config)?,
            config.detail_concurrency,
        ))
    }

    pub fn from_parts(collector: ListingCollector, scraper: JobScraper, concurrency: usize) -> Self {
        Self {
            collector,
            scraper: Arc::new(scraper),
            concurrency: concurrency.max(1),
        }
    }

    pub async fn run(
        &self,
        title: &str,
        location: &str,
        pages: u32,
        events: &EventSink,
    ) -> ScrapeOutcome {
        info!(title, location, pages, "Starting job scrape");

        let collected = self.collector.collect(title, location, pages, events).await;
        if collected.ids.is_empty() {
            return ScrapeOutcome::NoData {
                warning: collected.warning,
            };
        }

        let expected = collected.ids.len();
        let jobs = self.fetch_all(collected.ids, events).await;

        info!(
            found = jobs.len(),
            expected, "Scrape finished: found {} of {} jobs", jobs.len(), expected
        );

        if jobs.is_empty() {
            ScrapeOutcome::NoData {
                warning: collected.warning,
            }
        } else {
            ScrapeOutcome::Jobs {
                jobs,
                expected,
                warning: collected.warning,
            }
        }
    }

    /// Results arrive in completion order; each record carries its own `job_id`.
    async fn fetch_all(&self, job_ids: Vec<String>, events: &EventSink) -> Vec<JobRecord> {
        let total = job_ids.len();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set = JoinSet::new();

        events.progress(
            0.0,
            format!("Part 2/2: Scraping details for {} jobs...", total),
        );

        for job_id in job_ids {
            let scraper = Arc::clone(&self.scraper);
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                scraper.fetch_job_details(&job_id).await
            });
        }

        let mut jobs = Vec::with_capacity(total);
        let mut completed = 0usize;
        while let Some(joined) = join_set.join_next().await {
            completed += 1;
            match joined {
                Ok(Some(job)) => jobs.push(job),
                Ok(None) => {}
                Err(e) => error!("Detail fetch task panicked: {}", e),
            }
            events.progress(
                completed as f32 / total as f32,
                format!("Part 2/2: Scraping details... Job {}/{}", completed, total),
            );
        }
        jobs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PipelineEvent;
    use std::collections::HashSet;
    use wiremock::matchers::{method, path, path_regex, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn list_page(ids: &[&str]) -> String {
        ids.iter()
            .map(|id| {
                format!(
                    r#"<li><div class="base-card" data-entity-urn="urn:li:jobPosting:{}"></div></li>"#,
                    id
                )
            })
            .collect()
    }

    fn detail_page(title: &str) -> String {
        format!(
            r#"<h2 class="top-card-layout__title">{}</h2><a class="topcard__org-name-link">Acme</a>"#,
            title
        )
    }

    fn config_for(server: &MockServer) -> ScrapeConfig {
        ScrapeConfig {
            list_url: format!("{}/search", server.uri()),
            detail_url: format!("{}/jobPosting", server.uri()),
            politeness_delay_min_ms: 0,
            politeness_delay_max_ms: 0,
            ..ScrapeConfig::default()
        }
    }

    #[tokio::test]
    async fn test_table_excludes_failed_fetches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("start", "0"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(list_page(&["1", "2", "3", "2"])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("start", "25"))
            .respond_with(ResponseTemplate::new(200).set_body_string(list_page(&["4", "5", "1"])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/jobPosting/(2|5)$"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/jobPosting/(1|3|4)$"))
            .respond_with(ResponseTemplate::new(200).set_body_string(detail_page("Engineer")))
            .mount(&server)
            .await;

        let orchestrator = ScrapeOrchestrator::new(&config_for(&server)).unwrap();
        let outcome = orchestrator
            .run("Engineer", "Remote", 2, &EventSink::disabled())
            .await;

        match outcome {
            ScrapeOutcome::Jobs {
                jobs,
                expected,
                warning,
            } => {
                assert_eq!(expected, 5);
                assert_eq!(jobs.len(), expected - 2);
                let ids: HashSet<_> = jobs.iter().map(|job| job.job_id.as_str()).collect();
                assert_eq!(ids, HashSet::from(["1", "3", "4"]));
                assert!(warning.is_none());
            }
            other => panic!("expected jobs, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_ids_is_no_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string(""))
            .mount(&server)
            .await;

        let orchestrator = ScrapeOrchestrator::new(&config_for(&server)).unwrap();
        let outcome = orchestrator
            .run("Nothing", "Nowhere", 3, &EventSink::disabled())
            .await;

        assert_eq!(outcome, ScrapeOutcome::NoData { warning: None });
    }

    #[tokio::test]
    async fn test_all_detail_failures_is_no_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string(list_page(&["1", "2"])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/jobPosting/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let orchestrator = ScrapeOrchestrator::new(&config_for(&server)).unwrap();
        let outcome = orchestrator
            .run("Engineer", "Remote", 1, &EventSink::disabled())
            .await;

        assert!(matches!(outcome, ScrapeOutcome::NoData { .. }));
        assert!(outcome.jobs().is_empty());
    }

    #[tokio::test]
    async fn test_progress_reaches_total() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string(list_page(&["1", "2", "3"])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/jobPosting/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(detail_page("Analyst")))
            .mount(&server)
            .await;

        let (sink, mut rx) = EventSink::channel();
        let orchestrator = ScrapeOrchestrator::new(&config_for(&server)).unwrap();
        let outcome = orchestrator.run("Analyst", "Berlin", 1, &sink).await;
        drop(sink);

        assert_eq!(outcome.jobs().len(), 3);

        let mut last_message = String::new();
        while let Some(event) = rx.recv().await {
            if let PipelineEvent::Progress { message, .. } = event {
                last_message = message;
            }
        }
        assert_eq!(last_message, "Part 2/2: Scraping details... Job 3/3");
    }
}
