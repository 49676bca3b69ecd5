// src/scraping/job_scraper.rs
use super::field_parsers::{parse_applicant_count, parse_time_posted};
use super::{build_http_client, JobRecord, ScrapeConfig};
use anyhow::{Context, Result};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

const PLACEHOLDER: &str = "N/A";
const SALARY_MARKER: &str = "\u{1F4B0}";

const TITLE_SELECTOR: &str = "h2.top-card-layout__title";
const COMPANY_SELECTOR: &str = "a.topcard__org-name-link";
const DESCRIPTION_SELECTOR: &str = "div.show-more-less-html__markup";
const POSTED_SELECTOR: &str = "span.posted-time-ago__text";
const APPLICANTS_SELECTOR: &str = "span.num-applicants__caption";
const INSIGHT_SELECTOR: &str = "li.job-details-jobs-unified-top-card__job-insight";

/// Fetches one job posting page and turns it into a [`JobRecord`].
pub struct JobScraper {
    client: Client,
    config: ScrapeConfig,
}

impl JobScraper {
    pub fn new(config: &ScrapeConfig) -> Result<Self> {
        let client = build_http_client(config.detail_timeout_secs)?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: &ScrapeConfig) -> Self {
        Self {
            client,
            config: config.clone(),
        }
    }

    /// Returns `None` on any transport failure; never errors past this point.
    pub async fn fetch_job_details(&self, job_id: &str) -> Option<JobRecord> {
        match self.fetch_html(job_id).await {
            Ok(html) => Some(self.parse_job_details(job_id, &html)),
            Err(e) => {
                warn!(job_id = %job_id, "Failed to fetch job details: {:#}", e);
                None
            }
        }
    }

    async fn fetch_html(&self, job_id: &str) -> Result<String> {
        let url = self.config.detail_page_url(job_id);
        debug!("Fetching job post: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to fetch job post")?;

        if !response.status().is_success() {
            anyhow::bail!("HTTP error: {}", response.status());
        }

        response
            .text()
            .await
            .context("Failed to read response body")
    }

    /// Missing selectors fall back per field; a partial page still yields a record.
    pub fn parse_job_details(&self, job_id: &str, html: &str) -> JobRecord {
        let document = Html::parse_document(html);

        JobRecord {
            job_id: job_id.to_string(),
            job_link: self.config.job_view_link(job_id),
            job_title: first_text(&document, TITLE_SELECTOR)
                .unwrap_or_else(|| PLACEHOLDER.to_string()),
            company_name: first_text(&document, COMPANY_SELECTOR)
                .unwrap_or_else(|| PLACEHOLDER.to_string()),
            salary: extract_salary(&document),
            job_desc: first_element(&document, DESCRIPTION_SELECTOR)
                .map(|element| element.text().collect::<Vec<_>>().join("\n").trim().to_string())
                .unwrap_or_default(),
            hours_posted: parse_time_posted(first_text(&document, POSTED_SELECTOR).as_deref()),
            applicants_count: parse_applicant_count(
                first_text(&document, APPLICANTS_SELECTOR).as_deref(),
            ),
        }
    }
}

fn first_element<'a>(document: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(selector).ok()?;
    document.select(&selector).next()
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    first_element(document, selector).map(element_text)
}

/// Salary lives in the first insight bullet carrying the money marker.
fn extract_salary(document: &Html) -> Option<String> {
    let insight_selector = Selector::parse(INSIGHT_SELECTOR).ok()?;
    let span_selector = Selector::parse("span").ok()?;

    let insight = document
        .select(&insight_selector)
        .find(|insight| element_text(*insight).contains(SALARY_MARKER))?;

    insight.select(&span_selector).next().map(element_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FULL_PAGE: &str = r#"
        <html><body>
          <h2 class="top-card-layout__title"> Senior Data Scientist </h2>
          <a class="topcard__org-name-link" href="/company/acme">
            Acme Analytics
          </a>
          <ul>
            <li class="job-details-jobs-unified-top-card__job-insight">Full-time</li>
            <li class="job-details-jobs-unified-top-card__job-insight">&#x1F4B0; <span> $120K/yr - $150K/yr </span></li>
          </ul>
          <span class="posted-time-ago__text">2 weeks ago</span>
          <span class="num-applicants__caption">Over 200 applicants</span>
          <div class="show-more-less-html__markup">
            <p>Build models.</p><p>Ship them &amp; measure.</p>
          </div>
        </body></html>
    "#;

    fn config_for(server: &MockServer) -> ScrapeConfig {
        ScrapeConfig {
            detail_url: format!("{}/jobPosting", server.uri()),
            job_view_url: "https://jobs.example.test/view".to_string(),
            ..ScrapeConfig::default()
        }
    }

    #[test]
    fn test_parse_full_page() {
        let scraper = JobScraper::with_client(Client::new(), &ScrapeConfig::default());
        let job = scraper.parse_job_details("3901", FULL_PAGE);

        assert_eq!(job.job_id, "3901");
        assert_eq!(job.job_link, "https://www.linkedin.com/jobs/view/3901");
        assert_eq!(job.job_title, "Senior Data Scientist");
        assert_eq!(job.company_name, "Acme Analytics");
        assert_eq!(job.salary.as_deref(), Some("$120K/yr - $150K/yr"));
        assert_eq!(job.hours_posted, Some(336));
        assert_eq!(job.applicants_count, Some(200));
        assert!(job.job_desc.starts_with("Build models."));
        assert!(job.job_desc.contains("Ship them & measure."));
    }

    #[test]
    fn test_parse_missing_fields_use_placeholders() {
        let scraper = JobScraper::with_client(Client::new(), &ScrapeConfig::default());
        let job = scraper.parse_job_details("77", "<html><body><p>gone</p></body></html>");

        assert_eq!(job.job_title, "N/A");
        assert_eq!(job.company_name, "N/A");
        assert_eq!(job.job_desc, "");
        assert_eq!(job.salary, None);
        assert_eq!(job.hours_posted, None);
        assert_eq!(job.applicants_count, None);
    }

    #[test]
    fn test_salary_insight_without_span_is_absent() {
        let html = r#"<li class="job-details-jobs-unified-top-card__job-insight">&#x1F4B0; negotiable</li>"#;
        let scraper = JobScraper::with_client(Client::new(), &ScrapeConfig::default());
        assert_eq!(scraper.parse_job_details("1", html).salary, None);
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobPosting/3901"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FULL_PAGE))
            .expect(1)
            .mount(&server)
            .await;

        let scraper = JobScraper::new(&config_for(&server)).unwrap();
        let job = scraper.fetch_job_details("3901").await.unwrap();

        assert_eq!(job.job_title, "Senior Data Scientist");
        assert_eq!(job.job_link, "https://jobs.example.test/view/3901");
    }

    #[tokio::test]
    async fn test_fetch_non_success_status_is_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let scraper = JobScraper::new(&config_for(&server)).unwrap();
        assert!(scraper.fetch_job_details("3901").await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(FULL_PAGE)
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client = Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .unwrap();
        let scraper = JobScraper::with_client(client, &config_for(&server));

        assert!(scraper.fetch_job_details("3901").await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_connection_refused_is_absent() {
        let config = ScrapeConfig {
            detail_url: "http://127.0.0.1:9/jobPosting".to_string(),
            ..ScrapeConfig::default()
        };
        let scraper = JobScraper::new(&config).unwrap();
        assert!(scraper.fetch_job_details("3901").await.is_none());
    }
}
