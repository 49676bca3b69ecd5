// src/scraping/mod.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

pub mod field_parsers;
pub mod job_scraper;
pub mod listing_collector;
pub mod orchestrator;

pub use job_scraper::JobScraper;
pub use listing_collector::{CollectedIds, ListingCollector};
pub use orchestrator::{ScrapeOrchestrator, ScrapeOutcome};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// One scraped listing. `job_id` is unique within a scrape session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub job_link: String,
    pub job_title: String,
    pub company_name: String,
    pub salary: Option<String>,
    pub job_desc: String,
    pub hours_posted: Option<u32>,
    pub applicants_count: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub list_url: String,
    pub detail_url: String,
    pub job_view_url: String,
    pub detail_concurrency: usize,
    pub detail_timeout_secs: u64,
    pub list_timeout_secs: u64,
    pub page_step: u32,
    pub max_pages: u32,
    pub politeness_delay_min_ms: u64,
    pub politeness_delay_max_ms: u64,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            list_url: "https://www.linkedin.com/jobs-guest/jobs/api/seeMoreJobPostings/search"
                .to_string(),
            detail_url: "https://www.linkedin.com/jobs-guest/jobs/api/jobPosting".to_string(),
            job_view_url: "https://www.linkedin.com/jobs/view".to_string(),
            detail_concurrency: 8,
            detail_timeout_secs: 15,
            list_timeout_secs: 10,
            page_step: 25,
            max_pages: 10,
            politeness_delay_min_ms: 500,
            politeness_delay_max_ms: 1500,
        }
    }
}

impl ScrapeConfig {
    pub fn detail_page_url(&self, job_id: &str) -> String {
        format!("{}/{}", self.detail_url.trim_end_matches('/'), job_id)
    }

    pub fn job_view_link(&self, job_id: &str) -> String {
        format!("{}/{}", self.job_view_url.trim_end_matches('/'), job_id)
    }
}

pub(crate) fn build_http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(BROWSER_USER_AGENT)
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .context("Failed to create HTTP client")
}

const CSV_HEADERS: [&str; 8] = [
    "job_id",
    "job_link",
    "job_title",
    "company_name",
    "salary",
    "job_desc",
    "hours_posted",
    "applicants_count",
];

/// Renders the job table as UTF-8 CSV with a header row.
pub fn export_csv(jobs: &[JobRecord]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer
        .write_record(CSV_HEADERS)
        .context("Failed to write CSV header")?;

    for job in jobs {
        writer
            .serialize(job)
            .with_context(|| format!("Failed to write CSV row for job {}", job.job_id))?;
    }

    writer
        .into_inner()
        .map_err(|e| anyhow!("Failed to flush CSV output: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job() -> JobRecord {
        JobRecord {
            job_id: "3901".to_string(),
            job_link: "https://www.linkedin.com/jobs/view/3901".to_string(),
            job_title: "Data Scientist".to_string(),
            company_name: "Acme, Inc.".to_string(),
            salary: None,
            job_desc: "Build models.\nShip them.".to_string(),
            hours_posted: Some(72),
            applicants_count: None,
        }
    }

    #[test]
    fn test_export_csv_writes_header_for_empty_table() {
        let bytes = export_csv(&[]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(
            text.trim_end(),
            "job_id,job_link,job_title,company_name,salary,job_desc,hours_posted,applicants_count"
        );
    }

    #[test]
    fn test_export_csv_reads_back() {
        let bytes = export_csv(&[sample_job()]).unwrap();
        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let rows: Vec<JobRecord> = reader.deserialize().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows, vec![sample_job()]);
    }

    #[test]
    fn test_links_ignore_trailing_slash() {
        let config = ScrapeConfig {
            job_view_url: "https://example.test/jobs/view/".to_string(),
            ..ScrapeConfig::default()
        };
        assert_eq!(
            config.job_view_link("42"),
            "https://example.test/jobs/view/42"
        );
        assert_eq!(
            ScrapeConfig::default().detail_page_url("42"),
            "https://www.linkedin.com/jobs-guest/jobs/api/jobPosting/42"
        );
    }
}
