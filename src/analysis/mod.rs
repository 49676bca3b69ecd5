// src/analysis/mod.rs
pub mod latex;
pub mod orchestrator;
pub mod prompts;
pub mod worker;

use crate::scraping::JobRecord;
use serde::{Deserialize, Serialize};

pub use orchestrator::AnalysisOrchestrator;
pub use worker::{AnalysisWorker, MAX_ATTEMPTS};

/// Outcome of analyzing one job against one resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AnalysisResult {
    Success {
        resume_match_score: u8,
        match_analysis: String,
        updated_resume_latex: String,
        cover_letter_latex: String,
    },
    Error {
        /// Human-readable failure reason.
        match_analysis: String,
    },
}

impl AnalysisResult {
    pub fn error(message: impl Into<String>) -> Self {
        AnalysisResult::Error {
            match_analysis: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AnalysisResult::Success { .. })
    }

    pub fn match_analysis(&self) -> &str {
        match self {
            AnalysisResult::Success { match_analysis, .. }
            | AnalysisResult::Error { match_analysis } => match_analysis,
        }
    }
}

/// An analysis result correlated back to the job it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedJob {
    pub job_id: String,
    pub job_title: String,
    pub company_name: String,
    pub analysis: AnalysisResult,
}

impl AnalyzedJob {
    pub fn new(job: &JobRecord, analysis: AnalysisResult) -> Self {
        Self {
            job_id: job.job_id.clone(),
            job_title: job.job_title.clone(),
            company_name: job.company_name.clone(),
            analysis,
        }
    }
}

/// Completed batch, partitioned by status. Order within each list is completion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisBatch {
    pub successful: Vec<AnalyzedJob>,
    pub failed: Vec<AnalyzedJob>,
}

impl AnalysisBatch {
    pub fn push(&mut self, job: AnalyzedJob) {
        if job.analysis.is_success() {
            self.successful.push(job);
        } else {
            self.failed.push(job);
        }
    }

    /// The only figure the credit ledger is charged with.
    pub fn success_count(&self) -> usize {
        self.successful.len()
    }

    pub fn total(&self) -> usize {
        self.successful.len() + self.failed.len()
    }
}
