// src/session.rs
//! Per-user flow: search, pick jobs, analyze, review results.

use crate::analysis::AnalysisBatch;
use crate::scraping::JobRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Idle time after which a session is dropped.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(2 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStage {
    Search,
    Selection,
    Analyzing,
    Results,
}

/// Reasons the next action is refused. Earlier results are never touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("Select at least one job to analyze.")]
    NothingSelected,

    #[error("Please select a maximum of {max} jobs.")]
    TooManySelected { selected: usize, max: usize },

    #[error("You must provide your resume before analyzing.")]
    ResumeMissing,

    #[error("You selected {selected} jobs, but only have {credits_left} credits.")]
    InsufficientCredits { selected: usize, credits_left: i64 },

    #[error("Job {0} is not in the current search results.")]
    UnknownJob(String),

    #[error("There are no search results to select from.")]
    NoJobTable,

    #[error("An analysis is already running for this session.")]
    AnalysisInProgress,
}

impl GateError {
    pub fn code(&self) -> &'static str {
        match self {
            GateError::NothingSelected => "NOTHING_SELECTED",
            GateError::TooManySelected { .. } => "TOO_MANY_SELECTED",
            GateError::ResumeMissing => "RESUME_MISSING",
            GateError::InsufficientCredits { .. } => "INSUFFICIENT_CREDITS",
            GateError::UnknownJob(_) => "UNKNOWN_JOB",
            GateError::NoJobTable => "NO_JOB_TABLE",
            GateError::AnalysisInProgress => "ANALYSIS_IN_PROGRESS",
        }
    }
}

/// Preconditions for an analysis batch, checked in this order.
pub fn check_analysis_gate(
    selected: usize,
    max_batch: usize,
    has_resume: bool,
    credits_left: i64,
) -> Result<(), GateError> {
    if selected == 0 {
        return Err(GateError::NothingSelected);
    }
    if selected > max_batch {
        return Err(GateError::TooManySelected {
            selected,
            max: max_batch,
        });
    }
    if !has_resume {
        return Err(GateError::ResumeMissing);
    }
    if i64::try_from(selected).map_or(true, |n| n > credits_left) {
        return Err(GateError::InsufficientCredits {
            selected,
            credits_left: credits_left.max(0),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub stage: SessionStage,
    #[serde(skip)]
    resume_text: Option<String>,
    pub jobs: Vec<JobRecord>,
    pub results: AnalysisBatch,
}

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            last_active: now,
            stage: SessionStage::Search,
            resume_text: None,
            jobs: Vec::new(),
            results: AnalysisBatch::default(),
        }
    }

    pub fn resume_text(&self) -> Option<&str> {
        self.resume_text.as_deref()
    }

    pub fn has_resume(&self) -> bool {
        self.resume_text.is_some()
    }

    /// Start New Search: drops the table and all results, keeps the resume.
    pub fn reset(&mut self) {
        self.jobs.clear();
        self.results = AnalysisBatch::default();
        self.stage = SessionStage::Search;
    }

    /// A new resume invalidates everything derived from the old one.
    pub fn set_resume(&mut self, text: String) -> Result<(), GateError> {
        if self.stage == SessionStage::Analyzing {
            return Err(GateError::AnalysisInProgress);
        }
        self.reset();
        let text = text.trim();
        self.resume_text = (!text.is_empty()).then(|| text.to_string());
        Ok(())
    }

    pub fn ensure_idle(&self) -> Result<(), GateError> {
        if self.stage == SessionStage::Analyzing {
            return Err(GateError::AnalysisInProgress);
        }
        Ok(())
    }

    /// Replaces whatever an earlier search left behind.
    pub fn store_scrape(&mut self, jobs: Vec<JobRecord>) -> Result<(), GateError> {
        self.ensure_idle()?;
        self.reset();
        if !jobs.is_empty() {
            self.jobs = jobs;
            self.stage = SessionStage::Selection;
        }
        Ok(())
    }

    /// Runs the gate and moves into the analyzing stage.
    ///
    /// Returns the selected records in request order, duplicates removed.
    pub fn begin_analysis(
        &mut self,
        job_ids: &[String],
        max_batch: usize,
        credits_left: i64,
    ) -> Result<Vec<JobRecord>, GateError> {
        self.ensure_idle()?;
        if self.stage != SessionStage::Selection {
            return Err(GateError::NoJobTable);
        }

        let mut seen = HashSet::new();
        let unique: Vec<&String> = job_ids.iter().filter(|id| seen.insert(*id)).collect();

        check_analysis_gate(unique.len(), max_batch, self.has_resume(), credits_left)?;

        let selected = unique
            .into_iter()
            .map(|id| {
                self.jobs
                    .iter()
                    .find(|job| &job.job_id == id)
                    .cloned()
                    .ok_or_else(|| GateError::UnknownJob(id.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.jobs.clear();
        self.results = AnalysisBatch::default();
        self.stage = SessionStage::Analyzing;
        Ok(selected)
    }

    pub fn finish_analysis(&mut self, batch: AnalysisBatch) {
        self.results = batch;
        self.stage = SessionStage::Results;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory sessions shared across request handlers.
///
/// Sessions idle for longer than the TTL are swept whenever a new one is
/// created. A session mid-analysis is never swept.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
    ttl: chrono::Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
        }
    }

    pub async fn create(&self) -> Session {
        let session = Session::new();
        let mut sessions = self.sessions.write().await;
        Self::sweep(&mut sessions, self.ttl);
        sessions.insert(session.id, session.clone());
        session
    }

    pub async fn get(&self, id: Uuid) -> Option<Session> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Runs `f` under the write lock. `None` when the session does not exist.
    pub async fn update<R>(&self, id: Uuid, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        self.sessions.write().await.get_mut(&id).map(|session| {
            session.last_active = Utc::now();
            f(session)
        })
    }

    /// Drops idle sessions and returns how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        Self::sweep(&mut *self.sessions.write().await, self.ttl)
    }

    fn sweep(sessions: &mut HashMap<Uuid, Session>, ttl: chrono::Duration) -> usize {
        let Some(cutoff) = Utc::now().checked_sub_signed(ttl) else {
            return 0;
        };
        let before = sessions.len();
        sessions.retain(|_, s| s.stage == SessionStage::Analyzing || s.last_active > cutoff);
        let removed = before - sessions.len();
        if removed > 0 {
            debug!("Dropped {} idle sessions", removed);
        }
        removed
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}
