// src/web/types.rs

use crate::core::database::{CreditUpdate, UserCreditAccount};
use crate::session::{GateError, SessionStage};
use rocket::form::FromForm;
use rocket::fs::TempFile;
use rocket::http::{ContentType, Status};
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use rocket::serde::{Deserialize, Serialize};
use rocket::{Request, Response};
use uuid::Uuid;

pub type ApiError = (Status, Json<StandardErrorResponse>);
pub type ApiResult<T> = Result<T, ApiError>;

pub struct CsvResponse {
    pub data: Vec<u8>,
    pub filename: String,
}

impl<'r> Responder<'r, 'static> for CsvResponse {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        Response::build()
            .header(ContentType::CSV)
            .raw_header(
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", self.filename),
            )
            .sized_body(self.data.len(), std::io::Cursor::new(self.data))
            .ok()
    }
}

// ===== Requests =====

#[derive(Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct ResumeTextRequest {
    pub text: String,
}

#[derive(FromForm)]
pub struct ResumeUploadForm<'f> {
    pub file: TempFile<'f>,
}

#[derive(Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct ScrapeRequest {
    pub title: String,
    pub location: String,
    #[serde(default = "default_pages")]
    pub pages: u32,
}

fn default_pages() -> u32 {
    1
}

#[derive(Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct AnalyzeRequest {
    pub job_ids: Vec<String>,
}

#[derive(Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct AdminCreditUpdateRequest {
    pub updates: Vec<CreditUpdate>,
}

// ===== Response payloads =====

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct SessionInfo {
    pub session_id: Uuid,
    pub stage: SessionStage,
    pub has_resume: bool,
    pub job_count: usize,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct CreditInfo {
    pub identity: String,
    pub credits_used: i64,
    pub credit_limit: i64,
    pub credits_left: i64,
}

impl From<UserCreditAccount> for CreditInfo {
    fn from(account: UserCreditAccount) -> Self {
        Self {
            credits_left: account.credits_left(),
            identity: account.identity,
            credits_used: account.credits_used,
            credit_limit: account.credit_limit,
        }
    }
}

/// Final event of a scrape stream when rows came back.
#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct ScrapeJobsEvent<'a> {
    pub found: usize,
    pub expected: usize,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<&'a str>,
    pub jobs: &'a [crate::scraping::JobRecord],
}

/// Final event of an analysis stream.
#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct AnalysisSummaryEvent {
    pub successful: usize,
    pub total: usize,
    pub message: String,
    pub credits_updated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits_left: Option<i64>,
}

// ===== Standard envelopes =====

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct TextResponse {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub message: String,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct DataResponse<T> {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub message: String,
    pub data: T,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct ActionResponse {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub message: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_actions: Option<Vec<String>>,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct StandardErrorResponse {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub error: String,
    pub error_code: String,
    pub suggestions: Vec<String>,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde", rename_all = "lowercase")]
pub enum ResponseType {
    Text,
    Data,
    Action,
    Error,
}

impl TextResponse {
    pub fn success(message: String) -> Self {
        Self {
            response_type: ResponseType::Text,
            success: true,
            message,
        }
    }
}

impl<T> DataResponse<T> {
    pub fn success(message: String, data: T) -> Self {
        Self {
            response_type: ResponseType::Data,
            success: true,
            message,
            data,
        }
    }
}

impl ActionResponse {
    pub fn success(message: String, action: String) -> Self {
        Self {
            response_type: ResponseType::Action,
            success: true,
            message,
            action,
            next_actions: None,
        }
    }

    pub fn with_next_actions(mut self, next_actions: Vec<String>) -> Self {
        self.next_actions = Some(next_actions);
        self
    }
}

impl StandardErrorResponse {
    pub fn new(error: String, error_code: String, suggestions: Vec<String>) -> Self {
        Self {
            response_type: ResponseType::Error,
            success: false,
            error,
            error_code,
            suggestions,
        }
    }
}

pub fn api_error(
    status: Status,
    error: impl Into<String>,
    error_code: &str,
    suggestions: &[&str],
) -> ApiError {
    (
        status,
        Json(StandardErrorResponse::new(
            error.into(),
            error_code.to_string(),
            suggestions.iter().map(|s| s.to_string()).collect(),
        )),
    )
}

pub fn internal_error(error: impl Into<String>) -> ApiError {
    api_error(
        Status::InternalServerError,
        error,
        "INTERNAL_ERROR",
        &["Try again in a few moments"],
    )
}

impl From<GateError> for ApiError {
    fn from(e: GateError) -> Self {
        let (status, suggestions): (Status, &[&str]) = match &e {
            GateError::NothingSelected => (Status::BadRequest, &["Pick at least one job"]),
            GateError::TooManySelected { .. } => {
                (Status::BadRequest, &["Deselect jobs until you are within the limit"])
            }
            GateError::ResumeMissing => (
                Status::PreconditionRequired,
                &["Paste your resume or upload a PDF/TXT file first"],
            ),
            GateError::InsufficientCredits { .. } => (
                Status::PaymentRequired,
                &["Select fewer jobs", "Ask an administrator for more credits"],
            ),
            GateError::UnknownJob(_) => (Status::BadRequest, &["Use job ids from the latest search"]),
            GateError::NoJobTable => (Status::Conflict, &["Run a job search first"]),
            GateError::AnalysisInProgress => {
                (Status::Conflict, &["Wait for the running analysis to finish"])
            }
        };
        api_error(status, e.to_string(), e.code(), suggestions)
    }
}
