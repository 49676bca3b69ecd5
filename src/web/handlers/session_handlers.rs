// src/web/handlers/session_handlers.rs
use crate::analysis::AnalysisBatch;
use crate::resume::{self, ResumeText};
use crate::scraping::{export_csv, JobRecord};
use crate::session::Session;
use crate::web::types::*;
use crate::web::ServerState;

use rocket::form::Form;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use tracing::{error, info};
use uuid::Uuid;

pub(crate) fn parse_session_id(id: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(id).map_err(|_| session_not_found(id))
}

pub(crate) fn session_not_found(id: &str) -> ApiError {
    api_error(
        Status::NotFound,
        format!("Session not found: {}", id),
        "SESSION_NOT_FOUND",
        &["Create a session with POST /api/sessions"],
    )
}

pub(crate) async fn load_session(id: &str, state: &ServerState) -> ApiResult<Session> {
    let session_id = parse_session_id(id)?;
    state
        .sessions
        .get(session_id)
        .await
        .ok_or_else(|| session_not_found(id))
}

fn session_info(session: &Session) -> SessionInfo {
    SessionInfo {
        session_id: session.id,
        stage: session.stage,
        has_resume: session.has_resume(),
        job_count: session.jobs.len(),
    }
}

pub async fn create_session_handler(state: &State<ServerState>) -> Json<DataResponse<SessionInfo>> {
    let session = state.sessions.create().await;
    info!(session_id = %session.id, "Created session");
    Json(DataResponse::success(
        "Session created".to_string(),
        session_info(&session),
    ))
}

pub async fn reset_session_handler(
    id: &str,
    state: &State<ServerState>,
) -> ApiResult<Json<ActionResponse>> {
    let session_id = parse_session_id(id)?;
    state
        .sessions
        .update(session_id, |session| {
            session.ensure_idle()?;
            session.reset();
            Ok::<_, crate::session::GateError>(())
        })
        .await
        .ok_or_else(|| session_not_found(id))??;

    info!(%session_id, "Session reset for a new search");
    Ok(Json(
        ActionResponse::success("Ready for a new search".to_string(), "reset".to_string())
            .with_next_actions(vec!["scrape".to_string()]),
    ))
}

pub async fn set_resume_handler(
    id: &str,
    request: Json<ResumeTextRequest>,
    state: &State<ServerState>,
) -> ApiResult<Json<DataResponse<ResumeText>>> {
    let session_id = parse_session_id(id)?;
    let resume = resume::from_pasted(&request.text).map_err(|e| {
        api_error(
            Status::BadRequest,
            e.to_string(),
            "EMPTY_RESUME",
            &["Paste the full text of your resume"],
        )
    })?;

    store_resume(id, session_id, resume, state).await
}

pub async fn upload_resume_handler(
    id: &str,
    mut upload: Form<ResumeUploadForm<'_>>,
    state: &State<ServerState>,
) -> ApiResult<Json<DataResponse<ResumeText>>> {
    let session_id = parse_session_id(id)?;
    let declared_pdf = upload.file.content_type().map_or(false, |ct| ct.is_pdf());

    let temp_path = std::env::temp_dir().join(format!("resume_upload_{}", Uuid::new_v4()));
    upload.file.persist_to(&temp_path).await.map_err(|e| {
        error!("Failed to save uploaded resume: {}", e);
        internal_error("Failed to save uploaded file")
    })?;

    let bytes = tokio::fs::read(&temp_path).await;
    let _ = tokio::fs::remove_file(&temp_path).await;
    let bytes = bytes.map_err(|e| {
        error!("Failed to read uploaded resume: {}", e);
        internal_error("Failed to read uploaded file")
    })?;

    let resume = tokio::task::spawn_blocking(move || resume::from_upload(&bytes, declared_pdf))
        .await
        .map_err(|e| internal_error(format!("Resume extraction failed: {}", e)))?
        .map_err(|e| {
            api_error(
                Status::BadRequest,
                format!("{:#}", e),
                "INVALID_RESUME",
                &[
                    "Upload a PDF or a UTF-8 text file",
                    "Paste the resume text instead",
                ],
            )
        })?;

    store_resume(id, session_id, resume, state).await
}

async fn store_resume(
    id: &str,
    session_id: Uuid,
    resume: ResumeText,
    state: &ServerState,
) -> ApiResult<Json<DataResponse<ResumeText>>> {
    let text = resume.text.clone();
    state
        .sessions
        .update(session_id, |session| session.set_resume(text))
        .await
        .ok_or_else(|| session_not_found(id))??;

    info!(
        %session_id,
        source = ?resume.source,
        characters = resume.characters,
        failed_pages = resume.page_errors.len(),
        "Resume loaded"
    );

    let message = if resume.page_errors.is_empty() {
        "Resume loaded and ready for analysis".to_string()
    } else {
        format!(
            "Resume loaded, but {} page(s) could not be read",
            resume.page_errors.len()
        )
    };
    Ok(Json(DataResponse::success(message, resume)))
}

pub async fn get_jobs_handler(
    id: &str,
    state: &State<ServerState>,
) -> ApiResult<Json<DataResponse<Vec<JobRecord>>>> {
    let session = load_session(id, state).await?;
    Ok(Json(DataResponse::success(
        format!("{} jobs", session.jobs.len()),
        session.jobs,
    )))
}

pub async fn export_jobs_csv_handler(
    id: &str,
    state: &State<ServerState>,
) -> ApiResult<CsvResponse> {
    let session = load_session(id, state).await?;
    if session.jobs.is_empty() {
        return Err(api_error(
            Status::NotFound,
            "No job table to export",
            "NO_JOB_TABLE",
            &["Run a job search first"],
        ));
    }

    let data = export_csv(&session.jobs).map_err(|e| {
        error!("CSV export failed: {:#}", e);
        internal_error("Failed to build CSV export")
    })?;

    Ok(CsvResponse {
        data,
        filename: "linkedin_jobs.csv".to_string(),
    })
}

pub async fn get_results_handler(
    id: &str,
    state: &State<ServerState>,
) -> ApiResult<Json<DataResponse<AnalysisBatch>>> {
    let session = load_session(id, state).await?;
    let results = session.results;
    Ok(Json(DataResponse::success(
        format!(
            "{} jobs were analyzed successfully, {} could not be analyzed",
            results.successful.len(),
            results.failed.len()
        ),
        results,
    )))
}
