// src/web/mod.rs

pub mod handlers;
pub mod types;

pub use types::*;

use crate::analysis::{AnalysisOrchestrator, AnalysisWorker};
use crate::auth::{AdminAuth, ClientIdentity};
use crate::core::llm_client::LlmClient;
use crate::core::{ConfigManager, Database};
use crate::scraping::ScrapeOrchestrator;
use crate::session::SessionStore;
use anyhow::Result;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::form::Form;
use rocket::http::{Header, Status};
use rocket::response::stream::EventStream;
use rocket::serde::json::Json;
use rocket::{
    catchers, delete, get, options, patch, post, put, routes, Build, Request, Response, Rocket,
    State,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Everything the handlers share, managed by Rocket.
pub struct ServerState {
    pub config: ConfigManager,
    pub database: Database,
    pub sessions: SessionStore,
    pub scraper: Arc<ScrapeOrchestrator>,
    /// Absent when no LLM API key is configured.
    pub analyzer: Option<Arc<AnalysisOrchestrator>>,
}

impl ServerState {
    pub async fn build(config: ConfigManager) -> Result<Self> {
        let database = Database::new(&config.environment.database_path).await?;
        let scraper = Arc::new(ScrapeOrchestrator::new(&config.environment.scrape)?);

        let llm = &config.environment.llm;
        let analyzer = match LlmClient::new(llm, config.secrets.llm_api_key.clone()) {
            Ok(client) => {
                let worker =
                    AnalysisWorker::new(Arc::new(client), Duration::from_millis(llm.retry_delay_ms));
                Some(Arc::new(AnalysisOrchestrator::new(Arc::new(worker))))
            }
            Err(e) => {
                warn!("Analysis disabled: {}", e);
                None
            }
        };

        let sessions =
            SessionStore::new(Duration::from_secs(config.environment.session_ttl_secs));

        Ok(Self {
            config,
            database,
            sessions,
            scraper,
            analyzer,
        })
    }
}

// CORS Fairing
pub struct Cors;

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info {
            name: "Add CORS headers to responses",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
        response.set_header(Header::new("Access-Control-Allow-Origin", "*"));
        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "POST, GET, PUT, PATCH, DELETE, OPTIONS",
        ));
        response.set_header(Header::new("Access-Control-Allow-Headers", "*"));
        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
    }
}

// Session flow

#[post("/sessions")]
pub async fn create_session(state: &State<ServerState>) -> Json<DataResponse<SessionInfo>> {
    handlers::create_session_handler(state).await
}

#[delete("/sessions/<id>")]
pub async fn reset_session(
    id: &str,
    state: &State<ServerState>,
) -> ApiResult<Json<ActionResponse>> {
    handlers::reset_session_handler(id, state).await
}

#[put("/sessions/<id>/resume", data = "<request>")]
pub async fn set_resume(
    id: &str,
    request: Json<ResumeTextRequest>,
    state: &State<ServerState>,
) -> ApiResult<Json<DataResponse<crate::resume::ResumeText>>> {
    handlers::set_resume_handler(id, request, state).await
}

#[post("/sessions/<id>/resume/upload", data = "<upload>")]
pub async fn upload_resume(
    id: &str,
    upload: Form<ResumeUploadForm<'_>>,
    state: &State<ServerState>,
) -> ApiResult<Json<DataResponse<crate::resume::ResumeText>>> {
    handlers::upload_resume_handler(id, upload, state).await
}

#[post("/sessions/<id>/scrape", data = "<request>")]
pub async fn scrape_jobs(
    id: &str,
    request: Json<ScrapeRequest>,
    state: &State<ServerState>,
) -> ApiResult<EventStream![]> {
    handlers::scrape_handler(id, request, state).await
}

#[get("/sessions/<id>/jobs")]
pub async fn get_jobs(
    id: &str,
    state: &State<ServerState>,
) -> ApiResult<Json<DataResponse<Vec<crate::scraping::JobRecord>>>> {
    handlers::get_jobs_handler(id, state).await
}

#[get("/sessions/<id>/jobs.csv")]
pub async fn export_jobs_csv(id: &str, state: &State<ServerState>) -> ApiResult<CsvResponse> {
    handlers::export_jobs_csv_handler(id, state).await
}

#[post("/sessions/<id>/analyze", data = "<request>")]
pub async fn analyze_jobs(
    id: &str,
    request: Json<AnalyzeRequest>,
    identity: ClientIdentity,
    state: &State<ServerState>,
) -> ApiResult<EventStream![]> {
    handlers::analyze_handler(id, request, identity, state).await
}

#[get("/sessions/<id>/results")]
pub async fn get_results(
    id: &str,
    state: &State<ServerState>,
) -> ApiResult<Json<DataResponse<crate::analysis::AnalysisBatch>>> {
    handlers::get_results_handler(id, state).await
}

// Credits

#[get("/credits")]
pub async fn get_credits(
    identity: ClientIdentity,
    state: &State<ServerState>,
) -> ApiResult<Json<DataResponse<CreditInfo>>> {
    handlers::get_credits_handler(identity, state).await
}

#[get("/admin/credits")]
pub async fn admin_list_credits(
    _admin: AdminAuth,
    state: &State<ServerState>,
) -> ApiResult<Json<DataResponse<Vec<crate::core::database::UserCreditAccount>>>> {
    handlers::admin_list_credits_handler(state).await
}

#[patch("/admin/credits", data = "<request>")]
pub async fn admin_update_credits(
    _admin: AdminAuth,
    request: Json<AdminCreditUpdateRequest>,
    state: &State<ServerState>,
) -> ApiResult<Json<ActionResponse>> {
    handlers::admin_update_credits_handler(request, state).await
}

#[get("/health")]
pub async fn health(state: &State<ServerState>) -> ApiResult<Json<TextResponse>> {
    handlers::health_handler(state).await
}

#[options("/<_..>")]
pub async fn options() -> Status {
    Status::Ok
}

// Error catchers
#[rocket::catch(400)]
pub fn bad_request() -> Json<StandardErrorResponse> {
    Json(StandardErrorResponse::new(
        "Invalid request format".to_string(),
        "BAD_REQUEST".to_string(),
        vec![
            "Check your request JSON format".to_string(),
            "Verify all required fields are present".to_string(),
        ],
    ))
}

#[rocket::catch(401)]
pub fn unauthorized() -> Json<StandardErrorResponse> {
    Json(StandardErrorResponse::new(
        "Authorization required".to_string(),
        "UNAUTHORIZED".to_string(),
        vec!["Send the admin token as a Bearer Authorization header".to_string()],
    ))
}

#[rocket::catch(403)]
pub fn forbidden() -> Json<StandardErrorResponse> {
    Json(StandardErrorResponse::new(
        "Admin access is not configured on this server".to_string(),
        "FORBIDDEN".to_string(),
        vec!["Set JOBLENS_ADMIN_TOKEN and restart the server".to_string()],
    ))
}

#[rocket::catch(422)]
pub fn unprocessable() -> Json<StandardErrorResponse> {
    Json(StandardErrorResponse::new(
        "Request body could not be parsed".to_string(),
        "UNPROCESSABLE_ENTITY".to_string(),
        vec!["Check field names and types against the API".to_string()],
    ))
}

#[rocket::catch(500)]
pub fn internal_server_error() -> Json<StandardErrorResponse> {
    Json(StandardErrorResponse::new(
        "Internal server error".to_string(),
        "INTERNAL_ERROR".to_string(),
        vec![
            "Try again in a few moments".to_string(),
            "Contact support if the problem persists".to_string(),
        ],
    ))
}

pub fn build_rocket(state: ServerState, figment: rocket::figment::Figment) -> Rocket<Build> {
    rocket::custom(figment)
        .attach(Cors)
        .manage(state)
        .register(
            "/api",
            catchers![
                bad_request,
                unauthorized,
                forbidden,
                unprocessable,
                internal_server_error
            ],
        )
        .mount(
            "/api",
            routes![
                create_session,
                reset_session,
                set_resume,
                upload_resume,
                scrape_jobs,
                get_jobs,
                export_jobs_csv,
                analyze_jobs,
                get_results,
                get_credits,
                admin_list_credits,
                admin_update_credits,
                health,
                options,
            ],
        )
}

pub async fn start_web_server(config: ConfigManager, port: u16) -> Result<()> {
    let state = ServerState::build(config).await?;

    info!("Starting Job Lens API server");
    info!(
        "Database: {}",
        state.config.environment.database_path.display()
    );
    info!("Server: http://0.0.0.0:{}", port);

    let mut figment = rocket::Config::figment()
        .merge(("port", port))
        .merge(("address", "0.0.0.0"));
    if !state.config.environment.trust_proxy_header {
        figment = figment.merge(("ip_header", false));
    }

    let _rocket = build_rocket(state, figment).launch().await?;

    Ok(())
}
