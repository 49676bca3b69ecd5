// src/web/handlers/system_handlers.rs
use crate::web::types::*;
use crate::web::ServerState;

use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use tracing::error;

pub async fn health_handler(state: &State<ServerState>) -> ApiResult<Json<TextResponse>> {
    if let Err(e) = state.database.health_check().await {
        error!("Health check failed: {:#}", e);
        return Err(api_error(
            Status::ServiceUnavailable,
            "Database unavailable",
            "UNHEALTHY",
            &["Check the database file and permissions"],
        ));
    }

    let analysis = if state.analyzer.is_some() {
        "enabled"
    } else {
        "disabled"
    };
    Ok(Json(TextResponse::success(format!("OK (analysis {})", analysis))))
}
