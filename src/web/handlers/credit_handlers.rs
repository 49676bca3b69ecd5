// src/web/handlers/credit_handlers.rs
use crate::auth::ClientIdentity;
use crate::core::database::{CreditRepository, CreditService, UserCreditAccount};
use crate::web::types::*;
use crate::web::ServerState;

use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use tracing::{error, info};

pub async fn get_credits_handler(
    identity: ClientIdentity,
    state: &State<ServerState>,
) -> ApiResult<Json<DataResponse<CreditInfo>>> {
    let credits = &state.config.environment.credits;
    let account = CreditService::new(state.database.pool(), credits)
        .account_for(identity.as_str())
        .await
        .map_err(|e| {
            error!(identity = identity.as_str(), "Failed to load credits: {:#}", e);
            internal_error("Failed to load your credit balance")
        })?;

    let info = CreditInfo::from(account);
    Ok(Json(DataResponse::success(
        format!(
            "Analysis Credits: {} / {}. Initial search is free. Analysis costs 1 credit per job.",
            info.credits_left, info.credit_limit
        ),
        info,
    )))
}

pub async fn admin_list_credits_handler(
    state: &State<ServerState>,
) -> ApiResult<Json<DataResponse<Vec<UserCreditAccount>>>> {
    let accounts = CreditRepository::new(state.database.pool())
        .list_all()
        .await
        .map_err(|e| {
            error!("Failed to list credit accounts: {:#}", e);
            internal_error("Failed to list credit accounts")
        })?;

    Ok(Json(DataResponse::success(
        format!("{} accounts", accounts.len()),
        accounts,
    )))
}

pub async fn admin_update_credits_handler(
    request: Json<AdminCreditUpdateRequest>,
    state: &State<ServerState>,
) -> ApiResult<Json<ActionResponse>> {
    let updates = request.into_inner().updates;
    if updates.is_empty() {
        return Err(api_error(
            Status::BadRequest,
            "No credit changes supplied",
            "EMPTY_UPDATE",
            &["Send at least one row in `updates`"],
        ));
    }

    let saved = CreditRepository::new(state.database.pool())
        .batch_update(&updates)
        .await
        .map_err(|e| {
            api_error(
                Status::UnprocessableEntity,
                format!("{:#}", e),
                "CREDIT_UPDATE_REJECTED",
                &["Credits and limits must be non-negative integers"],
            )
        })?;

    info!(saved, "Admin credit changes saved");
    Ok(Json(ActionResponse::success(
        format!("Saved credit changes for {} users", saved),
        "credits_saved".to_string(),
    )))
}
