// src/web/handlers/analysis_handlers.rs
use super::session_handlers::{parse_session_id, session_not_found};
use crate::auth::ClientIdentity;
use crate::core::database::{CreditService, UserCreditAccount};
use crate::events::EventSink;
use crate::web::types::*;
use crate::web::ServerState;

use rocket::http::Status;
use rocket::response::stream::{Event, EventStream};
use rocket::serde::json::Json;
use rocket::State;
use tracing::{error, info};

struct AnalysisOutcome {
    successful: usize,
    total: usize,
    credits: anyhow::Result<Option<UserCreditAccount>>,
}

/// Gate check, then `result` events in completion order, then `summary`.
///
/// A failed ledger update adds a `credit_error` event; results already sent stand.
pub async fn analyze_handler(
    id: &str,
    request: Json<AnalyzeRequest>,
    identity: ClientIdentity,
    state: &State<ServerState>,
) -> ApiResult<EventStream![]> {
    let session_id = parse_session_id(id)?;
    let analyzer = state.analyzer.clone().ok_or_else(|| {
        api_error(
            Status::ServiceUnavailable,
            "Analysis is not available: no LLM API key configured",
            "LLM_NOT_CONFIGURED",
            &["Set GROQ_API_KEY and restart the server"],
        )
    })?;

    let credit_config = state.config.environment.credits.clone();
    let account = CreditService::new(state.database.pool(), &credit_config)
        .account_for(identity.as_str())
        .await
        .map_err(|e| {
            error!(identity = identity.as_str(), "Failed to load credits: {:#}", e);
            internal_error("Failed to load your credit balance")
        })?;

    let (jobs, resume_text) = state
        .sessions
        .update(session_id, |session| {
            let jobs = session.begin_analysis(
                &request.job_ids,
                credit_config.max_batch,
                account.credits_left(),
            )?;
            let resume_text = session.resume_text().unwrap_or_default().to_string();
            Ok::<_, crate::session::GateError>((jobs, resume_text))
        })
        .await
        .ok_or_else(|| session_not_found(id))??;

    info!(
        %session_id,
        identity = identity.as_str(),
        jobs = jobs.len(),
        credits_left = account.credits_left(),
        "Analysis batch accepted"
    );

    let (sink, mut rx) = EventSink::channel();
    let sessions = state.sessions.clone();
    let database = state.database.clone();
    let identity = identity.0;

    // Credits are charged here, not in the stream, so a dropped client still pays only for successes
    let task = tokio::spawn(async move {
        let batch = analyzer.run(&jobs, &resume_text, &sink).await;
        drop(sink);

        let successful = batch.success_count();
        let total = batch.total();
        sessions
            .update(session_id, |session| session.finish_analysis(batch))
            .await;

        let credits = CreditService::new(database.pool(), &credit_config)
            .record_successes(&identity, successful)
            .await;
        if let Err(e) = &credits {
            error!(identity = %identity, successful, "Credit update failed: {:#}", e);
        }

        AnalysisOutcome {
            successful,
            total,
            credits,
        }
    });

    Ok(EventStream! {
        while let Some(event) = rx.recv().await {
            yield Event::json(&event).event(event.kind());
        }

        match task.await {
            Ok(outcome) => {
                let (credits_updated, credits_left, credit_error) = match &outcome.credits {
                    Ok(Some(account)) => (true, Some(account.credits_left()), None),
                    Ok(None) => (false, None, None),
                    Err(e) => (false, None, Some(format!("{:#}", e))),
                };

                yield Event::json(&AnalysisSummaryEvent {
                    successful: outcome.successful,
                    total: outcome.total,
                    message: format!(
                        "{} of {} jobs analyzed successfully.",
                        outcome.successful, outcome.total
                    ),
                    credits_updated,
                    credits_left,
                })
                .event("summary");

                if let Some(detail) = credit_error {
                    yield Event::json(&StandardErrorResponse::new(
                        format!("Your results are saved, but credits could not be updated: {}", detail),
                        "CREDIT_UPDATE_FAILED".to_string(),
                        vec!["Contact an administrator to reconcile your credits".to_string()],
                    ))
                    .event("credit_error");
                }
            }
            Err(e) => {
                error!("Analysis task failed: {}", e);
                yield Event::json(&StandardErrorResponse::new(
                    "Analysis failed unexpectedly".to_string(),
                    "ANALYSIS_FAILED".to_string(),
                    vec!["Start a new search and try again".to_string()],
                ))
                .event("error");
            }
        }
    })
}
