// src/web/handlers/scrape_handlers.rs
use super::session_handlers::{load_session, session_not_found};
use crate::events::EventSink;
use crate::scraping::ScrapeOutcome;
use crate::web::types::*;
use crate::web::ServerState;

use rocket::http::Status;
use rocket::response::stream::{Event, EventStream};
use rocket::serde::json::{json, Json};
use rocket::State;
use std::sync::Arc;
use tracing::{error, info, warn};

const NO_DATA_MESSAGE: &str = "Scraping did not return any data. Please try different keywords.";

/// Streams `progress`/`warning` events, then one `jobs` or `no_data` event.
///
/// Ends with an `error` event instead when the session refused the results.
pub async fn scrape_handler(
    id: &str,
    request: Json<ScrapeRequest>,
    state: &State<ServerState>,
) -> ApiResult<EventStream![]> {
    let session = load_session(id, state).await?;
    session.ensure_idle()?;

    let request = request.into_inner();
    let max_pages = state.config.environment.scrape.max_pages;
    if request.title.trim().is_empty() || request.location.trim().is_empty() {
        return Err(api_error(
            Status::BadRequest,
            "Job title and location are required",
            "INVALID_SEARCH",
            &["Provide both a job title and a location"],
        ));
    }
    if request.pages == 0 || request.pages > max_pages {
        return Err(api_error(
            Status::BadRequest,
            format!("Pages to scan must be between 1 and {}", max_pages),
            "INVALID_PAGE_COUNT",
            &["Scan fewer pages"],
        ));
    }

    info!(
        session_id = %session.id,
        title = %request.title,
        location = %request.location,
        pages = request.pages,
        "Scrape requested"
    );

    let (sink, mut rx) = EventSink::channel();
    let scraper = Arc::clone(&state.scraper);
    let sessions = state.sessions.clone();
    let session_id = session.id;

    // Runs to completion even if the client goes away, so the table still lands in the session
    let task = tokio::spawn(async move {
        let outcome = scraper
            .run(
                request.title.trim(),
                request.location.trim(),
                request.pages,
                &sink,
            )
            .await;

        // An analysis may have started while we scraped
        let rejected = match sessions
            .update(session_id, |session| {
                session.store_scrape(outcome.jobs().to_vec())
            })
            .await
        {
            Some(Ok(())) => None,
            Some(Err(e)) => {
                warn!(%session_id, "Scrape results discarded: {}", e);
                Some(ApiError::from(e).1.into_inner())
            }
            None => {
                warn!(%session_id, "Scrape results discarded: session is gone");
                Some(session_not_found(&session_id.to_string()).1.into_inner())
            }
        };
        (outcome, rejected)
    });

    Ok(EventStream! {
        while let Some(event) = rx.recv().await {
            yield Event::json(&event).event(event.kind());
        }

        match task.await {
            Ok((_, Some(rejected))) => {
                yield Event::json(&rejected).event("error");
            }
            Ok((ScrapeOutcome::Jobs { jobs, expected, warning }, None)) => {
                let payload = ScrapeJobsEvent {
                    found: jobs.len(),
                    expected,
                    message: format!("Found {} of {} jobs", jobs.len(), expected),
                    warning: warning.as_deref(),
                    jobs: &jobs,
                };
                yield Event::json(&payload).event("jobs");
            }
            Ok((ScrapeOutcome::NoData { warning }, None)) => {
                yield Event::json(&json!({
                    "message": NO_DATA_MESSAGE,
                    "warning": warning,
                }))
                .event("no_data");
            }
            Err(e) => {
                error!("Scrape task failed: {}", e);
                yield Event::json(&StandardErrorResponse::new(
                    "Scrape failed unexpectedly".to_string(),
                    "SCRAPE_FAILED".to_string(),
                    vec!["Try the search again".to_string()],
                ))
                .event("error");
            }
        }
    })
}
