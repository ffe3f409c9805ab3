use std::time::Instant;

use actix_web::{http::StatusCode, post, web, HttpResponse, ResponseError};
use serde_json::{json, Value};

use crate::{
    domain::{
        search_kind::SearchKind,
        search_request::{SearchBody, SearchRequest},
    },
    error::SearchError,
    services::{SearchOrchestrator, SearchOutcome, SearchStatus},
};

#[post("/jobs")]
async fn search_jobs(
    orchestrator: web::Data<SearchOrchestrator>,
    body: web::Json<SearchBody>,
) -> HttpResponse {
    match run(&orchestrator, SearchKind::Jobs, body.into_inner()).await {
        Ok(outcome) => HttpResponse::Ok().json(jobs_body(outcome)),
        Err(e) => e.error_response(),
    }
}

#[post("/internships")]
async fn search_internships(
    orchestrator: web::Data<SearchOrchestrator>,
    body: web::Json<SearchBody>,
) -> HttpResponse {
    match run(&orchestrator, SearchKind::Internships, body.into_inner()).await {
        Ok(outcome) => HttpResponse::Ok().json(internships_body(outcome)),
        Err(e) => e.error_response(),
    }
}

#[post("/colleges")]
async fn search_colleges(
    orchestrator: web::Data<SearchOrchestrator>,
    body: web::Json<SearchBody>,
) -> HttpResponse {
    let started = Instant::now();

    match run(&orchestrator, SearchKind::Colleges, body.into_inner()).await {
        Ok(outcome) => {
            HttpResponse::Ok().json(outcome.result.external_response.unwrap_or(Value::Null))
        }
        Err(e) if e.status_code() == StatusCode::INTERNAL_SERVER_ERROR => {
            let elapsed = format!("{:.2}s", started.elapsed().as_secs_f64());
            log::error!("[colleges] Error after {}: {}", elapsed, e);

            let mut body = e.body();
            body["elapsed"] = json!(elapsed);
            HttpResponse::InternalServerError().json(body)
        }
        Err(e) => e.error_response(),
    }
}

async fn run(
    orchestrator: &SearchOrchestrator,
    kind: SearchKind,
    body: SearchBody,
) -> Result<SearchOutcome, SearchError> {
    let request = SearchRequest::parse(kind, body)?;
    orchestrator.search(request).await
}

fn jobs_body(outcome: SearchOutcome) -> Value {
    let count = outcome.records().len();
    match outcome.status {
        SearchStatus::Enriched => outcome.result.external_response.unwrap_or(Value::Null),
        SearchStatus::Degraded => json!({
            "message": "Jobs scraped but webhook unavailable",
            "results": outcome.result.scraped,
            "count": count,
        }),
        SearchStatus::Unenriched => json!({
            "results": outcome.result.scraped,
            "count": count,
        }),
    }
}

fn internships_body(outcome: SearchOutcome) -> Value {
    let mut body = json!({
        "success": true,
        "count": outcome.records().len(),
        "data": outcome.result.scraped,
    });

    match outcome.status {
        SearchStatus::Degraded => {
            body["message"] = json!("Internships scraped but webhook unavailable");
        }
        SearchStatus::Enriched => {
            body["response"] = outcome.result.external_response.unwrap_or(Value::Null);
        }
        SearchStatus::Unenriched => {}
    }
    body
}
