use actix_web::{get, web, HttpResponse, ResponseError};
use serde_json::json;

use crate::{
    domain::{search_kind::SearchKind, search_request::parse_user_id},
    services::SearchOrchestrator,
};

#[get("/{kind}/{user_id}")]
async fn saved_results(
    orchestrator: web::Data<SearchOrchestrator>,
    path: web::Path<(String, String)>,
) -> HttpResponse {
    let (kind, user_id) = path.into_inner();

    let Ok(kind) = kind.parse::<SearchKind>() else {
        return HttpResponse::NotFound().json(json!({
            "error": format!("Unknown search kind: {}", kind)
        }));
    };
    let user_id = match parse_user_id(Some(user_id)) {
        Ok(user_id) => user_id,
        Err(e) => return e.error_response(),
    };

    match orchestrator.saved_result(&user_id, kind).await {
        Ok(Some(result)) => HttpResponse::Ok().json(result),
        Ok(None) => {
            log::info!("No saved {} results for user {}", kind, user_id);
            HttpResponse::NotFound().json(json!({
                "error": format!("No saved {} results found", kind)
            }))
        }
        Err(e) => {
            log::error!("Failed to load {} results for user {}: {}", kind, user_id, e);
            e.error_response()
        }
    }
}
