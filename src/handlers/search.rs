use actix_web::error::{InternalError, UrlencodedError};
use actix_web::{web, HttpRequest, HttpResponse, Result};
use tracing::{error, info, warn};
use validator::Validate;

use crate::models::{ErrorResponse, SearchForm, SearchResponse};
use crate::utils::encode_query;
use crate::AppState;

pub const MAX_RESULTS: i64 = 100;

pub async fn get_json(
    state: web::Data<AppState>,
    form: web::Form<SearchForm>,
) -> Result<HttpResponse> {
    let form = form.into_inner();

    // Validate request
    if let Err(e) = form.validate() {
        let message = if e.field_errors().contains_key("num_results") {
            if form.num_results > MAX_RESULTS {
                "Maximum allowed results is 100"
            } else {
                "Minimum allowed results is 1"
            }
        } else {
            "query must not be empty"
        };
        return Ok(HttpResponse::BadRequest().json(ErrorResponse::new(message)));
    }

    if !state.quota_service.has_capacity().await {
        warn!("Daily quota exhausted, rejecting search");
        return Ok(HttpResponse::Forbidden().json(ErrorResponse::new("you have reached the limit")));
    }

    let query = encode_query(&form.query);
    let items = match state
        .search_service
        .fetch_results(&query, form.num_results as usize)
        .await
    {
        Ok(items) => items,
        Err(e) => {
            error!("Search provider error: {}", e);
            return Ok(HttpResponse::BadRequest().json(ErrorResponse::new("unable to fetch data")));
        }
    };

    let results = state.enrich_service.enrich(&items).await;

    let remaining = match state.quota_service.record_usage(items.len() as u64).await {
        Ok(remaining) => remaining,
        Err(e) => {
            warn!("{}", e);
            e.remaining
        }
    };

    info!(
        requested = form.num_results,
        returned = results.len(),
        remaining,
        "Search served"
    );

    Ok(HttpResponse::Ok().json(SearchResponse {
        limit_left_today: remaining.max(0),
        results,
    }))
}

/// Renders malformed form bodies as JSON errors.
pub fn form_error(err: UrlencodedError, _req: &HttpRequest) -> actix_web::Error {
    let details = err.to_string();
    InternalError::from_response(
        err,
        HttpResponse::BadRequest().json(ErrorResponse::with_details("Invalid form data", details)),
    )
    .into()
}
