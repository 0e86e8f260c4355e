use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json as AxumJson},
};
use serde::Deserialize;
use serde_json::json;

use crate::db;
use crate::db::models::DonationInput;
use crate::emails;
use crate::routing::{Decision, RoutingError};
use crate::AppState;

pub async fn create_donation(
    State(state): State<AppState>,
    Json(input): Json<DonationInput>,
) -> impl IntoResponse {
    if input.quantity <= 0 {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            "Quantity must be a positive number of meals",
        )
            .into_response();
    }

    match state.engine.submit_donation(input).await {
        Ok(submission) => (
            StatusCode::CREATED,
            AxumJson(json!({
                "message": submission.message,
                "notificationAttempted": submission.notification_attempted,
                "request": submission.record,
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Donation submit error: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn list_donations(State(state): State<AppState>) -> impl IntoResponse {
    match db::list_requests(&state.db).await {
        Ok(requests) => AxumJson(requests).into_response(),
        Err(e) => {
            tracing::error!("DB Query Error: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct RespondParams {
    pub decision: String,
    #[serde(rename = "requestId")]
    pub request_id: i64,
}

/// Accept/decline endpoint. These URLs ride inside the NGO emails, hence
/// GET; the reply is a human-readable confirmation page.
pub async fn respond(
    State(state): State<AppState>,
    Query(params): Query<RespondParams>,
) -> impl IntoResponse {
    let Some(decision) = Decision::parse(&params.decision) else {
        return (
            StatusCode::BAD_REQUEST,
            "decision must be 'accept' or 'decline'",
        )
            .into_response();
    };

    match state.engine.record_response(params.request_id, decision).await {
        Ok(outcome) => {
            Html(emails::response_page(outcome.message(), &state.base_url)).into_response()
        }
        Err(RoutingError::NotFound) => {
            (StatusCode::NOT_FOUND, "Request not found").into_response()
        }
        Err(e) => {
            tracing::error!("Response handling error: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}
