use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json as AxumJson},
};

use crate::db;
use crate::AppState;

pub async fn list_ngos(State(state): State<AppState>) -> impl IntoResponse {
    match db::list_ngos(&state.db).await {
        Ok(ngos) => AxumJson(ngos).into_response(),
        Err(e) => {
            tracing::error!("DB Query Error: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn list_restaurants(State(state): State<AppState>) -> impl IntoResponse {
    match db::list_restaurants(&state.db).await {
        Ok(restaurants) => AxumJson(restaurants).into_response(),
        Err(e) => {
            tracing::error!("DB Query Error: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}
