use axum::{Json, extract::State, response::IntoResponse};

use seams_db::queries;

use crate::error::ApiError;
use crate::{AppState, run_blocking};

/// Wipe every table. Meant for test harnesses driving a disposable server.
pub async fn clear(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, |conn| Ok(queries::clear(conn)?)).await?;
    Ok(Json(serde_json::json!({})))
}

pub async fn health() -> &'static str {
    "ok"
}
