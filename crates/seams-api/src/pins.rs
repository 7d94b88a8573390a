use axum::{Extension, Json, extract::State, response::IntoResponse};
use rusqlite::Connection;

use seams_db::queries::messages;
use seams_types::api::MessageIdRequest;

use crate::checks;
use crate::error::ApiError;
use crate::middleware::Session;
use crate::{AppState, run_blocking};

fn set_pin(conn: &Connection, user_id: i64, message_id: i64, pinned: bool) -> Result<(), ApiError> {
    let message = checks::visible_message(conn, message_id, user_id)?;
    if !checks::can_moderate(conn, message.location, user_id)? {
        return Err(ApiError::access("Only owners can pin messages"));
    }
    if message.is_pinned == pinned {
        let state = if pinned { "already pinned" } else { "not pinned" };
        return Err(ApiError::input(format!("Message is {state}")));
    }
    messages::set_pinned(conn, message_id, pinned)?;
    Ok(())
}

pub fn pin_message(conn: &Connection, user_id: i64, message_id: i64) -> Result<(), ApiError> {
    set_pin(conn, user_id, message_id, true)
}

pub fn unpin_message(conn: &Connection, user_id: i64, message_id: i64) -> Result<(), ApiError> {
    set_pin(conn, user_id, message_id, false)
}

pub async fn pin(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<MessageIdRequest>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |conn| pin_message(conn, session.user_id, req.message_id)).await?;
    Ok(Json(serde_json::json!({})))
}

pub async fn unpin(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<MessageIdRequest>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |conn| unpin_message(conn, session.user_id, req.message_id)).await?;
    Ok(Json(serde_json::json!({})))
}
