use axum::{Extension, Json, extract::State, response::IntoResponse};
use rusqlite::Connection;

use seams_db::queries::notifications;
use seams_types::api::NotificationsResponse;
use seams_types::models::Notification;

use crate::error::ApiError;
use crate::middleware::Session;
use crate::{AppState, run_blocking};

const NOTIFICATION_LIMIT: i64 = 20;

/// The 20 most recent, newest first.
pub fn recent_notifications(conn: &Connection, user_id: i64) -> Result<NotificationsResponse, ApiError> {
    let notifications = notifications::recent(conn, user_id, NOTIFICATION_LIMIT)?
        .into_iter()
        .map(|n| Notification {
            channel_id: n.channel_id,
            dm_id: n.dm_id,
            notification_message: n.message,
        })
        .collect();
    Ok(NotificationsResponse { notifications })
}

pub async fn get(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let res = run_blocking(&state, move |conn| recent_notifications(conn, session.user_id)).await?;
    Ok(Json(res))
}
