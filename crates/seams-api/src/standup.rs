use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use rusqlite::Connection;
use tracing::info;

use seams_db::queries::standups;
use seams_types::api::{
    ChannelQuery, StandupActiveResponse, StandupSendRequest, StandupStartRequest, StandupStartResponse,
};

use crate::checks::{self, MAX_MESSAGE_LEN, char_len};
use crate::error::ApiError;
use crate::middleware::Session;
use crate::{AppState, run_blocking, unix_now};

/// Open a standup lasting `length` seconds. The collected lines are posted
/// by the scheduler once it finishes.
pub fn start_standup(
    conn: &Connection,
    user_id: i64,
    channel_id: i64,
    length: i64,
    now: i64,
) -> Result<StandupStartResponse, ApiError> {
    checks::channel_member(conn, channel_id, user_id)?;
    if length < 0 {
        return Err(ApiError::input("Standup length cannot be negative"));
    }
    if standups::standup_for_channel(conn, channel_id)?.is_some() {
        return Err(ApiError::input("A standup is already running in this channel"));
    }

    let time_finish = now + length;
    standups::insert_standup(conn, channel_id, user_id, time_finish)?;
    info!("User {} started a standup in channel {} until {}", user_id, channel_id, time_finish);
    Ok(StandupStartResponse { time_finish })
}

pub fn standup_active(conn: &Connection, user_id: i64, channel_id: i64) -> Result<StandupActiveResponse, ApiError> {
    checks::channel_member(conn, channel_id, user_id)?;
    let standup = standups::standup_for_channel(conn, channel_id)?;
    Ok(StandupActiveResponse {
        is_active: standup.is_some(),
        time_finish: standup.map(|s| s.time_finish),
    })
}

pub fn standup_send(conn: &Connection, user_id: i64, channel_id: i64, message: &str) -> Result<(), ApiError> {
    checks::channel_member(conn, channel_id, user_id)?;
    if char_len(message) > MAX_MESSAGE_LEN {
        return Err(ApiError::input("Message is over 1000 characters"));
    }
    if standups::standup_for_channel(conn, channel_id)?.is_none() {
        return Err(ApiError::input("No standup is running in this channel"));
    }

    let sender = checks::caller(conn, user_id)?;
    standups::append_line(conn, channel_id, &format!("{}: {}", sender.handle, message))?;
    Ok(())
}

pub async fn start(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<StandupStartRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let res = run_blocking(&state, move |conn| {
        start_standup(conn, session.user_id, req.channel_id, req.length, unix_now())
    })
    .await?;
    Ok(Json(res))
}

pub async fn active(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<ChannelQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let res = run_blocking(&state, move |conn| {
        standup_active(conn, session.user_id, query.channel_id)
    })
    .await?;
    Ok(Json(res))
}

pub async fn send(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<StandupSendRequest>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |conn| {
        standup_send(conn, session.user_id, req.channel_id, &req.message)
    })
    .await?;
    Ok(Json(serde_json::json!({})))
}
