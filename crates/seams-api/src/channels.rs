use axum::{Extension, Json, extract::State, response::IntoResponse};
use rusqlite::Connection;
use tracing::info;

use seams_db::models::ChannelRow;
use seams_db::queries::channels;
use seams_types::api::{ChannelsCreateRequest, ChannelsCreateResponse, ChannelsListResponse};
use seams_types::models::ChannelSummary;

use crate::checks::char_len;
use crate::error::ApiError;
use crate::middleware::Session;
use crate::{AppState, run_blocking, stats, unix_now};

const MAX_CHANNEL_NAME_LEN: usize = 20;

fn summarize(rows: Vec<ChannelRow>) -> ChannelsListResponse {
    ChannelsListResponse {
        channels: rows
            .into_iter()
            .map(|c| ChannelSummary {
                channel_id: c.id,
                name: c.name,
            })
            .collect(),
    }
}

/// The creator becomes the first owner and member.
pub fn create_channel(
    conn: &Connection,
    user_id: i64,
    name: &str,
    is_public: bool,
    now: i64,
) -> Result<ChannelsCreateResponse, ApiError> {
    let len = char_len(name);
    if len < 1 || len > MAX_CHANNEL_NAME_LEN {
        return Err(ApiError::input("Channel name must be between 1 and 20 characters"));
    }

    let channel_id = channels::insert_channel(conn, name, is_public)?;
    channels::add_member(conn, channel_id, user_id, true)?;
    stats::channel_created(conn, user_id, now)?;

    info!("User {} created channel {} ({})", user_id, channel_id, name);
    Ok(ChannelsCreateResponse { channel_id })
}

pub fn list_channels(conn: &Connection, user_id: i64) -> Result<ChannelsListResponse, ApiError> {
    Ok(summarize(channels::channels_for_user(conn, user_id)?))
}

/// Every channel, private ones included.
pub fn list_all_channels(conn: &Connection) -> Result<ChannelsListResponse, ApiError> {
    Ok(summarize(channels::all_channels(conn)?))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<ChannelsCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let res = run_blocking(&state, move |conn| {
        create_channel(conn, session.user_id, &req.name, req.is_public, unix_now())
    })
    .await?;
    Ok(Json(res))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let res = run_blocking(&state, move |conn| list_channels(conn, session.user_id)).await?;
    Ok(Json(res))
}

pub async fn listall(
    State(state): State<AppState>,
    Extension(_session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let res = run_blocking(&state, list_all_channels).await?;
    Ok(Json(res))
}
