use axum::{Extension, Json, extract::State, response::IntoResponse};
use rusqlite::Connection;

use seams_db::models::Metric;
use seams_db::queries::{stats, users};
use seams_types::api::{UserStatsResponse, UsersStatsResponse};
use seams_types::models::{
    ChannelsExistPoint, ChannelsJoinedPoint, DmsExistPoint, DmsJoinedPoint, MessagesExistPoint,
    MessagesSentPoint, UserStats, WorkspaceStats,
};

use crate::error::ApiError;
use crate::middleware::Session;
use crate::{AppState, run_blocking};

// -- Events --

pub fn channel_created(conn: &Connection, creator_id: i64, now: i64) -> Result<(), ApiError> {
    stats::record_workspace(conn, Metric::Channels, 1, now)?;
    joined(conn, creator_id, Metric::Channels, now)
}

pub fn dm_created(conn: &Connection, member_ids: &[i64], now: i64) -> Result<(), ApiError> {
    stats::record_workspace(conn, Metric::Dms, 1, now)?;
    for &user_id in member_ids {
        joined(conn, user_id, Metric::Dms, now)?;
    }
    Ok(())
}

/// The DM and `message_count` delivered messages in it no longer exist.
pub fn dm_removed(conn: &Connection, member_ids: &[i64], message_count: i64, now: i64) -> Result<(), ApiError> {
    for &user_id in member_ids {
        left(conn, user_id, Metric::Dms, now)?;
    }
    stats::record_workspace(conn, Metric::Dms, -1, now)?;
    stats::record_workspace(conn, Metric::Messages, -message_count, now)?;
    Ok(())
}

/// `metric` is `Channels` or `Dms`.
pub fn joined(conn: &Connection, user_id: i64, metric: Metric, now: i64) -> Result<(), ApiError> {
    stats::record_user(conn, user_id, metric, 1, now)?;
    Ok(())
}

pub fn left(conn: &Connection, user_id: i64, metric: Metric, now: i64) -> Result<(), ApiError> {
    stats::record_user(conn, user_id, metric, -1, now)?;
    Ok(())
}

pub fn message_sent(conn: &Connection, author_id: i64, time_sent: i64) -> Result<(), ApiError> {
    stats::record_user(conn, author_id, Metric::Messages, 1, time_sent)?;
    stats::record_workspace(conn, Metric::Messages, 1, time_sent)?;
    Ok(())
}

pub fn message_removed(conn: &Connection, now: i64) -> Result<(), ApiError> {
    stats::record_workspace(conn, Metric::Messages, -1, now)?;
    Ok(())
}

// -- Reports --

pub fn involvement(conn: &Connection, user_id: i64) -> Result<UserStats, ApiError> {
    let channels_joined: Vec<_> = stats::user_history(conn, user_id, Metric::Channels)?
        .into_iter()
        .map(|p| ChannelsJoinedPoint {
            num_channels_joined: p.value,
            time_stamp: p.time_stamp,
        })
        .collect();
    let dms_joined: Vec<_> = stats::user_history(conn, user_id, Metric::Dms)?
        .into_iter()
        .map(|p| DmsJoinedPoint {
            num_dms_joined: p.value,
            time_stamp: p.time_stamp,
        })
        .collect();
    let messages_sent: Vec<_> = stats::user_history(conn, user_id, Metric::Messages)?
        .into_iter()
        .map(|p| MessagesSentPoint {
            num_messages_sent: p.value,
            time_stamp: p.time_stamp,
        })
        .collect();

    let numerator = stats::latest_user(conn, user_id, Metric::Channels)?
        + stats::latest_user(conn, user_id, Metric::Dms)?
        + stats::latest_user(conn, user_id, Metric::Messages)?;
    let denominator = stats::latest_workspace(conn, Metric::Channels)?
        + stats::latest_workspace(conn, Metric::Dms)?
        + stats::latest_workspace(conn, Metric::Messages)?;

    let involvement_rate = if denominator <= 0 {
        0.0
    } else {
        (numerator as f64 / denominator as f64).min(1.0)
    };

    Ok(UserStats {
        channels_joined,
        dms_joined,
        messages_sent,
        involvement_rate,
    })
}

pub fn utilization(conn: &Connection) -> Result<WorkspaceStats, ApiError> {
    let channels_exist: Vec<_> = stats::workspace_history(conn, Metric::Channels)?
        .into_iter()
        .map(|p| ChannelsExistPoint {
            num_channels_exist: p.value,
            time_stamp: p.time_stamp,
        })
        .collect();
    let dms_exist: Vec<_> = stats::workspace_history(conn, Metric::Dms)?
        .into_iter()
        .map(|p| DmsExistPoint {
            num_dms_exist: p.value,
            time_stamp: p.time_stamp,
        })
        .collect();
    let messages_exist: Vec<_> = stats::workspace_history(conn, Metric::Messages)?
        .into_iter()
        .map(|p| MessagesExistPoint {
            num_messages_exist: p.value,
            time_stamp: p.time_stamp,
        })
        .collect();

    let total_users = users::active_users(conn)?.len() as f64;
    let involved = users::count_involved_users(conn)? as f64;
    let utilization_rate = if total_users == 0.0 { 0.0 } else { involved / total_users };

    Ok(WorkspaceStats {
        channels_exist,
        dms_exist,
        messages_exist,
        utilization_rate,
    })
}

pub async fn user_stats(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let user_stats = run_blocking(&state, move |conn| involvement(conn, session.user_id)).await?;
    Ok(Json(UserStatsResponse { user_stats }))
}

pub async fn users_stats(
    State(state): State<AppState>,
    Extension(_session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let workspace_stats = run_blocking(&state, utilization).await?;
    Ok(Json(UsersStatsResponse { workspace_stats }))
}
