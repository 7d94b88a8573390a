use std::collections::HashSet;

use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use rusqlite::Connection;
use tracing::info;

use seams_db::models::{Location, Metric};
use seams_db::queries::{dms, messages, notifications};
use seams_types::api::{
    DmCreateRequest, DmCreateResponse, DmDetailsResponse, DmIdRequest, DmListResponse,
    DmMessagesQuery, DmQuery, MessagesPage,
};
use seams_types::models::DmSummary;

use crate::checks;
use crate::error::ApiError;
use crate::messages::messages_page;
use crate::middleware::Session;
use crate::users::to_profile;
use crate::{AppState, run_blocking, stats, unix_now};

/// The creator plus `u_ids`. The name is the members' handles, sorted and
/// joined with ", ", fixed at creation.
pub fn create_dm(conn: &Connection, user_id: i64, u_ids: &[i64], now: i64) -> Result<DmCreateResponse, ApiError> {
    let creator = checks::caller(conn, user_id)?;

    let mut seen = HashSet::from([user_id]);
    let mut handles = vec![creator.handle.clone()];
    for &u_id in u_ids {
        let user = checks::active_user(conn, u_id)?;
        if !seen.insert(u_id) {
            return Err(ApiError::input("Duplicate user in DM"));
        }
        handles.push(user.handle);
    }
    handles.sort();
    let name = handles.join(", ");

    let dm_id = dms::insert_dm(conn, &name, user_id)?;
    dms::add_member(conn, dm_id, user_id)?;
    for &u_id in u_ids {
        dms::add_member(conn, dm_id, u_id)?;
        notifications::push_notification(
            conn,
            u_id,
            Location::Dm(dm_id),
            &format!("{} added you to {}", creator.handle, name),
        )?;
    }

    let mut member_ids = vec![user_id];
    member_ids.extend_from_slice(u_ids);
    stats::dm_created(conn, &member_ids, now)?;

    info!("User {} created DM {} ({})", user_id, dm_id, name);
    Ok(DmCreateResponse { dm_id })
}

pub fn list_dms(conn: &Connection, user_id: i64) -> Result<DmListResponse, ApiError> {
    let dms = dms::dms_for_user(conn, user_id)?
        .into_iter()
        .map(|d| DmSummary {
            dm_id: d.id,
            name: d.name,
        })
        .collect();
    Ok(DmListResponse { dms })
}

/// Only the creator, while still a member, may remove a DM.
pub fn remove_dm(conn: &Connection, user_id: i64, dm_id: i64, now: i64) -> Result<(), ApiError> {
    let dm = checks::dm(conn, dm_id)?;
    if dm.creator_id != user_id || dm.creator_left {
        return Err(ApiError::access("Only the DM creator can remove it"));
    }

    let member_ids: Vec<i64> = dms::members(conn, dm_id)?.iter().map(|u| u.id).collect();
    let message_count = messages::count_delivered(conn, Location::Dm(dm_id))?;
    dms::delete_dm(conn, dm_id)?;
    stats::dm_removed(conn, &member_ids, message_count, now)?;

    info!("User {} removed DM {}", user_id, dm_id);
    Ok(())
}

pub fn dm_details(conn: &Connection, user_id: i64, dm_id: i64) -> Result<DmDetailsResponse, ApiError> {
    let dm = checks::dm_member(conn, dm_id, user_id)?;
    Ok(DmDetailsResponse {
        name: dm.name,
        members: dms::members(conn, dm_id)?.iter().map(to_profile).collect(),
    })
}

pub fn leave_dm(conn: &Connection, user_id: i64, dm_id: i64, now: i64) -> Result<(), ApiError> {
    let dm = checks::dm_member(conn, dm_id, user_id)?;
    dms::remove_member(conn, dm_id, user_id)?;
    if dm.creator_id == user_id {
        dms::set_creator_left(conn, dm_id)?;
    }
    stats::left(conn, user_id, Metric::Dms, now)?;
    Ok(())
}

pub fn dm_messages(conn: &Connection, user_id: i64, dm_id: i64, start: i64) -> Result<MessagesPage, ApiError> {
    checks::dm_member(conn, dm_id, user_id)?;
    messages_page(conn, Location::Dm(dm_id), user_id, start)
}

// -- Handlers --

pub async fn create(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<DmCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let res = run_blocking(&state, move |conn| {
        create_dm(conn, session.user_id, &req.u_ids, unix_now())
    })
    .await?;
    Ok(Json(res))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let res = run_blocking(&state, move |conn| list_dms(conn, session.user_id)).await?;
    Ok(Json(res))
}

pub async fn remove(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<DmIdRequest>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |conn| {
        remove_dm(conn, session.user_id, req.dm_id, unix_now())
    })
    .await?;
    Ok(Json(serde_json::json!({})))
}

pub async fn details(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<DmQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let res = run_blocking(&state, move |conn| dm_details(conn, session.user_id, query.dm_id)).await?;
    Ok(Json(res))
}

pub async fn leave(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<DmIdRequest>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |conn| {
        leave_dm(conn, session.user_id, req.dm_id, unix_now())
    })
    .await?;
    Ok(Json(serde_json::json!({})))
}

pub async fn messages(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<DmMessagesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let res = run_blocking(&state, move |conn| {
        dm_messages(conn, session.user_id, query.dm_id, query.start)
    })
    .await?;
    Ok(Json(res))
}
