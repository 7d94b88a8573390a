use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use rusqlite::Connection;
use tracing::info;

use seams_db::models::{Location, Metric};
use seams_db::queries::{channels, notifications, standups};
use seams_types::api::{
    ChannelDetailsResponse, ChannelIdRequest, ChannelMessagesQuery, ChannelQuery,
    ChannelUserRequest, MessagesPage,
};

use crate::checks;
use crate::error::ApiError;
use crate::messages::messages_page;
use crate::middleware::Session;
use crate::users::to_profile;
use crate::{AppState, run_blocking, stats, unix_now};

pub fn channel_details(conn: &Connection, user_id: i64, channel_id: i64) -> Result<ChannelDetailsResponse, ApiError> {
    let channel = checks::channel_member(conn, channel_id, user_id)?;
    Ok(ChannelDetailsResponse {
        name: channel.name,
        is_public: channel.is_public,
        owner_members: channels::owners(conn, channel_id)?.iter().map(to_profile).collect(),
        all_members: channels::members(conn, channel_id)?.iter().map(to_profile).collect(),
    })
}

/// Private channels only admit global owners.
pub fn join_channel(conn: &Connection, user_id: i64, channel_id: i64, now: i64) -> Result<(), ApiError> {
    let channel = checks::channel(conn, channel_id)?;
    if channels::is_member(conn, channel_id, user_id)? {
        return Err(ApiError::input("Already a member of this channel"));
    }
    if !channel.is_public && !checks::caller(conn, user_id)?.is_global_owner {
        return Err(ApiError::access("This channel is private"));
    }

    channels::add_member(conn, channel_id, user_id, false)?;
    stats::joined(conn, user_id, Metric::Channels, now)?;
    Ok(())
}

pub fn invite_to_channel(
    conn: &Connection,
    user_id: i64,
    channel_id: i64,
    u_id: i64,
    now: i64,
) -> Result<(), ApiError> {
    let channel = checks::channel_member(conn, channel_id, user_id)?;
    checks::active_user(conn, u_id)?;
    if channels::is_member(conn, channel_id, u_id)? {
        return Err(ApiError::input("User is already a member"));
    }

    channels::add_member(conn, channel_id, u_id, false)?;
    stats::joined(conn, u_id, Metric::Channels, now)?;

    let inviter = checks::caller(conn, user_id)?;
    notifications::push_notification(
        conn,
        u_id,
        Location::Channel(channel_id),
        &format!("{} added you to {}", inviter.handle, channel.name),
    )?;
    Ok(())
}

pub fn channel_messages(conn: &Connection, user_id: i64, channel_id: i64, start: i64) -> Result<MessagesPage, ApiError> {
    checks::channel_member(conn, channel_id, user_id)?;
    messages_page(conn, Location::Channel(channel_id), user_id, start)
}

/// Leaving also gives up ownership. The starter of a running standup must
/// stay until it ends.
pub fn leave_channel(conn: &Connection, user_id: i64, channel_id: i64, now: i64) -> Result<(), ApiError> {
    checks::channel_member(conn, channel_id, user_id)?;
    if let Some(standup) = standups::standup_for_channel(conn, channel_id)? {
        if standup.starter_id == user_id {
            return Err(ApiError::input("You started the active standup in this channel"));
        }
    }

    channels::remove_member(conn, channel_id, user_id)?;
    stats::left(conn, user_id, Metric::Channels, now)?;
    Ok(())
}

fn require_owner_permissions(conn: &Connection, channel_id: i64, user_id: i64) -> Result<(), ApiError> {
    if !checks::has_owner_permissions(conn, channel_id, user_id)? {
        return Err(ApiError::access("You do not have owner permissions in this channel"));
    }
    Ok(())
}

pub fn add_owner(conn: &Connection, user_id: i64, channel_id: i64, u_id: i64) -> Result<(), ApiError> {
    checks::channel(conn, channel_id)?;
    checks::active_user(conn, u_id)?;
    require_owner_permissions(conn, channel_id, user_id)?;

    if !channels::is_member(conn, channel_id, u_id)? {
        return Err(ApiError::input("User is not a member of the channel"));
    }
    if channels::is_owner(conn, channel_id, u_id)? {
        return Err(ApiError::input("User is already an owner"));
    }

    channels::set_owner(conn, channel_id, u_id, true)?;
    info!("User {} made {} an owner of channel {}", user_id, u_id, channel_id);
    Ok(())
}

pub fn remove_owner(conn: &Connection, user_id: i64, channel_id: i64, u_id: i64) -> Result<(), ApiError> {
    checks::channel(conn, channel_id)?;
    checks::active_user(conn, u_id)?;
    require_owner_permissions(conn, channel_id, user_id)?;

    if !channels::is_owner(conn, channel_id, u_id)? {
        return Err(ApiError::input("User is not an owner"));
    }
    if channels::count_owners(conn, channel_id)? == 1 {
        return Err(ApiError::input("User is the only owner"));
    }

    channels::set_owner(conn, channel_id, u_id, false)?;
    info!("User {} removed {} as owner of channel {}", user_id, u_id, channel_id);
    Ok(())
}

// -- Handlers --

pub async fn details(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<ChannelQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let res = run_blocking(&state, move |conn| {
        channel_details(conn, session.user_id, query.channel_id)
    })
    .await?;
    Ok(Json(res))
}

pub async fn join(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<ChannelIdRequest>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |conn| {
        join_channel(conn, session.user_id, req.channel_id, unix_now())
    })
    .await?;
    Ok(Json(serde_json::json!({})))
}

pub async fn invite(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<ChannelUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |conn| {
        invite_to_channel(conn, session.user_id, req.channel_id, req.u_id, unix_now())
    })
    .await?;
    Ok(Json(serde_json::json!({})))
}

pub async fn messages(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<ChannelMessagesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let res = run_blocking(&state, move |conn| {
        channel_messages(conn, session.user_id, query.channel_id, query.start)
    })
    .await?;
    Ok(Json(res))
}

pub async fn leave(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<ChannelIdRequest>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |conn| {
        leave_channel(conn, session.user_id, req.channel_id, unix_now())
    })
    .await?;
    Ok(Json(serde_json::json!({})))
}

pub async fn addowner(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<ChannelUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |conn| {
        add_owner(conn, session.user_id, req.channel_id, req.u_id)
    })
    .await?;
    Ok(Json(serde_json::json!({})))
}

pub async fn removeowner(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<ChannelUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |conn| {
        remove_owner(conn, session.user_id, req.channel_id, req.u_id)
    })
    .await?;
    Ok(Json(serde_json::json!({})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::create_channel;
    use crate::testing::{Fixture, register};

    #[test]
    fn private_channels_admit_only_global_owners() {
        let fx = Fixture::new();
        fx.run(|conn| {
            let global = register(conn, "boss@seams.io", "Boss", "Person");
            let ann = register(conn, "a@seams.io", "Ann", "Lee");
            let bob = register(conn, "b@seams.io", "Bob", "Ray");
            let secret = create_channel(conn, ann, "secret", false, 1)?.channel_id;

            assert!(matches!(join_channel(conn, bob, secret, 2), Err(ApiError::Access(_))));
            join_channel(conn, global, secret, 2)?;
            assert!(matches!(join_channel(conn, global, secret, 2), Err(ApiError::Input(_))));
            assert!(matches!(join_channel(conn, bob, 999, 2), Err(ApiError::Input(_))));
            Ok(())
        });
    }

    #[test]
    fn invite_checks_in_order() {
        let fx = Fixture::new();
        fx.run(|conn| {
            let ann = register(conn, "a@seams.io", "Ann", "Lee");
            let bob = register(conn, "b@seams.io", "Bob", "Ray");
            let cat = register(conn, "c@seams.io", "Cat", "Day");
            let channel = create_channel(conn, ann, "general", true, 1)?.channel_id;

            assert!(matches!(invite_to_channel(conn, ann, 42, bob, 2), Err(ApiError::Input(_))));
            assert!(matches!(invite_to_channel(conn, bob, channel, cat, 2), Err(ApiError::Access(_))));
            assert!(matches!(invite_to_channel(conn, ann, channel, 999, 2), Err(ApiError::Input(_))));

            invite_to_channel(conn, ann, channel, bob, 2)?;
            assert!(matches!(invite_to_channel(conn, ann, channel, bob, 2), Err(ApiError::Input(_))));

            let notes = notifications::recent(conn, bob, 20)?;
            assert_eq!(notes[0].message, "annlee added you to general");
            assert_eq!(notes[0].channel_id, channel);
            Ok(())
        });
    }

    #[test]
    fn details_lists_members_in_join_order() {
        let fx = Fixture::new();
        fx.run(|conn| {
            let ann = register(conn, "a@seams.io", "Ann", "Lee");
            let bob = register(conn, "b@seams.io", "Bob", "Ray");
            let channel = create_channel(conn, ann, "general", true, 1)?.channel_id;

            assert!(matches!(channel_details(conn, bob, channel), Err(ApiError::Access(_))));
            join_channel(conn, bob, channel, 2)?;

            let details = channel_details(conn, bob, channel)?;
            assert_eq!(details.name, "general");
            assert!(details.is_public);
            assert_eq!(details.owner_members.len(), 1);
            assert_eq!(details.owner_members[0].u_id, ann);
            let ids: Vec<i64> = details.all_members.iter().map(|u| u.u_id).collect();
            assert_eq!(ids, vec![ann, bob]);
            assert_eq!(details.all_members[1].handle_str, "bobray");
            Ok(())
        });
    }

    #[test]
    fn owner_management() {
        let fx = Fixture::new();
        fx.run(|conn| {
            let ann = register(conn, "a@seams.io", "Ann", "Lee");
            let bob = register(conn, "b@seams.io", "Bob", "Ray");
            let cat = register(conn, "c@seams.io", "Cat", "Day");
            let channel = create_channel(conn, ann, "general", true, 1)?.channel_id;
            join_channel(conn, bob, channel, 1)?;

            // ann is the only owner
            assert!(matches!(remove_owner(conn, ann, channel, ann), Err(ApiError::Input(_))));
            // cat is not a member
            assert!(matches!(add_owner(conn, ann, channel, cat), Err(ApiError::Input(_))));
            // bob lacks permissions
            assert!(matches!(add_owner(conn, bob, channel, bob), Err(ApiError::Access(_))));

            add_owner(conn, ann, channel, bob)?;
            assert!(matches!(add_owner(conn, ann, channel, bob), Err(ApiError::Input(_))));
            remove_owner(conn, bob, channel, ann)?;
            assert!(!channels::is_owner(conn, channel, ann)?);
            assert!(matches!(remove_owner(conn, bob, channel, ann), Err(ApiError::Input(_))));
            Ok(())
        });
    }

    #[test]
    fn global_owner_member_has_owner_permissions() {
        let fx = Fixture::new();
        fx.run(|conn| {
            let global = register(conn, "boss@seams.io", "Boss", "Person");
            let ann = register(conn, "a@seams.io", "Ann", "Lee");
            let channel = create_channel(conn, ann, "general", true, 1)?.channel_id;

            assert!(matches!(add_owner(conn, global, channel, global), Err(ApiError::Access(_))));
            join_channel(conn, global, channel, 1)?;
            add_owner(conn, global, channel, global)?;
            Ok(())
        });
    }

    #[test]
    fn leaving_drops_membership_and_ownership() {
        let fx = Fixture::new();
        fx.run(|conn| {
            let ann = register(conn, "a@seams.io", "Ann", "Lee");
            let channel = create_channel(conn, ann, "general", true, 1)?.channel_id;

            leave_channel(conn, ann, channel, 2)?;
            assert!(!channels::is_member(conn, channel, ann)?);
            assert_eq!(channels::count_owners(conn, channel)?, 0);
            assert!(matches!(leave_channel(conn, ann, channel, 3), Err(ApiError::Access(_))));
            Ok(())
        });
    }
}
