use axum::{Extension, Json, extract::State, response::IntoResponse};
use rusqlite::Connection;
use tracing::info;

use seams_db::queries::{channels, dms, messages, sessions, users};
use seams_types::api::{AdminPermissionChangeRequest, AdminUserRemoveRequest};

use crate::checks;
use crate::error::ApiError;
use crate::middleware::Session;
use crate::{AppState, run_blocking};

pub const PERMISSION_OWNER: i64 = 1;
pub const PERMISSION_MEMBER: i64 = 2;

pub const REMOVED_MESSAGE: &str = "Removed user";

/// Soft-delete `u_id`: strip memberships, blank their messages, free their
/// email and handle, and end their sessions. The row and profile stay.
pub fn remove_user(conn: &Connection, user_id: i64, u_id: i64) -> Result<(), ApiError> {
    checks::require_global_owner(conn, user_id)?;
    let target = checks::active_user(conn, u_id)?;
    if target.is_global_owner && users::count_global_owners(conn)? <= 1 {
        return Err(ApiError::input("Cannot remove the only global owner"));
    }

    for channel_id in channels::channel_ids_for_user(conn, u_id)? {
        channels::remove_member(conn, channel_id, u_id)?;
    }
    for dm_id in dms::dm_ids_for_user(conn, u_id)? {
        dms::remove_member(conn, dm_id, u_id)?;
    }
    dms::mark_creator_left_for(conn, u_id)?;

    let blanked = messages::replace_author_bodies(conn, u_id, REMOVED_MESSAGE)?;
    users::mark_removed(conn, u_id)?;
    sessions::delete_user_sessions(conn, u_id)?;

    info!("User {} removed user {} ({} messages blanked)", user_id, u_id, blanked);
    Ok(())
}

pub fn change_permission(conn: &Connection, user_id: i64, u_id: i64, permission_id: i64) -> Result<(), ApiError> {
    checks::require_global_owner(conn, user_id)?;
    let target = checks::active_user(conn, u_id)?;

    let make_owner = match permission_id {
        PERMISSION_OWNER => true,
        PERMISSION_MEMBER => false,
        _ => return Err(ApiError::input("Invalid permission id")),
    };
    if target.is_global_owner == make_owner {
        return Err(ApiError::input("User already has that permission"));
    }
    if !make_owner && users::count_global_owners(conn)? <= 1 {
        return Err(ApiError::input("Cannot demote the only global owner"));
    }

    users::set_global_owner(conn, u_id, make_owner)?;
    info!("User {} set permission {} on user {}", user_id, permission_id, u_id);
    Ok(())
}

pub async fn user_remove(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<AdminUserRemoveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |conn| remove_user(conn, session.user_id, req.u_id)).await?;
    Ok(Json(serde_json::json!({})))
}

pub async fn userpermission_change(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<AdminPermissionChangeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |conn| {
        change_permission(conn, session.user_id, req.u_id, req.permission_id)
    })
    .await?;
    Ok(Json(serde_json::json!({})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::send_message;
    use crate::testing::{Fixture, register};
    use seams_db::models::Location;

    #[test]
    fn only_global_owners_administer() {
        let fx = Fixture::new();
        fx.run(|conn| {
            let owner = register(conn, "a@seams.io", "Ann", "Lee");
            let bob = register(conn, "b@seams.io", "Bob", "Ray");

            assert!(matches!(remove_user(conn, bob, owner), Err(ApiError::Access(_))));
            assert!(matches!(
                change_permission(conn, bob, bob, PERMISSION_OWNER),
                Err(ApiError::Access(_))
            ));
            assert!(matches!(remove_user(conn, owner, owner), Err(ApiError::Input(_))));
            assert!(matches!(remove_user(conn, owner, 99), Err(ApiError::Input(_))));
            Ok(())
        });
    }

    #[test]
    fn permission_changes() {
        let fx = Fixture::new();
        fx.run(|conn| {
            let owner = register(conn, "a@seams.io", "Ann", "Lee");
            let bob = register(conn, "b@seams.io", "Bob", "Ray");

            assert!(matches!(change_permission(conn, owner, bob, 3), Err(ApiError::Input(_))));
            assert!(matches!(
                change_permission(conn, owner, bob, PERMISSION_MEMBER),
                Err(ApiError::Input(_))
            ));
            assert!(matches!(
                change_permission(conn, owner, owner, PERMISSION_MEMBER),
                Err(ApiError::Input(_))
            ));

            change_permission(conn, owner, bob, PERMISSION_OWNER)?;
            change_permission(conn, bob, owner, PERMISSION_MEMBER)?;
            assert!(!users::user_by_id(conn, owner)?.unwrap().is_global_owner);
            Ok(())
        });
    }

    #[test]
    fn removal_blanks_messages_and_frees_identity() {
        let fx = Fixture::new();
        fx.run(|conn| {
            let owner = register(conn, "a@seams.io", "Ann", "Lee");
            let bob = register(conn, "b@seams.io", "Bob", "Ray");
            let channel = crate::channels::create_channel(conn, owner, "general", true, 1)?.channel_id;
            crate::channel::join_channel(conn, bob, channel, 1)?;
            let dm = crate::dm::create_dm(conn, bob, &[owner], 1)?.dm_id;
            let msg = send_message(conn, bob, Location::Channel(channel), "hello", 2)?
                .message_id
                .unwrap();

            remove_user(conn, owner, bob)?;

            assert_eq!(messages::message_by_id(conn, msg)?.unwrap().body, REMOVED_MESSAGE);
            assert!(!channels::is_member(conn, channel, bob)?);
            assert!(!dms::is_member(conn, dm, bob)?);
            assert!(dms::dm_by_id(conn, dm)?.unwrap().creator_left);

            let profile = crate::user::user_profile(conn, bob)?.user;
            assert_eq!((profile.name_first.as_str(), profile.name_last.as_str()), ("Removed", "user"));
            assert_eq!(crate::users::list_users(conn)?.users.len(), 1);

            // email and handle can be taken again
            let again = register(conn, "b@seams.io", "Bob", "Ray");
            assert_eq!(users::user_by_id(conn, again)?.unwrap().handle, "bobray");
            Ok(())
        });
    }
}
