use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use rusqlite::Connection;
use tracing::debug;

use seams_db::queries::users;
use seams_types::api::{SetEmailRequest, SetHandleRequest, SetNameRequest, UserProfileResponse, UserQuery};

use crate::checks::{self, char_len};
use crate::error::ApiError;
use crate::middleware::Session;
use crate::users::to_profile;
use crate::{AppState, run_blocking};

const MIN_HANDLE_LEN: usize = 3;
const MAX_HANDLE_LEN: usize = 20;

/// Removed users are still found, under their replaced names.
pub fn user_profile(conn: &Connection, u_id: i64) -> Result<UserProfileResponse, ApiError> {
    let user = users::user_by_id(conn, u_id)?.ok_or_else(|| ApiError::input("Invalid user"))?;
    Ok(UserProfileResponse {
        user: to_profile(&user),
    })
}

pub fn set_name(conn: &Connection, user_id: i64, name_first: &str, name_last: &str) -> Result<(), ApiError> {
    checks::check_names(name_first, name_last)?;
    users::set_name(conn, user_id, name_first, name_last)?;
    Ok(())
}

pub fn set_email(conn: &Connection, user_id: i64, email: &str) -> Result<(), ApiError> {
    checks::check_email(email)?;
    if users::email_taken(conn, email, Some(user_id))? {
        return Err(ApiError::input("Email address is already in use"));
    }
    users::set_email(conn, user_id, email)?;
    Ok(())
}

pub fn set_handle(conn: &Connection, user_id: i64, handle: &str) -> Result<(), ApiError> {
    let len = char_len(handle);
    if !(MIN_HANDLE_LEN..=MAX_HANDLE_LEN).contains(&len) {
        return Err(ApiError::input("Handle must be between 3 and 20 characters"));
    }
    if !handle.chars().all(char::is_alphanumeric) {
        return Err(ApiError::input("Handle must be alphanumeric"));
    }
    if users::handle_taken(conn, handle, Some(user_id))? {
        return Err(ApiError::input("Handle is already in use"));
    }

    users::set_handle(conn, user_id, handle)?;
    debug!("User {} is now @{}", user_id, handle);
    Ok(())
}

pub async fn profile(
    State(state): State<AppState>,
    Extension(_session): Extension<Session>,
    Query(query): Query<UserQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let res = run_blocking(&state, move |conn| user_profile(conn, query.u_id)).await?;
    Ok(Json(res))
}

pub async fn setname(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<SetNameRequest>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |conn| {
        set_name(conn, session.user_id, &req.name_first, &req.name_last)
    })
    .await?;
    Ok(Json(serde_json::json!({})))
}

pub async fn setemail(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<SetEmailRequest>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |conn| set_email(conn, session.user_id, &req.email)).await?;
    Ok(Json(serde_json::json!({})))
}

pub async fn sethandle(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<SetHandleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |conn| set_handle(conn, session.user_id, &req.handle_str)).await?;
    Ok(Json(serde_json::json!({})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Fixture, register};

    #[test]
    fn handle_rules() {
        let fx = Fixture::new();
        fx.run(|conn| {
            let ann = register(conn, "a@seams.io", "Ann", "Lee");
            let bob = register(conn, "b@seams.io", "Bob", "Ray");

            for bad in ["ab", "has space", "dash-ed", &"h".repeat(21)] {
                assert!(matches!(set_handle(conn, ann, bad), Err(ApiError::Input(_))));
            }
            assert!(matches!(set_handle(conn, ann, "bobray"), Err(ApiError::Input(_))));

            // keeping your own handle is fine
            set_handle(conn, bob, "bobray")?;
            set_handle(conn, ann, "annie")?;
            assert_eq!(user_profile(conn, ann)?.user.handle_str, "annie");
            Ok(())
        });
    }

    #[test]
    fn email_and_name_updates() {
        let fx = Fixture::new();
        fx.run(|conn| {
            let ann = register(conn, "a@seams.io", "Ann", "Lee");
            register(conn, "b@seams.io", "Bob", "Ray");

            assert!(matches!(set_email(conn, ann, "b@seams.io"), Err(ApiError::Input(_))));
            assert!(matches!(set_email(conn, ann, "nope"), Err(ApiError::Input(_))));
            set_email(conn, ann, "ann@seams.io")?;

            assert!(matches!(set_name(conn, ann, "", "Lee"), Err(ApiError::Input(_))));
            set_name(conn, ann, "Anne", "Leigh")?;

            let user = user_profile(conn, ann)?.user;
            assert_eq!(user.email, "ann@seams.io");
            assert_eq!((user.name_first.as_str(), user.name_last.as_str()), ("Anne", "Leigh"));
            // handles are not recomputed on rename
            assert_eq!(user.handle_str, "annlee");

            assert!(matches!(user_profile(conn, 42), Err(ApiError::Input(_))));
            Ok(())
        });
    }
}
