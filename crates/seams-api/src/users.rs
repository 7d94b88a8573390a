use axum::{Extension, Json, extract::State, response::IntoResponse};
use rusqlite::Connection;

use seams_db::models::UserRow;
use seams_db::queries::users;
use seams_types::api::UsersAllResponse;
use seams_types::models::User;

use crate::error::ApiError;
use crate::middleware::Session;
use crate::{AppState, run_blocking};

pub fn to_profile(row: &UserRow) -> User {
    User {
        u_id: row.id,
        email: row.email.clone(),
        name_first: row.name_first.clone(),
        name_last: row.name_last.clone(),
        handle_str: row.handle.clone(),
        profile_img_url: row.profile_img_url.clone(),
    }
}

pub fn list_users(conn: &Connection) -> Result<UsersAllResponse, ApiError> {
    let users = users::active_users(conn)?.iter().map(to_profile).collect();
    Ok(UsersAllResponse { users })
}

pub async fn all(
    State(state): State<AppState>,
    Extension(_session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let res = run_blocking(&state, list_users).await?;
    Ok(Json(res))
}
