use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use rand::Rng;
use rusqlite::Connection;
use tracing::{info, warn};
use uuid::Uuid;

use seams_db::queries::{sessions, stats, users};
use seams_types::api::{
    AuthResponse, Claims, LoginRequest, PasswordResetRequest, PasswordResetReset, RegisterRequest,
};

use crate::checks;
use crate::error::ApiError;
use crate::middleware::Session;
use crate::{AppState, run_blocking, unix_now};

const MAX_HANDLE_LEN: usize = 20;
const RESET_CODE_TTL_SECS: i64 = 24 * 60 * 60;

/// What the mailer needs to deliver a reset code.
#[derive(Debug, Clone)]
pub struct ResetNotice {
    pub email: String,
    pub name: String,
    pub code: String,
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

/// Mint a token and record it as a live session.
fn open_session(conn: &Connection, secret: &str, user_id: i64) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user_id,
        sid: Uuid::new_v4(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(anyhow::Error::from)?;

    sessions::insert_session(conn, &token, user_id)?;
    Ok(token)
}

/// first+last, lowercased, alphanumerics only, at most 20 characters. A
/// taken handle gets the smallest free numeric suffix.
pub fn generate_handle(conn: &Connection, name_first: &str, name_last: &str) -> Result<String, ApiError> {
    let base: String = format!("{name_first}{name_last}")
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .take(MAX_HANDLE_LEN)
        .collect();

    if !users::handle_taken(conn, &base, None)? {
        return Ok(base);
    }

    let mut suffix: u64 = 0;
    loop {
        let candidate = format!("{base}{suffix}");
        if !users::handle_taken(conn, &candidate, None)? {
            return Ok(candidate);
        }
        suffix += 1;
    }
}

/// The very first account becomes a global owner and starts the workspace
/// statistics.
pub fn register_user(
    conn: &Connection,
    secret: &str,
    default_img_url: &str,
    req: &RegisterRequest,
    now: i64,
) -> Result<AuthResponse, ApiError> {
    checks::check_email(&req.email)?;
    if users::email_taken(conn, &req.email, None)? {
        return Err(ApiError::input("Email address is already in use"));
    }
    checks::check_password(&req.password)?;
    checks::check_names(&req.name_first, &req.name_last)?;

    let first_user = users::count_users(conn)? == 0;
    let handle = generate_handle(conn, &req.name_first, &req.name_last)?;
    let password_hash = hash_password(&req.password)?;

    let user_id = users::insert_user(
        conn,
        &users::NewUser {
            email: &req.email,
            password_hash: &password_hash,
            name_first: &req.name_first,
            name_last: &req.name_last,
            handle: &handle,
            profile_img_url: default_img_url,
            is_global_owner: first_user,
        },
    )?;

    if first_user {
        stats::seed_workspace(conn, now)?;
    }
    stats::seed_user(conn, user_id, now)?;

    let token = open_session(conn, secret, user_id)?;
    info!("Registered user {} ({})", user_id, handle);
    Ok(AuthResponse {
        token,
        auth_user_id: user_id,
    })
}

/// Every successful login opens an independent session.
pub fn login_user(conn: &Connection, secret: &str, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
    let user = users::active_user_by_email(conn, email)?
        .ok_or_else(|| ApiError::input("Email is not registered"))?;

    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| anyhow::anyhow!("stored hash for user {} is corrupt: {}", user.id, e))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::input("Incorrect password"))?;

    let token = open_session(conn, secret, user.id)?;
    Ok(AuthResponse {
        token,
        auth_user_id: user.id,
    })
}

pub fn logout_session(conn: &Connection, token: &str) -> Result<(), ApiError> {
    if !sessions::delete_session(conn, token)? {
        return Err(ApiError::access("Session already ended"));
    }
    Ok(())
}

/// Issue a reset code valid for a day. Unknown emails yield `None` so the
/// caller cannot tell them apart.
pub fn request_reset(conn: &Connection, email: &str, now: i64) -> Result<Option<ResetNotice>, ApiError> {
    let Some(user) = users::active_user_by_email(conn, email)? else {
        return Ok(None);
    };

    let mut rng = rand::rng();
    let code = loop {
        let candidate = rng.random_range(100_000..=999_999).to_string();
        if users::user_by_reset_code(conn, &candidate, now)?.is_none() {
            break candidate;
        }
    };

    users::set_reset_code(conn, user.id, &code, now + RESET_CODE_TTL_SECS)?;
    Ok(Some(ResetNotice {
        email: user.email,
        name: format!("{} {}", user.name_first, user.name_last),
        code,
    }))
}

/// Consume a reset code, set the new password and end every session of
/// that user.
pub fn reset_password(conn: &Connection, code: &str, new_password: &str, now: i64) -> Result<(), ApiError> {
    checks::check_password(new_password)?;
    let user = users::user_by_reset_code(conn, code, now)?
        .ok_or_else(|| ApiError::input("Invalid reset code"))?;

    let password_hash = hash_password(new_password)?;
    users::set_password(conn, user.id, &password_hash)?;
    users::clear_reset_code(conn, user.id)?;
    let ended = sessions::delete_user_sessions(conn, user.id)?;

    info!("User {} reset their password, {} sessions ended", user.id, ended);
    Ok(())
}

// -- Handlers --

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let secret = state.jwt_secret.clone();
    let default_img_url = state.images.default_url();
    let res = run_blocking(&state, move |conn| {
        register_user(conn, &secret, &default_img_url, &req, unix_now())
    })
    .await?;
    Ok(Json(res))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let secret = state.jwt_secret.clone();
    let res = run_blocking(&state, move |conn| {
        login_user(conn, &secret, &req.email, &req.password)
    })
    .await?;
    Ok(Json(res))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |conn| logout_session(conn, &session.token)).await?;
    Ok(Json(serde_json::json!({})))
}

pub async fn passwordreset_request(
    State(state): State<AppState>,
    Json(req): Json<PasswordResetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let notice = run_blocking(&state, move |conn| request_reset(conn, &req.email, unix_now())).await?;

    if let Some(notice) = notice {
        if let Err(e) = state
            .mailer
            .send_reset_code(&notice.email, &notice.name, &notice.code)
            .await
        {
            warn!("Failed to send reset code to {}: {:#}", notice.email, e);
        }
    }

    Ok(Json(serde_json::json!({})))
}

pub async fn passwordreset_reset(
    State(state): State<AppState>,
    Json(req): Json<PasswordResetReset>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |conn| {
        reset_password(conn, &req.reset_code, &req.new_password, unix_now())
    })
    .await?;
    Ok(Json(serde_json::json!({})))
}
