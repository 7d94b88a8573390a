use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
    typed_header::TypedHeaderRejection,
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::debug;

use seams_db::queries::sessions;
use seams_types::api::Claims;

use crate::error::ApiError;
use crate::{AppState, run_blocking, scheduler, unix_now};

/// The authenticated caller, inserted into request extensions by
/// [`require_auth`].
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: i64,
    pub token: String,
}

/// Reject the request unless it carries a live session token.
///
/// A token is only honoured while it is listed in the session table, so
/// logout and admin removal revoke it immediately. Deferred messages and
/// expired standups that fell due are delivered before the handler runs.
pub async fn require_auth(
    State(state): State<AppState>,
    header: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) =
        header.map_err(|_| ApiError::access("Missing session token"))?;
    let token = bearer.token().to_string();

    let lookup = token.clone();
    let owner = run_blocking(&state, move |conn| {
        let delivered = scheduler::flush_due(conn, unix_now())?;
        if delivered > 0 {
            debug!("Delivered {} scheduled items before request", delivered);
        }
        Ok(sessions::session_user(conn, &lookup)?)
    })
    .await?;

    let owner = owner.ok_or_else(|| ApiError::access("Invalid session token"))?;

    let mut validation = Validation::default();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    let token_data = decode::<Claims>(
        &token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|_| ApiError::access("Invalid session token"))?;

    if token_data.claims.sub != owner {
        return Err(ApiError::access("Invalid session token"));
    }

    req.extensions_mut().insert(Session {
        user_id: owner,
        token,
    });
    Ok(next.run(req).await)
}
