pub mod admin;
pub mod auth;
pub mod channel;
pub mod channels;
pub mod checks;
pub mod dm;
pub mod error;
pub mod mailer;
pub mod messages;
pub mod middleware;
pub mod notifications;
pub mod other;
pub mod photos;
pub mod pins;
pub mod reactions;
pub mod scheduler;
pub mod search;
pub mod standup;
pub mod stats;
pub mod user;
pub mod users;
pub mod wordle;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post, put},
};
use rusqlite::Connection;
use tower_http::services::ServeDir;
use tracing::error;

use seams_db::Database;

use crate::error::ApiError;
use crate::mailer::Mailer;
use crate::photos::ImageStore;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub images: ImageStore,
    pub mailer: Arc<dyn Mailer>,
    pub http: reqwest::Client,
}

/// Current unix time in seconds.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Run store work off the async runtime, inside one transaction.
pub(crate) async fn run_blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Connection) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || state.db.transaction(f))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("blocking task failed"))
        })?
}

/// Every route of the service. Cross-cutting layers (CORS, tracing) are
/// left to the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register/v2", post(auth::register))
        .route("/auth/login/v2", post(auth::login))
        .route("/auth/passwordreset/request/v1", post(auth::passwordreset_request))
        .route("/auth/passwordreset/reset/v1", post(auth::passwordreset_reset))
        .route("/clear/v1", delete(other::clear))
        .route("/health", get(other::health));

    let protected_routes = Router::new()
        .route("/auth/logout/v1", post(auth::logout))
        // Channels
        .route("/channels/create/v2", post(channels::create))
        .route("/channels/list/v2", get(channels::list))
        .route("/channels/listall/v2", get(channels::listall))
        .route("/channel/details/v2", get(channel::details))
        .route("/channel/join/v2", post(channel::join))
        .route("/channel/invite/v2", post(channel::invite))
        .route("/channel/messages/v2", get(channel::messages))
        .route("/channel/leave/v1", post(channel::leave))
        .route("/channel/addowner/v1", post(channel::addowner))
        .route("/channel/removeowner/v1", post(channel::removeowner))
        // DMs
        .route("/dm/create/v1", post(dm::create))
        .route("/dm/list/v1", get(dm::list))
        .route("/dm/remove/v1", delete(dm::remove))
        .route("/dm/details/v1", get(dm::details))
        .route("/dm/leave/v1", post(dm::leave))
        .route("/dm/messages/v1", get(dm::messages))
        // Messages
        .route("/message/send/v1", post(messages::send))
        .route("/message/senddm/v1", post(messages::senddm))
        .route("/message/sendlater/v1", post(messages::sendlater))
        .route("/message/sendlaterdm/v1", post(messages::sendlaterdm))
        .route("/message/edit/v1", put(messages::edit))
        .route("/message/remove/v1", delete(messages::remove))
        .route("/message/share/v1", post(messages::share))
        .route("/message/react/v1", post(reactions::react))
        .route("/message/unreact/v1", post(reactions::unreact))
        .route("/message/pin/v1", post(pins::pin))
        .route("/message/unpin/v1", post(pins::unpin))
        // Users
        .route("/users/all/v1", get(users::all))
        .route("/user/profile/v1", get(user::profile))
        .route("/user/profile/setname/v1", put(user::setname))
        .route("/user/profile/setemail/v1", put(user::setemail))
        .route("/user/profile/sethandle/v1", put(user::sethandle))
        .route("/user/profile/uploadphoto/v1", post(photos::uploadphoto))
        .route("/user/stats/v1", get(stats::user_stats))
        .route("/users/stats/v1", get(stats::users_stats))
        // Admin
        .route("/admin/user/remove/v1", delete(admin::user_remove))
        .route("/admin/userpermission/change/v1", post(admin::userpermission_change))
        // Search, standups, notifications
        .route("/search/v1", get(search::search))
        .route("/standup/start/v1", post(standup::start))
        .route("/standup/active/v1", get(standup::active))
        .route("/standup/send/v1", post(standup::send))
        .route("/notifications/get/v1", get(notifications::get))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest_service("/imgurl", ServeDir::new(state.images.dir()))
        .with_state(state)
}
