use axum::{Extension, Json, extract::State, response::IntoResponse};
use rusqlite::Connection;

use seams_db::queries::{messages, notifications};
use seams_types::api::MessageReactRequest;

use crate::checks;
use crate::error::ApiError;
use crate::middleware::Session;
use crate::{AppState, run_blocking};

/// The only react currently offered (thumbs up).
pub const THUMBS_UP: i64 = 1;

fn check_react_id(react_id: i64) -> Result<(), ApiError> {
    if react_id != THUMBS_UP {
        return Err(ApiError::input("Invalid react id"));
    }
    Ok(())
}

/// Adds the caller's react and tells the author, if they are still around
/// to see it.
pub fn react_message(conn: &Connection, user_id: i64, message_id: i64, react_id: i64) -> Result<(), ApiError> {
    let message = checks::visible_message(conn, message_id, user_id)?;
    check_react_id(react_id)?;
    if messages::has_reacted(conn, message_id, react_id, user_id)? {
        return Err(ApiError::input("Already reacted to this message"));
    }

    messages::add_reaction(conn, message_id, react_id, user_id)?;

    if checks::is_location_member(conn, message.location, message.author_id)? {
        let reactor = checks::caller(conn, user_id)?;
        let name = checks::location_name(conn, message.location)?;
        notifications::push_notification(
            conn,
            message.author_id,
            message.location,
            &format!("{} reacted to your message in {}", reactor.handle, name),
        )?;
    }
    Ok(())
}

pub fn unreact_message(conn: &Connection, user_id: i64, message_id: i64, react_id: i64) -> Result<(), ApiError> {
    checks::visible_message(conn, message_id, user_id)?;
    check_react_id(react_id)?;
    if !messages::has_reacted(conn, message_id, react_id, user_id)? {
        return Err(ApiError::input("You have not reacted to this message"));
    }
    messages::remove_reaction(conn, message_id, react_id, user_id)?;
    Ok(())
}

pub async fn react(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<MessageReactRequest>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |conn| {
        react_message(conn, session.user_id, req.message_id, req.react_id)
    })
    .await?;
    Ok(Json(serde_json::json!({})))
}

pub async fn unreact(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<MessageReactRequest>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |conn| {
        unreact_message(conn, session.user_id, req.message_id, req.react_id)
    })
    .await?;
    Ok(Json(serde_json::json!({})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{messages_page, send_message};
    use crate::testing::{Fixture, register};
    use seams_db::models::Location;
    use seams_db::queries::notifications::recent;

    #[test]
    fn react_is_per_user_and_notifies_author() {
        let fx = Fixture::new();
        fx.run(|conn| {
            let ann = register(conn, "a@seams.io", "Ann", "Lee");
            let bob = register(conn, "b@seams.io", "Bob", "Ray");
            let channel = crate::channels::create_channel(conn, ann, "general", true, 1)?.channel_id;
            crate::channel::join_channel(conn, bob, channel, 1)?;
            let msg = send_message(conn, ann, Location::Channel(channel), "hi", 2)?
                .message_id
                .unwrap();

            assert!(matches!(react_message(conn, bob, msg, 2), Err(ApiError::Input(_))));
            react_message(conn, bob, msg, THUMBS_UP)?;
            assert!(matches!(
                react_message(conn, bob, msg, THUMBS_UP),
                Err(ApiError::Input(_))
            ));

            let as_ann = messages_page(conn, Location::Channel(channel), ann, 0)?;
            assert_eq!(as_ann.messages[0].reacts[0].u_ids, vec![bob]);
            assert!(!as_ann.messages[0].reacts[0].is_this_user_reacted);
            let as_bob = messages_page(conn, Location::Channel(channel), bob, 0)?;
            assert!(as_bob.messages[0].reacts[0].is_this_user_reacted);

            assert_eq!(recent(conn, ann, 20)?[0].message, "bobray reacted to your message in general");

            unreact_message(conn, bob, msg, THUMBS_UP)?;
            assert!(matches!(
                unreact_message(conn, bob, msg, THUMBS_UP),
                Err(ApiError::Input(_))
            ));
            Ok(())
        });
    }

    #[test]
    fn departed_author_is_not_notified() {
        let fx = Fixture::new();
        fx.run(|conn| {
            let ann = register(conn, "a@seams.io", "Ann", "Lee");
            let bob = register(conn, "b@seams.io", "Bob", "Ray");
            let channel = crate::channels::create_channel(conn, ann, "general", true, 1)?.channel_id;
            crate::channel::join_channel(conn, bob, channel, 1)?;
            let msg = send_message(conn, bob, Location::Channel(channel), "bye", 2)?
                .message_id
                .unwrap();
            crate::channel::leave_channel(conn, bob, channel, 3)?;

            react_message(conn, ann, msg, THUMBS_UP)?;
            assert!(recent(conn, bob, 20)?.is_empty());
            Ok(())
        });
    }
}
