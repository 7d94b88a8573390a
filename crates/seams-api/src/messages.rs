use std::collections::{BTreeMap, HashMap};

use axum::{Extension, Json, extract::State, response::IntoResponse};
use rusqlite::Connection;
use tracing::debug;

use seams_db::models::{Location, MessageRow};
use seams_db::queries::{messages, notifications, users};
use seams_types::api::{
    MessageEditRequest, MessageIdRequest, MessageSendDmRequest, MessageSendLaterDmRequest,
    MessageSendLaterRequest, MessageSendRequest, MessageSendResponse, MessageShareRequest,
    MessageShareResponse, MessagesPage,
};
use seams_types::models::{Message, React};

use crate::checks::{self, MAX_MESSAGE_LEN, char_len};
use crate::error::ApiError;
use crate::middleware::Session;
use crate::{AppState, run_blocking, stats, unix_now, wordle};

pub const PAGE_SIZE: i64 = 50;
const TAG_PREVIEW_LEN: usize = 20;

// -- Delivery --

/// Store a visible message and account for it. No length check: callers
/// validate user input, while shares and standup summaries may run longer.
pub(crate) fn post_message(
    conn: &Connection,
    location: Location,
    author_id: i64,
    body: &str,
    time_sent: i64,
) -> Result<i64, ApiError> {
    let id = messages::insert_message(conn, location, author_id, body, time_sent, false)?;
    stats::message_sent(conn, author_id, time_sent)?;
    notify_tags(conn, location, author_id, body)?;
    Ok(id)
}

/// Make a scheduled message visible. Its id was reserved at scheduling time.
pub(crate) fn deliver_scheduled(conn: &Connection, message: &MessageRow) -> Result<(), ApiError> {
    messages::mark_delivered(conn, message.id)?;
    stats::message_sent(conn, message.author_id, message.time_sent)?;
    notify_tags(conn, message.location, message.author_id, &message.body)?;
    debug!("Delivered scheduled message {}", message.id);
    Ok(())
}

/// Distinct `@handle` mentions in order of first appearance.
pub fn tagged_handles(body: &str) -> Vec<String> {
    let mut handles: Vec<String> = Vec::new();
    for part in body.split('@').skip(1) {
        let handle: String = part.chars().take_while(|c| c.is_alphanumeric()).collect();
        if !handle.is_empty() && !handles.contains(&handle) {
            handles.push(handle);
        }
    }
    handles
}

fn notify_tags(conn: &Connection, location: Location, author_id: i64, body: &str) -> Result<(), ApiError> {
    let handles = tagged_handles(body);
    if handles.is_empty() {
        return Ok(());
    }

    let author = checks::caller(conn, author_id)?;
    let name = checks::location_name(conn, location)?;
    let preview: String = body.chars().take(TAG_PREVIEW_LEN).collect();
    let text = format!("{} tagged you in {}: {}", author.handle, name, preview);

    let active = users::active_users(conn)?;
    for handle in handles {
        let Some(target) = active.iter().find(|u| u.handle == handle) else {
            continue;
        };
        if checks::is_location_member(conn, location, target.id)? {
            notifications::push_notification(conn, target.id, location, &text)?;
        }
    }
    Ok(())
}

// -- Reading --

/// Shape stored rows for `viewer`, with reactions grouped per react id.
pub fn render_messages(conn: &Connection, rows: Vec<MessageRow>, viewer: i64) -> Result<Vec<Message>, ApiError> {
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    let reaction_rows = messages::reactions_for_messages(conn, &ids)?;

    let mut reaction_map: HashMap<i64, BTreeMap<i64, Vec<i64>>> = HashMap::new();
    for r in &reaction_rows {
        reaction_map
            .entry(r.message_id)
            .or_default()
            .entry(r.react_id)
            .or_default()
            .push(r.user_id);
    }

    let rendered = rows
        .into_iter()
        .map(|row| {
            let reacts = reaction_map
                .remove(&row.id)
                .map(|by_react| {
                    by_react
                        .into_iter()
                        .map(|(react_id, u_ids)| React {
                            react_id,
                            is_this_user_reacted: u_ids.contains(&viewer),
                            u_ids,
                        })
                        .collect()
                })
                .unwrap_or_default();

            Message {
                message_id: row.id,
                u_id: row.author_id,
                message: row.body,
                time_sent: row.time_sent,
                reacts,
                is_pinned: row.is_pinned,
            }
        })
        .collect();

    Ok(rendered)
}

/// Up to 50 messages, newest first, beginning `start` messages back.
/// Membership must already have been checked.
pub fn messages_page(conn: &Connection, location: Location, viewer: i64, start: i64) -> Result<MessagesPage, ApiError> {
    let total = messages::count_delivered(conn, location)?;
    if start < 0 || start > total {
        return Err(ApiError::input("Start is greater than the total number of messages"));
    }

    let rows = messages::page(conn, location, start, PAGE_SIZE)?;
    let end = if start + PAGE_SIZE >= total { -1 } else { start + PAGE_SIZE };

    Ok(MessagesPage {
        messages: render_messages(conn, rows, viewer)?,
        start,
        end,
    })
}

// -- Writing --

/// Send now. `/wordle` commands drive the game instead and store nothing
/// under the caller's name.
pub fn send_message(
    conn: &Connection,
    user_id: i64,
    location: Location,
    text: &str,
    now: i64,
) -> Result<MessageSendResponse, ApiError> {
    checks::location_member(conn, location, user_id)?;

    if wordle::is_command(text) {
        wordle::play(conn, location, user_id, text, now)?;
        return Ok(MessageSendResponse { message_id: None });
    }

    checks::check_message(text, false)?;
    let id = post_message(conn, location, user_id, text, now)?;
    Ok(MessageSendResponse { message_id: Some(id) })
}

/// Reserve an id now and deliver at `time_sent`.
pub fn schedule_message(
    conn: &Connection,
    user_id: i64,
    location: Location,
    text: &str,
    time_sent: i64,
    now: i64,
) -> Result<MessageSendResponse, ApiError> {
    checks::location_member(conn, location, user_id)?;
    checks::check_message(text, false)?;
    if time_sent < now {
        return Err(ApiError::input("Time sent is in the past"));
    }

    let id = messages::insert_message(conn, location, user_id, text, time_sent, true)?;
    debug!("Scheduled message {} for {}", id, time_sent);
    Ok(MessageSendResponse { message_id: Some(id) })
}

fn moderated_message(conn: &Connection, user_id: i64, message_id: i64) -> Result<MessageRow, ApiError> {
    let message = checks::visible_message(conn, message_id, user_id)?;
    if message.author_id != user_id && !checks::can_moderate(conn, message.location, user_id)? {
        return Err(ApiError::access("You cannot modify this message"));
    }
    Ok(message)
}

/// Replace the text. Editing to an empty string removes the message.
pub fn edit_message(conn: &Connection, user_id: i64, message_id: i64, text: &str, now: i64) -> Result<(), ApiError> {
    let message = checks::visible_message(conn, message_id, user_id)?;
    checks::check_message(text, true)?;
    if message.author_id != user_id && !checks::can_moderate(conn, message.location, user_id)? {
        return Err(ApiError::access("You cannot modify this message"));
    }

    if text.is_empty() {
        messages::delete_message(conn, message.id)?;
        stats::message_removed(conn, now)?;
    } else {
        messages::update_body(conn, message.id, text)?;
        notify_tags(conn, message.location, user_id, text)?;
    }
    Ok(())
}

pub fn remove_message(conn: &Connection, user_id: i64, message_id: i64, now: i64) -> Result<(), ApiError> {
    let message = moderated_message(conn, user_id, message_id)?;
    messages::delete_message(conn, message.id)?;
    stats::message_removed(conn, now)?;
    Ok(())
}

/// Exactly one of `channel_id` / `dm_id` must be -1.
pub fn share_message(
    conn: &Connection,
    user_id: i64,
    og_message_id: i64,
    extra: &str,
    channel_id: i64,
    dm_id: i64,
    now: i64,
) -> Result<MessageShareResponse, ApiError> {
    let target = match (channel_id, dm_id) {
        (-1, -1) => return Err(ApiError::input("No channel or DM given")),
        (channel_id, -1) => Location::Channel(channel_id),
        (-1, dm_id) => Location::Dm(dm_id),
        _ => return Err(ApiError::input("One of channel_id and dm_id must be -1")),
    };
    checks::location_name(conn, target)?;

    let original = checks::visible_message(conn, og_message_id, user_id)?;
    if char_len(extra) > MAX_MESSAGE_LEN {
        return Err(ApiError::input("Message is over 1000 characters"));
    }
    if !checks::is_location_member(conn, target, user_id)? {
        return Err(ApiError::access("You are not a member of the destination"));
    }

    let body = format!("New message: {}\nOriginal message: {}", extra, original.body);
    let shared_message_id = post_message(conn, target, user_id, &body, now)?;
    Ok(MessageShareResponse { shared_message_id })
}

// -- Handlers --

pub async fn send(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<MessageSendRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let res = run_blocking(&state, move |conn| {
        send_message(conn, session.user_id, Location::Channel(req.channel_id), &req.message, unix_now())
    })
    .await?;
    Ok(Json(res))
}

pub async fn senddm(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<MessageSendDmRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let res = run_blocking(&state, move |conn| {
        send_message(conn, session.user_id, Location::Dm(req.dm_id), &req.message, unix_now())
    })
    .await?;
    Ok(Json(res))
}

pub async fn sendlater(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<MessageSendLaterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let res = run_blocking(&state, move |conn| {
        schedule_message(
            conn,
            session.user_id,
            Location::Channel(req.channel_id),
            &req.message,
            req.time_sent,
            unix_now(),
        )
    })
    .await?;
    Ok(Json(res))
}

pub async fn sendlaterdm(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<MessageSendLaterDmRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let res = run_blocking(&state, move |conn| {
        schedule_message(
            conn,
            session.user_id,
            Location::Dm(req.dm_id),
            &req.message,
            req.time_sent,
            unix_now(),
        )
    })
    .await?;
    Ok(Json(res))
}

pub async fn edit(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<MessageEditRequest>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |conn| {
        edit_message(conn, session.user_id, req.message_id, &req.message, unix_now())
    })
    .await?;
    Ok(Json(serde_json::json!({})))
}

pub async fn remove(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<MessageIdRequest>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |conn| {
        remove_message(conn, session.user_id, req.message_id, unix_now())
    })
    .await?;
    Ok(Json(serde_json::json!({})))
}

pub async fn share(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<MessageShareRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let res = run_blocking(&state, move |conn| {
        share_message(
            conn,
            session.user_id,
            req.og_message_id,
            &req.message,
            req.channel_id,
            req.dm_id,
            unix_now(),
        )
    })
    .await?;
    Ok(Json(res))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Fixture, register};
    use seams_db::queries::notifications::recent;

    #[test]
    fn tag_parsing() {
        assert_eq!(tagged_handles("hi @bob and @alice, @bob again"), vec!["bob", "alice"]);
        assert!(tagged_handles("no tags @ here").is_empty());
        assert_eq!(tagged_handles("@a1@b2"), vec!["a1", "b2"]);
    }

    #[test]
    fn paging_windows() {
        let fx = Fixture::new();
        fx.run(|conn| {
            let owner = register(conn, "owner@seams.io", "Owner", "One");
            let channel = crate::channels::create_channel(conn, owner, "general", true, 100)?.channel_id;
            for i in 0..120 {
                post_message(conn, Location::Channel(channel), owner, &format!("m{i}"), 100 + i)?;
            }

            let first = messages_page(conn, Location::Channel(channel), owner, 0)?;
            assert_eq!(first.messages.len(), 50);
            assert_eq!(first.end, 50);
            assert_eq!(first.messages[0].message, "m119");

            let last = messages_page(conn, Location::Channel(channel), owner, 100)?;
            assert_eq!(last.messages.len(), 20);
            assert_eq!(last.end, -1);
            assert_eq!(last.messages[19].message, "m0");

            let empty_tail = messages_page(conn, Location::Channel(channel), owner, 120)?;
            assert!(empty_tail.messages.is_empty());
            assert_eq!(empty_tail.end, -1);

            assert!(matches!(
                messages_page(conn, Location::Channel(channel), owner, 121),
                Err(ApiError::Input(_))
            ));
            Ok(())
        });
    }

    #[test]
    fn tags_notify_members_only_once() {
        let fx = Fixture::new();
        fx.run(|conn| {
            let owner = register(conn, "owner@seams.io", "Owner", "One");
            let member = register(conn, "member@seams.io", "Member", "Two");
            let outsider = register(conn, "out@seams.io", "Out", "Sider");
            let channel = crate::channels::create_channel(conn, owner, "general", true, 100)?.channel_id;
            crate::channel::join_channel(conn, member, channel, 100)?;

            send_message(
                conn,
                owner,
                Location::Channel(channel),
                "@membertwo @membertwo @outsider look",
                100,
            )?;

            let notes = recent(conn, member, 20)?;
            assert_eq!(notes.len(), 1);
            assert_eq!(notes[0].message, "ownerone tagged you in general: @membertwo @membertw");
            assert_eq!(notes[0].channel_id, channel);
            assert_eq!(notes[0].dm_id, -1);
            assert!(recent(conn, outsider, 20)?.is_empty());
            Ok(())
        });
    }

    #[test]
    fn edit_permissions_and_empty_edit_removes() {
        let fx = Fixture::new();
        fx.run(|conn| {
            let owner = register(conn, "owner@seams.io", "Owner", "One");
            let member = register(conn, "member@seams.io", "Member", "Two");
            let channel = crate::channels::create_channel(conn, owner, "general", true, 100)?.channel_id;
            crate::channel::join_channel(conn, member, channel, 100)?;

            let mine = send_message(conn, owner, Location::Channel(channel), "owner says", 100)?
                .message_id
                .unwrap();
            let theirs = send_message(conn, member, Location::Channel(channel), "member says", 101)?
                .message_id
                .unwrap();

            assert!(matches!(
                edit_message(conn, member, mine, "hijack", 102),
                Err(ApiError::Access(_))
            ));
            edit_message(conn, owner, theirs, "moderated", 102)?;
            assert_eq!(messages::message_by_id(conn, theirs)?.unwrap().body, "moderated");

            edit_message(conn, member, theirs, "", 103)?;
            assert!(messages::message_by_id(conn, theirs)?.is_none());
            assert!(matches!(
                remove_message(conn, member, theirs, 104),
                Err(ApiError::Input(_))
            ));
            Ok(())
        });
    }

    #[test]
    fn share_rules() {
        let fx = Fixture::new();
        fx.run(|conn| {
            let owner = register(conn, "owner@seams.io", "Owner", "One");
            let other = register(conn, "other@seams.io", "Other", "Two");
            let general = crate::channels::create_channel(conn, owner, "general", true, 100)?.channel_id;
            let private = crate::channels::create_channel(conn, other, "private", false, 100)?.channel_id;
            let og = send_message(conn, owner, Location::Channel(general), "original", 100)?
                .message_id
                .unwrap();

            assert!(matches!(
                share_message(conn, owner, og, "", general, 1, 101),
                Err(ApiError::Input(_))
            ));
            assert!(matches!(
                share_message(conn, owner, og, "", -1, -1, 101),
                Err(ApiError::Input(_))
            ));
            assert!(matches!(
                share_message(conn, owner, og, "", private, -1, 101),
                Err(ApiError::Access(_))
            ));

            let shared = share_message(conn, owner, og, "look", general, -1, 101)?.shared_message_id;
            assert_eq!(
                messages::message_by_id(conn, shared)?.unwrap().body,
                "New message: look\nOriginal message: original"
            );
            Ok(())
        });
    }
}
