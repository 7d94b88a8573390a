//! Lookups and validations shared by the request handlers.
//!
//! Lookups resolve a target first (400 when it does not exist) and only then
//! check the caller's standing (403).

use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;

use seams_db::models::{ChannelRow, DmRow, Location, MessageRow, UserRow};
use seams_db::queries::{channels, dms, messages, users};

use crate::error::ApiError;

pub const MAX_MESSAGE_LEN: usize = 1000;
pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_NAME_LEN: usize = 50;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid email regex")
});

/// Length in characters, not bytes.
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

pub fn check_email(email: &str) -> Result<(), ApiError> {
    if !EMAIL_RE.is_match(email) {
        return Err(ApiError::input("Invalid email address"));
    }
    Ok(())
}

pub fn check_password(password: &str) -> Result<(), ApiError> {
    if char_len(password) < MIN_PASSWORD_LEN {
        return Err(ApiError::input("Password must be at least 6 characters"));
    }
    Ok(())
}

pub fn check_names(name_first: &str, name_last: &str) -> Result<(), ApiError> {
    for name in [name_first, name_last] {
        let len = char_len(name);
        if len < 1 || len > MAX_NAME_LEN {
            return Err(ApiError::input("Names must be between 1 and 50 characters"));
        }
    }
    Ok(())
}

/// Messages longer than the limit are rejected; empty ones only when
/// `allow_empty` is false.
pub fn check_message(message: &str, allow_empty: bool) -> Result<(), ApiError> {
    let len = char_len(message);
    if len > MAX_MESSAGE_LEN {
        return Err(ApiError::input("Message is over 1000 characters"));
    }
    if len == 0 && !allow_empty {
        return Err(ApiError::input("Message is empty"));
    }
    Ok(())
}

// -- Users --

/// A registered user who has not been removed.
pub fn active_user(conn: &Connection, u_id: i64) -> Result<UserRow, ApiError> {
    match users::user_by_id(conn, u_id)? {
        Some(user) if !user.removed => Ok(user),
        _ => Err(ApiError::input("Invalid user")),
    }
}

/// The caller's own row. A live session always points at one.
pub fn caller(conn: &Connection, user_id: i64) -> Result<UserRow, ApiError> {
    users::user_by_id(conn, user_id)?
        .ok_or_else(|| ApiError::access("Unknown session user"))
}

pub fn require_global_owner(conn: &Connection, user_id: i64) -> Result<(), ApiError> {
    if !caller(conn, user_id)?.is_global_owner {
        return Err(ApiError::access("Only global owners can do this"));
    }
    Ok(())
}

// -- Channels and DMs --

pub fn channel(conn: &Connection, channel_id: i64) -> Result<ChannelRow, ApiError> {
    channels::channel_by_id(conn, channel_id)?.ok_or_else(|| ApiError::input("Invalid channel"))
}

pub fn channel_member(conn: &Connection, channel_id: i64, user_id: i64) -> Result<ChannelRow, ApiError> {
    let channel = channel(conn, channel_id)?;
    if !channels::is_member(conn, channel_id, user_id)? {
        return Err(ApiError::access("You are not a member of this channel"));
    }
    Ok(channel)
}

pub fn dm(conn: &Connection, dm_id: i64) -> Result<DmRow, ApiError> {
    dms::dm_by_id(conn, dm_id)?.ok_or_else(|| ApiError::input("Invalid DM"))
}

pub fn dm_member(conn: &Connection, dm_id: i64, user_id: i64) -> Result<DmRow, ApiError> {
    let dm = dm(conn, dm_id)?;
    if !dms::is_member(conn, dm_id, user_id)? {
        return Err(ApiError::access("You are not a member of this DM"));
    }
    Ok(dm)
}

/// Resolve a channel or DM and require the caller to belong to it.
/// Returns its display name.
pub fn location_member(conn: &Connection, location: Location, user_id: i64) -> Result<String, ApiError> {
    match location {
        Location::Channel(id) => Ok(channel_member(conn, id, user_id)?.name),
        Location::Dm(id) => Ok(dm_member(conn, id, user_id)?.name),
    }
}

pub fn is_location_member(conn: &Connection, location: Location, user_id: i64) -> Result<bool, ApiError> {
    let member = match location {
        Location::Channel(id) => channels::is_member(conn, id, user_id)?,
        Location::Dm(id) => dms::is_member(conn, id, user_id)?,
    };
    Ok(member)
}

pub fn location_name(conn: &Connection, location: Location) -> Result<String, ApiError> {
    match location {
        Location::Channel(id) => Ok(channel(conn, id)?.name),
        Location::Dm(id) => Ok(dm(conn, id)?.name),
    }
}

/// Channel owners, and global owners who are members.
pub fn has_owner_permissions(conn: &Connection, channel_id: i64, user_id: i64) -> Result<bool, ApiError> {
    if channels::is_owner(conn, channel_id, user_id)? {
        return Ok(true);
    }
    let global = users::user_by_id(conn, user_id)?.is_some_and(|u| u.is_global_owner);
    Ok(global && channels::is_member(conn, channel_id, user_id)?)
}

/// May `user_id` edit, remove or pin other people's messages here?
pub fn can_moderate(conn: &Connection, location: Location, user_id: i64) -> Result<bool, ApiError> {
    match location {
        Location::Channel(id) => has_owner_permissions(conn, id, user_id),
        Location::Dm(id) => {
            let dm = dm(conn, id)?;
            Ok(dm.creator_id == user_id && !dm.creator_left)
        }
    }
}

// -- Messages --

/// A delivered message in a channel or DM the caller belongs to.
pub fn visible_message(conn: &Connection, message_id: i64, user_id: i64) -> Result<MessageRow, ApiError> {
    let message = messages::message_by_id(conn, message_id)?
        .ok_or_else(|| ApiError::input("Invalid message"))?;
    if !is_location_member(conn, message.location, user_id)? {
        return Err(ApiError::input("Invalid message"));
    }
    Ok(message)
}
