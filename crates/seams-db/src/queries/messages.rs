use anyhow::{Result, anyhow};
use rusqlite::{Connection, Row, params};

use super::OptionalExt;
use crate::models::{Location, MessageRow, ReactionRow};

const MESSAGE_COLUMNS: &str = "id, channel_id, dm_id, author_id, body, time_sent, is_pinned";

fn map_message(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    let channel_id: Option<i64> = row.get(1)?;
    let dm_id: Option<i64> = row.get(2)?;
    let location = match (channel_id, dm_id) {
        (Some(id), _) => Location::Channel(id),
        (None, Some(id)) => Location::Dm(id),
        (None, None) => return Err(rusqlite::Error::InvalidColumnType(1, "channel_id".into(), rusqlite::types::Type::Null)),
    };
    Ok(MessageRow {
        id: row.get(0)?,
        location,
        author_id: row.get(3)?,
        body: row.get(4)?,
        time_sent: row.get(5)?,
        is_pinned: row.get(6)?,
    })
}

/// Store a message. Pending messages stay invisible until delivered.
pub fn insert_message(
    conn: &Connection,
    location: Location,
    author_id: i64,
    body: &str,
    time_sent: i64,
    pending: bool,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO messages (channel_id, dm_id, author_id, body, time_sent, pending)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            location.channel_id(),
            location.dm_id(),
            author_id,
            body,
            time_sent,
            pending
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// A delivered message.
pub fn message_by_id(conn: &Connection, id: i64) -> Result<Option<MessageRow>> {
    let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1 AND pending = 0");
    conn.query_row(&sql, [id], map_message).optional()
}

fn location_filter(location: Location) -> &'static str {
    match location {
        Location::Channel(_) => "channel_id = ?1",
        Location::Dm(_) => "dm_id = ?1",
    }
}

/// Newest first, `limit` delivered messages starting `start` from the newest.
pub fn page(conn: &Connection, location: Location, start: i64, limit: i64) -> Result<Vec<MessageRow>> {
    let sql = format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages
         WHERE {} AND pending = 0
         ORDER BY time_sent DESC, id DESC
         LIMIT ?2 OFFSET ?3",
        location_filter(location)
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![location.id(), limit, start], map_message)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn count_delivered(conn: &Connection, location: Location) -> Result<i64> {
    let sql = format!(
        "SELECT COUNT(*) FROM messages WHERE {} AND pending = 0",
        location_filter(location)
    );
    let n = conn.query_row(&sql, [location.id()], |row| row.get(0))?;
    Ok(n)
}

/// Every delivered message in a channel or DM `user_id` currently belongs to.
pub fn visible_to(conn: &Connection, user_id: i64) -> Result<Vec<MessageRow>> {
    let sql = format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages
         WHERE pending = 0
           AND (channel_id IN (SELECT channel_id FROM channel_members WHERE user_id = ?1)
             OR dm_id IN (SELECT dm_id FROM dm_members WHERE user_id = ?1))
         ORDER BY time_sent DESC, id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([user_id], map_message)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn update_body(conn: &Connection, id: i64, body: &str) -> Result<()> {
    let n = conn.execute("UPDATE messages SET body = ?1 WHERE id = ?2", params![body, id])?;
    if n == 0 {
        return Err(anyhow!("Message not found: {}", id));
    }
    Ok(())
}

pub fn delete_message(conn: &Connection, id: i64) -> Result<()> {
    conn.execute("DELETE FROM messages WHERE id = ?1", [id])?;
    Ok(())
}

pub fn set_pinned(conn: &Connection, id: i64, pinned: bool) -> Result<()> {
    conn.execute(
        "UPDATE messages SET is_pinned = ?1 WHERE id = ?2",
        params![pinned, id],
    )?;
    Ok(())
}

pub fn replace_author_bodies(conn: &Connection, author_id: i64, body: &str) -> Result<usize> {
    let n = conn.execute(
        "UPDATE messages SET body = ?1 WHERE author_id = ?2",
        params![body, author_id],
    )?;
    Ok(n)
}

// -- Scheduled delivery --

/// Pending messages whose send time has arrived, oldest first.
pub fn due_pending(conn: &Connection, now: i64) -> Result<Vec<MessageRow>> {
    let sql = format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages
         WHERE pending = 1 AND time_sent <= ?1
         ORDER BY time_sent, id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([now], map_message)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn mark_delivered(conn: &Connection, id: i64) -> Result<()> {
    conn.execute("UPDATE messages SET pending = 0 WHERE id = ?1", [id])?;
    Ok(())
}

// -- Reactions --

pub fn add_reaction(conn: &Connection, message_id: i64, react_id: i64, user_id: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO reactions (message_id, react_id, user_id) VALUES (?1, ?2, ?3)",
        params![message_id, react_id, user_id],
    )?;
    Ok(())
}

pub fn remove_reaction(conn: &Connection, message_id: i64, react_id: i64, user_id: i64) -> Result<()> {
    conn.execute(
        "DELETE FROM reactions WHERE message_id = ?1 AND react_id = ?2 AND user_id = ?3",
        params![message_id, react_id, user_id],
    )?;
    Ok(())
}

pub fn has_reacted(conn: &Connection, message_id: i64, react_id: i64, user_id: i64) -> Result<bool> {
    let found: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM reactions
                       WHERE message_id = ?1 AND react_id = ?2 AND user_id = ?3)",
        params![message_id, react_id, user_id],
        |row| row.get(0),
    )?;
    Ok(found)
}

/// Ids bound per reaction lookup, well under SQLite's host parameter limit.
const REACTION_BATCH: usize = 500;

/// Batch-fetch reactions for a set of message IDs, in the order they were added.
pub fn reactions_for_messages(conn: &Connection, message_ids: &[i64]) -> Result<Vec<ReactionRow>> {
    let mut rows = Vec::new();
    for chunk in message_ids.chunks(REACTION_BATCH) {
        let placeholders: Vec<String> = (1..=chunk.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "SELECT message_id, react_id, user_id FROM reactions
             WHERE message_id IN ({})
             ORDER BY rowid",
            placeholders.join(", ")
        );

        let mut stmt = conn.prepare(&sql)?;
        let mapped = stmt.query_map(rusqlite::params_from_iter(chunk), |row| {
            Ok(ReactionRow {
                message_id: row.get(0)?,
                react_id: row.get(1)?,
                user_id: row.get(2)?,
            })
        })?;
        for row in mapped {
            rows.push(row?);
        }
    }
    Ok(rows)
}
