use anyhow::Result;
use rusqlite::{Connection, Row, params};

use super::OptionalExt;
use crate::models::{ChannelRow, UserRow};

fn map_channel(row: &Row<'_>) -> rusqlite::Result<ChannelRow> {
    Ok(ChannelRow {
        id: row.get(0)?,
        name: row.get(1)?,
        is_public: row.get(2)?,
    })
}

pub fn insert_channel(conn: &Connection, name: &str, is_public: bool) -> Result<i64> {
    conn.execute(
        "INSERT INTO channels (name, is_public) VALUES (?1, ?2)",
        params![name, is_public],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn channel_by_id(conn: &Connection, id: i64) -> Result<Option<ChannelRow>> {
    conn.query_row(
        "SELECT id, name, is_public FROM channels WHERE id = ?1",
        [id],
        map_channel,
    )
    .optional()
}

pub fn all_channels(conn: &Connection) -> Result<Vec<ChannelRow>> {
    let mut stmt = conn.prepare("SELECT id, name, is_public FROM channels ORDER BY id")?;
    let rows = stmt
        .query_map([], map_channel)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn channels_for_user(conn: &Connection, user_id: i64) -> Result<Vec<ChannelRow>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.name, c.is_public
         FROM channels c
         JOIN channel_members m ON m.channel_id = c.id
         WHERE m.user_id = ?1
         ORDER BY c.id",
    )?;
    let rows = stmt
        .query_map([user_id], map_channel)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// -- Membership --

pub fn add_member(conn: &Connection, channel_id: i64, user_id: i64, is_owner: bool) -> Result<()> {
    conn.execute(
        "INSERT INTO channel_members (channel_id, user_id, is_owner) VALUES (?1, ?2, ?3)",
        params![channel_id, user_id, is_owner],
    )?;
    Ok(())
}

pub fn remove_member(conn: &Connection, channel_id: i64, user_id: i64) -> Result<()> {
    conn.execute(
        "DELETE FROM channel_members WHERE channel_id = ?1 AND user_id = ?2",
        params![channel_id, user_id],
    )?;
    Ok(())
}

pub fn is_member(conn: &Connection, channel_id: i64, user_id: i64) -> Result<bool> {
    let found: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM channel_members WHERE channel_id = ?1 AND user_id = ?2)",
        params![channel_id, user_id],
        |row| row.get(0),
    )?;
    Ok(found)
}

pub fn is_owner(conn: &Connection, channel_id: i64, user_id: i64) -> Result<bool> {
    let found: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM channel_members
                       WHERE channel_id = ?1 AND user_id = ?2 AND is_owner = 1)",
        params![channel_id, user_id],
        |row| row.get(0),
    )?;
    Ok(found)
}

pub fn set_owner(conn: &Connection, channel_id: i64, user_id: i64, is_owner: bool) -> Result<()> {
    conn.execute(
        "UPDATE channel_members SET is_owner = ?1 WHERE channel_id = ?2 AND user_id = ?3",
        params![is_owner, channel_id, user_id],
    )?;
    Ok(())
}

pub fn count_owners(conn: &Connection, channel_id: i64) -> Result<i64> {
    let n = conn.query_row(
        "SELECT COUNT(*) FROM channel_members WHERE channel_id = ?1 AND is_owner = 1",
        [channel_id],
        |row| row.get(0),
    )?;
    Ok(n)
}

fn query_members(conn: &Connection, channel_id: i64, owners_only: bool) -> Result<Vec<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.email, u.password, u.name_first, u.name_last, u.handle,
                u.profile_img_url, u.is_global_owner, u.removed
         FROM channel_members m
         JOIN users u ON u.id = m.user_id
         WHERE m.channel_id = ?1 AND (?2 = 0 OR m.is_owner = 1)
         ORDER BY m.rowid",
    )?;
    let rows = stmt
        .query_map(params![channel_id, owners_only], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                email: row.get(1)?,
                password: row.get(2)?,
                name_first: row.get(3)?,
                name_last: row.get(4)?,
                handle: row.get(5)?,
                profile_img_url: row.get(6)?,
                is_global_owner: row.get(7)?,
                removed: row.get(8)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Members in join order.
pub fn members(conn: &Connection, channel_id: i64) -> Result<Vec<UserRow>> {
    query_members(conn, channel_id, false)
}

pub fn owners(conn: &Connection, channel_id: i64) -> Result<Vec<UserRow>> {
    query_members(conn, channel_id, true)
}

/// Channels `user_id` currently belongs to, as ids.
pub fn channel_ids_for_user(conn: &Connection, user_id: i64) -> Result<Vec<i64>> {
    let mut stmt =
        conn.prepare("SELECT channel_id FROM channel_members WHERE user_id = ?1 ORDER BY channel_id")?;
    let ids = stmt
        .query_map([user_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}
