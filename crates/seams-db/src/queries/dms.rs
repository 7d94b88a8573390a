use anyhow::Result;
use rusqlite::{Connection, Row, params};

use super::OptionalExt;
use crate::models::{DmRow, UserRow};

fn map_dm(row: &Row<'_>) -> rusqlite::Result<DmRow> {
    Ok(DmRow {
        id: row.get(0)?,
        name: row.get(1)?,
        creator_id: row.get(2)?,
        creator_left: row.get(3)?,
    })
}

pub fn insert_dm(conn: &Connection, name: &str, creator_id: i64) -> Result<i64> {
    conn.execute(
        "INSERT INTO dms (name, creator_id) VALUES (?1, ?2)",
        params![name, creator_id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn dm_by_id(conn: &Connection, id: i64) -> Result<Option<DmRow>> {
    conn.query_row(
        "SELECT id, name, creator_id, creator_left FROM dms WHERE id = ?1",
        [id],
        map_dm,
    )
    .optional()
}

pub fn dms_for_user(conn: &Connection, user_id: i64) -> Result<Vec<DmRow>> {
    let mut stmt = conn.prepare(
        "SELECT d.id, d.name, d.creator_id, d.creator_left
         FROM dms d
         JOIN dm_members m ON m.dm_id = d.id
         WHERE m.user_id = ?1
         ORDER BY d.id",
    )?;
    let rows = stmt
        .query_map([user_id], map_dm)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn add_member(conn: &Connection, dm_id: i64, user_id: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO dm_members (dm_id, user_id) VALUES (?1, ?2)",
        params![dm_id, user_id],
    )?;
    Ok(())
}

pub fn remove_member(conn: &Connection, dm_id: i64, user_id: i64) -> Result<()> {
    conn.execute(
        "DELETE FROM dm_members WHERE dm_id = ?1 AND user_id = ?2",
        params![dm_id, user_id],
    )?;
    Ok(())
}

pub fn is_member(conn: &Connection, dm_id: i64, user_id: i64) -> Result<bool> {
    let found: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM dm_members WHERE dm_id = ?1 AND user_id = ?2)",
        params![dm_id, user_id],
        |row| row.get(0),
    )?;
    Ok(found)
}

/// Members in the order they were added.
pub fn members(conn: &Connection, dm_id: i64) -> Result<Vec<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.email, u.password, u.name_first, u.name_last, u.handle,
                u.profile_img_url, u.is_global_owner, u.removed
         FROM dm_members m
         JOIN users u ON u.id = m.user_id
         WHERE m.dm_id = ?1
         ORDER BY m.rowid",
    )?;
    let rows = stmt
        .query_map([dm_id], |row| {
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

pub fn set_creator_left(conn: &Connection, dm_id: i64) -> Result<()> {
    conn.execute("UPDATE dms SET creator_left = 1 WHERE id = ?1", [dm_id])?;
    Ok(())
}

/// Mark every DM created by `user_id` as abandoned by its creator.
pub fn mark_creator_left_for(conn: &Connection, user_id: i64) -> Result<()> {
    conn.execute("UPDATE dms SET creator_left = 1 WHERE creator_id = ?1", [user_id])?;
    Ok(())
}

/// Deletes the DM together with its members, messages and any game in it.
/// AUTOINCREMENT keeps the id from being handed out again.
pub fn delete_dm(conn: &Connection, dm_id: i64) -> Result<()> {
    conn.execute(
        "DELETE FROM wordle_games WHERE location = 'dm' AND location_id = ?1",
        [dm_id],
    )?;
    conn.execute("DELETE FROM dms WHERE id = ?1", [dm_id])?;
    Ok(())
}

pub fn dm_ids_for_user(conn: &Connection, user_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT dm_id FROM dm_members WHERE user_id = ?1 ORDER BY dm_id")?;
    let ids = stmt
        .query_map([user_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}
