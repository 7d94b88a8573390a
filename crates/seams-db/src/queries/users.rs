use anyhow::Result;
use rusqlite::{Connection, Row, params};

use super::OptionalExt;
use crate::models::UserRow;

const USER_COLUMNS: &str =
    "id, email, password, name_first, name_last, handle, profile_img_url, is_global_owner, removed";

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
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
}

pub struct NewUser<'a> {
    pub email: &'a str,
    pub password_hash: &'a str,
    pub name_first: &'a str,
    pub name_last: &'a str,
    pub handle: &'a str,
    pub profile_img_url: &'a str,
    pub is_global_owner: bool,
}

pub fn insert_user(conn: &Connection, user: &NewUser<'_>) -> Result<i64> {
    conn.execute(
        "INSERT INTO users (email, password, name_first, name_last, handle, profile_img_url, is_global_owner)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            user.email,
            user.password_hash,
            user.name_first,
            user.name_last,
            user.handle,
            user.profile_img_url,
            user.is_global_owner,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Any user ever registered, removed ones included.
pub fn user_by_id(conn: &Connection, id: i64) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    conn.query_row(&sql, [id], map_user).optional()
}

pub fn active_user_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1 AND removed = 0");
    conn.query_row(&sql, [email], map_user).optional()
}

/// True when an active user other than `except` holds this email.
pub fn email_taken(conn: &Connection, email: &str, except: Option<i64>) -> Result<bool> {
    let taken: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1 AND removed = 0 AND id != ?2)",
        params![email, except.unwrap_or(-1)],
        |row| row.get(0),
    )?;
    Ok(taken)
}

/// True when an active user other than `except` holds this handle.
pub fn handle_taken(conn: &Connection, handle: &str, except: Option<i64>) -> Result<bool> {
    let taken: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE handle = ?1 AND removed = 0 AND id != ?2)",
        params![handle, except.unwrap_or(-1)],
        |row| row.get(0),
    )?;
    Ok(taken)
}

pub fn count_users(conn: &Connection) -> Result<i64> {
    let n = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    Ok(n)
}

pub fn active_users(conn: &Connection) -> Result<Vec<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE removed = 0 ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], map_user)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn count_global_owners(conn: &Connection) -> Result<i64> {
    let n = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE is_global_owner = 1 AND removed = 0",
        [],
        |row| row.get(0),
    )?;
    Ok(n)
}

/// Active users that belong to at least one channel or DM.
pub fn count_involved_users(conn: &Connection) -> Result<i64> {
    let n = conn.query_row(
        "SELECT COUNT(*) FROM users u
         WHERE u.removed = 0
           AND (EXISTS(SELECT 1 FROM channel_members cm WHERE cm.user_id = u.id)
             OR EXISTS(SELECT 1 FROM dm_members dm WHERE dm.user_id = u.id))",
        [],
        |row| row.get(0),
    )?;
    Ok(n)
}

pub fn set_name(conn: &Connection, id: i64, name_first: &str, name_last: &str) -> Result<()> {
    conn.execute(
        "UPDATE users SET name_first = ?1, name_last = ?2 WHERE id = ?3",
        params![name_first, name_last, id],
    )?;
    Ok(())
}

pub fn set_email(conn: &Connection, id: i64, email: &str) -> Result<()> {
    conn.execute("UPDATE users SET email = ?1 WHERE id = ?2", params![email, id])?;
    Ok(())
}

pub fn set_handle(conn: &Connection, id: i64, handle: &str) -> Result<()> {
    conn.execute("UPDATE users SET handle = ?1 WHERE id = ?2", params![handle, id])?;
    Ok(())
}

pub fn set_profile_img_url(conn: &Connection, id: i64, url: &str) -> Result<()> {
    conn.execute(
        "UPDATE users SET profile_img_url = ?1 WHERE id = ?2",
        params![url, id],
    )?;
    Ok(())
}

pub fn set_global_owner(conn: &Connection, id: i64, is_owner: bool) -> Result<()> {
    conn.execute(
        "UPDATE users SET is_global_owner = ?1 WHERE id = ?2",
        params![is_owner, id],
    )?;
    Ok(())
}

pub fn set_password(conn: &Connection, id: i64, password_hash: &str) -> Result<()> {
    conn.execute(
        "UPDATE users SET password = ?1 WHERE id = ?2",
        params![password_hash, id],
    )?;
    Ok(())
}

// -- Password reset --

pub fn set_reset_code(conn: &Connection, id: i64, code: &str, expires: i64) -> Result<()> {
    conn.execute(
        "UPDATE users SET reset_code = ?1, reset_expires = ?2 WHERE id = ?3",
        params![code, expires, id],
    )?;
    Ok(())
}

/// The active user holding `code`, provided it has not expired at `now`.
pub fn user_by_reset_code(conn: &Connection, code: &str, now: i64) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users
         WHERE reset_code = ?1 AND reset_expires >= ?2 AND removed = 0"
    );
    conn.query_row(&sql, params![code, now], map_user).optional()
}

pub fn clear_reset_code(conn: &Connection, id: i64) -> Result<()> {
    conn.execute(
        "UPDATE users SET reset_code = NULL, reset_expires = NULL WHERE id = ?1",
        [id],
    )?;
    Ok(())
}

/// Soft-delete: the row stays so old messages and ids still resolve, but the
/// email and handle stop counting as taken.
pub fn mark_removed(conn: &Connection, id: i64) -> Result<()> {
    conn.execute(
        "UPDATE users
         SET name_first = 'Removed', name_last = 'user', removed = 1, is_global_owner = 0,
             reset_code = NULL, reset_expires = NULL
         WHERE id = ?1",
        [id],
    )?;
    Ok(())
}
