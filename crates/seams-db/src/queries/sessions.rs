use anyhow::Result;
use rusqlite::{Connection, params};

use super::OptionalExt;

pub fn insert_session(conn: &Connection, token: &str, user_id: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO sessions (token, user_id) VALUES (?1, ?2)",
        params![token, user_id],
    )?;
    Ok(())
}

/// Owner of a live session, or `None` once the token has been logged out.
pub fn session_user(conn: &Connection, token: &str) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT user_id FROM sessions WHERE token = ?1",
        [token],
        |row| row.get(0),
    )
    .optional()
}

pub fn delete_session(conn: &Connection, token: &str) -> Result<bool> {
    let n = conn.execute("DELETE FROM sessions WHERE token = ?1", [token])?;
    Ok(n > 0)
}

pub fn delete_user_sessions(conn: &Connection, user_id: i64) -> Result<usize> {
    let n = conn.execute("DELETE FROM sessions WHERE user_id = ?1", [user_id])?;
    Ok(n)
}
