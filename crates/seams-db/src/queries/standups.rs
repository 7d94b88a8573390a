use anyhow::Result;
use rusqlite::{Connection, Row, params};

use super::OptionalExt;
use crate::models::StandupRow;

fn map_standup(row: &Row<'_>) -> rusqlite::Result<StandupRow> {
    Ok(StandupRow {
        channel_id: row.get(0)?,
        starter_id: row.get(1)?,
        time_finish: row.get(2)?,
        buffer: row.get(3)?,
    })
}

pub fn standup_for_channel(conn: &Connection, channel_id: i64) -> Result<Option<StandupRow>> {
    conn.query_row(
        "SELECT channel_id, starter_id, time_finish, buffer FROM standups WHERE channel_id = ?1",
        [channel_id],
        map_standup,
    )
    .optional()
}

pub fn insert_standup(conn: &Connection, channel_id: i64, starter_id: i64, time_finish: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO standups (channel_id, starter_id, time_finish) VALUES (?1, ?2, ?3)",
        params![channel_id, starter_id, time_finish],
    )?;
    Ok(())
}

/// Append one line to the standup summary.
pub fn append_line(conn: &Connection, channel_id: i64, line: &str) -> Result<()> {
    conn.execute(
        "UPDATE standups SET buffer = buffer || ?1 || char(10) WHERE channel_id = ?2",
        params![line, channel_id],
    )?;
    Ok(())
}

pub fn due_standups(conn: &Connection, now: i64) -> Result<Vec<StandupRow>> {
    let mut stmt = conn.prepare(
        "SELECT channel_id, starter_id, time_finish, buffer FROM standups
         WHERE time_finish <= ?1
         ORDER BY time_finish, channel_id",
    )?;
    let rows = stmt
        .query_map([now], map_standup)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn delete_standup(conn: &Connection, channel_id: i64) -> Result<()> {
    conn.execute("DELETE FROM standups WHERE channel_id = ?1", [channel_id])?;
    Ok(())
}
