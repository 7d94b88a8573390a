use anyhow::Result;
use rusqlite::{Connection, params};

use crate::models::{Location, NotificationRow};

pub fn push_notification(conn: &Connection, user_id: i64, location: Location, message: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO notifications (user_id, channel_id, dm_id, message) VALUES (?1, ?2, ?3, ?4)",
        params![
            user_id,
            location.channel_id().unwrap_or(-1),
            location.dm_id().unwrap_or(-1),
            message
        ],
    )?;
    Ok(())
}

/// Newest first.
pub fn recent(conn: &Connection, user_id: i64, limit: i64) -> Result<Vec<NotificationRow>> {
    let mut stmt = conn.prepare(
        "SELECT channel_id, dm_id, message FROM notifications
         WHERE user_id = ?1
         ORDER BY id DESC
         LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![user_id, limit], |row| {
            Ok(NotificationRow {
                channel_id: row.get(0)?,
                dm_id: row.get(1)?,
                message: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
