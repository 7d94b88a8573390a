pub mod channels;
pub mod dms;
pub mod messages;
pub mod notifications;
pub mod sessions;
pub mod standups;
pub mod stats;
pub mod users;
pub mod wordle;

use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Wipe every table and restart all id sequences.
pub fn clear(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        DELETE FROM wordle_games;
        DELETE FROM workspace_stats;
        DELETE FROM user_stats;
        DELETE FROM standups;
        DELETE FROM notifications;
        DELETE FROM reactions;
        DELETE FROM messages;
        DELETE FROM dm_members;
        DELETE FROM dms;
        DELETE FROM channel_members;
        DELETE FROM channels;
        DELETE FROM sessions;
        DELETE FROM users;
        DELETE FROM sqlite_sequence;
        ",
    )?;

    info!("Store cleared");
    Ok(())
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
