use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            email            TEXT NOT NULL,
            password         TEXT NOT NULL,
            name_first       TEXT NOT NULL,
            name_last        TEXT NOT NULL,
            handle           TEXT NOT NULL,
            profile_img_url  TEXT NOT NULL,
            is_global_owner  INTEGER NOT NULL DEFAULT 0,
            removed          INTEGER NOT NULL DEFAULT 0,
            reset_code       TEXT,
            reset_expires    INTEGER,
            created_at       TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);
        CREATE INDEX IF NOT EXISTS idx_users_handle ON users(handle);

        CREATE TABLE IF NOT EXISTS sessions (
            token       TEXT PRIMARY KEY,
            user_id     INTEGER NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS channels (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL,
            is_public   INTEGER NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- rowid order is join order
        CREATE TABLE IF NOT EXISTS channel_members (
            channel_id  INTEGER NOT NULL REFERENCES channels(id),
            user_id     INTEGER NOT NULL REFERENCES users(id),
            is_owner    INTEGER NOT NULL DEFAULT 0,
            UNIQUE(channel_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS dms (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            name          TEXT NOT NULL,
            creator_id    INTEGER NOT NULL REFERENCES users(id),
            creator_left  INTEGER NOT NULL DEFAULT 0,
            created_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS dm_members (
            dm_id    INTEGER NOT NULL REFERENCES dms(id) ON DELETE CASCADE,
            user_id  INTEGER NOT NULL REFERENCES users(id),
            UNIQUE(dm_id, user_id)
        );

        -- Message ids are shared by channels and DMs. Exactly one of
        -- channel_id / dm_id is set.
        CREATE TABLE IF NOT EXISTS messages (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            channel_id  INTEGER REFERENCES channels(id),
            dm_id       INTEGER REFERENCES dms(id) ON DELETE CASCADE,
            author_id   INTEGER NOT NULL REFERENCES users(id),
            body        TEXT NOT NULL,
            time_sent   INTEGER NOT NULL,
            is_pinned   INTEGER NOT NULL DEFAULT 0,
            pending     INTEGER NOT NULL DEFAULT 0,
            CHECK ((channel_id IS NULL) != (dm_id IS NULL))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_channel
            ON messages(channel_id, time_sent);
        CREATE INDEX IF NOT EXISTS idx_messages_dm
            ON messages(dm_id, time_sent);
        CREATE INDEX IF NOT EXISTS idx_messages_pending
            ON messages(pending, time_sent);

        CREATE TABLE IF NOT EXISTS reactions (
            message_id  INTEGER NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
            react_id    INTEGER NOT NULL,
            user_id     INTEGER NOT NULL REFERENCES users(id),
            PRIMARY KEY (message_id, react_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS notifications (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     INTEGER NOT NULL REFERENCES users(id),
            channel_id  INTEGER NOT NULL DEFAULT -1,
            dm_id       INTEGER NOT NULL DEFAULT -1,
            message     TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_notifications_user
            ON notifications(user_id, id);

        CREATE TABLE IF NOT EXISTS standups (
            channel_id   INTEGER PRIMARY KEY REFERENCES channels(id),
            starter_id   INTEGER NOT NULL REFERENCES users(id),
            time_finish  INTEGER NOT NULL,
            buffer       TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS user_stats (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     INTEGER NOT NULL REFERENCES users(id),
            metric      TEXT NOT NULL,
            value       INTEGER NOT NULL,
            time_stamp  INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_user_stats
            ON user_stats(user_id, metric, id);

        CREATE TABLE IF NOT EXISTS workspace_stats (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            metric      TEXT NOT NULL,
            value       INTEGER NOT NULL,
            time_stamp  INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS wordle_games (
            location          TEXT NOT NULL,
            location_id       INTEGER NOT NULL,
            host_id           INTEGER NOT NULL REFERENCES users(id),
            answer            TEXT NOT NULL,
            guesses           INTEGER NOT NULL DEFAULT 0,
            current           TEXT NOT NULL DEFAULT '_____',
            misplaced         TEXT NOT NULL DEFAULT '',
            incorrect         TEXT NOT NULL DEFAULT '',
            history           TEXT NOT NULL DEFAULT '',
            board_message_id  INTEGER NOT NULL DEFAULT 0,
            prompt_message_id INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (location, location_id)
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
