use anyhow::Result;
use rusqlite::{Connection, params};

use super::OptionalExt;
use crate::models::{Location, WordleRow};

pub fn game_at(conn: &Connection, location: Location) -> Result<Option<WordleRow>> {
    conn.query_row(
        "SELECT host_id, answer, guesses, current, misplaced, incorrect, history,
                board_message_id, prompt_message_id
         FROM wordle_games WHERE location = ?1 AND location_id = ?2",
        params![location.kind(), location.id()],
        |row| {
            Ok(WordleRow {
                location,
                host_id: row.get(0)?,
                answer: row.get(1)?,
                guesses: row.get(2)?,
                current: row.get(3)?,
                misplaced: row.get(4)?,
                incorrect: row.get(5)?,
                history: row.get(6)?,
                board_message_id: row.get(7)?,
                prompt_message_id: row.get(8)?,
            })
        },
    )
    .optional()
}

/// Insert or overwrite the game at `game.location`.
pub fn save_game(conn: &Connection, game: &WordleRow) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO wordle_games
            (location, location_id, host_id, answer, guesses, current, misplaced, incorrect,
             history, board_message_id, prompt_message_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            game.location.kind(),
            game.location.id(),
            game.host_id,
            game.answer,
            game.guesses,
            game.current,
            game.misplaced,
            game.incorrect,
            game.history,
            game.board_message_id,
            game.prompt_message_id,
        ],
    )?;
    Ok(())
}

pub fn delete_game(conn: &Connection, location: Location) -> Result<()> {
    conn.execute(
        "DELETE FROM wordle_games WHERE location = ?1 AND location_id = ?2",
        params![location.kind(), location.id()],
    )?;
    Ok(())
}
