//! A game of Wordle played through `/wordle` messages in a channel or DM.
//!
//! `/wordle start` posts a board and a prompt as the starter. Guesses edit the
//! board in place; the game ends on a correct guess, after five wrong ones,
//! or on `/wordle end`.

use once_cell::sync::Lazy;
use rand::seq::IndexedRandom;
use rusqlite::Connection;
use tracing::info;

use seams_db::models::{Location, WordleRow};
use seams_db::queries::{messages, wordle};

use crate::error::ApiError;
use crate::messages::post_message;

pub const COMMAND: &str = "/wordle";
pub const MAX_GUESSES: i64 = 5;

const PROMPT: &str = "Welcome to Wordle. Please enter '/wordle' and a 5 letter word: ";
const ENDED: &str = "Wordle ended, please try again at another time";

static WORDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    include_str!("words.txt")
        .lines()
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .collect()
});

/// Does this message address the game?
pub fn is_command(text: &str) -> bool {
    text.split_whitespace().next() == Some(COMMAND)
}

fn spaced_upper(word: &str) -> String {
    word.chars().flat_map(|c| [c.to_ascii_uppercase(), ' ']).collect()
}

fn letter_list(letters: &str) -> String {
    let mut sorted: Vec<char> = letters.chars().map(|c| c.to_ascii_uppercase()).collect();
    sorted.sort_unstable();
    sorted
        .iter()
        .map(char::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_board(game: &WordleRow) -> String {
    let history: String = game
        .history
        .split_whitespace()
        .map(|g| format!("{}\n", g.to_ascii_uppercase()))
        .collect();
    format!(
        "CURRENT WORDLE: \n\n{}\n\n{}\nMisplaced letters: {}\nIncorrect letters: {}\nGuesses left: {}",
        spaced_upper(&game.current),
        history,
        letter_list(&game.misplaced),
        letter_list(&game.incorrect),
        MAX_GUESSES - game.guesses,
    )
}

/// Fold one guess into the game state.
fn score_guess(game: &mut WordleRow, guess: &str) {
    let answer: Vec<char> = game.answer.chars().collect();
    let mut current: Vec<char> = game.current.chars().collect();

    for (i, c) in guess.chars().enumerate() {
        if answer.get(i) == Some(&c) {
            if let Some(slot) = current.get_mut(i) {
                *slot = c;
            }
        } else if answer.contains(&c) {
            if !game.misplaced.contains(c) {
                game.misplaced.push(c);
            }
        } else if !game.incorrect.contains(c) {
            game.incorrect.push(c);
        }
    }

    let current: String = current.into_iter().collect();
    game.misplaced.retain(|c| !current.contains(c));
    game.current = current;
    game.guesses += 1;
    game.history.push_str(guess);
    game.history.push(' ');
}

fn start_game(conn: &Connection, location: Location, host_id: i64, answer: &str, now: i64) -> Result<(), ApiError> {
    let mut game = WordleRow {
        location,
        host_id,
        answer: answer.to_string(),
        guesses: 0,
        current: "_____".to_string(),
        misplaced: String::new(),
        incorrect: String::new(),
        history: String::new(),
        board_message_id: 0,
        prompt_message_id: 0,
    };

    game.board_message_id = post_message(conn, location, host_id, &render_board(&game), now)?;
    game.prompt_message_id = post_message(conn, location, host_id, PROMPT, now)?;
    wordle::save_game(conn, &game)?;

    info!("Wordle started in {} {} by user {}", location.kind(), location.id(), host_id);
    Ok(())
}

/// Repost the board or prompt if someone removed it.
fn restore_messages(conn: &Connection, game: &mut WordleRow, now: i64) -> Result<(), ApiError> {
    if messages::message_by_id(conn, game.board_message_id)?.is_none() {
        game.board_message_id = post_message(conn, game.location, game.host_id, &render_board(game), now)?;
    }
    if messages::message_by_id(conn, game.prompt_message_id)?.is_none() {
        game.prompt_message_id = post_message(conn, game.location, game.host_id, PROMPT, now)?;
    }
    Ok(())
}

fn guess_word(conn: &Connection, mut game: WordleRow, guess: &str, now: i64) -> Result<(), ApiError> {
    if !WORDS.contains(&guess) {
        return Err(ApiError::input("Not a word in the word bank"));
    }

    restore_messages(conn, &mut game, now)?;
    score_guess(&mut game, guess);
    messages::update_body(conn, game.board_message_id, &render_board(&game))?;

    if guess == game.answer {
        let text = format!(
            "{}\n✅ Well Done, you got the answer in {}! ✅",
            spaced_upper(&game.answer),
            game.guesses
        );
        messages::update_body(conn, game.prompt_message_id, &text)?;
        wordle::delete_game(conn, game.location)?;
    } else if game.guesses >= MAX_GUESSES {
        let text = format!(
            "‼️ OH no! You didnt get the answer in {} tries. The answer was '{}' ‼️",
            MAX_GUESSES,
            game.answer.to_ascii_uppercase()
        );
        messages::update_body(conn, game.prompt_message_id, &text)?;
        wordle::delete_game(conn, game.location)?;
    } else {
        wordle::save_game(conn, &game)?;
    }
    Ok(())
}

/// Run one `/wordle <arg>` command. Membership must already be checked.
pub fn play(conn: &Connection, location: Location, user_id: i64, text: &str, now: i64) -> Result<(), ApiError> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let [_, arg] = words.as_slice() else {
        return Err(ApiError::input("Usage: /wordle start | end | <guess>"));
    };
    let arg = arg.to_lowercase();
    let game = wordle::game_at(conn, location)?;

    match (arg.as_str(), game) {
        ("start", Some(_)) => Err(ApiError::input("A game is already running here")),
        ("start", None) => {
            let answer = WORDS
                .choose(&mut rand::rng())
                .ok_or_else(|| anyhow::anyhow!("word bank is empty"))?;
            start_game(conn, location, user_id, answer, now)
        }
        (_, None) => Err(ApiError::input("Game not started")),
        ("end", Some(game)) => {
            post_message(conn, location, game.host_id, ENDED, now)?;
            wordle::delete_game(conn, location)?;
            Ok(())
        }
        (guess, Some(game)) => guess_word(conn, game, guess, now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{edit_message, messages_page, remove_message, send_message};
    use crate::testing::{Fixture, register};

    fn rig_answer(conn: &Connection, location: Location, answer: &str) {
        let mut game = wordle::game_at(conn, location).unwrap().unwrap();
        game.answer = answer.to_string();
        wordle::save_game(conn, &game).unwrap();
    }

    #[test]
    fn recognises_commands() {
        assert!(is_command("/wordle start"));
        assert!(is_command("  /wordle"));
        assert!(!is_command("/wordles start"));
        assert!(!is_command("play /wordle"));
    }

    #[test]
    fn board_layout() {
        let mut game = WordleRow {
            location: Location::Channel(1),
            host_id: 1,
            answer: "crane".into(),
            guesses: 0,
            current: "_____".into(),
            misplaced: String::new(),
            incorrect: String::new(),
            history: String::new(),
            board_message_id: 0,
            prompt_message_id: 0,
        };
        score_guess(&mut game, "react");

        assert_eq!(
            render_board(&game),
            "CURRENT WORDLE: \n\n_ _ A _ _ \n\nREACT\n\nMisplaced letters: C, E, R\nIncorrect letters: T\nGuesses left: 4"
        );
    }

    #[test]
    fn revealed_letters_leave_misplaced() {
        let mut game = WordleRow {
            location: Location::Channel(1),
            host_id: 1,
            answer: "crane".into(),
            guesses: 0,
            current: "_____".into(),
            misplaced: String::new(),
            incorrect: String::new(),
            history: String::new(),
            board_message_id: 0,
            prompt_message_id: 0,
        };

        score_guess(&mut game, "alarm");
        assert_eq!(game.current, "__a__");
        assert_eq!(letter_list(&game.misplaced), "R");
        assert_eq!(letter_list(&game.incorrect), "L, M");

        score_guess(&mut game, "crane");
        assert_eq!(
            render_board(&game),
            "CURRENT WORDLE: \n\nC R A N E \n\nALARM\nCRANE\n\nMisplaced letters: \nIncorrect letters: L, M\nGuesses left: 3"
        );
    }

    #[test]
    fn winning_game() {
        let fx = Fixture::new();
        fx.run(|conn| {
            let ann = register(conn, "a@seams.io", "Ann", "Lee");
            let channel = crate::channels::create_channel(conn, ann, "games", true, 0)?.channel_id;
            let location = Location::Channel(channel);

            assert!(matches!(
                send_message(conn, ann, location, "/wordle crane", 1),
                Err(ApiError::Input(_))
            ));
            let res = send_message(conn, ann, location, "/wordle start", 1)?;
            assert!(res.message_id.is_none());
            assert!(matches!(
                send_message(conn, ann, location, "/wordle start", 2),
                Err(ApiError::Input(_))
            ));
            rig_answer(conn, location, "crane");

            assert!(matches!(
                send_message(conn, ann, location, "/wordle zzzzz", 2),
                Err(ApiError::Input(_))
            ));
            assert!(matches!(
                send_message(conn, ann, location, "/wordle too many words", 2),
                Err(ApiError::Input(_))
            ));

            send_message(conn, ann, location, "/wordle alarm", 3)?;
            send_message(conn, ann, location, "/wordle CRANE", 4)?;

            let page = messages_page(conn, location, ann, 0)?;
            assert_eq!(page.messages.len(), 2);
            assert_eq!(
                page.messages[0].message,
                "C R A N E \n✅ Well Done, you got the answer in 2! ✅"
            );
            assert!(page.messages[1].message.ends_with("Guesses left: 3"));
            assert!(wordle::game_at(conn, location)?.is_none());
            Ok(())
        });
    }

    #[test]
    fn losing_and_ending_games() {
        let fx = Fixture::new();
        fx.run(|conn| {
            let ann = register(conn, "a@seams.io", "Ann", "Lee");
            let dm = crate::dm::create_dm(conn, ann, &[], 0)?.dm_id;
            let location = Location::Dm(dm);

            send_message(conn, ann, location, "/wordle start", 1)?;
            rig_answer(conn, location, "crane");
            for guess in ["house", "mouse", "light", "pound", "sugar"] {
                send_message(conn, ann, location, &format!("/wordle {guess}"), 2)?;
            }
            let page = messages_page(conn, location, ann, 0)?;
            assert_eq!(
                page.messages[0].message,
                "‼️ OH no! You didnt get the answer in 5 tries. The answer was 'CRANE' ‼️"
            );
            assert!(page.messages[1].message.ends_with("Guesses left: 0"));

            assert!(matches!(
                send_message(conn, ann, location, "/wordle end", 3),
                Err(ApiError::Input(_))
            ));
            send_message(conn, ann, location, "/wordle start", 4)?;
            send_message(conn, ann, location, "/wordle end", 5)?;
            let page = messages_page(conn, location, ann, 0)?;
            assert_eq!(page.messages[0].message, ENDED);
            assert!(wordle::game_at(conn, location)?.is_none());
            Ok(())
        });
    }

    #[test]
    fn end_is_announced_by_the_host() {
        let fx = Fixture::new();
        fx.run(|conn| {
            let ann = register(conn, "a@seams.io", "Ann", "Lee");
            let bob = register(conn, "b@seams.io", "Bob", "Ray");
            let channel = crate::channels::create_channel(conn, ann, "games", true, 0)?.channel_id;
            crate::channel::join_channel(conn, bob, channel, 0)?;
            let location = Location::Channel(channel);

            send_message(conn, ann, location, "/wordle start", 1)?;
            send_message(conn, bob, location, "/wordle end", 2)?;

            let page = messages_page(conn, location, bob, 0)?;
            assert_eq!(page.messages[0].message, ENDED);
            assert_eq!(page.messages[0].u_id, ann);
            Ok(())
        });
    }

    #[test]
    fn removed_board_is_reposted_on_next_guess() {
        let fx = Fixture::new();
        fx.run(|conn| {
            let ann = register(conn, "a@seams.io", "Ann", "Lee");
            let channel = crate::channels::create_channel(conn, ann, "games", true, 0)?.channel_id;
            let location = Location::Channel(channel);

            send_message(conn, ann, location, "/wordle start", 1)?;
            rig_answer(conn, location, "crane");
            let game = wordle::game_at(conn, location)?.unwrap();
            remove_message(conn, ann, game.board_message_id, 2)?;
            edit_message(conn, ann, game.prompt_message_id, "", 2)?;

            send_message(conn, ann, location, "/wordle alarm", 3)?;
            let moved = wordle::game_at(conn, location)?.unwrap();
            assert_ne!(moved.board_message_id, game.board_message_id);
            assert_ne!(moved.prompt_message_id, game.prompt_message_id);
            assert_eq!(moved.guesses, 1);

            let board = messages::message_by_id(conn, moved.board_message_id)?.unwrap();
            assert!(board.body.ends_with("Guesses left: 4"));
            assert_eq!(board.author_id, ann);

            send_message(conn, ann, location, "/wordle crane", 4)?;
            assert!(wordle::game_at(conn, location)?.is_none());
            Ok(())
        });
    }
}
