use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use rusqlite::Connection;

use seams_db::queries::messages;
use seams_types::api::{SearchQuery, SearchResponse};

use crate::checks::{MAX_MESSAGE_LEN, char_len};
use crate::error::ApiError;
use crate::messages::render_messages;
use crate::middleware::Session;
use crate::{AppState, run_blocking};

/// Case-insensitive substring match over every message the caller can see.
pub fn search_messages(conn: &Connection, user_id: i64, query_str: &str) -> Result<SearchResponse, ApiError> {
    let len = char_len(query_str);
    if len < 1 || len > MAX_MESSAGE_LEN {
        return Err(ApiError::input("Query must be between 1 and 1000 characters"));
    }

    let needle = query_str.to_lowercase();
    let rows = messages::visible_to(conn, user_id)?
        .into_iter()
        .filter(|m| m.body.to_lowercase().contains(&needle))
        .collect();

    Ok(SearchResponse {
        messages: render_messages(conn, rows, user_id)?,
    })
}

pub async fn search(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let res = run_blocking(&state, move |conn| {
        search_messages(conn, session.user_id, &query.query_str)
    })
    .await?;
    Ok(Json(res))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::send_message;
    use crate::testing::{Fixture, register};
    use seams_db::models::Location;

    #[test]
    fn matches_only_visible_messages() {
        let fx = Fixture::new();
        fx.run(|conn| {
            let ann = register(conn, "a@seams.io", "Ann", "Lee");
            let bob = register(conn, "b@seams.io", "Bob", "Ray");
            let shared = crate::channels::create_channel(conn, ann, "shared", true, 0)?.channel_id;
            let secret = crate::channels::create_channel(conn, ann, "secret", false, 0)?.channel_id;
            crate::channel::join_channel(conn, bob, shared, 0)?;

            send_message(conn, ann, Location::Channel(shared), "Release PLAN ready", 1)?;
            send_message(conn, ann, Location::Channel(secret), "secret plan", 2)?;
            let dm = crate::dm::create_dm(conn, bob, &[ann], 0)?.dm_id;
            send_message(conn, bob, Location::Dm(dm), "plan b?", 3)?;

            let hits = search_messages(conn, bob, "plan")?.messages;
            let mut bodies: Vec<_> = hits.iter().map(|m| m.message.as_str()).collect();
            bodies.sort();
            assert_eq!(bodies, vec!["Release PLAN ready", "plan b?"]);

            assert_eq!(search_messages(conn, ann, "PLAN")?.messages.len(), 3);
            assert!(matches!(search_messages(conn, ann, ""), Err(ApiError::Input(_))));
            assert!(matches!(
                search_messages(conn, ann, &"q".repeat(1001)),
                Err(ApiError::Input(_))
            ));
            Ok(())
        });
    }

    #[test]
    fn huge_result_sets_keep_their_reactions() {
        let fx = Fixture::new();
        fx.run(|conn| {
            let ann = register(conn, "a@seams.io", "Ann", "Lee");
            let channel = crate::channels::create_channel(conn, ann, "flood", true, 0)?.channel_id;
            let location = Location::Channel(channel);

            let mut ids = Vec::new();
            for t in 0..33_000 {
                ids.push(messages::insert_message(conn, location, ann, "hit", t, false)?);
            }
            let (oldest, newest) = (ids[0], ids[ids.len() - 1]);
            messages::add_reaction(conn, oldest, 1, ann)?;
            messages::add_reaction(conn, newest, 1, ann)?;

            let hits = search_messages(conn, ann, "hit")?.messages;
            assert_eq!(hits.len(), 33_000);
            let reacted: Vec<i64> = hits
                .iter()
                .filter(|m| !m.reacts.is_empty())
                .map(|m| m.message_id)
                .collect();
            assert_eq!(reacted, vec![newest, oldest]);
            assert!(hits[0].reacts[0].is_this_user_reacted);
            Ok(())
        });
    }
}
