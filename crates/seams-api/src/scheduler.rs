//! Delivery of work that falls due over time: scheduled messages and
//! finished standups.

use std::time::Duration;

use rusqlite::Connection;
use tracing::{debug, info, warn};

use seams_db::models::Location;
use seams_db::queries::{messages, standups};

use crate::error::ApiError;
use crate::messages::{deliver_scheduled, post_message};
use crate::{AppState, run_blocking, unix_now};

/// Deliver everything due at `now`. Returns how many items were handled.
pub fn flush_due(conn: &Connection, now: i64) -> Result<usize, ApiError> {
    let mut handled = 0;

    for message in messages::due_pending(conn, now)? {
        deliver_scheduled(conn, &message)?;
        handled += 1;
    }

    for standup in standups::due_standups(conn, now)? {
        let summary = standup.buffer.trim_end_matches('\n');
        if !summary.is_empty() {
            post_message(
                conn,
                Location::Channel(standup.channel_id),
                standup.starter_id,
                summary,
                standup.time_finish,
            )?;
        }
        standups::delete_standup(conn, standup.channel_id)?;
        info!("Standup in channel {} finished", standup.channel_id);
        handled += 1;
    }

    Ok(handled)
}

/// Background ticker. Requests flush on their own too, so the tick rate
/// only bounds how late an unobserved delivery can be.
pub async fn run_scheduler_loop(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    info!("Scheduler started (every {}s)", interval_secs);

    loop {
        interval.tick().await;

        match run_blocking(&state, |conn| flush_due(conn, unix_now())).await {
            Ok(count) => {
                if count > 0 {
                    debug!("Scheduler: delivered {} due items", count);
                }
            }
            Err(e) => {
                warn!("Scheduler error: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{messages_page, schedule_message};
    use crate::testing::{Fixture, register};

    #[test]
    fn scheduled_message_appears_at_its_time() {
        let fx = Fixture::new();
        fx.run(|conn| {
            let ann = register(conn, "a@seams.io", "Ann", "Lee");
            let channel = crate::channels::create_channel(conn, ann, "general", true, 0)?.channel_id;
            let location = Location::Channel(channel);

            assert!(matches!(
                schedule_message(conn, ann, location, "too late", 99, 100),
                Err(ApiError::Input(_))
            ));
            let id = schedule_message(conn, ann, location, "later", 150, 100)?
                .message_id
                .unwrap();

            assert!(messages::message_by_id(conn, id)?.is_none());
            assert_eq!(flush_due(conn, 149)?, 0);
            assert!(messages_page(conn, location, ann, 0)?.messages.is_empty());

            assert_eq!(flush_due(conn, 150)?, 1);
            let page = messages_page(conn, location, ann, 0)?;
            assert_eq!(page.messages[0].message_id, id);
            assert_eq!(page.messages[0].time_sent, 150);

            let stats = crate::stats::involvement(conn, ann)?;
            assert_eq!(stats.messages_sent.last().unwrap().num_messages_sent, 1);
            Ok(())
        });
    }

    #[test]
    fn scheduled_dm_message_dies_with_the_dm() {
        let fx = Fixture::new();
        fx.run(|conn| {
            let ann = register(conn, "a@seams.io", "Ann", "Lee");
            let dm = crate::dm::create_dm(conn, ann, &[], 0)?.dm_id;
            schedule_message(conn, ann, Location::Dm(dm), "never", 500, 100)?;
            crate::dm::remove_dm(conn, ann, dm, 101)?;
            assert_eq!(flush_due(conn, 600)?, 0);
            Ok(())
        });
    }
}
