use anyhow::Result;
use rusqlite::{Connection, params};

use super::OptionalExt;
use crate::models::{Metric, StatPoint};

const METRICS: [Metric; 3] = [Metric::Channels, Metric::Dms, Metric::Messages];

/// Zero baseline for a freshly registered user.
pub fn seed_user(conn: &Connection, user_id: i64, time_stamp: i64) -> Result<()> {
    for metric in METRICS {
        conn.execute(
            "INSERT INTO user_stats (user_id, metric, value, time_stamp) VALUES (?1, ?2, 0, ?3)",
            params![user_id, metric.as_str(), time_stamp],
        )?;
    }
    Ok(())
}

/// Zero baseline for the workspace, recorded when the first user registers.
pub fn seed_workspace(conn: &Connection, time_stamp: i64) -> Result<()> {
    for metric in METRICS {
        conn.execute(
            "INSERT INTO workspace_stats (metric, value, time_stamp) VALUES (?1, 0, ?2)",
            params![metric.as_str(), time_stamp],
        )?;
    }
    Ok(())
}

pub fn latest_user(conn: &Connection, user_id: i64, metric: Metric) -> Result<i64> {
    let value = conn
        .query_row(
            "SELECT value FROM user_stats WHERE user_id = ?1 AND metric = ?2 ORDER BY id DESC LIMIT 1",
            params![user_id, metric.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value.unwrap_or(0))
}

pub fn latest_workspace(conn: &Connection, metric: Metric) -> Result<i64> {
    let value = conn
        .query_row(
            "SELECT value FROM workspace_stats WHERE metric = ?1 ORDER BY id DESC LIMIT 1",
            [metric.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value.unwrap_or(0))
}

/// Append a new history point `delta` away from the latest one.
pub fn record_user(conn: &Connection, user_id: i64, metric: Metric, delta: i64, time_stamp: i64) -> Result<()> {
    let value = latest_user(conn, user_id, metric)? + delta;
    conn.execute(
        "INSERT INTO user_stats (user_id, metric, value, time_stamp) VALUES (?1, ?2, ?3, ?4)",
        params![user_id, metric.as_str(), value, time_stamp],
    )?;
    Ok(())
}

pub fn record_workspace(conn: &Connection, metric: Metric, delta: i64, time_stamp: i64) -> Result<()> {
    let value = latest_workspace(conn, metric)? + delta;
    conn.execute(
        "INSERT INTO workspace_stats (metric, value, time_stamp) VALUES (?1, ?2, ?3)",
        params![metric.as_str(), value, time_stamp],
    )?;
    Ok(())
}

pub fn user_history(conn: &Connection, user_id: i64, metric: Metric) -> Result<Vec<StatPoint>> {
    let mut stmt = conn.prepare(
        "SELECT value, time_stamp FROM user_stats WHERE user_id = ?1 AND metric = ?2 ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![user_id, metric.as_str()], |row| {
            Ok(StatPoint {
                value: row.get(0)?,
                time_stamp: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn workspace_history(conn: &Connection, metric: Metric) -> Result<Vec<StatPoint>> {
    let mut stmt =
        conn.prepare("SELECT value, time_stamp FROM workspace_stats WHERE metric = ?1 ORDER BY id")?;
    let rows = stmt
        .query_map([metric.as_str()], |row| {
            Ok(StatPoint {
                value: row.get(0)?,
                time_stamp: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
