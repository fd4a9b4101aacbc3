use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};

use crate::error::Result;
use crate::model::{CounterDelta, FollowCounts, UserId};

/// Cached counts for a user; a user with no row yet has all-zero counts
pub fn get_counts(conn: &Connection, user: &UserId) -> Result<FollowCounts> {
    let counts = conn
        .query_row(
            "SELECT followers_count, following_count, pending_requests_count \
             FROM follow_counters WHERE user_id = ?1",
            params![user.as_str()],
            |row| {
                Ok(FollowCounts {
                    followers_count: row.get(0)?,
                    following_count: row.get(1)?,
                    pending_requests_count: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(counts.unwrap_or_default())
}

/// Add a delta to a user's counter row, creating the row on first touch.
///
/// Counts are floored at zero; a decrement that would go negative means the cache
/// already drifted and is left for reconciliation.
pub fn apply_delta(tx: &Transaction<'_>, user: &UserId, delta: CounterDelta, now: DateTime<Utc>) -> Result<()> {
    if delta.is_zero() {
        return Ok(());
    }
    tx.execute(
        "INSERT INTO follow_counters \
             (user_id, followers_count, following_count, pending_requests_count, updated_at) \
         VALUES (?1, MAX(0, ?2), MAX(0, ?3), MAX(0, ?4), ?5) \
         ON CONFLICT(user_id) DO UPDATE SET \
             followers_count = MAX(0, followers_count + ?2), \
             following_count = MAX(0, following_count + ?3), \
             pending_requests_count = MAX(0, pending_requests_count + ?4), \
             updated_at = ?5",
        params![
            user.as_str(),
            delta.followers,
            delta.following,
            delta.pending_requests,
            now.timestamp_micros()
        ],
    )?;
    Ok(())
}

/// Replace a user's counter row with recomputed values
pub fn overwrite_counts(tx: &Transaction<'_>, user: &UserId, counts: FollowCounts, now: DateTime<Utc>) -> Result<()> {
    let now = now.timestamp_micros();
    tx.execute(
        "INSERT INTO follow_counters \
             (user_id, followers_count, following_count, pending_requests_count, updated_at, reconciled_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?5) \
         ON CONFLICT(user_id) DO UPDATE SET \
             followers_count = excluded.followers_count, \
             following_count = excluded.following_count, \
             pending_requests_count = excluded.pending_requests_count, \
             updated_at = excluded.updated_at, \
             reconciled_at = excluded.reconciled_at",
        params![
            user.as_str(),
            counts.followers_count,
            counts.following_count,
            counts.pending_requests_count,
            now
        ],
    )?;
    Ok(())
}
