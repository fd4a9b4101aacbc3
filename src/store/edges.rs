use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension, Row, Transaction};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{FollowGraphError, Result};
use crate::model::{from_micros, Edge, EdgeState, FollowCounts, Page, PageCursor, UserId};

const EDGE_COLUMNS: &str = "edge_id, follower_id, followee_id, state, created_at, accepted_at";

fn edge_from_row(row: &Row<'_>) -> rusqlite::Result<(String, String, String, String, i64, Option<i64>)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?))
}

fn into_edge(raw: (String, String, String, String, i64, Option<i64>)) -> Result<Edge> {
    let (edge_id, follower_id, followee_id, state, created_at, accepted_at) = raw;
    Ok(Edge {
        edge_id,
        follower_id: UserId::from_trusted(follower_id),
        followee_id: UserId::from_trusted(followee_id),
        state: EdgeState::from_db(&state)?,
        created_at: from_micros(created_at),
        accepted_at: accepted_at.map(from_micros),
    })
}

/// Read the edge for an ordered pair
pub fn get_edge(conn: &Connection, follower: &UserId, followee: &UserId) -> Result<Option<Edge>> {
    let sql = format!(
        "SELECT {} FROM follows_by_follower WHERE follower_id = ?1 AND followee_id = ?2",
        EDGE_COLUMNS
    );
    conn.query_row(&sql, params![follower.as_str(), followee.as_str()], edge_from_row)
        .optional()?
        .map(into_edge)
        .transpose()
}

/// Create the edge for a pair, or move an existing one to `state`.
///
/// A new row gets a fresh edge id and `created_at = now`. `accepted_at` is set the
/// first time the edge is ACTIVE and cleared if it is ever PENDING.
/// An orphan ByFollowee row for the pair is dropped before inserting.
/// Returns [`FollowGraphError::EdgeExists`] if a concurrent writer inserted the pair first.
pub fn upsert_edge(
    tx: &Transaction<'_>,
    follower: &UserId,
    followee: &UserId,
    state: EdgeState,
    now: DateTime<Utc>,
) -> Result<Edge> {
    match get_edge(tx, follower, followee)? {
        None => {
            // A mirror row without its ByFollower twin would block the insert forever
            let stale = tx.execute(
                "DELETE FROM follows_by_followee WHERE followee_id = ?1 AND follower_id = ?2",
                params![followee.as_str(), follower.as_str()],
            )?;
            if stale > 0 {
                log::warn!("dual index drift repaired on insert: orphan by_followee row {} -> {}", follower, followee);
            }
            let edge = Edge {
                edge_id: Uuid::new_v4().to_string(),
                follower_id: follower.clone(),
                followee_id: followee.clone(),
                state,
                created_at: now,
                accepted_at: (state == EdgeState::Active).then_some(now),
            };
            insert_pair(tx, &edge)?;
            Ok(edge)
        }
        Some(existing) => {
            let accepted_at = match state {
                EdgeState::Active => existing.accepted_at.or(Some(now)),
                EdgeState::Pending => None,
            };
            let accepted_micros = accepted_at.map(|t| t.timestamp_micros());
            tx.execute(
                "UPDATE follows_by_follower SET state = ?3, accepted_at = ?4 \
                 WHERE follower_id = ?1 AND followee_id = ?2",
                params![follower.as_str(), followee.as_str(), state.as_str(), accepted_micros],
            )?;
            tx.execute(
                "UPDATE follows_by_followee SET state = ?3, accepted_at = ?4 \
                 WHERE followee_id = ?1 AND follower_id = ?2",
                params![followee.as_str(), follower.as_str(), state.as_str(), accepted_micros],
            )?;
            Ok(Edge {
                state,
                accepted_at,
                ..existing
            })
        }
    }
}

fn insert_pair(tx: &Transaction<'_>, edge: &Edge) -> Result<()> {
    let created = edge.created_at.timestamp_micros();
    let accepted = edge.accepted_at.map(|t| t.timestamp_micros());
    let inserted = tx
        .execute(
            "INSERT INTO follows_by_follower (follower_id, followee_id, edge_id, state, created_at, accepted_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                edge.follower_id.as_str(),
                edge.followee_id.as_str(),
                edge.edge_id,
                edge.state.as_str(),
                created,
                accepted
            ],
        )
        .and_then(|_| {
            tx.execute(
                "INSERT INTO follows_by_followee (followee_id, follower_id, edge_id, state, created_at, accepted_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    edge.followee_id.as_str(),
                    edge.follower_id.as_str(),
                    edge.edge_id,
                    edge.state.as_str(),
                    created,
                    accepted
                ],
            )
        });

    match inserted {
        Ok(_) => Ok(()),
        Err(e) if FollowGraphError::is_constraint_violation(&e) => Err(FollowGraphError::EdgeExists),
        Err(e) => Err(e.into()),
    }
}

/// Remove the pair from both projections, returning what was removed
pub fn delete_edge(tx: &Transaction<'_>, follower: &UserId, followee: &UserId) -> Result<Option<Edge>> {
    let existing = get_edge(tx, follower, followee)?;
    let by_follower = tx.execute(
        "DELETE FROM follows_by_follower WHERE follower_id = ?1 AND followee_id = ?2",
        params![follower.as_str(), followee.as_str()],
    )?;
    let by_followee = tx.execute(
        "DELETE FROM follows_by_followee WHERE followee_id = ?1 AND follower_id = ?2",
        params![followee.as_str(), follower.as_str()],
    )?;
    if by_follower != by_followee {
        log::warn!(
            "dual index drift repaired on delete: {} -> {} ({} by_follower, {} by_followee rows)",
            follower, followee, by_follower, by_followee
        );
    }
    Ok(existing)
}

/// Which projection to page through
#[derive(Clone, Copy)]
enum Projection {
    ByFollower,
    ByFollowee,
}

fn list_edges(
    conn: &Connection,
    projection: Projection,
    user: &UserId,
    state: Option<EdgeState>,
    cursor: Option<&PageCursor>,
    limit: usize,
) -> Result<Page<Edge>> {
    let (table, key) = match projection {
        Projection::ByFollower => ("follows_by_follower", "follower_id"),
        Projection::ByFollowee => ("follows_by_followee", "followee_id"),
    };

    let mut sql = format!("SELECT {} FROM {} WHERE {} = ?", EDGE_COLUMNS, table, key);
    let mut values: Vec<Value> = vec![Value::Text(user.as_str().to_string())];
    if let Some(state) = state {
        sql.push_str(" AND state = ?");
        values.push(Value::Text(state.as_str().to_string()));
    }
    if let Some(cursor) = cursor {
        sql.push_str(" AND (created_at, edge_id) < (?, ?)");
        values.push(Value::Integer(cursor.created_at_micros));
        values.push(Value::Text(cursor.edge_id.clone()));
    }
    sql.push_str(" ORDER BY created_at DESC, edge_id DESC LIMIT ?");
    // One extra row tells us whether another page exists
    values.push(Value::Integer((limit + 1) as i64));

    let mut stmt = conn.prepare(&sql)?;
    let mut edges = stmt
        .query_map(params_from_iter(values), edge_from_row)?
        .map(|row| into_edge(row?))
        .collect::<Result<Vec<_>>>()?;

    let next_cursor = if edges.len() > limit {
        edges.truncate(limit);
        edges.last().map(|e| e.cursor().encode())
    } else {
        None
    };
    Ok(Page { items: edges, next_cursor })
}

/// Edges where `follower` is the follower, newest first
pub fn list_by_follower(
    conn: &Connection,
    follower: &UserId,
    state: Option<EdgeState>,
    cursor: Option<&PageCursor>,
    limit: usize,
) -> Result<Page<Edge>> {
    list_edges(conn, Projection::ByFollower, follower, state, cursor, limit)
}

/// Edges where `followee` is being followed, newest first
pub fn list_by_followee(
    conn: &Connection,
    followee: &UserId,
    state: Option<EdgeState>,
    cursor: Option<&PageCursor>,
    limit: usize,
) -> Result<Page<Edge>> {
    list_edges(conn, Projection::ByFollowee, followee, state, cursor, limit)
}

/// ACTIVE followees of `follower` with id greater than `after`, ascending by id.
///
/// Walks the (follower_id, followee_id) primary key, so successive calls form a
/// key-ordered stream without loading the whole set.
pub fn following_ids_after(
    conn: &Connection,
    follower: &UserId,
    after: Option<&UserId>,
    batch: usize,
) -> Result<Vec<UserId>> {
    let mut stmt = conn.prepare_cached(
        "SELECT followee_id FROM follows_by_follower \
         WHERE follower_id = ?1 AND followee_id > ?2 AND state = 'ACTIVE' \
         ORDER BY followee_id ASC LIMIT ?3",
    )?;
    let after = after.map(UserId::as_str).unwrap_or("");
    let ids = stmt
        .query_map(params![follower.as_str(), after, batch as i64], |row| row.get::<_, String>(0))?
        .map(|r| r.map(UserId::from_trusted))
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    Ok(ids)
}

/// Live aggregate of a user's edges, read straight from the index tables
pub fn count_live(conn: &Connection, user: &UserId) -> Result<FollowCounts> {
    let (followers, pending): (i64, i64) = conn.query_row(
        "SELECT \
            COALESCE(SUM(CASE WHEN state = 'ACTIVE' THEN 1 ELSE 0 END), 0), \
            COALESCE(SUM(CASE WHEN state = 'PENDING' THEN 1 ELSE 0 END), 0) \
         FROM follows_by_followee WHERE followee_id = ?1",
        params![user.as_str()],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let following: i64 = conn.query_row(
        "SELECT COUNT(*) FROM follows_by_follower WHERE follower_id = ?1 AND state = 'ACTIVE'",
        params![user.as_str()],
        |row| row.get(0),
    )?;
    Ok(FollowCounts {
        followers_count: followers,
        following_count: following,
        pending_requests_count: pending,
    })
}

/// One edge touching the viewer found by [`lookup_pairs`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairRow {
    /// The non-viewer side of the edge
    pub other: UserId,
    /// True when the viewer is the follower
    pub outgoing: bool,
    pub state: EdgeState,
}

/// Every edge between `viewer` and any of `targets`, both directions, in one statement
pub fn lookup_pairs(conn: &Connection, viewer: &UserId, targets: &[UserId]) -> Result<Vec<PairRow>> {
    if targets.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; targets.len()].join(",");
    let sql = format!(
        "SELECT followee_id, 1, state FROM follows_by_follower \
           WHERE follower_id = ? AND followee_id IN ({p}) \
         UNION ALL \
         SELECT follower_id, 0, state FROM follows_by_followee \
           WHERE followee_id = ? AND follower_id IN ({p})",
        p = placeholders
    );

    let mut values: Vec<&str> = Vec::with_capacity(targets.len() * 2 + 2);
    values.push(viewer.as_str());
    values.extend(targets.iter().map(UserId::as_str));
    values.push(viewer.as_str());
    values.extend(targets.iter().map(UserId::as_str));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, String>(2)?))
        })?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

    rows.into_iter()
        .map(|(other, outgoing, state)| {
            Ok(PairRow {
                other: UserId::from_trusted(other),
                outgoing: outgoing == 1,
                state: EdgeState::from_db(&state)?,
            })
        })
        .collect()
}

/// A pair whose two projections disagree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexMismatch {
    pub follower_id: String,
    pub followee_id: String,
    /// missing_by_followee | missing_by_follower | row_mismatch
    pub problem: String,
}

/// Scan both projections for pairs violating dual-index consistency
pub fn dual_index_mismatches(conn: &Connection) -> Result<Vec<IndexMismatch>> {
    let mut stmt = conn.prepare(
        "SELECT f.follower_id, f.followee_id, 'missing_by_followee' \
           FROM follows_by_follower f \
           LEFT JOIN follows_by_followee r \
             ON r.followee_id = f.followee_id AND r.follower_id = f.follower_id \
          WHERE r.edge_id IS NULL \
         UNION ALL \
         SELECT r.follower_id, r.followee_id, 'missing_by_follower' \
           FROM follows_by_followee r \
           LEFT JOIN follows_by_follower f \
             ON f.follower_id = r.follower_id AND f.followee_id = r.followee_id \
          WHERE f.edge_id IS NULL \
         UNION ALL \
         SELECT f.follower_id, f.followee_id, 'row_mismatch' \
           FROM follows_by_follower f \
           JOIN follows_by_followee r \
             ON r.followee_id = f.followee_id AND r.follower_id = f.follower_id \
          WHERE f.edge_id <> r.edge_id OR f.state <> r.state \
             OR f.created_at <> r.created_at OR f.accepted_at IS NOT r.accepted_at",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(IndexMismatch {
                follower_id: row.get(0)?,
                followee_id: row.get(1)?,
                problem: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    Ok(rows)
}

/// Users with a counter row or any edge, ascending, after `after`
pub fn graph_user_ids(conn: &Connection, after: Option<&UserId>, batch: usize) -> Result<Vec<UserId>> {
    let mut stmt = conn.prepare(
        "SELECT user_id FROM ( \
             SELECT user_id FROM follow_counters \
             UNION SELECT follower_id FROM follows_by_follower \
             UNION SELECT followee_id FROM follows_by_followee \
         ) WHERE user_id > ?1 ORDER BY user_id ASC LIMIT ?2",
    )?;
    let after = after.map(UserId::as_str).unwrap_or("");
    let ids = stmt
        .query_map(params![after, batch as i64], |row| row.get::<_, String>(0))?
        .map(|r| r.map(UserId::from_trusted))
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::now_utc;
    use chrono::Duration;
    use rusqlite::TransactionBehavior;
    use std::path::Path;
    use tempfile::TempDir;

    fn uid(s: &str) -> UserId {
        UserId::parse(s).unwrap()
    }

    fn setup() -> (Connection, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut conn = Connection::open(temp_dir.path().join("test.db")).unwrap();
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations");
        crate::db::migrate::run_migrations(&mut conn, &dir).unwrap();
        (conn, temp_dir)
    }

    fn upsert(conn: &mut Connection, a: &str, b: &str, state: EdgeState, at: DateTime<Utc>) -> Edge {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate).unwrap();
        let edge = upsert_edge(&tx, &uid(a), &uid(b), state, at).unwrap();
        tx.commit().unwrap();
        edge
    }

    #[test]
    fn test_upsert_writes_both_projections() {
        let (mut conn, _tmp) = setup();
        let edge = upsert(&mut conn, "alice", "bob", EdgeState::Pending, now_utc());

        let mirrored: (String, String) = conn
            .query_row(
                "SELECT edge_id, state FROM follows_by_followee WHERE followee_id = 'bob' AND follower_id = 'alice'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(mirrored.0, edge.edge_id);
        assert_eq!(mirrored.1, "PENDING");
        assert!(edge.accepted_at.is_none());
        assert!(dual_index_mismatches(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_upsert_promotes_and_stamps_accepted_at() {
        let (mut conn, _tmp) = setup();
        let created = upsert(&mut conn, "alice", "carol", EdgeState::Pending, now_utc());
        let later = now_utc() + Duration::seconds(5);
        let promoted = upsert(&mut conn, "alice", "carol", EdgeState::Active, later);

        assert_eq!(promoted.edge_id, created.edge_id);
        assert_eq!(promoted.created_at, created.created_at);
        assert_eq!(promoted.accepted_at, Some(later));
        assert_eq!(get_edge(&conn, &uid("alice"), &uid("carol")).unwrap(), Some(promoted));
        assert!(dual_index_mismatches(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_insert_maps_to_edge_exists() {
        let (mut conn, _tmp) = setup();
        let tx = conn.transaction().unwrap();
        let edge = Edge {
            edge_id: "e1".to_string(),
            follower_id: uid("a"),
            followee_id: uid("b"),
            state: EdgeState::Active,
            created_at: now_utc(),
            accepted_at: None,
        };
        insert_pair(&tx, &edge).unwrap();
        let again = insert_pair(&tx, &Edge { edge_id: "e2".to_string(), ..edge });
        assert!(matches!(again, Err(FollowGraphError::EdgeExists)));
    }

    #[test]
    fn test_insert_replaces_orphan_mirror_row() {
        let (mut conn, _tmp) = setup();
        conn.execute(
            "INSERT INTO follows_by_followee (followee_id, follower_id, edge_id, state, created_at, accepted_at) \
             VALUES ('b', 'a', 'orphan', 'ACTIVE', 1, 1)",
            [],
        )
        .unwrap();
        assert_eq!(dual_index_mismatches(&conn).unwrap().len(), 1);

        let edge = upsert(&mut conn, "a", "b", EdgeState::Pending, now_utc());
        assert_ne!(edge.edge_id, "orphan");
        assert!(dual_index_mismatches(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_delete_then_refollow_creates_fresh_row() {
        let (mut conn, _tmp) = setup();
        let first = upsert(&mut conn, "a", "b", EdgeState::Active, now_utc());

        let tx = conn.transaction().unwrap();
        let removed = delete_edge(&tx, &uid("a"), &uid("b")).unwrap();
        tx.commit().unwrap();
        assert_eq!(removed.map(|e| e.edge_id), Some(first.edge_id.clone()));
        assert!(get_edge(&conn, &uid("a"), &uid("b")).unwrap().is_none());

        let second = upsert(&mut conn, "a", "b", EdgeState::Active, now_utc());
        assert_ne!(second.edge_id, first.edge_id);
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM follows_by_followee WHERE followee_id = 'b'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_pagination_newest_first_with_cursor() {
        let (mut conn, _tmp) = setup();
        let base = now_utc();
        for (i, follower) in ["u1", "u2", "u3", "u4", "u5"].iter().enumerate() {
            upsert(&mut conn, follower, "star", EdgeState::Active, base + Duration::seconds(i as i64));
        }
        // Same timestamp as u5, broken by edge id
        upsert(&mut conn, "u6", "star", EdgeState::Active, base + Duration::seconds(4));

        let first = list_by_followee(&conn, &uid("star"), Some(EdgeState::Active), None, 4).unwrap();
        assert_eq!(first.items.len(), 4);
        let cursor = PageCursor::decode(first.next_cursor.as_deref().unwrap()).unwrap();
        let second = list_by_followee(&conn, &uid("star"), Some(EdgeState::Active), Some(&cursor), 4).unwrap();
        assert_eq!(second.items.len(), 2);
        assert!(second.next_cursor.is_none());

        let mut seen: Vec<String> = first
            .items
            .iter()
            .chain(second.items.iter())
            .map(|e| e.follower_id.to_string())
            .collect();
        assert_eq!(&seen[4..], &["u2".to_string(), "u1".to_string()]);
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn test_state_filter_and_follower_listing() {
        let (mut conn, _tmp) = setup();
        upsert(&mut conn, "a", "b", EdgeState::Active, now_utc());
        upsert(&mut conn, "a", "c", EdgeState::Pending, now_utc());

        let active = list_by_follower(&conn, &uid("a"), Some(EdgeState::Active), None, 10).unwrap();
        assert_eq!(active.items.len(), 1);
        assert_eq!(active.items[0].followee_id, uid("b"));
        let all = list_by_follower(&conn, &uid("a"), None, None, 10).unwrap();
        assert_eq!(all.items.len(), 2);
    }

    #[test]
    fn test_following_ids_after_is_key_ordered() {
        let (mut conn, _tmp) = setup();
        for target in ["d", "b", "c", "a"] {
            upsert(&mut conn, "x", target, EdgeState::Active, now_utc());
        }
        upsert(&mut conn, "x", "e", EdgeState::Pending, now_utc());

        let first = following_ids_after(&conn, &uid("x"), None, 2).unwrap();
        assert_eq!(first, vec![uid("a"), uid("b")]);
        let rest = following_ids_after(&conn, &uid("x"), first.last(), 10).unwrap();
        assert_eq!(rest, vec![uid("c"), uid("d")]);
    }

    #[test]
    fn test_count_live() {
        let (mut conn, _tmp) = setup();
        upsert(&mut conn, "a", "b", EdgeState::Active, now_utc());
        upsert(&mut conn, "c", "b", EdgeState::Pending, now_utc());
        upsert(&mut conn, "b", "a", EdgeState::Active, now_utc());

        let counts = count_live(&conn, &uid("b")).unwrap();
        assert_eq!(counts.followers_count, 1);
        assert_eq!(counts.following_count, 1);
        assert_eq!(counts.pending_requests_count, 1);
        assert_eq!(count_live(&conn, &uid("nobody")).unwrap(), FollowCounts::default());
    }

    #[test]
    fn test_lookup_pairs_both_directions() {
        let (mut conn, _tmp) = setup();
        upsert(&mut conn, "v", "b", EdgeState::Active, now_utc());
        upsert(&mut conn, "c", "v", EdgeState::Active, now_utc());
        upsert(&mut conn, "v", "d", EdgeState::Pending, now_utc());
        upsert(&mut conn, "v", "zzz", EdgeState::Active, now_utc());

        let mut rows = lookup_pairs(&conn, &uid("v"), &[uid("b"), uid("c"), uid("d")]).unwrap();
        rows.sort_by(|x, y| x.other.cmp(&y.other));
        assert_eq!(rows.len(), 3);
        assert!(rows[0].outgoing && rows[0].state == EdgeState::Active);
        assert!(!rows[1].outgoing && rows[1].state == EdgeState::Active);
        assert!(rows[2].outgoing && rows[2].state == EdgeState::Pending);
        assert!(lookup_pairs(&conn, &uid("v"), &[]).unwrap().is_empty());
    }

    #[test]
    fn test_dual_index_mismatch_detection() {
        let (mut conn, _tmp) = setup();
        upsert(&mut conn, "a", "b", EdgeState::Active, now_utc());
        conn.execute("UPDATE follows_by_followee SET state = 'PENDING' WHERE follower_id = 'a'", [])
            .unwrap();
        conn.execute(
            "INSERT INTO follows_by_follower (follower_id, followee_id, edge_id, state, created_at) \
             VALUES ('q', 'r', 'orphan', 'ACTIVE', 1)",
            [],
        )
        .unwrap();

        let mut problems: Vec<String> = dual_index_mismatches(&conn)
            .unwrap()
            .into_iter()
            .map(|m| m.problem)
            .collect();
        problems.sort();
        assert_eq!(problems, vec!["missing_by_followee", "row_mismatch"]);
    }

    #[test]
    fn test_graph_user_ids_paged() {
        let (mut conn, _tmp) = setup();
        upsert(&mut conn, "a", "b", EdgeState::Active, now_utc());
        upsert(&mut conn, "c", "b", EdgeState::Pending, now_utc());

        let first = graph_user_ids(&conn, None, 2).unwrap();
        assert_eq!(first, vec![uid("a"), uid("b")]);
        let rest = graph_user_ids(&conn, first.last(), 2).unwrap();
        assert_eq!(rest, vec![uid("c")]);
    }
}
