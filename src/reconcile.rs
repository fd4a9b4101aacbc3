//! Counter reconciliation: recompute a user's counts from the edge tables and
//! overwrite the cached row.

use serde::Serialize;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::db::Db;
use crate::error::Result;
use crate::model::{now_utc, FollowCounts, UserId};
use crate::store;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub user_id: UserId,
    pub before: FollowCounts,
    pub after: FollowCounts,
    pub drifted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub users_checked: usize,
    pub users_repaired: usize,
    pub failures: usize,
}

/// Recompute and overwrite one user's counters.
///
/// Runs under the database write lock, so no edge write can interleave between
/// the aggregate and the overwrite.
pub async fn reconcile_counters(db: &Db, user: &UserId) -> Result<ReconcileReport> {
    let user_id = user.clone();
    let result = db
        .with_transaction(move |tx| {
            let before = store::get_counts(tx, &user_id)?;
            let after = store::count_live(tx, &user_id)?;
            store::overwrite_counts(tx, &user_id, after, now_utc())?;
            Ok(ReconcileReport {
                drifted: before != after,
                user_id,
                before,
                after,
            })
        })
        .await;

    match &result {
        Ok(report) if report.drifted => log::warn!(
            "counter drift for {}: cached {:?}, actual {:?}",
            report.user_id,
            report.before,
            report.after
        ),
        Ok(report) => log::debug!("counters for {} already consistent", report.user_id),
        Err(e) => log::error!("reconcile failed for {}: {}", user, e),
    }
    result
}

/// Reconcile every user appearing in the graph or the counter table, in batches
pub async fn reconcile_all(db: &Db, batch_size: usize) -> Result<SweepReport> {
    let mut report = SweepReport::default();
    let mut after: Option<UserId> = None;

    loop {
        let cursor = after.clone();
        let users = db
            .with_connection(move |conn| store::graph_user_ids(conn, cursor.as_ref(), batch_size))
            .await?;
        if users.is_empty() {
            break;
        }

        for user in &users {
            report.users_checked += 1;
            match reconcile_counters(db, user).await {
                Ok(r) if r.drifted => report.users_repaired += 1,
                Ok(_) => {}
                Err(_) => report.failures += 1,
            }
        }

        if users.len() < batch_size {
            break;
        }
        after = users.last().cloned();
    }

    log::info!(
        "reconcile sweep done: {} checked, {} repaired, {} failed",
        report.users_checked,
        report.users_repaired,
        report.failures
    );
    Ok(report)
}

/// Run `reconcile_all` every `interval` until the runtime shuts down
pub fn spawn_sweep(db: Db, interval: Duration, batch_size: usize) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick fires immediately; skip it so startup isn't slowed by a sweep
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = reconcile_all(&db, batch_size).await {
                log::error!("reconcile sweep failed: {}", e);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CounterDelta;
    use crate::testing::{uid, Harness};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_reconcile_repairs_drift() {
        let h = Harness::new().await;
        let (a, b) = (h.user("a", false).await, h.user("b", false).await);
        h.follow.follow_user(&a, &b).await.unwrap();

        let skew = b.clone();
        h.db.with_transaction(move |tx| {
            let delta = CounterDelta {
                followers: 5,
                following: 0,
                pending_requests: 2,
            };
            store::apply_delta(tx, &skew, delta, now_utc())
        })
        .await
        .unwrap();
        assert_eq!(h.counts("b").await.followers_count, 6);

        let report = reconcile_counters(&h.db, &b).await.unwrap();
        assert!(report.drifted);
        assert_eq!(report.before.followers_count, 6);
        assert_eq!(report.after.followers_count, 1);
        assert_eq!(h.counts("b").await, h.live_counts("b").await);

        let again = reconcile_counters(&h.db, &b).await.unwrap();
        assert!(!again.drifted);
    }

    #[tokio::test]
    async fn test_reconcile_all_covers_counter_only_users() {
        let h = Harness::new().await;
        let (a, b) = (h.user("a", false).await, h.user("b", false).await);
        h.follow.follow_user(&a, &b).await.unwrap();
        h.follow.unfollow_user(&a, &b).await.unwrap();

        // A stale row for a user with no edges left
        let ghost = uid("ghost");
        h.db.with_transaction(move |tx| {
            let delta = CounterDelta {
                followers: 3,
                following: 0,
                pending_requests: 0,
            };
            store::apply_delta(tx, &ghost, delta, now_utc())
        })
        .await
        .unwrap();

        let report = reconcile_all(&h.db, 1).await.unwrap();
        assert!(report.users_checked >= 3);
        assert_eq!(report.users_repaired, 1);
        assert_eq!(report.failures, 0);
        assert_eq!(h.counts("ghost").await, FollowCounts::default());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_reconcile_concurrent_with_live_writes() {
        let h = Harness::new().await;
        let star = h.user("star", false).await;
        let mut fans = Vec::new();
        for i in 0..8 {
            fans.push(h.user(&format!("fan{}", i), false).await);
        }

        let mut handles = Vec::new();
        for fan in fans {
            let (follow, star) = (Arc::clone(&h.follow), star.clone());
            handles.push(tokio::spawn(async move {
                for _ in 0..5 {
                    follow.follow_user(&fan, &star).await.unwrap();
                    follow.unfollow_user(&fan, &star).await.unwrap();
                }
                follow.follow_user(&fan, &star).await.unwrap();
            }));
        }
        for _ in 0..4 {
            let (db, star) = (h.db.clone(), star.clone());
            handles.push(tokio::spawn(async move {
                for _ in 0..10 {
                    reconcile_counters(&db, &star).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let counts = h.counts("star").await;
        assert_eq!(counts.followers_count, 8);
        assert_eq!(counts, h.live_counts("star").await);
        assert!(!reconcile_counters(&h.db, &star).await.unwrap().drifted);
    }

    /// Deterministic pseudo-random walk over all operations between a few users
    #[tokio::test]
    async fn test_random_operations_keep_counters_and_indexes_consistent() {
        let h = Harness::new().await;
        let names = ["u0", "u1", "u2", "u3", "u4"];
        for (i, name) in names.iter().enumerate() {
            h.user(name, i % 2 == 1).await;
        }

        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move |n: usize| {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
            ((seed >> 33) as usize) % n
        };

        for _ in 0..300 {
            let x = uid(names[next(names.len())]);
            let y = uid(names[next(names.len())]);
            if x == y {
                continue;
            }
            // Illegal transitions are expected and must leave no trace
            let _ = match next(6) {
                0 => h.follow.follow_user(&x, &y).await,
                1 => h.follow.unfollow_user(&x, &y).await,
                2 => h.follow.cancel_follow_request(&x, &y).await,
                3 => h.follow.accept_follow_request(&x, &y).await,
                4 => h.follow.decline_follow_request(&x, &y).await,
                _ => h.follow.remove_follower(&x, &y).await,
            };
            if next(20) == 0 {
                h.directory.upsert_user(&y, next(2) == 0).await.unwrap();
            }
        }

        for name in names {
            assert_eq!(h.counts(name).await, h.live_counts(name).await, "drift for {}", name);
        }
        let mismatches = h
            .db
            .with_connection(|conn| store::dual_index_mismatches(conn))
            .await
            .unwrap();
        assert!(mismatches.is_empty(), "{:?}", mismatches);

        let report = reconcile_all(&h.db, 2).await.unwrap();
        assert_eq!(report.users_repaired, 0);
    }
}
