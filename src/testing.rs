//! Shared fixtures for service-level tests

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use crate::config::{LookupConfig, PaginationConfig};
use crate::db::{testing::migrated_db, Db};
use crate::directory::{SqliteUserDirectory, UserDirectory};
use crate::events::RecordingSink;
use crate::follow::FollowService;
use crate::model::{Edge, FollowCounts, UserId};
use crate::query::QueryService;
use crate::ratelimit::{FixedWindowRateLimiter, NoopRateLimiter, RateLimiter};
use crate::store;

pub fn uid(raw: &str) -> UserId {
    UserId::parse(raw).unwrap()
}

/// Migrated database with both services wired to in-process collaborators
pub struct Harness {
    pub db: Db,
    pub directory: Arc<SqliteUserDirectory>,
    pub events: Arc<RecordingSink>,
    pub follow: Arc<FollowService>,
    pub query: Arc<QueryService>,
    _temp_dir: TempDir,
}

impl Harness {
    pub async fn new() -> Self {
        Self::build(Arc::new(NoopRateLimiter), PaginationConfig::default()).await
    }

    pub async fn with_rate_limit(actions: u32) -> Self {
        let limiter = FixedWindowRateLimiter::new(actions, Duration::from_secs(60), 100);
        Self::build(Arc::new(limiter), PaginationConfig::default()).await
    }

    pub async fn with_merge_batch(batch: usize) -> Self {
        let pagination = PaginationConfig {
            merge_batch_size: batch,
            ..PaginationConfig::default()
        };
        Self::build(Arc::new(NoopRateLimiter), pagination).await
    }

    async fn build(rate_limiter: Arc<dyn RateLimiter>, pagination: PaginationConfig) -> Self {
        let (db, temp_dir) = migrated_db().await;
        let directory = Arc::new(SqliteUserDirectory::new(db.clone()));
        let events = Arc::new(RecordingSink::default());
        let lookup: Arc<dyn UserDirectory> = directory.clone();

        let follow = Arc::new(FollowService::new(db.clone(), lookup.clone(), events.clone(), rate_limiter));
        let query = Arc::new(QueryService::new(db.clone(), lookup, pagination, LookupConfig::default()));
        Self {
            db,
            directory,
            events,
            follow,
            query,
            _temp_dir: temp_dir,
        }
    }

    /// Register a user in the directory
    pub async fn user(&self, name: &str, is_private: bool) -> UserId {
        let id = uid(name);
        self.directory.upsert_user(&id, is_private).await.unwrap();
        id
    }

    pub async fn edge(&self, follower: &str, followee: &str) -> Option<Edge> {
        let (f, fe) = (uid(follower), uid(followee));
        self.db
            .with_connection(move |conn| store::get_edge(conn, &f, &fe))
            .await
            .unwrap()
    }

    /// Cached counters
    pub async fn counts(&self, name: &str) -> FollowCounts {
        let user = uid(name);
        self.db
            .with_connection(move |conn| store::get_counts(conn, &user))
            .await
            .unwrap()
    }

    /// Counts aggregated from the edge tables
    pub async fn live_counts(&self, name: &str) -> FollowCounts {
        let user = uid(name);
        self.db
            .with_connection(move |conn| store::count_live(conn, &user))
            .await
            .unwrap()
    }
}
