//! Read side of the follow graph: paginated lists, mutuals, batch lookups, counts
//! and the visibility rule other subsystems use for private accounts.

mod mutuals;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::{LookupConfig, PaginationConfig};
use crate::db::Db;
use crate::directory::UserDirectory;
use crate::error::{FollowGraphError, Result};
use crate::model::{Edge, EdgeState, FollowCounts, KeyCursor, Page, PageCursor, RelationshipState, UserId};
use crate::store;

/// A user in a followers/following/requests listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelatedUser {
    pub user_id: UserId,
    pub state: EdgeState,
    /// When the request was made, or when the follow became active
    pub since: DateTime<Utc>,
}

impl RelatedUser {
    fn other_side(edge: Edge, of: &UserId) -> Self {
        let since = edge.accepted_at.unwrap_or(edge.created_at);
        let user_id = if &edge.follower_id == of { edge.followee_id } else { edge.follower_id };
        Self {
            user_id,
            state: edge.state,
            since,
        }
    }
}

/// Per-target flags returned by [`QueryService::lookup_relationships`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RelationshipFlags {
    /// viewer -> target is ACTIVE
    pub following: bool,
    /// target -> viewer is ACTIVE
    pub followed_by: bool,
    /// viewer -> target is PENDING
    pub pending: bool,
    /// target -> viewer is PENDING
    pub incoming_pending: bool,
    pub is_mutual: bool,
}

/// Both directions between a viewer and one target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelationshipView {
    pub outgoing: RelationshipState,
    pub incoming: RelationshipState,
}

/// Counter cache view; pending requests are only shown to the owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FollowCountsView {
    pub followers_count: i64,
    pub following_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_requests_count: Option<i64>,
}

pub struct QueryService {
    db: Db,
    directory: Arc<dyn UserDirectory>,
    pagination: PaginationConfig,
    lookup: LookupConfig,
}

impl QueryService {
    pub fn new(
        db: Db,
        directory: Arc<dyn UserDirectory>,
        pagination: PaginationConfig,
        lookup: LookupConfig,
    ) -> Self {
        Self {
            db,
            directory,
            pagination,
            lookup,
        }
    }

    fn page_size(&self, limit: Option<usize>) -> usize {
        limit
            .unwrap_or(self.pagination.default_limit)
            .clamp(1, self.pagination.max_limit)
    }

    /// True if `viewer` may see `owner`'s graph and activity: the owner themself,
    /// anyone when the account is public, otherwise only ACTIVE followers.
    pub async fn can_view(&self, viewer: &UserId, owner: &UserId) -> Result<bool> {
        if viewer == owner {
            return Ok(true);
        }
        let profile = self
            .directory
            .lookup(owner)
            .await?
            .ok_or_else(|| FollowGraphError::NotFound(format!("user {} not found", owner)))?;
        if !profile.is_private {
            return Ok(true);
        }

        let (viewer, owner) = (viewer.clone(), owner.clone());
        let edge = self
            .db
            .with_connection(move |conn| store::get_edge(conn, &viewer, &owner))
            .await?;
        Ok(matches!(edge, Some(e) if e.state == EdgeState::Active))
    }

    async fn ensure_visible(&self, viewer: &UserId, owner: &UserId) -> Result<()> {
        if self.can_view(viewer, owner).await? {
            Ok(())
        } else {
            Err(FollowGraphError::Forbidden(format!("account {} is private", owner)))
        }
    }

    async fn list(
        &self,
        user: &UserId,
        followers: bool,
        state: EdgeState,
        cursor: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Page<RelatedUser>> {
        let cursor = cursor.map(PageCursor::decode).transpose()?;
        let limit = self.page_size(limit);
        let user = user.clone();

        self.db
            .with_connection(move |conn| {
                let page = if followers {
                    store::list_by_followee(conn, &user, Some(state), cursor.as_ref(), limit)?
                } else {
                    store::list_by_follower(conn, &user, Some(state), cursor.as_ref(), limit)?
                };
                Ok(Page {
                    items: page.items.into_iter().map(|e| RelatedUser::other_side(e, &user)).collect(),
                    next_cursor: page.next_cursor,
                })
            })
            .await
    }

    /// ACTIVE followers of `user`, newest first
    pub async fn get_followers(
        &self,
        viewer: &UserId,
        user: &UserId,
        cursor: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Page<RelatedUser>> {
        self.ensure_visible(viewer, user).await?;
        self.list(user, true, EdgeState::Active, cursor, limit).await
    }

    /// Users `user` follows (ACTIVE), newest first
    pub async fn get_following(
        &self,
        viewer: &UserId,
        user: &UserId,
        cursor: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Page<RelatedUser>> {
        self.ensure_visible(viewer, user).await?;
        self.list(user, false, EdgeState::Active, cursor, limit).await
    }

    /// PENDING requests waiting on `owner`'s approval
    pub async fn incoming_requests(
        &self,
        owner: &UserId,
        cursor: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Page<RelatedUser>> {
        self.list(owner, true, EdgeState::Pending, cursor, limit).await
    }

    /// PENDING requests `owner` has sent
    pub async fn outgoing_requests(
        &self,
        owner: &UserId,
        cursor: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Page<RelatedUser>> {
        self.list(owner, false, EdgeState::Pending, cursor, limit).await
    }

    /// Users both `a` and `b` follow, ascending by id
    pub async fn get_mutuals(
        &self,
        a: &UserId,
        b: &UserId,
        cursor: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Page<UserId>> {
        let after = cursor.map(KeyCursor::decode).transpose()?.map(|c| c.0);
        let limit = self.page_size(limit);
        let batch = self.pagination.merge_batch_size;
        let (a, b) = (a.clone(), b.clone());

        self.db
            .with_connection(move |conn| {
                // One read transaction so both streams see the same snapshot
                let tx = conn.transaction()?;
                let page = mutuals::merge_join(&tx, &a, &b, after, limit, batch)?;
                tx.commit()?;
                Ok(page)
            })
            .await
    }

    /// Mutuals between the viewer and another user, subject to that user's privacy
    pub async fn mutuals_with(
        &self,
        viewer: &UserId,
        target: &UserId,
        cursor: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Page<UserId>> {
        if viewer == target {
            return Err(FollowGraphError::Validation("mutuals need two different users".to_string()));
        }
        self.ensure_visible(viewer, target).await?;
        self.get_mutuals(viewer, target, cursor, limit).await
    }

    /// Relationship flags between `viewer` and every target, in one query.
    /// Every requested id appears in the result, all-false when unrelated.
    pub async fn lookup_relationships(
        &self,
        viewer: &UserId,
        target_ids: &[String],
    ) -> Result<BTreeMap<UserId, RelationshipFlags>> {
        let mut targets = target_ids
            .iter()
            .map(|raw| UserId::parse(raw))
            .collect::<Result<Vec<_>>>()?;
        targets.sort();
        targets.dedup();
        if targets.len() > self.lookup.max_targets {
            return Err(FollowGraphError::Validation(format!(
                "at most {} target_ids per lookup",
                self.lookup.max_targets
            )));
        }

        let viewer = viewer.clone();
        let query_targets = targets.clone();
        let rows = self
            .db
            .with_connection(move |conn| store::lookup_pairs(conn, &viewer, &query_targets))
            .await?;

        let mut flags: BTreeMap<UserId, RelationshipFlags> =
            targets.into_iter().map(|t| (t, RelationshipFlags::default())).collect();
        for row in rows {
            if let Some(f) = flags.get_mut(&row.other) {
                match (row.outgoing, row.state) {
                    (true, EdgeState::Active) => f.following = true,
                    (true, EdgeState::Pending) => f.pending = true,
                    (false, EdgeState::Active) => f.followed_by = true,
                    (false, EdgeState::Pending) => f.incoming_pending = true,
                }
            }
        }
        for f in flags.values_mut() {
            f.is_mutual = f.following && f.followed_by;
        }
        Ok(flags)
    }

    /// Both directions between `viewer` and `target` as explicit states
    pub async fn get_relationship(&self, viewer: &UserId, target: &UserId) -> Result<RelationshipView> {
        let (viewer, target) = (viewer.clone(), target.clone());
        self.db
            .with_connection(move |conn| {
                let outgoing = store::get_edge(conn, &viewer, &target)?.map(|e| e.state);
                let incoming = store::get_edge(conn, &target, &viewer)?.map(|e| e.state);
                Ok(RelationshipView {
                    outgoing: outgoing.into(),
                    incoming: incoming.into(),
                })
            })
            .await
    }

    /// Counts straight from the counter cache, never a live aggregate
    pub async fn get_follow_counts(&self, viewer: &UserId, user: &UserId) -> Result<FollowCountsView> {
        let owner_view = viewer == user;
        let user = user.clone();
        let counts: FollowCounts = self
            .db
            .with_connection(move |conn| store::get_counts(conn, &user))
            .await?;
        Ok(FollowCountsView {
            followers_count: counts.followers_count,
            following_count: counts.following_count,
            pending_requests_count: owner_view.then_some(counts.pending_requests_count),
        })
    }
}
