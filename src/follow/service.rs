use serde::Serialize;
use std::future::Future;
use std::sync::Arc;

use crate::db::Db;
use crate::directory::UserDirectory;
use crate::error::{FollowGraphError, Result};
use crate::events::{EventSink, FollowEvent};
use crate::follow::state::{self, EdgeMutation, FollowAction, Plan, Transition};
use crate::model::{now_utc, EdgeState, FollowCounts, RelationshipState, UserId};
use crate::ratelimit::RateLimiter;
use crate::store;

/// Counts of one user after a write
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserCounts {
    pub user_id: UserId,
    #[serde(flatten)]
    pub counts: FollowCounts,
}

/// Counts of both sides of the edge after a write
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdatedCounts {
    pub follower: UserCounts,
    pub followee: UserCounts,
}

/// Result of a write, enough for a client to render without another read
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FollowOutcome {
    pub action: FollowAction,
    pub state: RelationshipState,
    pub follower_id: UserId,
    pub followee_id: UserId,
    pub updated_counts: UpdatedCounts,
}

/// Single write entry point for the follow graph
pub struct FollowService {
    db: Db,
    directory: Arc<dyn UserDirectory>,
    events: Arc<dyn EventSink>,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl FollowService {
    pub fn new(
        db: Db,
        directory: Arc<dyn UserDirectory>,
        events: Arc<dyn EventSink>,
        rate_limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        Self {
            db,
            directory,
            events,
            rate_limiter,
        }
    }

    /// Follow `target`. Public targets become ACTIVE at once, private ones PENDING.
    /// Repeating a follow, including one that loses a concurrent insert race,
    /// returns the existing state as a no-op.
    pub async fn follow_user(&self, actor: &UserId, target: &UserId) -> Result<FollowOutcome> {
        reject_self(actor, target, "follow")?;
        self.rate_limiter.check(actor, "follow")?;

        let profile = self
            .directory
            .lookup(target)
            .await?
            .ok_or_else(|| FollowGraphError::NotFound(format!("user {} not found", target)))?;
        let transition = Transition::Follow {
            target_private: profile.is_private,
        };

        retry_lost_insert(move || self.execute(actor, target, transition)).await
    }

    /// Stop following an ACTIVE followee
    pub async fn unfollow_user(&self, actor: &UserId, target: &UserId) -> Result<FollowOutcome> {
        reject_self(actor, target, "unfollow")?;
        self.rate_limiter.check(actor, "unfollow")?;
        self.execute(actor, target, Transition::Unfollow).await
    }

    /// Withdraw the actor's own PENDING request to `target`
    pub async fn cancel_follow_request(&self, actor: &UserId, target: &UserId) -> Result<FollowOutcome> {
        reject_self(actor, target, "cancel a request to")?;
        self.rate_limiter.check(actor, "cancel_request")?;
        self.execute(actor, target, Transition::CancelRequest).await
    }

    /// Approve `requester`'s PENDING request to follow `owner`
    pub async fn accept_follow_request(&self, owner: &UserId, requester: &UserId) -> Result<FollowOutcome> {
        reject_self(owner, requester, "accept a request from")?;
        self.rate_limiter.check(owner, "accept_request")?;
        self.execute(requester, owner, Transition::AcceptRequest).await
    }

    /// Reject `requester`'s PENDING request. No trace of the request is kept.
    pub async fn decline_follow_request(&self, owner: &UserId, requester: &UserId) -> Result<FollowOutcome> {
        reject_self(owner, requester, "decline a request from")?;
        self.rate_limiter.check(owner, "decline_request")?;
        self.execute(requester, owner, Transition::DeclineRequest).await
    }

    /// Drop an ACTIVE follower of `owner`
    pub async fn remove_follower(&self, owner: &UserId, follower: &UserId) -> Result<FollowOutcome> {
        reject_self(owner, follower, "remove")?;
        self.rate_limiter.check(owner, "remove_follower")?;
        self.execute(follower, owner, Transition::RemoveFollower).await
    }

    /// Validate the persisted state, then write the edge and both counter rows in
    /// one transaction. Events go out only after commit.
    async fn execute(&self, follower: &UserId, followee: &UserId, transition: Transition) -> Result<FollowOutcome> {
        let (follower_id, followee_id) = (follower.clone(), followee.clone());

        let (outcome, plan): (FollowOutcome, Plan) = self
            .db
            .with_transaction(move |tx| {
                let current: RelationshipState = store::get_edge(tx, &follower_id, &followee_id)?
                    .map(|e| e.state)
                    .into();
                let plan = state::plan(transition, current)?;
                let now = now_utc();

                match plan.mutation {
                    EdgeMutation::Keep => {}
                    EdgeMutation::Create(edge_state) => {
                        store::upsert_edge(tx, &follower_id, &followee_id, edge_state, now)?;
                    }
                    EdgeMutation::Promote => {
                        store::upsert_edge(tx, &follower_id, &followee_id, EdgeState::Active, now)?;
                    }
                    EdgeMutation::Delete => {
                        store::delete_edge(tx, &follower_id, &followee_id)?;
                    }
                }
                store::apply_delta(tx, &follower_id, plan.follower_delta, now)?;
                store::apply_delta(tx, &followee_id, plan.followee_delta, now)?;

                let updated_counts = UpdatedCounts {
                    follower: UserCounts {
                        counts: store::get_counts(tx, &follower_id)?,
                        user_id: follower_id.clone(),
                    },
                    followee: UserCounts {
                        counts: store::get_counts(tx, &followee_id)?,
                        user_id: followee_id.clone(),
                    },
                };
                let outcome = FollowOutcome {
                    action: plan.action,
                    state: plan.resulting,
                    follower_id,
                    followee_id,
                    updated_counts,
                };
                Ok((outcome, plan))
            })
            .await
            .map_err(|e| {
                if let FollowGraphError::Conflict(msg) = &e {
                    log::info!("{} {} -> {} rejected: {}", transition.name(), follower, followee, msg);
                }
                e
            })?;

        if plan.is_noop() {
            log::debug!("{} {} -> {}: no-op ({:?})", transition.name(), follower, followee, plan.action);
        } else {
            log::info!("{} {} -> {}: {:?}", transition.name(), follower, followee, plan.action);
        }

        if let Some(kind) = plan.event() {
            self.events.emit(FollowEvent {
                kind,
                follower_id: follower.clone(),
                followee_id: followee.clone(),
                occurred_at: now_utc(),
            });
        }
        Ok(outcome)
    }
}

/// Re-run `attempt` once if it lost an insert race; the re-run reads the winner's
/// row and reports it as a no-op. A second loss surfaces as a retryable storage error.
async fn retry_lost_insert<T, F, Fut>(mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match attempt().await {
        Err(FollowGraphError::EdgeExists) => {
            log::debug!("follow lost insert race, re-reading");
            match attempt().await {
                Err(FollowGraphError::EdgeExists) => Err(FollowGraphError::Storage(
                    "follow insert conflicted twice".to_string(),
                )),
                other => other,
            }
        }
        other => other,
    }
}

fn reject_self(actor: &UserId, other: &UserId, verb: &str) -> Result<()> {
    if actor == other {
        return Err(FollowGraphError::Validation(format!("cannot {} yourself", verb)));
    }
    Ok(())
}
