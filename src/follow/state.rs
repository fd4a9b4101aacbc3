//! Legal transitions for one directed pair.
//!
//! `plan` is pure: given the persisted state of edge(follower, followee) it decides
//! the edge mutation and both users' counter deltas, or rejects the transition.
//! Callers read the state and apply the plan inside one transaction.

use serde::Serialize;

use crate::error::{FollowGraphError, Result};
use crate::events::FollowEventKind;
use crate::model::{CounterDelta, EdgeState, RelationshipState};

/// A requested change to edge(follower, followee)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Follower follows followee; the flag is the followee's live privacy setting
    Follow { target_private: bool },
    Unfollow,
    /// Follower withdraws their own request
    CancelRequest,
    /// Followee approves the follower's request
    AcceptRequest,
    DeclineRequest,
    /// Followee drops an active follower
    RemoveFollower,
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Follow { .. } => "follow",
            Self::Unfollow => "unfollow",
            Self::CancelRequest => "cancel_request",
            Self::AcceptRequest => "accept_request",
            Self::DeclineRequest => "decline_request",
            Self::RemoveFollower => "remove_follower",
        }
    }
}

/// What happened, as reported to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowAction {
    Followed,
    Requested,
    AlreadyFollowing,
    AlreadyRequested,
    Unfollowed,
    RequestCancelled,
    RequestAccepted,
    RequestDeclined,
    FollowerRemoved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeMutation {
    /// Idempotent repeat, nothing to write
    Keep,
    Create(EdgeState),
    /// PENDING -> ACTIVE
    Promote,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    pub action: FollowAction,
    pub mutation: EdgeMutation,
    /// State of the pair after the plan is applied
    pub resulting: RelationshipState,
    pub follower_delta: CounterDelta,
    pub followee_delta: CounterDelta,
}

impl Plan {
    /// Event owed to the notification pipeline once the plan commits
    pub fn event(&self) -> Option<FollowEventKind> {
        match self.action {
            FollowAction::Followed => Some(FollowEventKind::Followed),
            FollowAction::Requested => Some(FollowEventKind::FollowRequested),
            FollowAction::RequestAccepted => Some(FollowEventKind::FollowRequestAccepted),
            _ => None,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.mutation == EdgeMutation::Keep
    }
}

const ONE_FOLLOWING: CounterDelta = CounterDelta { followers: 0, following: 1, pending_requests: 0 };
const ONE_FOLLOWER: CounterDelta = CounterDelta { followers: 1, following: 0, pending_requests: 0 };
const ONE_PENDING: CounterDelta = CounterDelta { followers: 0, following: 0, pending_requests: 1 };
const NO_CHANGE: CounterDelta = CounterDelta { followers: 0, following: 0, pending_requests: 0 };

fn negate(d: CounterDelta) -> CounterDelta {
    CounterDelta {
        followers: -d.followers,
        following: -d.following,
        pending_requests: -d.pending_requests,
    }
}

fn plan_of(
    action: FollowAction,
    mutation: EdgeMutation,
    resulting: RelationshipState,
    follower_delta: CounterDelta,
    followee_delta: CounterDelta,
) -> Plan {
    Plan {
        action,
        mutation,
        resulting,
        follower_delta,
        followee_delta,
    }
}

fn conflict(transition: Transition, current: RelationshipState) -> FollowGraphError {
    let required = match transition {
        Transition::Follow { .. } => "NONE",
        Transition::Unfollow | Transition::RemoveFollower => "ACTIVE",
        Transition::CancelRequest | Transition::AcceptRequest | Transition::DeclineRequest => "PENDING",
    };
    FollowGraphError::Conflict(format!(
        "cannot {} from {:?}, requires {}",
        transition.name(),
        current,
        required
    ))
}

/// Decide how `transition` applies to a pair currently in `current`
pub fn plan(transition: Transition, current: RelationshipState) -> Result<Plan> {
    use RelationshipState as S;

    let planned = match (transition, current) {
        (Transition::Follow { target_private: false }, S::None) => plan_of(
            FollowAction::Followed,
            EdgeMutation::Create(EdgeState::Active),
            S::Active,
            ONE_FOLLOWING,
            ONE_FOLLOWER,
        ),
        (Transition::Follow { target_private: true }, S::None) => plan_of(
            FollowAction::Requested,
            EdgeMutation::Create(EdgeState::Pending),
            S::Pending,
            NO_CHANGE,
            ONE_PENDING,
        ),
        (Transition::Follow { .. }, S::Active) => {
            plan_of(FollowAction::AlreadyFollowing, EdgeMutation::Keep, S::Active, NO_CHANGE, NO_CHANGE)
        }
        (Transition::Follow { .. }, S::Pending) => {
            plan_of(FollowAction::AlreadyRequested, EdgeMutation::Keep, S::Pending, NO_CHANGE, NO_CHANGE)
        }
        (Transition::Unfollow, S::Active) => plan_of(
            FollowAction::Unfollowed,
            EdgeMutation::Delete,
            S::None,
            negate(ONE_FOLLOWING),
            negate(ONE_FOLLOWER),
        ),
        (Transition::RemoveFollower, S::Active) => plan_of(
            FollowAction::FollowerRemoved,
            EdgeMutation::Delete,
            S::None,
            negate(ONE_FOLLOWING),
            negate(ONE_FOLLOWER),
        ),
        (Transition::CancelRequest, S::Pending) => plan_of(
            FollowAction::RequestCancelled,
            EdgeMutation::Delete,
            S::None,
            NO_CHANGE,
            negate(ONE_PENDING),
        ),
        (Transition::DeclineRequest, S::Pending) => plan_of(
            FollowAction::RequestDeclined,
            EdgeMutation::Delete,
            S::None,
            NO_CHANGE,
            negate(ONE_PENDING),
        ),
        (Transition::AcceptRequest, S::Pending) => plan_of(
            FollowAction::RequestAccepted,
            EdgeMutation::Promote,
            S::Active,
            ONE_FOLLOWING,
            CounterDelta {
                followers: 1,
                following: 0,
                pending_requests: -1,
            },
        ),
        (t, s) => return Err(conflict(t, s)),
    };
    Ok(planned)
}
