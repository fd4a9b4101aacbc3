//! Follow graph writes: the transition rules and the service that applies them

pub mod service;
pub mod state;

pub use service::{FollowOutcome, FollowService, UpdatedCounts, UserCounts};
pub use state::{FollowAction, Transition};
