pub mod config;
pub mod error;
pub mod db;
pub mod model;
pub mod store;
pub mod directory;
pub mod events;
pub mod ratelimit;
pub mod follow;
pub mod query;
pub mod reconcile;
pub mod http;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::{FollowGraphError, Result};
pub use follow::{FollowAction, FollowOutcome, FollowService};
pub use model::{Edge, EdgeState, FollowCounts, Page, RelationshipState, UserId};
pub use query::{QueryService, RelationshipFlags};
