//! Relationship store and counter cache.
//!
//! The edge relation is persisted twice, as `follows_by_follower` and
//! `follows_by_followee`. Mutations only accept a [`rusqlite::Transaction`] and
//! always write both projections, so no reader can see one updated without the other.
//! Reads accept any connection (a transaction derefs to one).

pub mod counters;
pub mod edges;

pub use counters::{apply_delta, get_counts, overwrite_counts};
pub use edges::{
    count_live, delete_edge, dual_index_mismatches, get_edge, graph_user_ids, list_by_followee,
    list_by_follower, lookup_pairs, following_ids_after, upsert_edge, IndexMismatch, PairRow,
};
