//! Domain types shared by the store, the services and the HTTP layer.
//!
//! Storage only ever holds PENDING and ACTIVE rows; [`RelationshipState`] adds the
//! implicit NONE so callers always get an explicit tagged state.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use crate::error::{FollowGraphError, Result};

fn user_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("static regex"))
}

/// Validated platform user identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Parse an id supplied by a caller; malformed ids are validation errors
    pub fn parse(raw: &str) -> Result<Self> {
        if user_id_pattern().is_match(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(FollowGraphError::Validation(format!("malformed user id: {:?}", raw)))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap an id read back from our own tables
    pub(crate) fn from_trusted(raw: String) -> Self {
        Self(raw)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persisted edge state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeState {
    Pending,
    Active,
}

impl EdgeState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Active => "ACTIVE",
        }
    }

    pub fn from_db(raw: &str) -> Result<Self> {
        match raw {
            "PENDING" => Ok(Self::Pending),
            "ACTIVE" => Ok(Self::Active),
            other => Err(FollowGraphError::Storage(format!("unknown edge state in store: {}", other))),
        }
    }
}

/// Relationship of one ordered pair as seen at the service boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipState {
    None,
    Pending,
    Active,
}

impl From<Option<EdgeState>> for RelationshipState {
    fn from(state: Option<EdgeState>) -> Self {
        match state {
            None => Self::None,
            Some(EdgeState::Pending) => Self::Pending,
            Some(EdgeState::Active) => Self::Active,
        }
    }
}

/// One directed edge, identical in both index projections
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub edge_id: String,
    pub follower_id: UserId,
    pub followee_id: UserId,
    pub state: EdgeState,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
}

impl Edge {
    pub fn cursor(&self) -> PageCursor {
        PageCursor {
            created_at_micros: self.created_at.timestamp_micros(),
            edge_id: self.edge_id.clone(),
        }
    }
}

/// Cached per-user counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowCounts {
    pub followers_count: i64,
    pub following_count: i64,
    pub pending_requests_count: i64,
}

/// Signed change to one user's counter row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterDelta {
    pub followers: i64,
    pub following: i64,
    pub pending_requests: i64,
}

impl CounterDelta {
    pub fn is_zero(&self) -> bool {
        self.followers == 0 && self.following == 0 && self.pending_requests == 0
    }
}

/// Position in a newest-first edge listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    pub created_at_micros: i64,
    pub edge_id: String,
}

const PAGE_TAG: &str = "t";
const KEY_TAG: &str = "k";

impl PageCursor {
    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(format!("{}:{}:{}", PAGE_TAG, self.created_at_micros, self.edge_id))
    }

    pub fn decode(raw: &str) -> Result<Self> {
        let text = decode_cursor_text(raw)?;
        let mut parts = text.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(PAGE_TAG), Some(micros), Some(edge_id)) if !edge_id.is_empty() => {
                let created_at_micros = micros.parse().map_err(|_| malformed_cursor())?;
                Ok(Self {
                    created_at_micros,
                    edge_id: edge_id.to_string(),
                })
            }
            _ => Err(malformed_cursor()),
        }
    }
}

/// Position in a listing ordered by user id (mutuals)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCursor(pub UserId);

impl KeyCursor {
    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(format!("{}:{}", KEY_TAG, self.0))
    }

    pub fn decode(raw: &str) -> Result<Self> {
        let text = decode_cursor_text(raw)?;
        match text.split_once(':') {
            Some((KEY_TAG, id)) => Ok(Self(UserId::parse(id).map_err(|_| malformed_cursor())?)),
            _ => Err(malformed_cursor()),
        }
    }
}

fn decode_cursor_text(raw: &str) -> Result<String> {
    let bytes = URL_SAFE_NO_PAD.decode(raw).map_err(|_| malformed_cursor())?;
    String::from_utf8(bytes).map_err(|_| malformed_cursor())
}

fn malformed_cursor() -> FollowGraphError {
    FollowGraphError::Validation("malformed cursor".to_string())
}

/// One page of results plus the cursor for the next one
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Current time truncated to the microsecond precision we persist
pub fn now_utc() -> DateTime<Utc> {
    from_micros(Utc::now().timestamp_micros())
}

pub(crate) fn from_micros(micros: i64) -> DateTime<Utc> {
    Utc.timestamp_micros(micros).single().unwrap_or_default()
}
