use axum::{async_trait, extract::FromRequestParts, http::request::Parts, http::HeaderMap};

use crate::error::{FollowGraphError, Result};
use crate::http::AppState;
use crate::model::UserId;

/// Resolves the calling user from request headers
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, headers: &HeaderMap) -> Result<UserId>;
}

/// Trusts an identity header set by the gateway that validated the token
pub struct TrustedHeaderAuthenticator {
    header: String,
}

impl TrustedHeaderAuthenticator {
    pub fn new(header: &str) -> Self {
        Self {
            header: header.to_ascii_lowercase(),
        }
    }
}

impl Authenticator for TrustedHeaderAuthenticator {
    fn authenticate(&self, headers: &HeaderMap) -> Result<UserId> {
        let raw = headers
            .get(self.header.as_str())
            .ok_or_else(|| FollowGraphError::Unauthorized(format!("missing {} header", self.header)))?
            .to_str()
            .map_err(|_| FollowGraphError::Unauthorized(format!("unreadable {} header", self.header)))?;
        UserId::parse(raw.trim())
            .map_err(|_| FollowGraphError::Unauthorized(format!("malformed {} header", self.header)))
    }
}

/// The authenticated caller, extracted before any handler logic runs
pub struct Caller(pub UserId);

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = FollowGraphError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        state.authenticator.authenticate(&parts.headers).map(Caller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_trusted_header() {
        let auth = TrustedHeaderAuthenticator::new("X-User-Id");
        let mut headers = HeaderMap::new();
        assert!(matches!(auth.authenticate(&headers), Err(FollowGraphError::Unauthorized(_))));

        headers.insert("x-user-id", HeaderValue::from_static("not valid!"));
        assert!(matches!(auth.authenticate(&headers), Err(FollowGraphError::Unauthorized(_))));

        headers.insert("x-user-id", HeaderValue::from_static("alice"));
        assert_eq!(auth.authenticate(&headers).unwrap().as_str(), "alice");
    }
}
