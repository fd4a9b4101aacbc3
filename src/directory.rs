//! User directory collaborator: existence and the live privacy flag.
//!
//! The flag is read on every call and never cached, so a user flipping their
//! account private takes effect for the next follow.

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::config::{Config, DirectoryKind};
use crate::db::Db;
use crate::error::{FollowGraphError, Result};
use crate::model::{now_utc, UserId};

/// What the follow graph needs to know about a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub user_id: UserId,
    pub is_private: bool,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// `None` when the user does not exist
    async fn lookup(&self, user: &UserId) -> Result<Option<UserProfile>>;
}

/// Reads the `users` mirror table in the service database
pub struct SqliteUserDirectory {
    db: Db,
}

impl SqliteUserDirectory {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Insert or update a user's mirror row
    pub async fn upsert_user(&self, user: &UserId, is_private: bool) -> Result<()> {
        let user = user.clone();
        let now = now_utc().timestamp_micros();
        self.db
            .with_connection(move |conn| {
                conn.execute(
                    "INSERT INTO users (user_id, is_private, updated_at) VALUES (?1, ?2, ?3) \
                     ON CONFLICT(user_id) DO UPDATE SET is_private = excluded.is_private, \
                     updated_at = excluded.updated_at",
                    params![user.as_str(), is_private, now],
                )?;
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl UserDirectory for SqliteUserDirectory {
    async fn lookup(&self, user: &UserId) -> Result<Option<UserProfile>> {
        let user = user.clone();
        self.db
            .with_connection(move |conn| {
                let is_private: Option<bool> = conn
                    .query_row(
                        "SELECT is_private FROM users WHERE user_id = ?1",
                        params![user.as_str()],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(is_private.map(|is_private| UserProfile { user_id: user, is_private }))
            })
            .await
    }
}

#[derive(Debug, Deserialize)]
struct DirectoryRecord {
    #[serde(default)]
    is_private: bool,
}

/// Queries the platform user service over HTTP: `GET {base_url}/users/{id}`
pub struct HttpUserDirectory {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpUserDirectory {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| FollowGraphError::Config(format!("invalid directory base_url: {}", e)))?;
        // Url::join replaces the last segment unless the base ends with '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FollowGraphError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, base_url })
    }

    fn user_url(&self, user: &UserId) -> Result<Url> {
        self.base_url
            .join(&format!("users/{}", user))
            .map_err(|e| FollowGraphError::Upstream(format!("bad directory url: {}", e)))
    }
}

#[async_trait]
impl UserDirectory for HttpUserDirectory {
    async fn lookup(&self, user: &UserId) -> Result<Option<UserProfile>> {
        let url = self.user_url(user)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FollowGraphError::Upstream(format!("user directory unreachable: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(FollowGraphError::Upstream(format!(
                "user directory returned {} for {}",
                response.status(),
                user
            )));
        }

        let record: DirectoryRecord = response
            .json()
            .await
            .map_err(|e| FollowGraphError::Upstream(format!("bad user directory response: {}", e)))?;
        Ok(Some(UserProfile {
            user_id: user.clone(),
            is_private: record.is_private,
        }))
    }
}

/// Build the directory named in the config
pub fn from_config(config: &Config, db: &Db) -> Result<Arc<dyn UserDirectory>> {
    match config.directory.kind {
        DirectoryKind::Sqlite => Ok(Arc::new(SqliteUserDirectory::new(db.clone()))),
        DirectoryKind::Http => {
            let base_url = config
                .directory
                .base_url
                .as_deref()
                .ok_or_else(|| FollowGraphError::Config("directory.base_url not set".to_string()))?;
            let timeout = Duration::from_millis(config.directory.timeout_ms);
            Ok(Arc::new(HttpUserDirectory::new(base_url, timeout)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::migrated_db;

    #[tokio::test]
    async fn test_sqlite_directory_reads_live_flag() {
        let (db, _tmp) = migrated_db().await;
        let directory = SqliteUserDirectory::new(db);
        let alice = UserId::parse("alice").unwrap();

        assert!(directory.lookup(&alice).await.unwrap().is_none());

        directory.upsert_user(&alice, false).await.unwrap();
        assert!(!directory.lookup(&alice).await.unwrap().unwrap().is_private);

        directory.upsert_user(&alice, true).await.unwrap();
        assert!(directory.lookup(&alice).await.unwrap().unwrap().is_private);
    }

    #[test]
    fn test_http_directory_url_building() {
        let directory = HttpUserDirectory::new("http://users.internal:9000/api", Duration::from_secs(1)).unwrap();
        let url = directory.user_url(&UserId::parse("u-42").unwrap()).unwrap();
        assert_eq!(url.as_str(), "http://users.internal:9000/api/users/u-42");
        assert!(HttpUserDirectory::new("not a url", Duration::from_secs(1)).is_err());
    }
}
