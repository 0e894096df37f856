//! Wearable OAuth token storage.
//!
//! # Invariants
//! - At most one token set is stored (`id = 1`); storing replaces it.
//! - Token values never appear in logs or error messages.

use crate::repo::codec::{datetime_col, datetime_to_db};
use crate::repo::RepoResult;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: NaiveDateTime,
    pub user_id: Option<String>,
}

impl StoredTokens {
    pub fn is_expired_at(&self, now: NaiveDateTime) -> bool {
        now >= self.expires_at
    }
}

impl Debug for StoredTokens {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredTokens")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("user_id", &self.user_id)
            .finish()
    }
}

pub trait TokenRepository {
    fn load_tokens(&self) -> RepoResult<Option<StoredTokens>>;
    fn store_tokens(&self, tokens: &StoredTokens) -> RepoResult<()>;
    fn clear_tokens(&self) -> RepoResult<()>;
}

impl<T: TokenRepository + ?Sized> TokenRepository for &T {
    fn load_tokens(&self) -> RepoResult<Option<StoredTokens>> {
        (**self).load_tokens()
    }

    fn store_tokens(&self, tokens: &StoredTokens) -> RepoResult<()> {
        (**self).store_tokens(tokens)
    }

    fn clear_tokens(&self) -> RepoResult<()> {
        (**self).clear_tokens()
    }
}

pub struct SqliteTokenRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTokenRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl TokenRepository for SqliteTokenRepository<'_> {
    fn load_tokens(&self) -> RepoResult<Option<StoredTokens>> {
        let mut stmt = self.conn.prepare(
            "SELECT access_token, refresh_token, expires_at, user_id
             FROM fitbit_tokens
             WHERE id = 1;",
        )?;
        let mut rows = stmt.query([])?;
        match rows.next()? {
            Some(row) => Ok(Some(StoredTokens {
                access_token: row.get("access_token")?,
                refresh_token: row.get("refresh_token")?,
                expires_at: datetime_col(row, "fitbit_tokens", "expires_at")?,
                user_id: row.get("user_id")?,
            })),
            None => Ok(None),
        }
    }

    fn store_tokens(&self, tokens: &StoredTokens) -> RepoResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO fitbit_tokens (id, access_token, refresh_token, expires_at, user_id)
             VALUES (1, ?1, ?2, ?3, ?4);",
            params![
                tokens.access_token.as_str(),
                tokens.refresh_token.as_str(),
                datetime_to_db(tokens.expires_at),
                tokens.user_id.as_deref(),
            ],
        )?;
        Ok(())
    }

    fn clear_tokens(&self) -> RepoResult<()> {
        self.conn.execute("DELETE FROM fitbit_tokens;", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{SqliteTokenRepository, StoredTokens, TokenRepository};
    use crate::db::open_db_in_memory;
    use chrono::NaiveDate;

    #[test]
    fn store_replaces_and_clear_removes() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteTokenRepository::new(&conn);
        let expires_at = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let mut tokens = StoredTokens {
            access_token: "a1".to_string(),
            refresh_token: "r1".to_string(),
            expires_at,
            user_id: Some("U1".to_string()),
        };
        repo.store_tokens(&tokens).unwrap();
        tokens.access_token = "a2".to_string();
        repo.store_tokens(&tokens).unwrap();

        assert_eq!(repo.load_tokens().unwrap(), Some(tokens.clone()));
        assert!(!format!("{tokens:?}").contains("a2"));

        repo.clear_tokens().unwrap();
        assert!(repo.load_tokens().unwrap().is_none());
    }
}
