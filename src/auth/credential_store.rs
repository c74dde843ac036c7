//! Credential storage for locker users.
//!
//! Point lookups and single-row conditional updates over the `user` table.
//! No business logic lives here.

use std::fmt;

use tracing::{debug, info};

use crate::auth::password::hash_password;
use crate::db::Db;
use crate::db::schema::{UserCreate, UserRecord};
use crate::types::{RefreshSecret, RefreshTokenId, StorageNamespace, Username};

/// Errors returned by the credential store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialStoreError {
    /// No matching user
    NotFound,
    /// A conditional update touched an unexpected number of rows
    Conflict { affected: usize },
    /// Backing store failure
    Database(String),
}

impl fmt::Display for CredentialStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "User not found"),
            Self::Conflict { affected } => {
                write!(f, "Expected to update exactly one user, updated {}", affected)
            }
            Self::Database(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl std::error::Error for CredentialStoreError {}

impl From<surrealdb::Error> for CredentialStoreError {
    fn from(e: surrealdb::Error) -> Self {
        Self::Database(e.to_string())
    }
}

pub type CredentialResult<T> = Result<T, CredentialStoreError>;

/// Substring of the storage engine's commit error when two transactions touch
/// the same record.
const TRANSACTION_CONFLICT: &str = "read or write conflict";

fn is_transaction_conflict(message: &str) -> bool {
    message.contains(TRANSACTION_CONFLICT)
}

fn rotation_error(e: surrealdb::Error) -> CredentialStoreError {
    let message = e.to_string();
    if is_transaction_conflict(&message) {
        debug!("Refresh rotation lost a concurrent write");
        CredentialStoreError::Conflict { affected: 0 }
    } else {
        CredentialStoreError::Database(message)
    }
}

/// Credential store for database operations.
#[derive(Clone)]
pub struct CredentialStore {
    db: Db,
}

impl CredentialStore {
    /// Create a new credential store.
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Get a user by username.
    pub async fn find_by_username(&self, username: &str) -> CredentialResult<UserRecord> {
        let username = username.to_string();

        let query = r#"
            SELECT * FROM user
            WHERE username = $username
            LIMIT 1
        "#;

        let mut res = self.db
            .query(query)
            .bind(("username", username))
            .await?;

        let users: Vec<UserRecord> = res.take(0)?;
        users.into_iter().next().ok_or(CredentialStoreError::NotFound)
    }

    /// Replace the user's refresh identifier and secret as one pair.
    ///
    /// This is a single conditional write keyed by record id, so a concurrent
    /// login can never leave an old identifier next to a new secret. When two
    /// logins race, the store aborts the losing transaction and it surfaces
    /// as `Conflict { affected: 0 }` with nothing written.
    pub async fn rotate_refresh_credentials(
        &self,
        user: &UserRecord,
        token_id: &RefreshTokenId,
        token_secret: &RefreshSecret,
    ) -> CredentialResult<()> {
        let query = r#"
            UPDATE user SET
                token_id = $token_id,
                token_secret = $token_secret
            WHERE id = $id
            RETURN AFTER
        "#;

        let mut res = self.db
            .query(query)
            .bind(("id", user.id.clone()))
            .bind(("token_id", token_id.as_str().to_string()))
            .bind(("token_secret", token_secret.as_str().to_string()))
            .await
            .map_err(rotation_error)?;

        let updated: Vec<UserRecord> = res.take(0).map_err(rotation_error)?;
        if updated.len() != 1 {
            return Err(CredentialStoreError::Conflict {
                affected: updated.len(),
            });
        }

        debug!("Rotated refresh credentials for {}", user.username);
        Ok(())
    }

    /// Get the signing secret of whichever user currently holds `token_id`.
    ///
    /// Fails with `NotFound` when nobody holds the identifier, or when the
    /// holder's secret is still the zero-value sentinel.
    pub async fn find_signing_secret_by_refresh_id(
        &self,
        token_id: &RefreshTokenId,
    ) -> CredentialResult<RefreshSecret> {
        let token_id = token_id.as_str().to_string();

        let query = r#"
            SELECT token_secret FROM user
            WHERE token_id = $token_id
            LIMIT 1
        "#;

        let mut res = self.db
            .query(query)
            .bind(("token_id", token_id))
            .await?;

        #[derive(serde::Deserialize)]
        struct SecretRow {
            #[serde(default)]
            token_secret: Option<RefreshSecret>,
        }

        let rows: Vec<SecretRow> = res.take(0)?;
        rows.into_iter()
            .next()
            .and_then(|row| row.token_secret)
            .filter(|secret| !secret.is_unset())
            .ok_or(CredentialStoreError::NotFound)
    }

    /// Create a user with a hashed password and a fresh storage namespace.
    ///
    /// Used by the offline provisioning command; the HTTP surface never
    /// creates users.
    pub async fn provision_user(
        &self,
        username: &str,
        password: &str,
        cost: u32,
    ) -> anyhow::Result<UserRecord> {
        if username.trim().is_empty() || password.is_empty() {
            anyhow::bail!("username and password must not be empty");
        }

        let create = UserCreate {
            username: Username::new(username),
            pass_hash: hash_password(password, cost)?,
            storage_dir: StorageNamespace::generate(),
        };

        let query = r#"
            CREATE user CONTENT {
                username: $username,
                pass_hash: $pass_hash,
                storage_dir: $storage_dir
            }
        "#;

        let mut res = self.db
            .query(query)
            .bind(("username", create.username.into_inner()))
            .bind(("pass_hash", create.pass_hash))
            .bind(("storage_dir", create.storage_dir.into_inner()))
            .await?;

        let users: Vec<UserRecord> = res.take(0)?;
        let user = users.into_iter().next()
            .ok_or_else(|| anyhow::anyhow!("Failed to create user"))?;

        info!("Provisioned user {} with a new storage namespace", user.username);
        Ok(user)
    }

    /// Delete a user by username. Returns whether a row was removed.
    pub async fn delete_user(&self, username: &str) -> CredentialResult<bool> {
        let username = username.to_string();

        let mut res = self.db
            .query("DELETE user WHERE username = $username RETURN BEFORE")
            .bind(("username", username))
            .await?;

        let deleted: Vec<UserRecord> = res.take(0)?;
        Ok(!deleted.is_empty())
    }
}
