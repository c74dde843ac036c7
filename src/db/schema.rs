use serde::{Deserialize, Serialize};
use surrealdb::{RecordId, sql::Datetime};

use crate::types::{RefreshSecret, RefreshTokenId, StorageNamespace, Username};

/// Persisted locker user.
///
/// `token_id` and `token_secret` are always written together by a single
/// conditional update; both are `None` until the user's first login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Database identifier
    pub id: RecordId,
    /// Unique login name
    pub username: Username,
    /// bcrypt password verifier
    pub pass_hash: String,
    /// Sandbox directory name under each artifact root
    pub storage_dir: StorageNamespace,
    /// Identifier of the current refresh-token issuance
    #[serde(default)]
    pub token_id: Option<RefreshTokenId>,
    /// Signing key of the current refresh-token issuance
    #[serde(default)]
    pub token_secret: Option<RefreshSecret>,
    pub created_at: Option<Datetime>,
}

/// Payload for creating a new user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCreate {
    pub username: Username,
    pub pass_hash: String,
    pub storage_dir: StorageNamespace,
}
