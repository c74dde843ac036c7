//! Authentication gateway: credential login, token refresh and bearer checks.

use std::fmt;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::auth::context::StorageIdentity;
use crate::auth::credential_store::{CredentialStore, CredentialStoreError};
use crate::auth::password::verify_password;
use crate::auth::token::{TokenError, TokenService};
use crate::types::StorageNamespace;

/// Name of the cookie carrying the refresh token.
pub const REFRESH_COOKIE_NAME: &str = "refresh-tok";

/// Path the refresh cookie is scoped to.
pub const REFRESH_COOKIE_PATH: &str = "/api/tokens/refresh";

const BEARER_PREFIX: &str = "Bearer ";

/// Login request body.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    #[serde(alias = "Username")]
    pub username: String,
    #[serde(alias = "Password")]
    pub password: String,
}

/// Tokens produced by a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub access_token: String,
    pub refresh_token: String,
    pub identity: StorageIdentity,
}

/// Authentication errors.
#[derive(Debug, Clone)]
pub enum AuthError {
    /// Request is missing required fields
    MalformedRequest,
    /// No usable token was presented, or it failed validation
    Unauthenticated,
    /// Unknown user or wrong password
    InvalidCredentials,
    /// A concurrent login for the same user rotated first
    Conflict,
    /// Storage, rotation or signing failure
    Internal(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedRequest => write!(f, "Malformed request"),
            Self::Unauthenticated => write!(f, "Authentication required"),
            Self::InvalidCredentials => write!(f, "Invalid credentials"),
            Self::Conflict => write!(f, "Concurrent login for the same user"),
            Self::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

/// Adapts raw request credentials onto the token service.
#[derive(Clone)]
pub struct AuthGateway {
    tokens: TokenService,
    credentials: CredentialStore,
}

impl AuthGateway {
    pub fn new(tokens: TokenService, credentials: CredentialStore) -> Self {
        Self { tokens, credentials }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Verify a username/password pair and issue a fresh token pair.
    ///
    /// Every successful login rotates the user's refresh credentials, which
    /// invalidates any refresh token issued before it. A login that loses a
    /// rotation race to another login for the same user fails with
    /// `Conflict` and issues nothing.
    pub async fn login(&self, credentials: &Credentials) -> Result<LoginOutcome, AuthError> {
        if credentials.username.is_empty() || credentials.password.is_empty() {
            return Err(AuthError::MalformedRequest);
        }

        let user = match self.credentials.find_by_username(&credentials.username).await {
            Ok(user) => user,
            Err(CredentialStoreError::NotFound) => return Err(AuthError::InvalidCredentials),
            Err(e) => return Err(AuthError::Internal(e.to_string())),
        };

        let password = credentials.password.clone();
        let pass_hash = user.pass_hash.clone();
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &pass_hash))
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        if !matches {
            debug!("Password mismatch for {}", user.username);
            return Err(AuthError::InvalidCredentials);
        }

        let refresh_token = match self.tokens.issue_refresh_token(&user).await {
            Ok(token) => token,
            Err(TokenError::Rotation(CredentialStoreError::Conflict { .. })) => {
                info!("Login for {} lost a concurrent rotation", user.username);
                return Err(AuthError::Conflict);
            }
            Err(e) => return Err(AuthError::Internal(e.to_string())),
        };

        let (access_token, identity) = self.access_for(&user.storage_dir)?;

        info!("User {} logged in", user.username);

        Ok(LoginOutcome {
            access_token,
            refresh_token,
            identity,
        })
    }

    /// Mint a new access token from a refresh-token cookie value.
    pub async fn refresh(&self, refresh_token: Option<&str>) -> Result<String, AuthError> {
        let token = refresh_token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::Unauthenticated)?;

        let claims = self
            .tokens
            .validate_refresh_token(token)
            .await
            .ok_or(AuthError::Unauthenticated)?;

        let (access_token, _) = self.access_for(&claims.store)?;
        Ok(access_token)
    }

    /// Validate an `Authorization: Bearer <token>` header value.
    pub fn authorize(&self, authorization: Option<&str>) -> Result<StorageIdentity, AuthError> {
        let token = authorization
            .and_then(|header| header.strip_prefix(BEARER_PREFIX))
            .ok_or(AuthError::Unauthenticated)?;

        self.tokens
            .validate_access_token(token)
            .map(StorageIdentity::from)
            .ok_or(AuthError::Unauthenticated)
    }

    fn access_for(&self, store: &StorageNamespace) -> Result<(String, StorageIdentity), AuthError> {
        let token = self.tokens.issue_access_token(store).map_err(|e| {
            warn!("Failed to sign access token: {}", e);
            AuthError::Internal(e.to_string())
        })?;

        let identity = self
            .tokens
            .validate_access_token(&token)
            .map(StorageIdentity::from)
            .ok_or_else(|| AuthError::Internal("freshly issued access token did not validate".to_string()))?;

        Ok((token, identity))
    }
}
