//! Access and refresh token issuance and validation.
//!
//! Two HMAC-signed JWT kinds cooperate:
//!
//! - **Access tokens** carry `{store, exp}`, live five minutes and are signed
//!   with a secret generated once per process ([`TokenConfig`]). Restarting
//!   the process invalidates every outstanding access token.
//! - **Refresh tokens** carry `{sub, store, exp}`, live seven hours and are
//!   signed with the holder's per-user secret. `sub` is the rotation
//!   identifier; both it and the secret are replaced on each login, which
//!   implicitly revokes every older refresh token.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::credential_store::{CredentialStore, CredentialStoreError};
use crate::db::schema::UserRecord;
use crate::types::{RefreshSecret, RefreshTokenId, StorageNamespace};

/// Lifetime of an access token.
pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(5 * 60);

/// Lifetime of a refresh token (and of the cookie carrying it).
pub const REFRESH_TOKEN_TTL: Duration = Duration::from_secs(7 * 60 * 60);

/// Algorithm used when issuing tokens.
const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// The MAC family accepted on validation.
const MAC_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Process-wide token settings.
///
/// Built once at startup and shared by reference for the process lifetime.
/// The access secret lives only in memory and is never persisted.
pub struct TokenConfig {
    access_secret: Vec<u8>,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl TokenConfig {
    /// Generate a fresh access secret from OS randomness.
    pub fn generate() -> Self {
        let mut secret = Vec::with_capacity(32);
        secret.extend_from_slice(Uuid::new_v4().as_bytes());
        secret.extend_from_slice(Uuid::new_v4().as_bytes());
        Self::with_access_secret(secret)
    }

    /// Use a caller-supplied access secret.
    pub fn with_access_secret(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            access_secret: secret.into(),
            access_ttl: ACCESS_TOKEN_TTL,
            refresh_ttl: REFRESH_TOKEN_TTL,
        }
    }
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("access_secret", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

/// Claims of an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub store: StorageNamespace,
    pub exp: i64,
}

/// Claims of a refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: RefreshTokenId,
    pub store: StorageNamespace,
    pub exp: i64,
}

/// Token issuance errors.
#[derive(Debug, Clone)]
pub enum TokenError {
    /// The JWT library failed to sign
    Signing(String),
    /// Persisting the rotated refresh pair failed
    Rotation(CredentialStoreError),
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signing(msg) => write!(f, "Token signing failed: {}", msg),
            Self::Rotation(e) => write!(f, "Refresh rotation failed: {}", e),
        }
    }
}

impl std::error::Error for TokenError {}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        Self::Signing(e.to_string())
    }
}

/// Issues and validates access and refresh tokens.
#[derive(Clone)]
pub struct TokenService {
    config: Arc<TokenConfig>,
    credentials: CredentialStore,
}

impl TokenService {
    pub fn new(config: Arc<TokenConfig>, credentials: CredentialStore) -> Self {
        Self { config, credentials }
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.config.refresh_ttl
    }

    /// Sign a short-lived access token for a storage namespace.
    pub fn issue_access_token(&self, store: &StorageNamespace) -> Result<String, TokenError> {
        let claims = AccessClaims {
            store: store.clone(),
            exp: expires_in(self.config.access_ttl),
        };

        let token = encode(
            &Header::new(SIGNING_ALGORITHM),
            &claims,
            &EncodingKey::from_secret(&self.config.access_secret),
        )?;

        Ok(token)
    }

    /// Rotate the user's refresh pair and sign a refresh token under it.
    ///
    /// Only called after a successful login. No token is produced if the
    /// rotation does not update exactly one user.
    pub async fn issue_refresh_token(&self, user: &UserRecord) -> Result<String, TokenError> {
        let token_id = RefreshTokenId::generate();
        let secret = RefreshSecret::generate();

        self.credentials
            .rotate_refresh_credentials(user, &token_id, &secret)
            .await
            .map_err(TokenError::Rotation)?;

        let claims = RefreshClaims {
            sub: token_id,
            store: user.storage_dir.clone(),
            exp: expires_in(self.config.refresh_ttl),
        };

        let token = encode(
            &Header::new(SIGNING_ALGORITHM),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )?;

        info!("Issued refresh token for {}", user.username);
        Ok(token)
    }

    /// Validate an access token against the process secret.
    ///
    /// Expired, malformed, mis-signed and wrong-algorithm tokens all yield
    /// `None`; the reason is only logged at debug level.
    pub fn validate_access_token(&self, token: &str) -> Option<AccessClaims> {
        let key = DecodingKey::from_secret(&self.config.access_secret);

        match decode::<AccessClaims>(token, &key, &mac_validation()) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                debug!("Rejected access token: {}", e);
                None
            }
        }
    }

    /// Validate a refresh token whose signing key depends on its own `sub`.
    ///
    /// 1. Read `sub` from the unverified payload.
    /// 2. Look up the secret currently paired with that identifier.
    /// 3. Fully verify the token under that secret.
    pub async fn validate_refresh_token(&self, token: &str) -> Option<RefreshClaims> {
        let sub = match unverified_subject(token) {
            Some(sub) => sub,
            None => {
                debug!("Rejected refresh token: no readable subject");
                return None;
            }
        };

        let secret = match self.credentials.find_signing_secret_by_refresh_id(&sub).await {
            Ok(secret) => secret,
            Err(e) => {
                debug!("Rejected refresh token: {}", e);
                return None;
            }
        };

        let key = DecodingKey::from_secret(secret.as_bytes());
        match decode::<RefreshClaims>(token, &key, &mac_validation()) {
            Ok(data) if data.claims.sub == sub => Some(data.claims),
            Ok(_) => None,
            Err(e) => {
                debug!("Rejected refresh token: {}", e);
                None
            }
        }
    }
}

fn mac_validation() -> Validation {
    let mut validation = Validation::new(SIGNING_ALGORITHM);
    validation.algorithms = MAC_ALGORITHMS.to_vec();
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp"]);
    validation
}

fn expires_in(ttl: Duration) -> i64 {
    chrono::Utc::now().timestamp() + ttl.as_secs() as i64
}

/// Recover `sub` from a token without checking its signature.
///
/// The header must already name a MAC algorithm so a foreign-family token
/// never reaches the credential store.
fn unverified_subject(token: &str) -> Option<RefreshTokenId> {
    let header = decode_header(token).ok()?;
    if !MAC_ALGORITHMS.contains(&header.alg) {
        return None;
    }

    let mut segments = token.split('.');
    let (_, payload, _) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() {
        return None;
    }

    #[derive(Deserialize)]
    struct UnverifiedClaims {
        #[serde(default)]
        sub: Option<String>,
    }

    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: UnverifiedClaims = serde_json::from_slice(&bytes).ok()?;

    claims
        .sub
        .filter(|sub| !sub.trim().is_empty())
        .map(RefreshTokenId::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_connection, ensure_schema, DatabaseConfig};

    async fn setup() -> (TokenService, CredentialStore) {
        let config = DatabaseConfig {
            url: "memory".to_string(),
            ..Default::default()
        };
        let db = create_connection(config).await.unwrap();
        ensure_schema(&db).await.unwrap();
        let credentials = CredentialStore::new(db);
        let service = TokenService::new(Arc::new(TokenConfig::generate()), credentials.clone());
        (service, credentials)
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    fn sign<T: Serialize>(alg: Algorithm, claims: &T, secret: &[u8]) -> String {
        encode(&Header::new(alg), claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    /// Hand-build a token with an arbitrary header; the signature is junk.
    fn forge(header: serde_json::Value, claims: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(header.to_string());
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        let signature = URL_SAFE_NO_PAD.encode(b"not-a-real-signature");
        format!("{}.{}.{}", header, payload, signature)
    }

    fn decode_unchecked(token: &str) -> serde_json::Value {
        let payload = token.split('.').nth(1).unwrap();
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_access_token_round_trip() {
        let (service, _) = setup().await;
        let store = StorageNamespace::generate();

        let token = service.issue_access_token(&store).unwrap();
        let claims = service.validate_access_token(&token).unwrap();

        assert_eq!(claims.store, store);
        let lifetime = claims.exp - now();
        assert!(lifetime > 0 && lifetime <= ACCESS_TOKEN_TTL.as_secs() as i64);
    }

    #[tokio::test]
    async fn test_access_token_other_key_rejected() {
        let (service, _) = setup().await;
        let claims = AccessClaims {
            store: StorageNamespace::generate(),
            exp: now() + 60,
        };

        let token = sign(Algorithm::HS256, &claims, b"some-other-process-secret");
        assert!(service.validate_access_token(&token).is_none());
    }

    #[tokio::test]
    async fn test_access_token_from_previous_process_rejected() {
        let (service, credentials) = setup().await;
        let restarted = TokenService::new(Arc::new(TokenConfig::generate()), credentials);

        let token = service.issue_access_token(&StorageNamespace::generate()).unwrap();
        assert!(restarted.validate_access_token(&token).is_none());
    }

    #[tokio::test]
    async fn test_access_token_expired_rejected() {
        let secret = b"fixed-test-secret".to_vec();
        let (_, credentials) = setup().await;
        let service = TokenService::new(Arc::new(TokenConfig::with_access_secret(secret.clone())), credentials);

        let claims = AccessClaims {
            store: StorageNamespace::generate(),
            exp: now() - 3600,
        };
        let token = sign(Algorithm::HS256, &claims, &secret);
        assert!(service.validate_access_token(&token).is_none());
    }

    #[tokio::test]
    async fn test_access_token_other_mac_width_accepted() {
        let secret = b"fixed-test-secret".to_vec();
        let (_, credentials) = setup().await;
        let service = TokenService::new(Arc::new(TokenConfig::with_access_secret(secret.clone())), credentials);

        let claims = AccessClaims {
            store: StorageNamespace::generate(),
            exp: now() + 60,
        };
        let token = sign(Algorithm::HS512, &claims, &secret);
        assert_eq!(service.validate_access_token(&token), Some(claims));
    }

    #[tokio::test]
    async fn test_access_token_algorithm_confusion_rejected() {
        let (service, _) = setup().await;
        let claims = serde_json::json!({ "store": StorageNamespace::generate(), "exp": now() + 60 });

        let none = forge(serde_json::json!({ "alg": "none", "typ": "JWT" }), claims.clone());
        let rsa = forge(serde_json::json!({ "alg": "RS256", "typ": "JWT" }), claims);

        assert!(service.validate_access_token(&none).is_none());
        assert!(service.validate_access_token(&rsa).is_none());
    }

    #[tokio::test]
    async fn test_access_token_garbage_rejected() {
        let (service, _) = setup().await;
        assert!(service.validate_access_token("").is_none());
        assert!(service.validate_access_token("not.a.jwt").is_none());
    }

    #[tokio::test]
    async fn test_refresh_token_issue_and_validate() {
        let (service, credentials) = setup().await;
        let user = credentials.provision_user("alice", "hunter2", 4).await.unwrap();

        let token = service.issue_refresh_token(&user).await.unwrap();
        let claims = service.validate_refresh_token(&token).await.unwrap();

        let rotated = credentials.find_by_username("alice").await.unwrap();
        assert_eq!(Some(claims.sub), rotated.token_id);
        assert_eq!(claims.store, user.storage_dir);
        let lifetime = claims.exp - now();
        assert!(lifetime > REFRESH_TOKEN_TTL.as_secs() as i64 - 60);
    }

    #[tokio::test]
    async fn test_refresh_token_superseded_by_new_login() {
        let (service, credentials) = setup().await;
        let user = credentials.provision_user("alice", "hunter2", 4).await.unwrap();

        let first = service.issue_refresh_token(&user).await.unwrap();
        let second = service.issue_refresh_token(&user).await.unwrap();

        assert!(service.validate_refresh_token(&first).await.is_none());
        assert!(service.validate_refresh_token(&second).await.is_some());
    }

    #[tokio::test]
    async fn test_refresh_token_for_vanished_user_not_issued() {
        let (service, credentials) = setup().await;
        let user = credentials.provision_user("alice", "hunter2", 4).await.unwrap();
        credentials.delete_user("alice").await.unwrap();

        let result = service.issue_refresh_token(&user).await;
        assert!(matches!(
            result,
            Err(TokenError::Rotation(CredentialStoreError::Conflict { affected: 0 }))
        ));
    }

    #[tokio::test]
    async fn test_refresh_token_missing_subject_rejected() {
        let (service, credentials) = setup().await;
        let user = credentials.provision_user("alice", "hunter2", 4).await.unwrap();
        service.issue_refresh_token(&user).await.unwrap();

        let claims = serde_json::json!({ "store": user.storage_dir, "exp": now() + 60 });
        let token = sign(Algorithm::HS256, &claims, b"whatever");
        assert!(service.validate_refresh_token(&token).await.is_none());
    }

    #[tokio::test]
    async fn test_refresh_token_unknown_subject_rejected() {
        let (service, credentials) = setup().await;
        let user = credentials.provision_user("alice", "hunter2", 4).await.unwrap();

        // Correctly signed under a key the attacker chose, but `sub` is not
        // anybody's current rotation identifier.
        let guessed = RefreshSecret::generate();
        let claims = RefreshClaims {
            sub: RefreshTokenId::generate(),
            store: user.storage_dir.clone(),
            exp: now() + 60,
        };
        let token = sign(Algorithm::HS256, &claims, guessed.as_bytes());
        assert!(service.validate_refresh_token(&token).await.is_none());
    }

    #[tokio::test]
    async fn test_refresh_token_right_subject_wrong_secret_rejected() {
        let (service, credentials) = setup().await;
        let user = credentials.provision_user("alice", "hunter2", 4).await.unwrap();

        let genuine = service.issue_refresh_token(&user).await.unwrap();
        let sub = decode_unchecked(&genuine)["sub"].as_str().unwrap().to_string();

        let claims = RefreshClaims {
            sub: RefreshTokenId::new(sub),
            store: user.storage_dir.clone(),
            exp: now() + 60,
        };
        let token = sign(Algorithm::HS256, &claims, b"not-the-rotated-secret");
        assert!(service.validate_refresh_token(&token).await.is_none());
    }

    #[tokio::test]
    async fn test_refresh_token_algorithm_confusion_rejected() {
        let (service, credentials) = setup().await;
        let user = credentials.provision_user("alice", "hunter2", 4).await.unwrap();

        let genuine = service.issue_refresh_token(&user).await.unwrap();
        let claims = decode_unchecked(&genuine);

        let none = forge(serde_json::json!({ "alg": "none", "typ": "JWT" }), claims.clone());
        let rsa = forge(serde_json::json!({ "alg": "RS256", "typ": "JWT" }), claims);

        assert!(service.validate_refresh_token(&none).await.is_none());
        assert!(service.validate_refresh_token(&rsa).await.is_none());
    }

    #[tokio::test]
    async fn test_refresh_token_expired_rejected() {
        let (service, credentials) = setup().await;
        let user = credentials.provision_user("alice", "hunter2", 4).await.unwrap();

        let token_id = RefreshTokenId::generate();
        let secret = RefreshSecret::generate();
        credentials.rotate_refresh_credentials(&user, &token_id, &secret).await.unwrap();

        let claims = RefreshClaims {
            sub: token_id,
            store: user.storage_dir.clone(),
            exp: now() - 3600,
        };
        let token = sign(Algorithm::HS256, &claims, secret.as_bytes());
        assert!(service.validate_refresh_token(&token).await.is_none());
    }

    #[test]
    fn test_unverified_subject() {
        let claims = serde_json::json!({ "sub": "abc", "exp": 1 });
        let token = sign(Algorithm::HS256, &claims, b"k");
        assert_eq!(unverified_subject(&token), Some(RefreshTokenId::new("abc")));

        let empty = sign(Algorithm::HS256, &serde_json::json!({ "sub": "" }), b"k");
        assert_eq!(unverified_subject(&empty), None);

        assert_eq!(unverified_subject("a.b"), None);
    }

    #[test]
    fn test_token_config_debug_is_redacted() {
        let config = TokenConfig::with_access_secret(b"visible?".to_vec());
        assert!(!format!("{:?}", config).contains("visible"));
    }
}
