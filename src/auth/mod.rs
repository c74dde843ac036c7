//! Authentication: credentials, tokens and request identity.
//!
//! ## Flow
//!
//! - `POST /api/account/login` verifies a bcrypt password through
//!   [`AuthGateway::login`], rotates the user's refresh pair and returns an
//!   access token in the body plus a refresh token in an HttpOnly cookie.
//! - `POST /api/tokens/refresh` exchanges the cookie for a new access token.
//! - Every other protected route passes its `Authorization: Bearer` header
//!   through [`AuthGateway::authorize`], producing a [`StorageIdentity`].
//!
//! ## Security Model
//!
//! - Access tokens are signed with a per-process secret and never persisted
//! - Refresh tokens are signed with a per-user secret replaced on every login
//! - Downstream code sees only the storage namespace, never the username

mod context;
mod credential_store;
mod gateway;
pub mod password;
pub mod token;

pub use context::StorageIdentity;
pub use credential_store::{CredentialResult, CredentialStore, CredentialStoreError};
pub use gateway::{
    AuthError, AuthGateway, Credentials, LoginOutcome, REFRESH_COOKIE_NAME, REFRESH_COOKIE_PATH,
};
pub use token::{AccessClaims, RefreshClaims, TokenConfig, TokenError, TokenService};
