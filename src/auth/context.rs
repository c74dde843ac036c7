//! Request-scoped identity derived from a validated access token.

use serde::{Deserialize, Serialize};

use crate::auth::token::AccessClaims;
use crate::types::StorageNamespace;

/// Identity attached to a request once its access token has been validated.
///
/// This struct is passed through the request handling chain to scope every
/// file operation. It is immutable once created and deliberately carries no
/// username: the storage namespace is the only identity the file layer sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageIdentity {
    /// Opaque sandbox name from the `store` claim
    store: StorageNamespace,
}

impl StorageIdentity {
    /// Create a new identity for a storage namespace.
    pub fn new(store: StorageNamespace) -> Self {
        Self { store }
    }

    /// Get the storage namespace.
    pub fn store(&self) -> &StorageNamespace {
        &self.store
    }
}

impl From<AccessClaims> for StorageIdentity {
    fn from(claims: AccessClaims) -> Self {
        Self::new(claims.store)
    }
}
