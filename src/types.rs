//! NewType wrappers for strong typing throughout the locker.
//!
//! These types prevent accidental mixing of semantically different strings
//! (e.g., passing a username where a storage namespace is expected, which
//! would leak a guessable directory name onto disk).

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Macro to generate a NewType wrapper with standard trait implementations.
macro_rules! newtype_string {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the inner value as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner String.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

newtype_string!(
    /// Unique, immutable login name of a locker user.
    ///
    /// Only used to look a user up at login. It never appears in tokens or
    /// on disk.
    Username
);

newtype_string!(
    /// Opaque storage namespace assigned to a user at creation.
    ///
    /// A random UUIDv4 that names the user's sandbox directory under each
    /// artifact root. It is carried in the `store` claim of both token kinds.
    StorageNamespace
);

newtype_string!(
    /// Identifier of the currently active refresh-token issuance.
    ///
    /// Carried as the `sub` claim of refresh tokens and replaced on every
    /// successful login.
    RefreshTokenId
);

impl StorageNamespace {
    /// Generate a fresh, unguessable namespace.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Parse the namespace as a UUID, rejecting anything else.
    pub fn as_uuid(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.0).ok()
    }
}

impl RefreshTokenId {
    /// Generate a fresh rotation identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Per-user symmetric key used to sign and verify refresh tokens.
///
/// Rotated together with [`RefreshTokenId`] on every login. `Debug` output is
/// redacted so the secret never ends up in logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefreshSecret(String);

impl RefreshSecret {
    /// Wrap an existing secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generate a fresh random secret.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Whether this is the zero-value sentinel of a never-rotated user.
    pub fn is_unset(&self) -> bool {
        self.0.is_empty() || Uuid::parse_str(&self.0).is_ok_and(|u| u.is_nil())
    }

    /// Key bytes for the MAC.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Get the inner value as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RefreshSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RefreshSecret(<redacted>)")
    }
}
