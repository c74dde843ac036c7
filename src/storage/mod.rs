//! Per-identity file storage.
//!
//! [`StorageGate`] turns a validated [`StorageIdentity`](crate::auth::StorageIdentity)
//! into a sandboxed directory and enforces upload policy. [`FileRepository`]
//! performs the byte-level I/O inside whatever directory the gate hands it
//! and knows nothing about identity.

mod gate;
mod repository;

use std::fmt;
use std::path::PathBuf;

pub use gate::{ArtifactKind, MAX_UPLOAD_BYTES, ROM_EXTENSIONS, StorageGate};
pub use repository::FileRepository;

/// Storage errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// File name is not a single plain path component
    InvalidFileName(String),
    /// Upload extension is outside the allow-list for its artifact class
    DisallowedExtension {
        allowed: &'static [&'static str],
        file_name: String,
    },
    /// Storage namespace claim is not a UUID
    InvalidNamespace,
    /// File or directory does not exist
    NotFound(PathBuf),
    /// Any other filesystem failure
    Io(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFileName(name) => write!(f, "Invalid file name: {:?}", name),
            Self::DisallowedExtension { allowed, .. } => {
                write!(f, "{}", gate::rejection_message(allowed))
            }
            Self::InvalidNamespace => write!(f, "Invalid storage namespace"),
            Self::NotFound(path) => write!(f, "Not found: {}", path.display()),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}

impl StorageError {
    fn from_io(err: std::io::Error, path: PathBuf) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path)
        } else {
            Self::Io(format!("{}: {}", path.display(), err))
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
