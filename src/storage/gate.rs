use std::fmt;
use std::path::{Path, PathBuf};

use tracing::info;

use super::{StorageError, StorageResult};
use crate::auth::StorageIdentity;
use crate::config::StorageConfig;

/// Accepted ROM extensions, without the leading dot.
pub const ROM_EXTENSIONS: &[&str] = &["gba", "gbc", "gb", "zip", "7z"];

/// Inbound body ceiling: 50 MiB of payload plus 1 KiB for multipart framing.
pub const MAX_UPLOAD_BYTES: usize = (50 << 20) + 1024;

/// Class of stored artifact. Each class has its own root directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Rom,
    Save,
}

impl ArtifactKind {
    /// Multipart field name and download query parameter for this class.
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Rom => "rom",
            Self::Save => "save",
        }
    }

    /// Extension allow-list, or `None` when any extension is accepted.
    pub fn allowed_extensions(&self) -> Option<&'static [&'static str]> {
        match self {
            Self::Rom => Some(ROM_EXTENSIONS),
            Self::Save => None,
        }
    }
}

pub(super) fn rejection_message(allowed: &[&str]) -> String {
    format!(
        "File not in gba format, expected extensions are {}",
        allowed
            .iter()
            .map(|ext| format!(".{}", ext))
            .collect::<Vec<_>>()
            .join("/")
    )
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

/// Maps validated identities onto sandboxed directories.
#[derive(Debug, Clone)]
pub struct StorageGate {
    rom_root: PathBuf,
    save_root: PathBuf,
}

impl StorageGate {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            rom_root: config.rom_path.clone(),
            save_root: config.save_path.clone(),
        }
    }

    fn base_path(&self, kind: ArtifactKind) -> &Path {
        match kind {
            ArtifactKind::Rom => &self.rom_root,
            ArtifactKind::Save => &self.save_root,
        }
    }

    /// `<base>/<namespace>/` for the identity.
    ///
    /// Derived only from the token's `store` claim, never from a username.
    pub fn resolve_namespace_root(
        &self,
        kind: ArtifactKind,
        identity: &StorageIdentity,
    ) -> StorageResult<PathBuf> {
        let namespace = identity
            .store()
            .as_uuid()
            .ok_or(StorageError::InvalidNamespace)?;

        Ok(self.base_path(kind).join(namespace.hyphenated().to_string()))
    }

    /// Resolve the namespace root and create it if absent.
    ///
    /// Safe under concurrent first use: a directory that already exists is
    /// success.
    pub async fn provision(
        &self,
        kind: ArtifactKind,
        identity: &StorageIdentity,
    ) -> StorageResult<PathBuf> {
        let root = self.resolve_namespace_root(kind, identity)?;

        match tokio::fs::create_dir(&root).await {
            Ok(()) => info!("Provisioned {} namespace directory", kind),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Base directory itself is missing; create the whole chain.
                tokio::fs::create_dir_all(&root)
                    .await
                    .map_err(|e| StorageError::from_io(e, root.clone()))?;
                info!("Provisioned {} namespace directory", kind);
            }
            Err(e) => return Err(StorageError::from_io(e, root)),
        }

        Ok(root)
    }

    /// Path of `file_name` inside the identity's namespace root.
    pub fn resolve_file(
        &self,
        kind: ArtifactKind,
        identity: &StorageIdentity,
        file_name: &str,
    ) -> StorageResult<PathBuf> {
        validate_file_name(file_name)?;
        Ok(self.resolve_namespace_root(kind, identity)?.join(file_name))
    }

    /// Check an upload's extension against the class allow-list.
    pub fn validate_upload_extension(kind: ArtifactKind, file_name: &str) -> StorageResult<()> {
        let Some(allowed) = kind.allowed_extensions() else {
            return Ok(());
        };

        // Everything after the last dot, so a bare ".gba" still counts.
        let extension = file_name.rsplit_once('.').map(|(_, ext)| ext);

        match extension {
            Some(ext) if allowed.contains(&ext) => Ok(()),
            _ => Err(StorageError::DisallowedExtension {
                allowed,
                file_name: file_name.to_string(),
            }),
        }
    }
}

/// A file name must be exactly one normal path component.
fn validate_file_name(file_name: &str) -> StorageResult<()> {
    let invalid = file_name.is_empty()
        || file_name == "."
        || file_name == ".."
        || file_name.contains(['/', '\\', '\0'])
        || Path::new(file_name).file_name().and_then(|n| n.to_str()) != Some(file_name);

    if invalid {
        Err(StorageError::InvalidFileName(file_name.to_string()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StorageNamespace;
    use tempfile::TempDir;

    fn identity() -> StorageIdentity {
        StorageIdentity::new(StorageNamespace::generate())
    }

    fn gate(dir: &TempDir) -> StorageGate {
        StorageGate::new(&StorageConfig::under(dir.path()))
    }

    #[test]
    fn test_rom_extensions() {
        for name in ["a.gba", "b.gbc", "c.gb", "d.zip", "e.7z"] {
            assert!(StorageGate::validate_upload_extension(ArtifactKind::Rom, name).is_ok(), "{}", name);
        }

        for name in ["f.nds", "g", "h.GBA", "i.gba.exe", "game.", "gba"] {
            assert!(StorageGate::validate_upload_extension(ArtifactKind::Rom, name).is_err(), "{}", name);
        }
    }

    #[test]
    fn test_bare_extension_name_accepted() {
        assert!(StorageGate::validate_upload_extension(ArtifactKind::Rom, ".gba").is_ok());
        assert!(StorageGate::validate_upload_extension(ArtifactKind::Rom, ".nds").is_err());
    }

    #[test]
    fn test_save_accepts_any_extension() {
        for name in ["a.sav", "b.ss0", "c"] {
            assert!(StorageGate::validate_upload_extension(ArtifactKind::Save, name).is_ok());
        }
    }

    #[test]
    fn test_rom_rejection_message() {
        let err = StorageGate::validate_upload_extension(ArtifactKind::Rom, "f.nds").unwrap_err();
        assert_eq!(
            err.to_string(),
            "File not in gba format, expected extensions are .gba/.gbc/.gb/.zip/.7z"
        );
    }

    #[test]
    fn test_namespace_root_uses_store_claim() {
        let dir = TempDir::new().unwrap();
        let gate = gate(&dir);
        let identity = identity();

        let root = gate.resolve_namespace_root(ArtifactKind::Rom, &identity).unwrap();
        assert_eq!(root, dir.path().join("local_roms").join(identity.store().as_str()));

        let save_root = gate.resolve_namespace_root(ArtifactKind::Save, &identity).unwrap();
        assert_eq!(save_root, dir.path().join("local_saves").join(identity.store().as_str()));
    }

    #[test]
    fn test_non_uuid_namespace_rejected() {
        let dir = TempDir::new().unwrap();
        let gate = gate(&dir);
        let identity = StorageIdentity::new(StorageNamespace::new("../../etc"));

        assert_eq!(
            gate.resolve_namespace_root(ArtifactKind::Rom, &identity).unwrap_err(),
            StorageError::InvalidNamespace
        );
    }

    #[test]
    fn test_traversal_file_names_rejected() {
        let dir = TempDir::new().unwrap();
        let gate = gate(&dir);
        let identity = identity();

        for name in ["", ".", "..", "../x.gba", "a/b.gba", "a\\b.gba", "/etc/passwd"] {
            assert!(
                matches!(
                    gate.resolve_file(ArtifactKind::Rom, &identity, name),
                    Err(StorageError::InvalidFileName(_))
                ),
                "{:?}",
                name
            );
        }

        assert!(gate.resolve_file(ArtifactKind::Rom, &identity, "game.gba").is_ok());
    }

    #[tokio::test]
    async fn test_provision_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let gate = gate(&dir);
        let identity = identity();

        let first = gate.provision(ArtifactKind::Rom, &identity).await.unwrap();
        let second = gate.provision(ArtifactKind::Rom, &identity).await.unwrap();

        assert_eq!(first, second);
        assert!(first.is_dir());
    }

    #[tokio::test]
    async fn test_concurrent_provision_succeeds() {
        let dir = TempDir::new().unwrap();
        let gate = gate(&dir);
        let identity = identity();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let gate = gate.clone();
                let identity = identity.clone();
                tokio::spawn(async move { gate.provision(ArtifactKind::Save, &identity).await })
            })
            .collect();

        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }
    }
}
