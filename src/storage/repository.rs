use std::path::Path;

use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::debug;

use super::{StorageError, StorageResult};

/// Byte-level file operations inside a directory supplied by the gate.
///
/// Writes are unsynchronized: concurrent writers to one path race and the
/// last one wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileRepository;

impl FileRepository {
    pub fn new() -> Self {
        Self
    }

    /// Create or truncate-and-replace `path` with the contents of `reader`.
    ///
    /// A failure part way through can leave a truncated file behind.
    pub async fn write<R>(&self, path: &Path, reader: &mut R) -> StorageResult<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|e| StorageError::from_io(e, path.to_path_buf()))?;

        let written = tokio::io::copy(reader, &mut file)
            .await
            .map_err(|e| StorageError::from_io(e, path.to_path_buf()))?;

        file.flush()
            .await
            .map_err(|e| StorageError::from_io(e, path.to_path_buf()))?;

        debug!("Wrote {} bytes", written);
        Ok(written)
    }

    pub async fn read(&self, path: &Path) -> StorageResult<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .map_err(|e| StorageError::from_io(e, path.to_path_buf()))
    }

    /// Names of the entries directly inside `dir`, sorted.
    pub async fn list(&self, dir: &Path) -> StorageResult<Vec<String>> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| StorageError::from_io(e, dir.to_path_buf()))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::from_io(e, dir.to_path_buf()))?
        {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }

        names.sort();
        Ok(names)
    }
}
