use serde::{Deserialize, Serialize};
use std::{env, path::PathBuf};

/// Where artifact files are kept on disk.
///
/// Each root holds one directory per storage namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub rom_path: PathBuf,
    pub save_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            rom_path: env::var("LOCKER_ROM_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./local_roms")),
            save_path: env::var("LOCKER_SAVE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./local_saves")),
        }
    }
}

impl StorageConfig {
    /// Place both artifact roots under a single directory.
    pub fn under(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        Self {
            rom_path: base.join("local_roms"),
            save_path: base.join("local_saves"),
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: env::var("LOCKER_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
        }
    }
}
