// Core modules
mod config;
mod db;
mod types;
pub mod api;
pub mod auth;
pub mod storage;

// Re-export key types and functions
pub use api::{AppState, LockerState, create_router};
pub use auth::{AuthGateway, CredentialStore, StorageIdentity, TokenConfig, TokenService};
pub use config::{ServerConfig, StorageConfig};
pub use db::{DatabaseConfig, Db, UserRecord, create_connection, ensure_schema};
pub use storage::{ArtifactKind, FileRepository, StorageGate};
pub use types::{RefreshSecret, RefreshTokenId, StorageNamespace, Username};

use std::sync::Arc;
use anyhow::Result;
use tracing::info;

/// Convenience function to assemble the full locker state.
///
/// Connects to the database, applies the schema, generates this process's
/// access-token secret and wires the gateway to the storage layer.
pub async fn create_locker(
    db_config: DatabaseConfig,
    storage_config: StorageConfig,
) -> Result<AppState> {
    let db = create_connection(db_config).await?;
    ensure_schema(&db).await?;

    let credentials = CredentialStore::new(db);
    let tokens = TokenService::new(Arc::new(TokenConfig::generate()), credentials.clone());

    info!(
        "Storing roms under {} and saves under {}",
        storage_config.rom_path.display(),
        storage_config.save_path.display()
    );

    Ok(Arc::new(LockerState {
        gateway: AuthGateway::new(tokens, credentials),
        gate: StorageGate::new(&storage_config),
        files: FileRepository::new(),
    }))
}
