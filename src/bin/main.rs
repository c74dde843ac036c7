use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;
use rom_locker::{
    CredentialStore, DatabaseConfig, ServerConfig, StorageConfig, create_locker, create_router,
};

#[derive(Parser)]
#[command(name = "rom-locker")]
#[command(about = "Authenticated ROM and save-state file locker")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Server {
        /// Bind address, e.g. 0.0.0.0:8080
        #[arg(long, env = "LOCKER_BIND")]
        bind: Option<String>,
        /// Overrides the database url assembled from LOCKER_DB_* variables
        #[arg(long)]
        db_url: Option<String>,
        #[arg(long, env = "LOCKER_ROM_PATH")]
        rom_path: Option<PathBuf>,
        #[arg(long, env = "LOCKER_SAVE_PATH")]
        save_path: Option<PathBuf>,
    },
    /// Initialize the database
    Init {
        #[arg(long)]
        db_url: Option<String>,
    },
    /// Create a user with a fresh storage namespace
    CreateUser {
        #[arg(long)]
        username: String,
        #[arg(long, env = "LOCKER_USER_PASSWORD", hide_env_values = true)]
        password: String,
        /// bcrypt work factor
        #[arg(long, default_value_t = rom_locker::auth::password::DEFAULT_COST)]
        cost: u32,
        #[arg(long)]
        db_url: Option<String>,
    },
    /// Delete a user. Their files are left on disk.
    DeleteUser {
        #[arg(long)]
        username: String,
        #[arg(long)]
        db_url: Option<String>,
    },
}

fn db_config(db_url: Option<String>) -> DatabaseConfig {
    let mut config = DatabaseConfig::default();
    if let Some(url) = db_url {
        config.url = url;
    }
    config
}

async fn credential_store(db_url: Option<String>) -> Result<CredentialStore> {
    let db_config = db_config(db_url);
    info!("Using database url: {}", db_config.url);

    let db = rom_locker::create_connection(db_config).await?;
    rom_locker::ensure_schema(&db).await?;
    Ok(CredentialStore::new(db))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("rom_locker=info".parse()?)
                .add_directive("surrealdb=warn".parse()?),
        )
        .with_max_level(Level::INFO)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Server {
            bind,
            db_url,
            rom_path,
            save_path,
        } => {
            let bind = bind.unwrap_or_else(|| ServerConfig::default().bind);

            let mut storage_config = StorageConfig::default();
            if let Some(path) = rom_path {
                storage_config.rom_path = path;
            }
            if let Some(path) = save_path {
                storage_config.save_path = path;
            }

            let db_config = db_config(db_url);
            info!("Using database url for server: {}", db_config.url);

            let state = create_locker(db_config, storage_config).await?;
            let app = create_router(state);

            let listener = tokio::net::TcpListener::bind(&bind).await?;
            info!("Locker listening on http://{}", bind);

            axum::serve(listener, app).await?;
        }
        Commands::Init { db_url } => {
            info!("Initializing database...");
            credential_store(db_url).await?;
            info!("Database initialized successfully");
        }
        Commands::CreateUser {
            username,
            password,
            cost,
            db_url,
        } => {
            let store = credential_store(db_url).await?;
            let user = store.provision_user(&username, &password, cost).await?;

            println!("User created successfully!");
            println!();
            println!("  Username:  {}", user.username);
            println!("  Namespace: {}", user.storage_dir);
        }
        Commands::DeleteUser { username, db_url } => {
            let store = credential_store(db_url).await?;

            if store.delete_user(&username).await? {
                println!("User '{}' has been deleted.", username);
            } else {
                println!("No user found with username '{}'.", username);
            }
        }
    }

    Ok(())
}
