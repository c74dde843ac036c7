use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;

pub type Db = Surreal<Any>;

const DEFAULT_DB_PORT: &str = "8000";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: connection_url_from_env(),
            namespace: env::var("LOCKER_DB_NAMESPACE")
                .unwrap_or_else(|_| "locker".to_string()),
            database: env::var("LOCKER_DB_DATABASE")
                .unwrap_or_else(|_| "users".to_string()),
            username: env::var("LOCKER_DB_USER").ok(),
            password: env::var("LOCKER_DB_PASSWORD").ok(),
        }
    }
}

/// Resolve the store URL from the environment.
///
/// `LOCKER_DB_URL` wins outright. Otherwise the URL is assembled from host,
/// port and SSL mode, falling back to the embedded in-memory engine when no
/// host is configured.
fn connection_url_from_env() -> String {
    if let Ok(url) = env::var("LOCKER_DB_URL") {
        return url;
    }

    match env::var("LOCKER_DB_HOST") {
        Ok(host) if !host.trim().is_empty() => {
            let port = env::var("LOCKER_DB_PORT").unwrap_or_else(|_| DEFAULT_DB_PORT.to_string());
            let ssl_mode = env::var("LOCKER_DB_SSL_MODE").unwrap_or_default();
            assemble_url(&host, &port, &ssl_mode)
        }
        _ => "memory".to_string(),
    }
}

fn assemble_url(host: &str, port: &str, ssl_mode: &str) -> String {
    let ssl_mode = ssl_mode.trim();
    let scheme = if ssl_mode.is_empty() || ssl_mode.eq_ignore_ascii_case("disable") {
        "ws"
    } else {
        "wss"
    };
    format!("{}://{}:{}", scheme, host.trim(), port.trim())
}

pub async fn create_connection(config: DatabaseConfig) -> Result<Db> {
    let db = surrealdb::engine::any::connect(config.url).await?;

    // Sign in if credentials are provided
    if let (Some(username), Some(password)) = (config.username, config.password) {
        db.signin(Root {
            username: &username,
            password: &password,
        })
        .await?;
    }

    db.use_ns(config.namespace).use_db(config.database).await?;

    Ok(db)
}

pub async fn ensure_schema(db: &Db) -> Result<()> {
    let schema_queries = vec![
        // Locker users. token_id/token_secret stay NONE until the first login.
        "DEFINE TABLE IF NOT EXISTS user SCHEMAFULL;
         DEFINE FIELD IF NOT EXISTS username ON TABLE user TYPE string;
         DEFINE FIELD IF NOT EXISTS pass_hash ON TABLE user TYPE string;
         DEFINE FIELD IF NOT EXISTS storage_dir ON TABLE user TYPE string;
         DEFINE FIELD IF NOT EXISTS token_id ON TABLE user TYPE option<string>;
         DEFINE FIELD IF NOT EXISTS token_secret ON TABLE user TYPE option<string>;
         DEFINE FIELD IF NOT EXISTS created_at ON TABLE user TYPE datetime DEFAULT time::now();",

        "DEFINE INDEX IF NOT EXISTS user_username ON TABLE user COLUMNS username UNIQUE;
         DEFINE INDEX IF NOT EXISTS user_storage_dir ON TABLE user COLUMNS storage_dir UNIQUE;
         DEFINE INDEX IF NOT EXISTS user_token_id ON TABLE user COLUMNS token_id;",
    ];

    for query in schema_queries {
        db.query(query).await?.check()?;
    }

    Ok(())
}
