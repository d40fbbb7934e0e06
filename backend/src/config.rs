use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};

/// Which `ProductRepository` implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Postgres,
    Memory,
}

impl FromStr for StorageKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "memory" | "mem" => Ok(Self::Memory),
            other => bail!("unknown STORAGE backend '{other}' (expected postgres or memory)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => bail!("unknown LOG_FORMAT '{other}' (expected compact, pretty or json)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// Total connection attempts, always >= 1.
    pub connect_retries: u32,
    pub retry_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct MessagesConfig {
    pub dir: PathBuf,
    pub default_language: String,
    /// Zero disables lazy reload.
    pub reload_after: Duration,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    pub default_filter: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageKind,
    /// `None` only when `storage` is `Memory`.
    pub database: Option<DatabaseConfig>,
    pub host: String,
    pub port: u16,
    pub messages: MessagesConfig,
    pub log: LogConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key/value source. `from_env` is the
    /// production caller; tests feed a map.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let storage: StorageKind = var("STORAGE", "postgres").parse()?;

        let database = match storage {
            StorageKind::Memory => None,
            StorageKind::Postgres => {
                let connect_retries: u32 = var("DB_CONNECT_RETRIES", "5")
                    .parse()
                    .context("DB_CONNECT_RETRIES must be a valid number")?;
                if connect_retries == 0 {
                    bail!("DB_CONNECT_RETRIES must be at least 1");
                }
                let max_connections: u32 = var("DB_MAX_CONNECTIONS", "10")
                    .parse()
                    .context("DB_MAX_CONNECTIONS must be a valid number")?;
                if max_connections == 0 {
                    bail!("DB_MAX_CONNECTIONS must be at least 1");
                }
                Some(DatabaseConfig {
                    url: lookup("DATABASE_URL")
                        .context("DATABASE_URL must be set when STORAGE=postgres")?,
                    max_connections,
                    connect_retries,
                    retry_delay: Duration::from_millis(
                        var("DB_RETRY_DELAY_MS", "2000")
                            .parse()
                            .context("DB_RETRY_DELAY_MS must be a valid number")?,
                    ),
                })
            }
        };

        let default_language = var("DEFAULT_LANGUAGE", "en").trim().to_ascii_lowercase();
        if default_language.is_empty() {
            bail!("DEFAULT_LANGUAGE must not be empty");
        }

        Ok(Self {
            storage,
            database,
            host: var("HOST", "127.0.0.1"),
            port: var("PORT", "3000")
                .parse()
                .context("PORT must be a valid number")?,
            messages: MessagesConfig {
                dir: PathBuf::from(var("MESSAGES_DIR", "./messages")),
                default_language,
                reload_after: Duration::from_secs(
                    var("MESSAGES_RELOAD_SECS", "0")
                        .parse()
                        .context("MESSAGES_RELOAD_SECS must be a valid number")?,
                ),
            },
            log: LogConfig {
                format: var("LOG_FORMAT", "compact").parse()?,
                default_filter: "info,registration_service=debug".to_string(),
            },
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
