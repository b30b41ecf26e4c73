//! Server configuration from the environment.
//!
//! Environment variables (defaults in `radmem_core::defaults`):
//! - `HOST`, `PORT`: listen address
//! - `DATABASE_URL`: PostgreSQL connection string
//! - `DB_MAX_CONNECTIONS`, `DB_CONNECT_TIMEOUT_SECS`: pool sizing
//! - `STORE_BACKEND`: `postgres` (default) or `memory`
//! - `UPLOAD_DIR`, `HISTORY_DIR`: file storage roots
//! - `EMBED_URL`, `EMBED_MODEL`, `EMBED_DIM`, `EMBED_CONCURRENCY`, `EMBED_TIMEOUT_SECS`
//! - `OLLAMA_BASE`, `OLLAMA_GEN_MODEL`, `GEN_TIMEOUT_SECS`
//! - `ALLOWED_ORIGINS`: comma-separated CORS origins
//! - `MAX_UPLOAD_BYTES`: request body limit

use std::path::PathBuf;
use std::str::FromStr;

use radmem_core::{defaults, Error, Result};
use radmem_db::PoolConfig;

/// Which point store the server runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(StoreBackend::Postgres),
            "memory" | "mem" => Ok(StoreBackend::Memory),
            other => Err(Error::Config(format!("Unknown STORE_BACKEND: {}", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_connect_timeout_secs: u64,
    pub store_backend: StoreBackend,
    pub upload_dir: PathBuf,
    pub history_dir: PathBuf,
    pub embed_url: String,
    pub embed_model: String,
    pub embed_dim: usize,
    pub embed_concurrency: usize,
    pub embed_timeout_secs: u64,
    pub ollama_base: String,
    pub gen_model: String,
    pub gen_timeout_secs: u64,
    pub allowed_origins: String,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let string = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            host: string("HOST", defaults::SERVER_HOST),
            port: parse(&lookup, "PORT", defaults::SERVER_PORT)?,
            database_url: string("DATABASE_URL", "postgres://localhost/radmem"),
            db_max_connections: parse(&lookup, "DB_MAX_CONNECTIONS", defaults::DB_MAX_CONNECTIONS)?,
            db_connect_timeout_secs: parse(
                &lookup,
                "DB_CONNECT_TIMEOUT_SECS",
                defaults::DB_CONNECT_TIMEOUT_SECS,
            )?,
            store_backend: parse(&lookup, "STORE_BACKEND", StoreBackend::Postgres)?,
            upload_dir: PathBuf::from(string("UPLOAD_DIR", defaults::UPLOAD_DIR)),
            history_dir: PathBuf::from(string("HISTORY_DIR", defaults::HISTORY_DIR)),
            embed_url: string("EMBED_URL", defaults::EMBED_URL),
            embed_model: string("EMBED_MODEL", defaults::EMBED_MODEL),
            embed_dim: parse(&lookup, "EMBED_DIM", defaults::EMBED_DIMENSION)?,
            embed_concurrency: parse(&lookup, "EMBED_CONCURRENCY", defaults::EMBED_CONCURRENCY)?,
            embed_timeout_secs: parse(&lookup, "EMBED_TIMEOUT_SECS", defaults::EMBED_TIMEOUT_SECS)?,
            ollama_base: string("OLLAMA_BASE", defaults::OLLAMA_URL),
            gen_model: string("OLLAMA_GEN_MODEL", defaults::GEN_MODEL),
            gen_timeout_secs: parse(&lookup, "GEN_TIMEOUT_SECS", defaults::GEN_TIMEOUT_SECS)?,
            allowed_origins: string("ALLOWED_ORIGINS", ""),
            max_upload_bytes: parse(&lookup, "MAX_UPLOAD_BYTES", defaults::MAX_BODY_SIZE_BYTES)?,
        })
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::new(self.db_max_connections, self.db_connect_timeout_secs)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} has an invalid value: {}", key, raw))),
        _ => Ok(default),
    }
}
