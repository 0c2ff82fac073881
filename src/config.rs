use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub max_connections: u32,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let host = var("APP_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = match var("APP_PORT") {
            Some(p) => p.parse::<u16>().context("APP_PORT is not a valid port")?,
            None => 5000,
        };
        let max_connections = var("DB_MAX_CONNECTIONS")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(10);
        Ok(Self {
            database_url,
            host,
            port,
            max_connections,
        })
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .context("invalid APP_HOST/APP_PORT")
    }
}

/// Settings for the browsing client.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub api_url: String,
    /// Directory holding the client's local storage entries.
    pub favorites_dir: PathBuf,
}

impl ClientConfig {
    /// Reads `RECIPES_API_URL` and `FAVORITES_DIR` through `var`; pass
    /// `|k| std::env::var(k).ok()` for the process environment.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            api_url: var("RECIPES_API_URL").unwrap_or_else(|| "http://localhost:5000/".into()),
            favorites_dir: var("FAVORITES_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".recipes")),
        }
    }
}
