//! Configuration loading and management.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub auth: AuthConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    /// Connections kept in the pool.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            pool_size: default_pool_size(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".worklog/worklog.db")
}

fn default_pool_size() -> u32 {
    8
}

/// Session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Days before a session token expires.
    #[serde(default = "default_session_ttl_days")]
    pub session_ttl_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_days: default_session_ttl_days(),
        }
    }
}

fn default_session_ttl_days() -> i64 {
    30
}

impl AuthConfig {
    pub fn session_ttl_ms(&self) -> i64 {
        self.session_ttl_days * 86_400_000
    }
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from default locations or return defaults.
    pub fn load_or_default() -> Self {
        // Try ./.worklog/config.yaml, then the home directory
        if let Ok(config) = Self::load(".worklog/config.yaml") {
            return config;
        }
        if let Some(home) = dirs::home_dir()
            && let Ok(config) = Self::load(home.join(".worklog/config.yaml"))
        {
            return config;
        }

        // Fall back to defaults with environment overrides
        let mut config = Self::default();

        if let Ok(path) = std::env::var("WORKLOG_DB_PATH") {
            config.database.path = PathBuf::from(path);
        }

        if let Ok(host) = std::env::var("WORKLOG_HOST") {
            config.server.host = host;
        }

        if let Ok(port) = std::env::var("WORKLOG_PORT")
            && let Ok(port) = port.parse()
        {
            config.server.port = port;
        }

        config
    }

    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.database.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_sections() {
        let config: Config = serde_yaml::from_str("server:\n  port: 8080\n").expect("parses");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.database.pool_size, 8);
        assert_eq!(config.auth.session_ttl_days, 30);
    }

    #[test]
    fn session_ttl_converts_to_milliseconds() {
        let auth = AuthConfig {
            session_ttl_days: 1,
        };
        assert_eq!(auth.session_ttl_ms(), 86_400_000);
    }
}
