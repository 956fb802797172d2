use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use crate::auth::{AuthConfig, AuthError};

/// Prefix for environment overrides, e.g. `BANDGATE_AUTH__CLIENT_SECRET`
pub const ENV_PREFIX: &str = "BANDGATE_";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

/// Configuration for the bandgate server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub environment: Environment,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port; 0 picks an ephemeral port
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

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string. Without one, users live in memory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,

    #[serde(default = "default_true")]
    pub auto_migrate: bool,
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
            auto_migrate: true,
        }
    }
}

impl Config {
    /// Layer built-in defaults, an optional TOML file and `BANDGATE_*`
    /// environment variables. Validation happens when the server starts.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        if let Some(path) = path {
            if !path.exists() {
                anyhow::bail!("Configuration file not found: {}", path.display());
            }
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]).split("__"));

        Ok(Self::from_figment(&figment)?)
    }

    pub fn from_figment(figment: &Figment) -> Result<Self, figment::Error> {
        figment.extract()
    }

    pub fn validate(&self) -> Result<(), AuthError> {
        if self.server.host.is_empty() {
            return Err(AuthError::invalid_config("server.host", "cannot be empty"));
        }

        if self.database.max_connections == 0 {
            return Err(AuthError::invalid_config(
                "database.max_connections",
                "must be at least 1",
            ));
        }

        if let Some(url) = &self.database.url
            && url.trim().is_empty()
        {
            return Err(AuthError::invalid_config(
                "database.url",
                "cannot be blank; omit it to use the in-memory user store",
            ));
        }

        self.auth.validate()?;

        if self.is_production() && !self.auth.cookie.secure {
            warn!(
                "Running in production with auth.cookie.secure = false; \
                 session cookies will be sent over plain HTTP"
            );
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout_ms() -> u64 {
    2000
}

fn default_true() -> bool {
    true
}
