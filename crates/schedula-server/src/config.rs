//! Process-wide configuration, loaded once at startup: a TOML file layered
//! under `SCHEDULA_`-prefixed environment variables. No hot reload.

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    pub database_url: String,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ShutdownConfig {
    /// Seconds in-flight handlers are given to finish after shutdown begins.
    pub grace_period_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { grace_period_secs: 30 }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct RpcConfig {
    /// Applied to any RPC that doesn't carry its own deadline.
    pub default_deadline_secs: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self { default_deadline_secs: 10 }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub max_lifetime_secs: u64,
    pub idle_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            max_lifetime_secs: 30 * 60,
            idle_timeout_secs: 10 * 60,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("schedula.toml"))
            .merge(Env::prefixed("SCHEDULA_").split("__"))
            .extract()
    }
}

impl From<PoolConfig> for schedula_store::PoolConfig {
    fn from(config: PoolConfig) -> Self {
        schedula_store::PoolConfig {
            max_connections: config.max_connections,
            min_connections: config.min_connections,
            max_lifetime: std::time::Duration::from_secs(config.max_lifetime_secs),
            idle_timeout: std::time::Duration::from_secs(config.idle_timeout_secs),
        }
    }
}
