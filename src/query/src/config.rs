//! Gateway configuration loading and validation

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Complete gateway configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub directory: DirectoryConfig,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub cache: CacheSection,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DirectoryConfig {
    #[serde(default = "default_base_dn")]
    pub base_dn: String,
    #[serde(default = "default_groups_ou")]
    pub groups_ou: String,
    #[serde(default = "default_users_ou")]
    pub users_ou: String,
}

/// Which evaluator serves group and user searches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Load entities from the backend and run the filter interpreter
    #[default]
    Interpreter,
    /// Compile the filter to SQL against the relational cache
    Sql,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryConfig {
    #[serde(default)]
    pub strategy: Strategy,
    /// Resolve `member`/`memberOf` transitively
    #[serde(default = "default_true")]
    pub flattening: bool,
    #[serde(default)]
    pub use_materialized_views: bool,
    #[serde(default = "default_true")]
    pub active_users_only: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

fn default_true() -> bool { true }
fn default_base_dn() -> String { "dc=example,dc=com".to_string() }
fn default_groups_ou() -> String { "groups".to_string() }
fn default_users_ou() -> String { "users".to_string() }
fn default_database_url() -> String { "sqlite::memory:".to_string() }
fn default_max_connections() -> u32 { 1 }
fn default_acquire_timeout() -> u64 { 3 }
fn default_cache_capacity() -> usize { 10_000 }
fn default_cache_ttl() -> u64 { 60 }

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            base_dn: default_base_dn(),
            groups_ou: default_groups_ou(),
            users_ou: default_users_ou(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            flattening: true,
            use_materialized_views: false,
            active_users_only: true,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
        }
    }
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl(),
        }
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

impl CacheSection {
    pub fn to_cache_config(&self) -> dirgate_core::backends::CacheConfig {
        dirgate_core::backends::CacheConfig {
            capacity: self.capacity,
            ttl: Duration::from_secs(self.ttl_secs),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .context("Failed to read configuration file")?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: GatewayConfig = toml::from_str(contents)
            .context("Failed to parse configuration file")?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let base = self.directory.base_dn.trim();
        if base.is_empty() {
            anyhow::bail!("directory.base_dn must not be empty");
        }
        if base.split(',').any(|rdn| !rdn.contains('=')) {
            anyhow::bail!("directory.base_dn is not a distinguished name: {}", base);
        }
        if self.directory.groups_ou.trim().is_empty() || self.directory.users_ou.trim().is_empty() {
            anyhow::bail!("directory.groups_ou and directory.users_ou must not be empty");
        }
        if self.directory.groups_ou.eq_ignore_ascii_case(&self.directory.users_ou) {
            anyhow::bail!("Groups and users must live in different units");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("database.max_connections must be at least 1");
        }

        if self.cache.enabled && self.cache.capacity == 0 {
            anyhow::bail!("cache.capacity must be positive when the cache is enabled");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = GatewayConfig::from_toml("").unwrap();
        assert_eq!(config.directory.base_dn, "dc=example,dc=com");
        assert_eq!(config.query.strategy, Strategy::Interpreter);
        assert!(config.query.flattening);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_sections() {
        let config = GatewayConfig::from_toml(
            r#"
            [directory]
            base_dn = "dc=corp,dc=local"

            [query]
            strategy = "sql"
            use_materialized_views = true
            active_users_only = false

            [cache]
            enabled = false
            capacity = 0
            "#,
        )
        .unwrap();
        assert_eq!(config.query.strategy, Strategy::Sql);
        assert!(config.query.use_materialized_views);
        assert!(!config.query.active_users_only);
        assert_eq!(config.directory.users_ou, "users");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_layout() {
        let mut config = GatewayConfig::default();
        config.directory.users_ou = "Groups".to_string();
        assert!(config.validate().is_err());

        let mut config = GatewayConfig::default();
        config.directory.base_dn = "example.com".to_string();
        assert!(config.validate().is_err());
    }
}
