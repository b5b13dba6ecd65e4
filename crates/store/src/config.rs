//! Store configuration parsing.

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A [`serde`]-compatible representation of the store's YAML configuration
/// file.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    /// The URL of the primary PostgreSQL database. All writes go here.
    pub database_url: String,
    /// Read-only replicas of the primary. Reads that ask for a replica pick
    /// one of them at random.
    #[serde(default)]
    pub read_replica_urls: Vec<String>,
    /// Maximum number of connections per pool.
    #[serde(default = "StoreConfig::default_pool_size")]
    pub pool_size: usize,
    #[serde(default = "StoreConfig::default_run_migrations")]
    pub run_migrations: bool,
    /// Applied to raw statements that don't set their own timeout.
    #[serde(default)]
    pub statement_timeout_in_millis: Option<u64>,
}

impl StoreConfig {
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open config file {}", path.display()))?;
        serde_yaml::from_reader(file).context("invalid config file")
    }

    /// A configuration with defaults for everything but the database.
    pub fn for_database(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            read_replica_urls: vec![],
            pool_size: Self::default_pool_size(),
            run_migrations: Self::default_run_migrations(),
            statement_timeout_in_millis: None,
        }
    }

    pub fn statement_timeout(&self) -> Option<Duration> {
        self.statement_timeout_in_millis.map(Duration::from_millis)
    }

    fn default_pool_size() -> usize {
        10
    }

    fn default_run_migrations() -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config: StoreConfig =
            serde_yaml::from_str("databaseUrl: postgres://localhost/indexer").unwrap();
        assert_eq!(config.database_url, "postgres://localhost/indexer");
        assert!(config.read_replica_urls.is_empty());
        assert_eq!(config.pool_size, 10);
        assert!(config.run_migrations);
        assert_eq!(config.statement_timeout(), None);
    }

    #[test]
    fn full_config() {
        let yaml = r#"
databaseUrl: postgres://primary/indexer
readReplicaUrls:
  - postgres://replica-1/indexer
  - postgres://replica-2/indexer
poolSize: 4
runMigrations: false
statementTimeoutInMillis: 1500
"#;
        let config: StoreConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.read_replica_urls.len(), 2);
        assert_eq!(config.pool_size, 4);
        assert!(!config.run_migrations);
        assert_eq!(config.statement_timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn database_url_is_required() {
        assert!(serde_yaml::from_str::<StoreConfig>("poolSize: 4").is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = StoreConfig::read(Path::new("/does/not/exist.yml")).unwrap_err();
        assert!(err.to_string().contains("failed to open config file"));
    }
}
