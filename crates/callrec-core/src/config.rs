//! Configuration for the storage backends
//!
//! Handles loading and validation of callrec.toml configuration files.
//! Every engine constructor takes its config section by value; there is no
//! process-wide mutable settings object.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// JSON snapshot store settings
    #[serde(default)]
    pub json: JsonStoreConfig,

    /// Document store settings
    #[serde(default)]
    pub mongo: MongoConfig,

    /// Relational store settings
    #[serde(default)]
    pub sql: SqlConfig,
}

/// JSON snapshot store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonStoreConfig {
    /// Directory holding the primary snapshot file
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Name of the primary snapshot file
    #[serde(default = "default_file_name")]
    pub file_name: String,

    /// Name of the backup subdirectory inside `storage_dir`
    #[serde(default = "default_backup_dir")]
    pub backup_dir: String,
}

impl Default for JsonStoreConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            file_name: default_file_name(),
            backup_dir: default_backup_dir(),
        }
    }
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("records")
}

fn default_file_name() -> String {
    "current_records.json".to_string()
}

fn default_backup_dir() -> String {
    "backup_records".to_string()
}

/// Document store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoConfig {
    /// Connection string
    #[serde(default = "default_mongo_uri")]
    pub uri: String,

    /// Database name
    #[serde(default = "default_db_name")]
    pub database: String,

    /// Collection holding the records
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: default_mongo_uri(),
            database: default_db_name(),
            collection: default_collection(),
        }
    }
}

fn default_mongo_uri() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_db_name() -> String {
    "mydatabase".to_string()
}

fn default_collection() -> String {
    "records".to_string()
}

/// Relational store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlConfig {
    /// Database file path
    #[serde(default = "default_sql_db_path")]
    pub db_path: PathBuf,
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            db_path: default_sql_db_path(),
        }
    }
}

fn default_sql_db_path() -> PathBuf {
    PathBuf::from("records/records.db")
}

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> std::result::Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Re-root the file-backed stores under the given data directory.
    ///
    /// The JSON snapshot lives directly under `dir` and the SQLite database
    /// file next to it.
    #[must_use]
    pub fn with_data_dir(mut self, dir: &Path) -> Self {
        self.json.storage_dir = dir.to_path_buf();
        self.sql.db_path = dir.join("records.db");
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_persisted_layout() {
        let config = Config::default();
        assert_eq!(config.json.storage_dir, PathBuf::from("records"));
        assert_eq!(config.json.file_name, "current_records.json");
        assert_eq!(config.json.backup_dir, "backup_records");
        assert_eq!(config.mongo.database, "mydatabase");
        assert_eq!(config.mongo.collection, "records");
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [mongo]
            uri = "mongodb://db.example.com:27017"
            "#,
        )
        .unwrap();
        assert_eq!(config.mongo.uri, "mongodb://db.example.com:27017");
        assert_eq!(config.mongo.collection, "records");
        assert_eq!(config.json.file_name, "current_records.json");
    }

    #[test]
    fn with_data_dir_reroots_file_stores() {
        let config = Config::default().with_data_dir(Path::new("/tmp/data"));
        assert_eq!(config.json.storage_dir, PathBuf::from("/tmp/data"));
        assert_eq!(config.sql.db_path, PathBuf::from("/tmp/data/records.db"));
    }

    #[test]
    fn config_serde_roundtrip() {
        let config = Config::default();
        let raw = toml::to_string(&config).unwrap();
        let back: Config = toml::from_str(&raw).unwrap();
        assert_eq!(back.mongo.uri, config.mongo.uri);
        assert_eq!(back.sql.db_path, config.sql.db_path);
    }
}
