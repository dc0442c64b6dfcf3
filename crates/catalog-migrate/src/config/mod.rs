//! Configuration loading and validation.
//!
//! Target connection parameters come from the environment (the tool is run
//! against throwaway destinations from CI or an operator shell); everything
//! else arrives through the CLI and is carried in an explicit struct.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{MigrateError, Result};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database configuration (SQLite snapshot).
    pub source: SourceConfig,

    /// Target database configuration (PostgreSQL).
    pub target: TargetConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Source database (SQLite) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Path to the SQLite snapshot file.
    pub path: PathBuf,
}

/// Target database (PostgreSQL) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Database host.
    pub host: String,

    /// Database port.
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(skip_serializing)]
    pub password: String,

    /// Target schema / search path (default: "content").
    #[serde(default = "default_schema")]
    pub schema: String,
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Rows fetched per source page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Records buffered per COPY submission.
    #[serde(default = "default_insert_limit")]
    pub insert_limit: usize,

    /// Path to the destination schema DDL script.
    #[serde(default = "default_schema_file")]
    pub schema_file: PathBuf,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            insert_limit: default_insert_limit(),
            schema_file: default_schema_file(),
        }
    }
}

impl TargetConfig {
    /// Build target configuration from the environment.
    ///
    /// Recognized variables: `DB_NAME`, `DB_USER`, `DB_PASSWORD`, `DB_HOST`,
    /// `DB_PORT`, and optionally `DB_SCHEMA`. A missing required variable
    /// fails fast before any connection is attempted.
    pub fn from_env() -> Result<Self> {
        let port_raw = require_env("DB_PORT")?;
        let port: u16 = port_raw.parse().map_err(|_| {
            MigrateError::Config(format!("DB_PORT must be a port number, got '{port_raw}'"))
        })?;

        Ok(Self {
            host: require_env("DB_HOST")?,
            port,
            database: require_env("DB_NAME")?,
            user: require_env("DB_USER")?,
            password: require_env("DB_PASSWORD")?,
            schema: env::var("DB_SCHEMA").unwrap_or_else(|_| default_schema()),
        })
    }
}

impl Config {
    /// Build a configuration for the given snapshot path, taking target
    /// connection settings from the environment and migration defaults.
    pub fn from_env(sqlite_path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            source: SourceConfig {
                path: sqlite_path.into(),
            },
            target: TargetConfig::from_env()?,
            migration: MigrationConfig::default(),
        })
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.migration.page_size == 0 {
            return Err(MigrateError::Config("page_size must be positive".into()));
        }
        if self.migration.insert_limit == 0 {
            return Err(MigrateError::Config("insert_limit must be positive".into()));
        }
        if self.target.schema.is_empty() {
            return Err(MigrateError::Config("target schema must not be empty".into()));
        }
        Ok(())
    }
}

fn require_env(name: &str) -> Result<String> {
    env::var(name)
        .map_err(|_| MigrateError::Config(format!("environment variable {name} is not set")))
}

fn default_schema() -> String {
    "content".to_string()
}

fn default_page_size() -> usize {
    500
}

fn default_insert_limit() -> usize {
    200
}

fn default_schema_file() -> PathBuf {
    PathBuf::from("schema_design/db_schema.sql")
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 6] = [
        "DB_NAME",
        "DB_USER",
        "DB_PASSWORD",
        "DB_HOST",
        "DB_PORT",
        "DB_SCHEMA",
    ];

    // Environment mutation is process-global, so both scenarios run inside a
    // single test to avoid interleaving with a parallel test runner.
    #[test]
    fn target_config_from_env() {
        for var in VARS {
            env::remove_var(var);
        }

        // Missing variables fail fast and name the offender.
        let err = TargetConfig::from_env().unwrap_err();
        assert!(matches!(err, MigrateError::Config(_)));
        assert!(err.to_string().contains("DB_"));

        env::set_var("DB_NAME", "catalog");
        env::set_var("DB_USER", "app");
        env::set_var("DB_PASSWORD", "secret");
        env::set_var("DB_HOST", "127.0.0.1");
        env::set_var("DB_PORT", "5432");

        let config = TargetConfig::from_env().unwrap();
        assert_eq!(config.database, "catalog");
        assert_eq!(config.port, 5432);
        assert_eq!(config.schema, "content");

        env::set_var("DB_PORT", "not-a-port");
        let err = TargetConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("DB_PORT"));

        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn validate_rejects_zero_page_size() {
        let config = Config {
            source: SourceConfig {
                path: PathBuf::from("db.sqlite"),
            },
            target: TargetConfig {
                host: "localhost".into(),
                port: 5432,
                database: "catalog".into(),
                user: "app".into(),
                password: "secret".into(),
                schema: default_schema(),
            },
            migration: MigrationConfig {
                page_size: 0,
                ..Default::default()
            },
        };
        assert!(config.validate().is_err());
    }
}
