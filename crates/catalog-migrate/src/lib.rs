//! # catalog-migrate
//!
//! SQLite to PostgreSQL migration library for the media catalog.
//!
//! This library moves a static SQLite catalog snapshot into a PostgreSQL
//! `content` schema with support for:
//!
//! - **Bulk loads** using the PostgreSQL text COPY protocol
//! - **Bounded memory** via fixed-size page reads from the source
//! - **Idempotent reruns** by truncating each table before loading
//! - **Post-load verification** of source vs. target row counts
//!
//! ## Example
//!
//! ```rust,no_run
//! use catalog_migrate::{Config, Migrator};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> catalog_migrate::Result<()> {
//!     let config = Config::from_env("db.sqlite")?;
//!     let migrator = Migrator::new(config).await?;
//!     let report = migrator.run().await?;
//!     println!("Migrated {} rows", report.rows_migrated);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod record;
pub mod source;
pub mod target;

// Re-exports for convenient access
pub use config::{Config, MigrationConfig, SourceConfig, TargetConfig};
pub use error::{MigrateError, Result};
pub use orchestrator::{MigrationReport, Migrator, TableReport};
pub use record::{CatalogTable, Record};
pub use source::SqliteReader;
pub use target::PgLoader;
