//! Migration orchestrator - main workflow coordinator.
//!
//! Drives the full run sequentially: apply schema, then for each catalog
//! table in dependency order truncate, copy, and verify. The first failure
//! aborts the run; already-loaded tables keep their data.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::record::CatalogTable;
use crate::source::SqliteReader;
use crate::target::PgLoader;

/// Migration orchestrator.
pub struct Migrator {
    config: Config,
    reader: SqliteReader,
    loader: PgLoader,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Unique run identifier.
    pub run_id: String,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Per-table row counts, in load order.
    pub tables: Vec<TableReport>,

    /// Total rows migrated.
    pub rows_migrated: u64,
}

/// One migrated table in the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableReport {
    /// Table name.
    pub table: String,

    /// Rows copied and verified.
    pub rows: u64,
}

impl Migrator {
    /// Connect to both databases and build the orchestrator.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let reader = SqliteReader::connect(&config.source).await?;
        let loader = PgLoader::connect(&config.target, config.migration.insert_limit).await?;
        Ok(Self {
            config,
            reader,
            loader,
        })
    }

    /// Run the migration end to end.
    pub async fn run(&self) -> Result<MigrationReport> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        info!("Starting migration run: {}", run_id);

        info!("Phase 1: Applying target schema");
        let ddl = std::fs::read_to_string(Path::new(&self.config.migration.schema_file))?;
        self.loader.apply_schema(&ddl).await?;

        info!("Phase 2: Loading tables");
        let mut tables = Vec::new();
        let mut rows_migrated: u64 = 0;
        for table in CatalogTable::LOAD_ORDER {
            info!("{}: truncating", table);
            self.loader.truncate(table).await?;

            info!("{}: copying", table);
            let mut pages = self
                .reader
                .pages(table, self.config.migration.page_size);
            let rows = self.loader.load(table, &mut pages).await?;
            self.loader.verify(table, rows as i64).await?;
            info!("{}: {} rows migrated", table, rows);

            rows_migrated += rows;
            tables.push(TableReport {
                table: table.name().to_string(),
                rows,
            });
        }

        let completed_at = Utc::now();
        let duration_seconds = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;
        info!(
            "Migration complete: {} rows in {:.1}s",
            rows_migrated, duration_seconds
        );

        Ok(MigrationReport {
            run_id,
            started_at,
            completed_at,
            duration_seconds,
            tables,
            rows_migrated,
        })
    }

    /// Compare source and target row counts without writing anything.
    /// Returns `(source, target, matches)` per table name.
    pub async fn validate(&self) -> Result<HashMap<String, (i64, i64, bool)>> {
        let mut results = HashMap::new();
        for table in CatalogTable::LOAD_ORDER {
            let source_count = self.reader.row_count(table).await?;
            let target_count = self.loader.row_count(table).await?;

            let matches = source_count == target_count;
            results.insert(table.name().to_string(), (source_count, target_count, matches));

            if matches {
                info!("{}: {} rows (match)", table, source_count);
            } else {
                warn!(
                    "{}: source={} target={} (MISMATCH)",
                    table, source_count, target_count
                );
            }
        }
        Ok(results)
    }
}

impl MigrationReport {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Human-readable completion notice.
    pub fn summary(&self) -> String {
        let per_table: Vec<String> = self
            .tables
            .iter()
            .map(|t| format!("  {}: {} rows", t.table, t.rows))
            .collect();
        format!(
            "Migration {} complete: {} rows in {:.1}s\n{}",
            self.run_id,
            self.rows_migrated,
            self.duration_seconds,
            per_table.join("\n")
        )
    }
}
