//! SQLite source reader.
//!
//! Reads catalog rows in bounded pages and materializes them into typed
//! [`Record`]s. The snapshot is opened read-only; the row count is captured
//! once per table before paginating, so concurrent mutation of the source
//! file is undefined behavior (acceptable: the snapshot is static).

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::SourceConfig;
use crate::error::{MigrateError, Result};
use crate::record::{CatalogTable, Genre, Person, Record, Work, WorkGenre, WorkPerson};

/// SQLite source reader.
pub struct SqliteReader {
    pool: SqlitePool,
}

impl SqliteReader {
    /// Open the snapshot file read-only and probe the connection.
    pub async fn connect(config: &SourceConfig) -> Result<Self> {
        if !Path::new(&config.path).exists() {
            return Err(MigrateError::Config(format!(
                "SQLite snapshot not found: {}",
                config.path.display()
            )));
        }

        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .read_only(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::query("SELECT 1").fetch_one(&pool).await?;

        info!("Connected to SQLite source: {}", config.path.display());
        Ok(Self { pool })
    }

    /// Query the current row count of a table.
    pub async fn row_count(&self, table: CatalogTable) -> Result<i64> {
        let sql = format!("SELECT count(*) FROM {}", table.name());
        sqlx::query_scalar(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MigrateError::read(table.name(), e))
    }

    /// Lazy page cursor over a table. The total is snapshotted on first use.
    pub fn pages(&self, table: CatalogTable, page_size: usize) -> Pages<'_> {
        Pages {
            reader: self,
            table,
            page_size,
            remaining: None,
            offset: 0,
        }
    }

    async fn fetch_page(
        &self,
        table: CatalogTable,
        limit: usize,
        offset: i64,
    ) -> Result<Vec<Record>> {
        let sql = format!(
            "SELECT {} FROM {} LIMIT ? OFFSET ?",
            table.columns().join(", "),
            table.name()
        );

        let rows: Vec<SqliteRow> = sqlx::query(&sql)
            .bind(limit as i64)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MigrateError::read(table.name(), e))?;

        debug!("{}: fetched {} rows at offset {}", table, rows.len(), offset);

        rows.iter().map(|row| record_from_row(table, row)).collect()
    }
}

/// Lazy sequence of record batches for one table.
pub struct Pages<'a> {
    reader: &'a SqliteReader,
    table: CatalogTable,
    page_size: usize,
    remaining: Option<i64>,
    offset: i64,
}

impl Pages<'_> {
    /// Fetch and materialize the next batch, or `None` when the snapshotted
    /// count has been consumed. An empty table yields no batches at all.
    pub async fn next_batch(&mut self) -> Result<Option<Vec<Record>>> {
        let remaining = match self.remaining {
            Some(r) => r,
            None => {
                let total = self.reader.row_count(self.table).await?;
                debug!("{}: {} rows to export", self.table, total);
                self.remaining = Some(total);
                total
            }
        };

        if remaining <= 0 {
            return Ok(None);
        }

        let batch = self
            .reader
            .fetch_page(self.table, self.page_size, self.offset)
            .await?;
        if batch.is_empty() {
            // Source shrank under us; the snapshot assumption was violated.
            self.remaining = Some(0);
            return Ok(None);
        }

        self.offset += self.page_size as i64;
        self.remaining = Some(remaining - self.page_size as i64);
        Ok(Some(batch))
    }
}

/// Materialize one source row into the record variant for its table.
fn record_from_row(table: CatalogTable, row: &SqliteRow) -> Result<Record> {
    let record = match table {
        CatalogTable::Works => Record::Work(Work {
            id: get_uuid(table, row, "id")?,
            title: get_text(table, row, "title")?,
            description: get_opt_text(table, row, "description")?,
            creation_date: get_opt_date(table, row, "creation_date")?,
            certificate: get_opt_text(table, row, "certificate")?,
            file_path: get_opt_text(table, row, "file_path")?,
            rating: get_opt_f64(table, row, "rating")?,
            kind: get_text(table, row, "kind")?,
            created_at: get_opt_timestamp(table, row, "created_at")?,
            updated_at: get_opt_timestamp(table, row, "updated_at")?,
        }),
        CatalogTable::Genres => Record::Genre(Genre {
            id: get_uuid(table, row, "id")?,
            name: get_text(table, row, "name")?,
            description: get_opt_text(table, row, "description")?,
            created_at: get_opt_timestamp(table, row, "created_at")?,
            updated_at: get_opt_timestamp(table, row, "updated_at")?,
        }),
        CatalogTable::People => Record::Person(Person {
            id: get_uuid(table, row, "id")?,
            full_name: get_text(table, row, "full_name")?,
            birth_date: get_opt_date(table, row, "birth_date")?,
            created_at: get_opt_timestamp(table, row, "created_at")?,
            updated_at: get_opt_timestamp(table, row, "updated_at")?,
        }),
        CatalogTable::WorkGenres => Record::WorkGenre(WorkGenre {
            id: get_uuid(table, row, "id")?,
            work_id: get_uuid(table, row, "work_id")?,
            genre_id: get_uuid(table, row, "genre_id")?,
            created_at: get_opt_timestamp(table, row, "created_at")?,
        }),
        CatalogTable::WorkPeople => Record::WorkPerson(WorkPerson {
            id: get_uuid(table, row, "id")?,
            work_id: get_uuid(table, row, "work_id")?,
            person_id: get_uuid(table, row, "person_id")?,
            role: get_text(table, row, "role")?,
            created_at: get_opt_timestamp(table, row, "created_at")?,
        }),
    };
    Ok(record)
}

fn get_text(table: CatalogTable, row: &SqliteRow, col: &str) -> Result<String> {
    row.try_get::<String, _>(col)
        .map_err(|e| MigrateError::read(table.name(), format!("column {col}: {e}")))
}

fn get_opt_text(table: CatalogTable, row: &SqliteRow, col: &str) -> Result<Option<String>> {
    row.try_get::<Option<String>, _>(col)
        .map_err(|e| MigrateError::read(table.name(), format!("column {col}: {e}")))
}

fn get_opt_f64(table: CatalogTable, row: &SqliteRow, col: &str) -> Result<Option<f64>> {
    row.try_get::<Option<f64>, _>(col)
        .map_err(|e| MigrateError::read(table.name(), format!("column {col}: {e}")))
}

fn get_uuid(table: CatalogTable, row: &SqliteRow, col: &str) -> Result<Uuid> {
    let text = get_text(table, row, col)?;
    Uuid::parse_str(&text)
        .map_err(|e| MigrateError::read(table.name(), format!("column {col}: invalid UUID: {e}")))
}

fn get_opt_date(
    table: CatalogTable,
    row: &SqliteRow,
    col: &str,
) -> Result<Option<chrono::NaiveDate>> {
    match get_opt_text(table, row, col)? {
        Some(text) if !text.is_empty() => chrono::NaiveDate::parse_from_str(&text, "%Y-%m-%d")
            .map(Some)
            .map_err(|e| MigrateError::read(table.name(), format!("column {col}: {e}"))),
        _ => Ok(None),
    }
}

fn get_opt_timestamp(
    table: CatalogTable,
    row: &SqliteRow,
    col: &str,
) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
    match get_opt_text(table, row, col)? {
        Some(text) if !text.is_empty() => parse_timestamp(&text)
            .map(Some)
            .ok_or_else(|| {
                MigrateError::read(
                    table.name(),
                    format!("column {col}: unrecognized timestamp '{text}'"),
                )
            }),
        _ => Ok(None),
    }
}

/// Parse the timestamp spellings seen in catalog snapshots: RFC 3339,
/// `YYYY-MM-DD HH:MM:SS[.ffffff]` with a `+00`-style offset, or the same
/// without an offset (assumed UTC).
fn parse_timestamp(text: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    use chrono::{DateTime, NaiveDateTime, Utc};

    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    None
}
