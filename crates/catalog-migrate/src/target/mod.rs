//! PostgreSQL target loader.
//!
//! Applies the target schema, truncates tables, and streams record batches
//! through the text COPY protocol. Each table load is one COPY session; a
//! malformed line aborts the COPY and surfaces the server diagnostic.

use std::time::Duration;

use bytes::Bytes;
use futures::SinkExt;
use tokio_postgres::{Client, Config as PgConfig, NoTls};
use tracing::{debug, error, info};

use crate::config::TargetConfig;
use crate::error::{MigrateError, Result};
use crate::record::{CatalogTable, DELIMITER, NULL_TOKEN};
use crate::source::Pages;

/// Connect timeout for the target session.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// PostgreSQL target loader.
pub struct PgLoader {
    client: Client,
    schema: String,
    insert_limit: usize,
}

impl PgLoader {
    /// Connect to the target database and probe the connection. The session
    /// `search_path` is pinned to the configured schema.
    pub async fn connect(config: &TargetConfig, insert_limit: usize) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);
        pg_config.options(format!("-c search_path={}", config.schema));
        pg_config.connect_timeout(CONNECT_TIMEOUT);

        let (client, connection) = pg_config.connect(NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("PostgreSQL connection error: {}", e);
            }
        });

        client.simple_query("SELECT 1").await?;

        info!(
            "Connected to PostgreSQL target: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self {
            client,
            schema: config.schema.clone(),
            insert_limit,
        })
    }

    /// Execute the target DDL script as a single batch.
    pub async fn apply_schema(&self, ddl: &str) -> Result<()> {
        self.client.batch_execute(ddl).await?;
        info!("Applied target schema");
        Ok(())
    }

    /// Truncate a table, cascading to its dependents.
    pub async fn truncate(&self, table: CatalogTable) -> Result<u64> {
        let sql = format!(
            "TRUNCATE {} CASCADE",
            qualify_table(&self.schema, table.name())
        );
        self.client
            .execute(&sql, &[])
            .await
            .map_err(|e| MigrateError::write_from_pg(table.name(), e))
    }

    /// Stream all batches of a page cursor into the table via text COPY.
    /// Returns the number of rows sent.
    pub async fn load(&self, table: CatalogTable, pages: &mut Pages<'_>) -> Result<u64> {
        let copy_sql = copy_statement(&self.schema, table);
        let sink = self
            .client
            .copy_in(&copy_sql)
            .await
            .map_err(|e| MigrateError::write_from_pg(table.name(), e))?;
        tokio::pin!(sink);

        let mut rows_sent: u64 = 0;
        let mut buf = String::new();
        let mut buffered = 0usize;

        while let Some(batch) = pages.next_batch().await? {
            for record in &batch {
                record.write_line(&mut buf);
                buffered += 1;
                if buffered >= self.insert_limit {
                    sink.send(Bytes::from(std::mem::take(&mut buf)))
                        .await
                        .map_err(|e| MigrateError::write_from_pg(table.name(), e))?;
                    buffered = 0;
                }
            }
            rows_sent += batch.len() as u64;
            debug!("{}: buffered {} rows for COPY", table, rows_sent);
        }

        if !buf.is_empty() {
            sink.send(Bytes::from(buf))
                .await
                .map_err(|e| MigrateError::write_from_pg(table.name(), e))?;
        }

        sink.finish()
            .await
            .map_err(|e| MigrateError::write_from_pg(table.name(), e))?;

        info!("{}: copied {} rows", table, rows_sent);
        Ok(rows_sent)
    }

    /// Query the current row count of a target table.
    pub async fn row_count(&self, table: CatalogTable) -> Result<i64> {
        let sql = format!(
            "SELECT count(*) FROM {}",
            qualify_table(&self.schema, table.name())
        );
        let row = self
            .client
            .query_one(&sql, &[])
            .await
            .map_err(|e| MigrateError::write_from_pg(table.name(), e))?;
        Ok(row.get(0))
    }

    /// Assert that the target row count matches the source count.
    pub async fn verify(&self, table: CatalogTable, source_rows: i64) -> Result<()> {
        let target_rows = self.row_count(table).await?;
        check_counts(table, source_rows, target_rows)
    }
}

/// Compare the counts for one table; a mismatch is fatal.
fn check_counts(table: CatalogTable, source_rows: i64, target_rows: i64) -> Result<()> {
    if target_rows != source_rows {
        return Err(MigrateError::Verification {
            table: table.name().to_string(),
            source_rows,
            target_rows,
        });
    }
    debug!("{}: verified {} rows", table, target_rows);
    Ok(())
}

/// Build the text COPY statement for a table.
fn copy_statement(schema: &str, table: CatalogTable) -> String {
    let cols: Vec<String> = table.columns().iter().map(|c| quote_ident(c)).collect();
    format!(
        "COPY {} ({}) FROM STDIN WITH (FORMAT text, DELIMITER '{}', NULL '{}')",
        qualify_table(schema, table.name()),
        cols.join(", "),
        DELIMITER,
        NULL_TOKEN
    )
}

/// Quote a PostgreSQL identifier.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Qualify a table name with its schema.
fn qualify_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_statement_carries_delimiter_and_null_token() {
        let sql = copy_statement("content", CatalogTable::Genres);
        assert_eq!(
            sql,
            "COPY \"content\".\"genre\" (\"id\", \"name\", \"description\", \
             \"created_at\", \"updated_at\") FROM STDIN WITH \
             (FORMAT text, DELIMITER '|', NULL 'null')"
        );
    }

    #[test]
    fn copy_statement_lists_link_table_columns() {
        let sql = copy_statement("content", CatalogTable::WorkPeople);
        assert!(sql.contains("\"content\".\"work_person\""));
        assert!(sql.contains("\"work_id\", \"person_id\", \"role\""));
    }

    #[test]
    fn quote_ident_doubles_embedded_quotes() {
        assert_eq!(quote_ident("plain"), "\"plain\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn qualify_table_quotes_both_parts() {
        assert_eq!(qualify_table("content", "work"), "\"content\".\"work\"");
    }

    #[test]
    fn check_counts_accepts_matching_totals() {
        assert!(check_counts(CatalogTable::Works, 999, 999).is_ok());
        // Empty table verifies trivially.
        assert!(check_counts(CatalogTable::Genres, 0, 0).is_ok());
    }

    #[test]
    fn check_counts_rejects_mismatch() {
        let err = check_counts(CatalogTable::Genres, 3, 2).unwrap_err();
        match &err {
            MigrateError::Verification {
                table,
                source_rows,
                target_rows,
            } => {
                assert_eq!(table, "genre");
                assert_eq!((*source_rows, *target_rows), (3, 2));
            }
            other => panic!("expected verification error, got {other:?}"),
        }
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("source has 3 rows"));
    }
}
