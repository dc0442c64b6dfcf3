//! Error types for the migration library.

use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (missing environment variable, invalid value, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source database connection error
    #[error("Source database error: {0}")]
    Source(#[from] sqlx::Error),

    /// Target database connection or query error
    #[error("Target database error: {0}")]
    Target(#[from] tokio_postgres::Error),

    /// Source read failed for a specific table
    #[error("Read failed for table {table}: {message}")]
    Read { table: String, message: String },

    /// Bulk load failed for a specific table
    #[error("Write failed for table {table}: {message}")]
    Write { table: String, message: String },

    /// Post-load row count mismatch between source and target
    #[error(
        "Verification failed for table {table}: source has {source_rows} rows, target has {target_rows}"
    )]
    Verification {
        table: String,
        source_rows: i64,
        target_rows: i64,
    },

    /// IO error (schema script, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Report serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Read error for a table.
    pub fn read(table: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Read {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Create a Write error preserving the server-side diagnostic when present.
    pub fn write_from_pg(table: impl Into<String>, err: tokio_postgres::Error) -> Self {
        let message = match err.as_db_error() {
            Some(db) => db.message().to_string(),
            None => err.to_string(),
        };
        MigrateError::Write {
            table: table.into(),
            message,
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) => 2,
            MigrateError::Verification { .. } => 3,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
