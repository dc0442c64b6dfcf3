//! catalog-migrate CLI - SQLite to PostgreSQL media catalog migration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;

use catalog_migrate::{Config, MigrateError, Migrator};
use clap::{Parser, Subcommand};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "catalog-migrate")]
#[command(about = "Migrate the media catalog from SQLite to PostgreSQL")]
#[command(version)]
struct Cli {
    /// Path to the SQLite snapshot
    #[arg(long, default_value = "db.sqlite")]
    sqlite: PathBuf,

    /// Path to the target DDL script
    #[arg(long, default_value = "schema_design/db_schema.sql")]
    schema_file: PathBuf,

    /// Rows fetched from the source per page
    #[arg(long, default_value = "500")]
    page_size: usize,

    /// Rows buffered per COPY chunk
    #[arg(long, default_value = "200")]
    insert_limit: usize,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the migration
    Run,

    /// Validate row counts between source and target
    Validate,

    /// Test database connections
    HealthCheck,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    // Target credentials come from the environment; .env is honored if present.
    dotenvy::dotenv().ok();

    let mut config = Config::from_env(cli.sqlite.clone())?;
    config.migration.page_size = cli.page_size;
    config.migration.insert_limit = cli.insert_limit;
    config.migration.schema_file = cli.schema_file.clone();

    match cli.command {
        Commands::Run => {
            let migrator = Migrator::new(config).await?;
            let report = migrator.run().await?;

            if cli.output_json {
                println!("{}", report.to_json()?);
            } else {
                println!("\n{}", report.summary());
            }
        }

        Commands::Validate => {
            let migrator = Migrator::new(config).await?;
            let results = migrator.validate().await?;

            if let Some(err) = mismatch_error(&results) {
                return Err(err);
            }
            println!("Validation completed successfully");
        }

        Commands::HealthCheck => {
            // Connecting probes both databases with SELECT 1.
            Migrator::new(config).await?;
            info!("Both connections healthy");
            println!("Health check passed");
        }
    }

    Ok(())
}

/// Build the fatal verification error for the first mismatched table, in
/// name order so repeated runs report the same table.
fn mismatch_error(results: &HashMap<String, (i64, i64, bool)>) -> Option<MigrateError> {
    let mut mismatched: Vec<_> = results
        .iter()
        .filter(|(_, (_, _, matches))| !matches)
        .collect();
    mismatched.sort_by(|a, b| a.0.cmp(b.0));
    mismatched
        .first()
        .map(|(table, (source_rows, target_rows, _))| MigrateError::Verification {
            table: (*table).clone(),
            source_rows: *source_rows,
            target_rows: *target_rows,
        })
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
