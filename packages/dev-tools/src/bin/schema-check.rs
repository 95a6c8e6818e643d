//! Registry / Catalog Checker
//!
//! Connects to the archive database, loads the relation allow-lists and
//! compares the entity registry with the live catalog.
//!
//! # Usage
//!
//! ```bash
//! # Check the built-in registry
//! cargo run --bin schema-check
//!
//! # Check a JSON registry and print the report as JSON
//! cargo run --bin schema-check -- --registry registry.json --json
//! ```
//!
//! # Environment Variables
//!
//! - `ARCHIVE_DATABASE_URL` or `ARCHIVE_DB_*`: connection settings
//! - `RUST_LOG`: Logging level (e.g., "info", "debug", "trace")

use std::path::PathBuf;

use clap::Parser;
use survey_archive_core::models::core_schemas::archive_registry;
use survey_archive_core::{
    DatabaseConfig, DatabaseService, RelationValidator, SchemaIntrospector, SchemaRegistry,
};

#[derive(Debug, Parser)]
#[command(name = "schema-check", about = "Compare the entity registry with the database catalog")]
struct Args {
    /// JSON registry file (defaults to the built-in archive registry)
    #[arg(long)]
    registry: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Exit with status 1 when mismatches are found
    #[arg(long)]
    strict: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let registry = match &args.registry {
        Some(path) => SchemaRegistry::from_path(path)?,
        None => archive_registry()?,
    };
    tracing::info!("Loaded registry with {} entities", registry.len());

    let db = DatabaseService::new(DatabaseConfig::from_env())?;
    db.health_check().await?;
    let client = db.client().await?;

    let relations = RelationValidator::load(&**client).await?;
    for node_type in registry.node_types() {
        let dependents = relations.dependents_of(node_type);
        if !dependents.is_empty() {
            tracing::info!("{} accepts: {}", node_type, dependents.join(", "));
        }
    }

    let introspector = SchemaIntrospector::new(db.catalog_schema());
    let report = introspector.verify_registry(&**client, &registry).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Checked {} entities: {} mismatches",
            report.entities_checked,
            report.mismatches.len()
        );
        for mismatch in &report.mismatches {
            println!("  {mismatch}");
        }
    }

    if args.strict && !report.is_consistent() {
        std::process::exit(1);
    }
    Ok(())
}
