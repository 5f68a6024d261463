//! Declarative PostgreSQL function migrations.
//!
//! Functions are declared as `CREATE FUNCTION` SQL in a [`Registry`]. Each
//! run compares the registry with the last recorded state in a
//! [`FunctionStore`], writes one numbered migration artifact per app with the
//! upserts and drops needed to catch up, and records the new state.

pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod loader;
pub mod logging;
pub mod migration;
pub mod output;
pub mod registry;
pub mod sql;

#[cfg(feature = "cli")]
pub mod cli;

use std::path::PathBuf;

pub use commands::{compute_operations, generate_migrations, MakeMigrationsOptions, MigrationPlan};
pub use config::{AppConfig, PgfnConfig};
pub use db::{FunctionRecord, FunctionStore, MemoryStore, PostgresStore};
pub use error::{PgfnError, Result};
pub use migration::{MigrationGraph, MigrationWriter, Operation, OperationKind, TomlRenderer};
pub use registry::{FunctionDefinition, Registry};
pub use sql::{calculate_sql_hash, extract_function_name, normalize_sql};

/// Run `make-migrations` for the configured apps without console output.
/// Returns the artifact paths, which on a dry run do not exist yet.
pub async fn make_migrations(config: &PgfnConfig, custom_name: Option<&str>, dry_run: bool) -> Result<Vec<PathBuf>> {
    let result = commands::execute_make_migrations(config, custom_name, dry_run, &output::SilentOutputHandler).await?;
    Ok(result.paths)
}
