use std::path::PathBuf;
#[cfg(feature = "cli")]
use owo_colors::OwoColorize;
use tracing::info;
use crate::commands::plan::{compute_operations, MigrationPlan};
use crate::config::PgfnConfig;
use crate::db::{connect_to_database, sync_state, FunctionStore, PostgresStore, SyncResult};
use crate::error::{PgfnError, Result};
use crate::loader::load_registry;
use crate::migration::{MigrationGraph, MigrationWriter, TomlRenderer};
use crate::output::OutputHandler;
use crate::registry::Registry;

#[derive(Debug, Clone, Copy, Default)]
pub struct MakeMigrationsOptions<'a> {
    /// Replaces the timestamped `update_functions_...` suffix
    pub custom_name: Option<&'a str>,
    pub dry_run: bool,
    pub default_app: Option<&'a str>,
}

#[derive(Debug, Default)]
pub struct MakeMigrationsResult {
    /// One artifact per app with changes, in plan order
    pub paths: Vec<PathBuf>,
    pub plan: MigrationPlan,
    /// `None` on dry runs and when nothing changed
    pub sync: Option<SyncResult>,
    pub dry_run: bool,
}

/// Diff the registry against the store, write one artifact per affected
/// app, then record the new state. Every artifact is rendered before any is
/// written, and written artifacts are removed again if recording the state
/// fails. Dry runs compute paths only and leave both the filesystem and the
/// store untouched.
pub async fn generate_migrations<S: FunctionStore>(
    registry: &Registry,
    store: &mut S,
    writer: &MigrationWriter<'_>,
    options: MakeMigrationsOptions<'_>,
    output: &dyn OutputHandler,
) -> Result<MakeMigrationsResult> {
    let plan = compute_operations(registry, &*store, options.default_app).await?;

    let mut result = MakeMigrationsResult {
        dry_run: options.dry_run,
        ..Default::default()
    };

    if plan.is_empty() {
        info!("No function changes detected");
        result.plan = plan;
        return Ok(result);
    }

    let mut pending = Vec::with_capacity(plan.apps.len());
    for app in &plan.apps {
        output.info(&format!("Generating migration for app '{}'", app.app_label));
        pending.push(writer.prepare(&app.app_label, &app.operations, options.custom_name)?);
    }

    let verb = if options.dry_run { "Would write" } else { "Writing" };
    for artifact in &pending {
        output.status(verb, &artifact.path.display().to_string());
    }

    if !options.dry_run {
        writer.write_all(&pending)?;
        match sync_state(registry, store, options.default_app).await {
            Ok(sync) => result.sync = Some(sync),
            Err(e) => {
                writer.discard(&pending);
                output.warning(&format!(
                    "Function state was not recorded; removed {} new migration(s)",
                    pending.len()
                ));
                return Err(e);
            }
        }
    }

    result.paths = pending.into_iter().map(|artifact| artifact.path).collect();
    result.plan = plan;
    Ok(result)
}

/// Run `make-migrations` against the configured database and apps
pub async fn execute_make_migrations(
    config: &PgfnConfig,
    custom_name: Option<&str>,
    dry_run: bool,
    output: &dyn OutputHandler,
) -> Result<MakeMigrationsResult> {
    if config.apps.is_empty() {
        return Err(PgfnError::Configuration(
            "no [[apps]] are configured; refusing to treat every recorded function as deleted".to_string(),
        ));
    }

    let registry = load_registry(&config.apps)?;

    let mut client = connect_to_database(&config.database_config()?).await?;
    let mut store = PostgresStore::new(&mut client);

    let root = config.migrations_root();
    let graph = MigrationGraph::load(&root)?;
    let renderer = TomlRenderer;
    let writer = MigrationWriter::new(root, &graph, &renderer);

    generate_migrations(
        &registry,
        &mut store,
        &writer,
        MakeMigrationsOptions {
            custom_name,
            dry_run,
            default_app: config.default_app.as_deref(),
        },
        output,
    ).await
}

#[cfg(feature = "cli")]
pub fn print_make_migrations_summary(result: &MakeMigrationsResult) {
    crate::commands::plan::print_plan_summary(&result.plan);

    if result.paths.is_empty() {
        return;
    }

    if result.dry_run {
        println!("\n{} {} migration(s) would be written (dry run)", "→".cyan(), result.paths.len());
    } else {
        println!("\n{} {} migration(s) written", "✓".green().bold(), result.paths.len());
    }
    for path in &result.paths {
        println!("  {}", path.display().to_string().dimmed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::output::{LibraryOutputHandler, OutputLevel};
    use crate::registry::FunctionDefinition;
    use tempfile::TempDir;

    const GREET: &str = "CREATE FUNCTION greet(name text) RETURNS text AS $$ SELECT 'hi ' || name $$ LANGUAGE sql;";

    #[tokio::test]
    async fn test_generate_reports_and_syncs() {
        let temp_dir = TempDir::new().unwrap();
        let graph = MigrationGraph::new();
        let writer = MigrationWriter::new(temp_dir.path(), &graph, &TomlRenderer);
        let mut store = MemoryStore::new();
        let output = LibraryOutputHandler::new();

        let mut registry = Registry::new();
        registry.register(FunctionDefinition::new(GREET).with_app_label("greetings"));

        let result = generate_migrations(&registry, &mut store, &writer, MakeMigrationsOptions::default(), &output)
            .await
            .unwrap();

        assert_eq!(result.paths.len(), 1);
        assert!(result.paths[0].exists());
        assert_eq!(
            output.messages_at(OutputLevel::Info),
            vec!["Generating migration for app 'greetings'"]
        );
        assert_eq!(result.sync.unwrap().upserted, vec!["greet"]);
        assert!(store.get("greet").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_nothing_to_do() {
        let temp_dir = TempDir::new().unwrap();
        let graph = MigrationGraph::new();
        let writer = MigrationWriter::new(temp_dir.path(), &graph, &TomlRenderer);
        let output = LibraryOutputHandler::new();

        let result = generate_migrations(&Registry::new(), &mut MemoryStore::new(), &writer, MakeMigrationsOptions::default(), &output)
            .await
            .unwrap();

        assert!(result.paths.is_empty());
        assert!(result.sync.is_none());
        assert!(output.get_messages().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_leaves_store_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let graph = MigrationGraph::new();
        let writer = MigrationWriter::new(temp_dir.path(), &graph, &TomlRenderer);
        let mut store = MemoryStore::new();
        let output = LibraryOutputHandler::new();

        let mut registry = Registry::new();
        registry.register(FunctionDefinition::new(GREET));

        let options = MakeMigrationsOptions {
            custom_name: Some("preview"),
            dry_run: true,
            default_app: Some("greetings"),
        };
        let result = generate_migrations(&registry, &mut store, &writer, options, &output).await.unwrap();

        assert!(result.paths[0].ends_with("greetings/migrations/0001_preview.toml"));
        assert!(!result.paths[0].exists());
        assert!(result.sync.is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_config_without_apps_is_rejected() {
        let config = PgfnConfig {
            connection_string: Some("postgres://localhost/db".to_string()),
            ..Default::default()
        };

        let err = execute_make_migrations(&config, None, false, &LibraryOutputHandler::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PgfnError::Configuration(msg) if msg.contains("[[apps]]")));
    }
}
