use std::collections::HashMap;
#[cfg(feature = "cli")]
use owo_colors::OwoColorize;
use tracing::debug;
use crate::db::FunctionStore;
use crate::error::{PgfnError, Result};
use crate::migration::{drop_function_sql, Operation, OperationKind};
use crate::registry::Registry;
use crate::sql::normalize_sql;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// Why an operation was generated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionChange {
    pub function_name: String,
    pub app_label: String,
    pub kind: ChangeKind,
}

/// Operations for one app, in emission order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppOperations {
    pub app_label: String,
    pub operations: Vec<Operation>,
}

/// Everything one diff pass decided, grouped by app. Apps keep the order
/// in which they were first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationPlan {
    pub apps: Vec<AppOperations>,
    pub changes: Vec<FunctionChange>,
}

impl MigrationPlan {
    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    pub fn operation_count(&self) -> usize {
        self.apps.iter().map(|app| app.operations.len()).sum()
    }

    pub fn operations_for(&self, app_label: &str) -> Option<&[Operation]> {
        self.apps
            .iter()
            .find(|app| app.app_label == app_label)
            .map(|app| app.operations.as_slice())
    }

    fn push(&mut self, app_label: &str, operation: Operation, kind: ChangeKind) {
        self.changes.push(FunctionChange {
            function_name: operation.function_name.clone(),
            app_label: app_label.to_string(),
            kind,
        });

        match self.apps.iter_mut().find(|app| app.app_label == app_label) {
            Some(app) => app.operations.push(operation),
            None => self.apps.push(AppOperations {
                app_label: app_label.to_string(),
                operations: vec![operation],
            }),
        }
    }
}

/// Compare the registry against the store and decide what to migrate.
///
/// New or changed functions become upserts whose reverse SQL restores the
/// stored body (or drops a brand-new function). Stored functions missing
/// from the registry become drops under their stored app.
pub async fn compute_operations<S: FunctionStore>(
    registry: &Registry,
    store: &S,
    default_app: Option<&str>,
) -> Result<MigrationPlan> {
    let mut plan = MigrationPlan::default();
    let mut seen: HashMap<String, String> = HashMap::new();

    for definition in registry.all() {
        let function_name = definition.function_name()?;
        let app_label = definition.resolve_app_label(default_app)?;

        if let Some(first_app) = seen.get(&function_name) {
            return Err(PgfnError::DuplicateFunction {
                function: function_name,
                first_app: first_app.clone(),
                second_app: app_label,
            });
        }
        seen.insert(function_name.clone(), app_label.clone());

        let normalized = normalize_sql(&definition.sql);

        match store.get(&function_name).await? {
            None => {
                debug!(function = %function_name, app = %app_label, "New function");
                plan.push(
                    &app_label,
                    Operation::upsert(&function_name, &definition.sql, drop_function_sql(&function_name)),
                    ChangeKind::Created,
                );
            }
            Some(record) if record.sql_definition != normalized => {
                debug!(function = %function_name, app = %app_label, "Function body changed");
                plan.push(
                    &app_label,
                    Operation::upsert(&function_name, &definition.sql, record.sql_definition),
                    ChangeKind::Updated,
                );
            }
            Some(_) => {
                debug!(function = %function_name, "Function unchanged");
            }
        }
    }

    for record in store.all().await? {
        if seen.contains_key(&record.function_name) {
            continue;
        }
        debug!(function = %record.function_name, app = %record.app_label, "Function removed");
        plan.push(&record.app_label, Operation::drop(&record.function_name), ChangeKind::Deleted);
    }

    Ok(plan)
}

#[cfg(feature = "cli")]
pub fn print_plan_summary(plan: &MigrationPlan) {
    if plan.is_empty() {
        println!("{}", "No function changes detected".green());
        return;
    }

    println!("\n{}:", "Function Changes".bold());
    for change in &plan.changes {
        let (marker, verb) = match change.kind {
            ChangeKind::Created => ("+".green().bold().to_string(), "create"),
            ChangeKind::Updated => ("~".yellow().bold().to_string(), "update"),
            ChangeKind::Deleted => ("-".red().bold().to_string(), "drop"),
        };
        println!(
            "  {} {} {} ({})",
            marker,
            verb.dimmed(),
            change.function_name.cyan(),
            change.app_label
        );
    }

    for app in &plan.apps {
        let upserts = app.operations.iter().filter(|op| op.kind == OperationKind::Upsert).count();
        println!(
            "  {}: {} upsert(s), {} drop(s)",
            app.app_label.bold(),
            upserts,
            app.operations.len() - upserts
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::registry::FunctionDefinition;

    const ADD_ONE: &str = "CREATE FUNCTION add_one(x int) RETURNS int AS $$ SELECT x + 1 $$ LANGUAGE sql;";
    const ADD_TWO: &str = "CREATE FUNCTION add_two(x int) RETURNS int AS $$ SELECT x + 2 $$ LANGUAGE sql;";

    #[tokio::test]
    async fn test_new_function_reverses_to_drop() {
        let store = MemoryStore::new();
        let mut registry = Registry::new();
        registry.register(FunctionDefinition::new(ADD_ONE).with_app_label("core"));

        let plan = compute_operations(&registry, &store, None).await.unwrap();
        let ops = plan.operations_for("core").unwrap();

        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].kind, OperationKind::Upsert);
        assert_eq!(ops[0].sql, ADD_ONE);
        assert_eq!(ops[0].reverse_sql.as_deref(), Some("DROP FUNCTION IF EXISTS add_one;"));
        assert_eq!(plan.changes[0].kind, ChangeKind::Created);
    }

    #[tokio::test]
    async fn test_unchanged_function_produces_nothing() {
        let mut store = MemoryStore::new();
        store.upsert("add_one", "core", &normalize_sql(ADD_ONE)).await.unwrap();

        let mut registry = Registry::new();
        let reformatted = ADD_ONE.replace("SELECT", "select").replace(" AS ", "\n    AS ");
        registry.register(FunctionDefinition::new(reformatted).with_app_label("core"));

        let plan = compute_operations(&registry, &store, None).await.unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.operation_count(), 0);
    }

    #[tokio::test]
    async fn test_changed_function_reverses_to_stored_body() {
        let mut store = MemoryStore::new();
        store.upsert("add_one", "core", &normalize_sql(ADD_ONE)).await.unwrap();

        let changed = ADD_ONE.replace("x + 1", "x + 100");
        let mut registry = Registry::new();
        registry.register(FunctionDefinition::new(changed.clone()));

        let plan = compute_operations(&registry, &store, Some("core")).await.unwrap();
        let ops = plan.operations_for("core").unwrap();

        assert_eq!(ops[0].sql, changed);
        assert_eq!(ops[0].reverse_sql, Some(normalize_sql(ADD_ONE)));
        assert_eq!(plan.changes[0].kind, ChangeKind::Updated);
    }

    #[tokio::test]
    async fn test_removed_function_dropped_under_stored_app() {
        let mut store = MemoryStore::new();
        store.upsert("add_one", "legacy", &normalize_sql(ADD_ONE)).await.unwrap();

        let plan = compute_operations(&Registry::new(), &store, Some("core")).await.unwrap();

        assert_eq!(plan.apps.len(), 1);
        assert_eq!(plan.apps[0].app_label, "legacy");
        assert_eq!(plan.apps[0].operations, vec![Operation::drop("add_one")]);
    }

    #[tokio::test]
    async fn test_apps_in_first_seen_order() {
        let mut store = MemoryStore::new();
        store.upsert("gone", "archive", "SELECT 1").await.unwrap();

        let mut registry = Registry::new();
        registry.register(FunctionDefinition::new(ADD_TWO).with_app_label("math"));
        registry.register(FunctionDefinition::new(ADD_ONE).with_app_label("core"));

        let plan = compute_operations(&registry, &store, None).await.unwrap();
        let labels: Vec<&str> = plan.apps.iter().map(|a| a.app_label.as_str()).collect();
        assert_eq!(labels, vec!["math", "core", "archive"]);
    }

    #[tokio::test]
    async fn test_duplicate_names_rejected() {
        let store = MemoryStore::new();
        let mut registry = Registry::new();
        registry.register(FunctionDefinition::new(ADD_ONE).with_app_label("core"));
        registry.register(FunctionDefinition::new(ADD_ONE.replace("x + 1", "x + 2")).with_app_label("billing"));

        let err = compute_operations(&registry, &store, None).await.unwrap_err();
        assert!(matches!(err, PgfnError::DuplicateFunction { function, first_app, second_app }
            if function == "add_one" && first_app == "core" && second_app == "billing"));
    }

    #[tokio::test]
    async fn test_unresolvable_app_fails() {
        let store = MemoryStore::new();
        let mut registry = Registry::new();
        registry.register(FunctionDefinition::new(ADD_ONE));

        let err = compute_operations(&registry, &store, None).await.unwrap_err();
        assert!(matches!(err, PgfnError::AppResolution { function } if function == "add_one"));
    }
}
