use std::fs;
use std::path::{Path, PathBuf};
use pg_query::NodeEnum;
use tracing::{debug, warn};
use crate::config::AppConfig;
use crate::error::{ErrorContext, PgfnError, Result};
use crate::registry::{FunctionDefinition, Registry};
use crate::sql::{split_sql_file, SqlStatement};

/// Build a registry from every configured app's functions directory.
/// Apps are loaded in configuration order, files in path order.
pub fn load_registry(apps: &[AppConfig]) -> Result<Registry> {
    let mut registry = Registry::new();

    for app in apps {
        for definition in load_app_functions(&app.label, &app.functions_dir)? {
            registry.register(definition);
        }
    }

    debug!("Loaded {} function definitions", registry.len());
    Ok(registry)
}

/// Load `CREATE FUNCTION` statements from `.sql` files under `directory`.
/// Other statements are skipped with a warning.
pub fn load_app_functions(app_label: &str, directory: &Path) -> Result<Vec<FunctionDefinition>> {
    if !directory.is_dir() {
        return Err(PgfnError::Configuration(format!(
            "functions directory for app '{}' does not exist: {}",
            app_label,
            directory.display()
        )));
    }

    let mut files = Vec::new();
    collect_sql_files(directory, &mut files)?;
    files.sort();

    let mut definitions = Vec::new();
    for file in files {
        let content = fs::read_to_string(&file).map_err(|e| PgfnError::file_read(&file, e))?;
        if content.trim().is_empty() {
            continue;
        }

        for statement in split_sql_file(&content).file_context(&file)? {
            if is_function_definition(&statement).file_context(&file)? {
                definitions.push(
                    FunctionDefinition::new(statement.sql)
                        .with_app_label(app_label)
                        .with_source(&file, statement.start_line),
                );
            } else {
                warn!(
                    "Skipping non-function statement in {}{}",
                    file.display(),
                    statement.start_line.map(|l| format!(" at line {}", l)).unwrap_or_default()
                );
            }
        }
    }

    Ok(definitions)
}

fn collect_sql_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| PgfnError::file_read(dir, e))?;

    for entry in entries {
        let path = entry.map_err(|e| PgfnError::file_read(dir, e))?.path();

        if path.is_dir() {
            collect_sql_files(&path, files)?;
        } else if path.extension().and_then(|s| s.to_str()) == Some("sql") {
            files.push(path);
        }
    }

    Ok(())
}

fn is_function_definition(statement: &SqlStatement) -> Result<bool> {
    let parsed = pg_query::parse(&statement.sql)?;
    Ok(parsed.protobuf.stmts.first()
        .and_then(|raw| raw.stmt.as_ref())
        .and_then(|node| node.node.as_ref())
        .map_or(false, |node| matches!(node, NodeEnum::CreateFunctionStmt(_))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use tempfile::TempDir;

    #[test]
    fn test_loads_functions_with_source_lines() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("math.sql"), indoc! {"
            CREATE FUNCTION add_one(x int) RETURNS int AS $$
              SELECT x + 1
            $$ LANGUAGE sql;

            CREATE TABLE not_a_function (id int);

            CREATE OR REPLACE FUNCTION add_two(x int) RETURNS int AS $$ SELECT x + 2 $$ LANGUAGE sql;
        "}).unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "CREATE FUNCTION ignored() ...").unwrap();

        let definitions = load_app_functions("core", temp_dir.path()).unwrap();

        assert_eq!(definitions.len(), 2);
        assert_eq!(definitions[0].function_name().unwrap(), "add_one");
        assert_eq!(definitions[0].start_line, Some(1));
        assert_eq!(definitions[1].function_name().unwrap(), "add_two");
        assert_eq!(definitions[1].start_line, Some(7));
        assert!(definitions.iter().all(|d| d.app_label.as_deref() == Some("core")));
        assert_eq!(definitions[0].source_file.as_deref(), Some(temp_dir.path().join("math.sql").as_path()));
    }

    #[test]
    fn test_registry_keeps_app_then_file_order() {
        let temp_dir = TempDir::new().unwrap();
        let core = temp_dir.path().join("core");
        let billing = temp_dir.path().join("billing/nested");
        fs::create_dir_all(&core).unwrap();
        fs::create_dir_all(&billing).unwrap();
        fs::write(core.join("b.sql"), "CREATE FUNCTION second() RETURNS int AS $$ SELECT 2 $$ LANGUAGE sql;").unwrap();
        fs::write(core.join("a.sql"), "CREATE FUNCTION first() RETURNS int AS $$ SELECT 1 $$ LANGUAGE sql;").unwrap();
        fs::write(billing.join("c.sql"), "CREATE FUNCTION third() RETURNS int AS $$ SELECT 3 $$ LANGUAGE sql;").unwrap();

        let registry = load_registry(&[
            AppConfig { label: "core".to_string(), functions_dir: core },
            AppConfig { label: "billing".to_string(), functions_dir: temp_dir.path().join("billing") },
        ]).unwrap();

        assert_eq!(registry.function_names().unwrap(), vec!["first", "second", "third"]);
        assert_eq!(registry.all()[2].app_label.as_deref(), Some("billing"));
    }

    #[test]
    fn test_missing_directory() {
        let err = load_app_functions("core", Path::new("/nonexistent/pgfn/functions")).unwrap_err();
        assert!(matches!(err, PgfnError::Configuration(msg) if msg.contains("core")));
    }

    #[test]
    fn test_invalid_sql_reports_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("broken.sql");
        fs::write(&file, "CREATE FUNCTION oops( RETURNS;").unwrap();

        let err = load_app_functions("core", temp_dir.path()).unwrap_err();
        assert!(matches!(err, PgfnError::SqlParse { file: f, .. } if f == file));
    }
}
