use std::path::PathBuf;
use crate::error::{PgfnError, Result};
use crate::sql::name::{create_sql_preview, extract_function_name};

/// A declared SQL function: the `CREATE FUNCTION` text plus the metadata
/// needed to place it in a migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDefinition {
    pub sql: String,
    pub output_type: Option<String>,
    pub app_label: Option<String>,
    pub source_file: Option<PathBuf>,
    pub start_line: Option<usize>,
}

impl FunctionDefinition {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            output_type: None,
            app_label: None,
            source_file: None,
            start_line: None,
        }
    }

    pub fn with_app_label(mut self, app_label: impl Into<String>) -> Self {
        self.app_label = Some(app_label.into());
        self
    }

    pub fn with_output_type(mut self, output_type: impl Into<String>) -> Self {
        self.output_type = Some(output_type.into());
        self
    }

    pub fn with_source(mut self, source_file: impl Into<PathBuf>, start_line: Option<usize>) -> Self {
        self.source_file = Some(source_file.into());
        self.start_line = start_line;
        self
    }

    /// The function name, as found in the SQL text
    pub fn function_name(&self) -> Result<String> {
        extract_function_name(&self.sql)
    }

    /// Owning app: the explicit label, else `default_app`
    pub fn resolve_app_label(&self, default_app: Option<&str>) -> Result<String> {
        self.app_label
            .clone()
            .or_else(|| default_app.map(str::to_string))
            .ok_or_else(|| PgfnError::AppResolution {
                function: self
                    .function_name()
                    .unwrap_or_else(|_| create_sql_preview(&self.sql)),
            })
    }

    /// Render a call of this function as an SQL expression, cast to the
    /// output type. `output_type` overrides the declared one.
    pub fn call_expression(&self, args: &[&str], output_type: Option<&str>) -> Result<String> {
        let name = self.function_name()?;
        let output_type = output_type
            .or(self.output_type.as_deref())
            .ok_or_else(|| PgfnError::MissingOutputType(name.clone()))?;

        Ok(format!("{}({})::{}", name, args.join(", "), output_type))
    }
}

/// Ordered collection of declared functions. Owned by the caller; there is
/// no process-wide instance.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    definitions: Vec<FunctionDefinition>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: FunctionDefinition) {
        self.definitions.push(definition);
    }

    /// Remove a previously registered definition
    pub fn deregister(&mut self, definition: &FunctionDefinition) -> Result<FunctionDefinition> {
        let position = self.definitions
            .iter()
            .position(|d| d == definition)
            .ok_or_else(|| PgfnError::NotFound(
                definition.function_name().unwrap_or_else(|_| create_sql_preview(&definition.sql))
            ))?;

        Ok(self.definitions.remove(position))
    }

    /// Remove the first definition whose SQL declares `function_name`
    pub fn deregister_function(&mut self, function_name: &str) -> Result<FunctionDefinition> {
        let position = self.definitions
            .iter()
            .position(|d| d.function_name().map_or(false, |name| name == function_name))
            .ok_or_else(|| PgfnError::NotFound(function_name.to_string()))?;

        Ok(self.definitions.remove(position))
    }

    pub fn all(&self) -> &[FunctionDefinition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Names of every registered function. Fails on the first definition
    /// without a recognizable name.
    pub fn function_names(&self) -> Result<Vec<String>> {
        self.definitions.iter().map(FunctionDefinition::function_name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIRST_OF_TWO: &str = "CREATE OR REPLACE FUNCTION first_of_two(first integer, second integer) RETURNS integer AS $$ SELECT first; $$ LANGUAGE sql;";
    const ADD_ONE: &str = "CREATE FUNCTION add_one(x integer) RETURNS integer AS $$ SELECT x + 1; $$ LANGUAGE sql;";

    #[test]
    fn test_register_preserves_order() {
        let mut registry = Registry::new();
        registry.register(FunctionDefinition::new(FIRST_OF_TWO).with_app_label("billing"));
        registry.register(FunctionDefinition::new(ADD_ONE).with_app_label("core"));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.function_names().unwrap(), vec!["first_of_two", "add_one"]);
    }

    #[test]
    fn test_deregister_removes_definition() {
        let definition = FunctionDefinition::new(FIRST_OF_TWO).with_app_label("billing");
        let mut registry = Registry::new();
        registry.register(definition.clone());

        let removed = registry.deregister(&definition).unwrap();
        assert_eq!(removed, definition);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_deregister_missing_definition_fails() {
        let mut registry = Registry::new();
        let err = registry.deregister(&FunctionDefinition::new(ADD_ONE)).unwrap_err();
        assert!(matches!(err, PgfnError::NotFound(name) if name == "add_one"));

        let err = registry.deregister_function("missing").unwrap_err();
        assert!(matches!(err, PgfnError::NotFound(_)));
    }

    #[test]
    fn test_registry_does_not_deduplicate() {
        let mut registry = Registry::new();
        registry.register(FunctionDefinition::new(ADD_ONE).with_app_label("core"));
        registry.register(FunctionDefinition::new(ADD_ONE).with_app_label("core"));
        assert_eq!(registry.len(), 2);

        registry.deregister_function("add_one").unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_resolve_app_label() {
        let explicit = FunctionDefinition::new(ADD_ONE).with_app_label("core");
        assert_eq!(explicit.resolve_app_label(Some("fallback")).unwrap(), "core");

        let implicit = FunctionDefinition::new(ADD_ONE);
        assert_eq!(implicit.resolve_app_label(Some("fallback")).unwrap(), "fallback");

        let err = implicit.resolve_app_label(None).unwrap_err();
        assert!(matches!(err, PgfnError::AppResolution { function } if function == "add_one"));
    }

    #[test]
    fn test_call_expression() {
        let definition = FunctionDefinition::new(FIRST_OF_TWO).with_output_type("integer");
        assert_eq!(
            definition.call_expression(&["a", "b"], None).unwrap(),
            "first_of_two(a, b)::integer"
        );
        assert_eq!(
            definition.call_expression(&["1", "2"], Some("bigint")).unwrap(),
            "first_of_two(1, 2)::bigint"
        );

        let untyped = FunctionDefinition::new(ADD_ONE);
        let err = untyped.call_expression(&["x"], None).unwrap_err();
        assert!(matches!(err, PgfnError::MissingOutputType(name) if name == "add_one"));
    }
}
