use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use crate::error::{PgfnError, Result};

/// File extension of migration artifacts
pub const ARTIFACT_EXTENSION: &str = "toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Create or replace a function body
    Upsert,
    /// Remove a function
    Drop,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Upsert => write!(f, "UPSERT"),
            OperationKind::Drop => write!(f, "DROP"),
        }
    }
}

/// One schema change with the SQL that undoes it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub kind: OperationKind,
    pub function_name: String,
    pub sql: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverse_sql: Option<String>,
}

impl Operation {
    pub fn upsert(function_name: impl Into<String>, sql: impl Into<String>, reverse_sql: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Upsert,
            function_name: function_name.into(),
            sql: sql.into(),
            reverse_sql: Some(reverse_sql.into()),
        }
    }

    /// Drops carry no reverse step: the body that would restore the function
    /// lives in the upsert that created it
    pub fn drop(function_name: impl Into<String>) -> Self {
        let function_name = function_name.into();
        Self {
            kind: OperationKind::Drop,
            sql: drop_function_sql(&function_name),
            function_name,
            reverse_sql: None,
        }
    }
}

pub fn drop_function_sql(function_name: &str) -> String {
    format!("DROP FUNCTION IF EXISTS {};", function_name)
}

/// Identity of a migration artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub app_label: String,
    pub name: String,
}

impl ArtifactRef {
    pub fn new(app_label: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            app_label: app_label.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.app_label, self.name)
    }
}

/// A numbered migration for one app
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationArtifact {
    pub app_label: String,
    pub name: String,
    #[serde(default)]
    pub dependencies: Vec<ArtifactRef>,
    #[serde(default)]
    pub operations: Vec<Operation>,
}

impl MigrationArtifact {
    pub fn artifact_ref(&self) -> ArtifactRef {
        ArtifactRef::new(&self.app_label, &self.name)
    }
}

/// Turns an artifact into the text written to disk
pub trait ArtifactRenderer {
    fn render(&self, artifact: &MigrationArtifact) -> Result<String>;
}

/// Renders artifacts as TOML behind a comment header
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlRenderer;

impl ArtifactRenderer for TomlRenderer {
    fn render(&self, artifact: &MigrationArtifact) -> Result<String> {
        let body = toml::to_string_pretty(artifact).map_err(|e| PgfnError::InvalidArtifact {
            path: Path::new(&artifact.app_label).join(&artifact.name),
            message: e.to_string(),
        })?;

        let header = format!(
            "# Generated by pgfn {} on {}\n# Operations run in order; reverse_sql undoes each one.\n\n",
            env!("CARGO_PKG_VERSION"),
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
        );

        Ok(header + &body)
    }
}

/// Read an artifact written by [`TomlRenderer`]
pub fn parse_artifact(content: &str, path: &Path) -> Result<MigrationArtifact> {
    toml::from_str(content).map_err(|e| PgfnError::InvalidArtifact {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_artifact() -> MigrationArtifact {
        MigrationArtifact {
            app_label: "billing".to_string(),
            name: "0002_update_totals".to_string(),
            dependencies: vec![ArtifactRef::new("billing", "0001_initial")],
            operations: vec![
                Operation::upsert(
                    "totals",
                    "CREATE OR REPLACE FUNCTION totals() RETURNS int AS $$\n  SELECT 2;\n$$ LANGUAGE sql;",
                    "CREATE OR REPLACE FUNCTION totals()\nRETURNS INT AS $$\nSELECT 1;\n$$\nLANGUAGE sql;",
                ),
                Operation::drop("legacy_totals"),
            ],
        }
    }

    #[test]
    fn test_drop_operation_has_no_reverse() {
        let op = Operation::drop("first_of_two");
        assert_eq!(op.kind, OperationKind::Drop);
        assert_eq!(op.sql, "DROP FUNCTION IF EXISTS first_of_two;");
        assert!(op.reverse_sql.is_none());
    }

    #[test]
    fn test_rendered_artifact_reads_back() {
        let artifact = sample_artifact();
        let rendered = TomlRenderer.render(&artifact).unwrap();

        assert!(rendered.starts_with("# Generated by pgfn"));
        assert!(rendered.contains("kind = \"upsert\""));
        assert!(rendered.contains("kind = \"drop\""));

        let parsed = parse_artifact(&rendered, Path::new("billing/migrations/0002_update_totals.toml")).unwrap();
        assert_eq!(parsed, artifact);
    }

    #[test]
    fn test_parse_invalid_artifact() {
        let err = parse_artifact("app_label = ", Path::new("core/migrations/0001_bad.toml")).unwrap_err();
        assert!(matches!(err, PgfnError::InvalidArtifact { path, .. } if path.ends_with("0001_bad.toml")));
    }

    #[test]
    fn test_artifact_ref_display() {
        assert_eq!(ArtifactRef::new("core", "0001_initial").to_string(), "core.0001_initial");
    }
}
