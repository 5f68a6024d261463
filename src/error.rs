use std::path::PathBuf;
use thiserror::Error;
use tokio_postgres::error::SqlState;

/// Main error type for pgfn
#[derive(Error, Debug)]
pub enum PgfnError {
    // Declaration Errors
    #[error("Could not determine function name from SQL definition: {sql_preview}")]
    NameExtraction {
        sql_preview: String,
    },

    #[error("Could not determine the owning app for function {function}")]
    AppResolution {
        function: String,
    },

    #[error("Function {function} is declared more than once (apps: {first_app}, {second_app})")]
    DuplicateFunction {
        function: String,
        first_app: String,
        second_app: String,
    },

    #[error("Function definition not found in registry: {0}")]
    NotFound(String),

    #[error("No output type declared or given for function {0}")]
    MissingOutputType(String),

    // State Store Errors
    #[error("Function state store is not available: {message}")]
    StoreUnavailable {
        message: String,
        #[source]
        source: Option<tokio_postgres::Error>,
    },

    #[error("Failed to connect to database: {message}")]
    DatabaseConnection {
        message: String,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),

    // File System Errors
    #[error("Failed to read {path}: {message}")]
    FileRead {
        path: PathBuf,
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {message}")]
    FileWrite {
        path: PathBuf,
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse SQL in {file}: {message}")]
    SqlParse {
        file: PathBuf,
        message: String,
    },

    // Migration Graph Errors
    #[error("Invalid migration artifact {path}: {message}")]
    InvalidArtifact {
        path: PathBuf,
        message: String,
    },

    #[error("Missing dependency: {object} depends on {dependency} which doesn't exist")]
    MissingDependency {
        object: String,
        dependency: String,
    },

    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),

    // Configuration Errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to load configuration from {path}: {message}")]
    ConfigLoad {
        path: PathBuf,
        message: String,
    },

    #[error("{0}")]
    Other(String),
}

impl PgfnError {
    pub(crate) fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PgfnError::FileRead {
            path: path.into(),
            message: source.to_string(),
            source,
        }
    }

    pub(crate) fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PgfnError::FileWrite {
            path: path.into(),
            message: source.to_string(),
            source,
        }
    }

    /// True when the error means the state table has not been created yet
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, PgfnError::StoreUnavailable { .. })
    }
}

impl From<tokio_postgres::Error> for PgfnError {
    fn from(err: tokio_postgres::Error) -> Self {
        let missing_relation = err.code().map_or(false, |code| {
            *code == SqlState::UNDEFINED_TABLE || *code == SqlState::INVALID_SCHEMA_NAME
        });

        if missing_relation {
            PgfnError::StoreUnavailable {
                message: err.to_string(),
                source: Some(err),
            }
        } else if err.is_closed() || err.to_string().contains("connect") {
            PgfnError::DatabaseConnection {
                message: err.to_string(),
                source: err,
            }
        } else {
            PgfnError::Database {
                message: err.to_string(),
                source: err,
            }
        }
    }
}

impl From<pg_query::Error> for PgfnError {
    fn from(err: pg_query::Error) -> Self {
        PgfnError::SqlParse {
            file: PathBuf::from("unknown"),
            message: err.to_string(),
        }
    }
}

/// Result type alias for pgfn operations
pub type Result<T> = std::result::Result<T, PgfnError>;

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    /// Add context about which file caused the error
    fn file_context(self, path: impl Into<PathBuf>) -> Result<T>;

    /// Add context about which function caused the error
    fn function_context(self, function_name: &str) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<PgfnError>,
{
    fn file_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| {
            let mut err = e.into();
            match &mut err {
                PgfnError::SqlParse { file, .. } => *file = path.into(),
                PgfnError::FileRead { path: p, .. } => *p = path.into(),
                PgfnError::FileWrite { path: p, .. } => *p = path.into(),
                PgfnError::InvalidArtifact { path: p, .. } => *p = path.into(),
                _ => {}
            }
            err
        })
    }

    fn function_context(self, function_name: &str) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            match err {
                PgfnError::Other(msg) => PgfnError::Other(
                    format!("Error processing function '{}': {}", function_name, msg)
                ),
                _ => err,
            }
        })
    }
}

/// Helper function to format error with all its causes
pub fn format_error_chain(err: &PgfnError) -> String {
    use std::error::Error;

    let mut output = format!("Error: {}", err);

    let mut current_err: &dyn Error = err;
    while let Some(source) = current_err.source() {
        output.push_str(&format!("\n  Caused by: {}", source));
        current_err = source;
    }

    output
}

/// Helper function to suggest fixes for common errors
pub fn suggest_fix(err: &PgfnError) -> Option<String> {
    match err {
        PgfnError::StoreUnavailable { .. } => Some(
            "The function state table does not exist yet.\n\
             - Run `pgfn setup` to create the pgfn schema first\n\
             - Then run `pgfn make-migrations` again".to_string()
        ),
        PgfnError::DatabaseConnection { .. } => Some(
            "Suggestions:\n\
             - Check if PostgreSQL is running\n\
             - Verify the connection string is correct\n\
             - Try: psql <your-connection-string> to test the connection".to_string()
        ),
        PgfnError::InvalidConnectionString(_) => Some(
            "Connection string should be in format:\n\
             postgres://[user[:password]@][host][:port][/dbname]".to_string()
        ),
        PgfnError::NameExtraction { .. } => Some(
            "Every definition must contain `FUNCTION <name>(...)`.\n\
             - Check the CREATE FUNCTION statement for typos".to_string()
        ),
        PgfnError::AppResolution { function } => Some(
            format!("Function '{}' has no app label.\n\
                    - Set an app label on the definition\n\
                    - Or set `default_app` in pgfn.toml", function)
        ),
        PgfnError::DuplicateFunction { function, .. } => Some(
            format!("Function '{}' is declared twice.\n\
                    - Function names must be unique across all apps\n\
                    - Rename or remove one of the declarations", function)
        ),
        PgfnError::MissingDependency { object, dependency } => Some(
            format!("Migration '{}' depends on '{}' which doesn't exist.\n\
                    - Restore the missing migration file\n\
                    - Or fix the dependency list in '{}'", object, dependency, object)
        ),
        PgfnError::CircularDependency(details) => Some(
            format!("Circular dependency detected: {}\n\
                    - Review the dependencies declared in your migration files", details)
        ),
        _ => None,
    }
}
