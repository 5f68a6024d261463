pub mod artifact;
pub mod graph;
pub mod writer;

pub use artifact::{
    drop_function_sql, parse_artifact, ArtifactRef, ArtifactRenderer, MigrationArtifact, Operation,
    OperationKind, TomlRenderer, ARTIFACT_EXTENSION,
};
pub use graph::{DependencyGraph, MigrationGraph};
pub use writer::{artifact_name, MigrationWriter, PendingArtifact};
