use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use chrono::Utc;
use regex::Regex;
use tracing::{debug, info, warn};
use crate::error::{PgfnError, Result};
use crate::migration::artifact::{ArtifactRenderer, MigrationArtifact, Operation, ARTIFACT_EXTENSION};
use crate::migration::graph::DependencyGraph;

static SEQUENCE_RE: OnceLock<Regex> = OnceLock::new();

fn sequence_regex() -> &'static Regex {
    SEQUENCE_RE.get_or_init(|| Regex::new(r"^(\d+)_").expect("sequence regex is valid"))
}

/// Writes numbered migration artifacts under `{root}/{app}/migrations/`
pub struct MigrationWriter<'a> {
    root: PathBuf,
    graph: &'a dyn DependencyGraph,
    renderer: &'a dyn ArtifactRenderer,
}

impl<'a> MigrationWriter<'a> {
    pub fn new(root: impl Into<PathBuf>, graph: &'a dyn DependencyGraph, renderer: &'a dyn ArtifactRenderer) -> Self {
        Self {
            root: root.into(),
            graph,
            renderer,
        }
    }

    pub fn migrations_dir(&self, app_label: &str) -> PathBuf {
        self.root.join(app_label).join("migrations")
    }

    /// One more than the highest numeric prefix among the app's artifacts,
    /// or 1 when it has none
    pub fn next_sequence_number(&self, app_label: &str) -> Result<u64> {
        let dir = self.migrations_dir(app_label);
        if !dir.is_dir() {
            return Ok(1);
        }

        let mut highest = 0u64;
        for entry in fs::read_dir(&dir).map_err(|e| PgfnError::file_read(&dir, e))? {
            let path = entry.map_err(|e| PgfnError::file_read(&dir, e))?.path();
            if path.extension().and_then(|s| s.to_str()) != Some(ARTIFACT_EXTENSION) {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some(caps) = sequence_regex().captures(file_name) else {
                continue;
            };
            let number = caps[1]
                .parse::<u64>()
                .ok()
                .filter(|&number| number < u64::MAX)
                .ok_or_else(|| PgfnError::InvalidArtifact {
                    path: path.clone(),
                    message: format!("sequence number {} is out of range", &caps[1]),
                })?;
            highest = highest.max(number);
        }

        Ok(highest + 1)
    }

    /// Render the next artifact for `app_label` without writing it
    pub fn prepare(
        &self,
        app_label: &str,
        operations: &[Operation],
        custom_name: Option<&str>,
    ) -> Result<PendingArtifact> {
        let sequence = self.next_sequence_number(app_label)?;
        let name = artifact_name(sequence, custom_name);
        let path = self.migrations_dir(app_label).join(format!("{}.{}", name, ARTIFACT_EXTENSION));

        let artifact = MigrationArtifact {
            app_label: app_label.to_string(),
            name,
            dependencies: self.graph.leaf_artifacts(app_label),
            operations: operations.to_vec(),
        };
        let content = self.renderer.render(&artifact)?;

        Ok(PendingArtifact { path, content })
    }

    /// Write every pending artifact. If one write fails, the artifacts
    /// written before it are removed again.
    pub fn write_all(&self, pending: &[PendingArtifact]) -> Result<()> {
        for (index, artifact) in pending.iter().enumerate() {
            if let Err(e) = write_artifact(&artifact.path, &artifact.content) {
                self.discard(&pending[..index]);
                return Err(e);
            }
            info!("Wrote migration {}", artifact.path.display());
        }
        Ok(())
    }

    /// Remove artifacts that were written but must not be kept
    pub fn discard(&self, written: &[PendingArtifact]) {
        for artifact in written {
            match fs::remove_file(&artifact.path) {
                Ok(()) => debug!("Removed {}", artifact.path.display()),
                Err(e) => warn!("Could not remove {}: {}", artifact.path.display(), e),
            }
        }
    }
}

/// A rendered artifact and where it goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingArtifact {
    pub path: PathBuf,
    pub content: String,
}

/// `0004_custom` or `0004_update_functions_20240101_120000`
pub fn artifact_name(sequence: u64, custom_name: Option<&str>) -> String {
    match custom_name {
        Some(name) => format!("{:04}_{}", sequence, name),
        None => format!("{:04}_update_functions_{}", sequence, Utc::now().format("%Y%m%d_%H%M%S")),
    }
}

fn write_artifact(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| PgfnError::file_write(parent, e))?;
    }
    fs::write(path, content).map_err(|e| PgfnError::file_write(path, e))
}
