use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use petgraph::{Graph, Direction};
use petgraph::graph::NodeIndex;
use regex::Regex;
use tracing::{debug, warn};
use crate::error::{PgfnError, Result};
use crate::migration::artifact::{parse_artifact, ArtifactRef, MigrationArtifact, ARTIFACT_EXTENSION};

/// Knows which artifacts exist and which of them are the newest per app
pub trait DependencyGraph {
    /// Artifacts of `app_label` that no other artifact of the same app
    /// depends on, sorted by name
    fn leaf_artifacts(&self, app_label: &str) -> Vec<ArtifactRef>;
}

/// Migration artifacts on disk and the dependencies between them.
/// Edges point from a dependency to its dependent.
#[derive(Debug, Default)]
pub struct MigrationGraph {
    graph: Graph<ArtifactRef, ()>,
    node_map: HashMap<ArtifactRef, NodeIndex>,
}

impl MigrationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every artifact under `{root}/{app}/migrations/`
    pub fn load(root: &Path) -> Result<Self> {
        let mut artifacts = Vec::new();

        if !root.exists() {
            return Self::from_artifacts(&artifacts);
        }

        let entries = fs::read_dir(root).map_err(|e| PgfnError::file_read(root, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| PgfnError::file_read(root, e))?;
            let migrations_dir = entry.path().join("migrations");
            if !migrations_dir.is_dir() {
                continue;
            }

            let app_label = entry.file_name().to_string_lossy().to_string();
            artifacts.extend(load_app_artifacts(&app_label, &migrations_dir)?);
        }

        debug!("Loaded {} migration artifacts from {}", artifacts.len(), root.display());
        Self::from_artifacts(&artifacts)
    }

    /// Build the graph, failing on references to unknown artifacts
    pub fn from_artifacts(artifacts: &[MigrationArtifact]) -> Result<Self> {
        let mut graph = Self::new();

        for artifact in artifacts {
            graph.add_node(artifact.artifact_ref());
        }

        for artifact in artifacts {
            let dependent = artifact.artifact_ref();
            for dependency in &artifact.dependencies {
                if !graph.node_map.contains_key(dependency) {
                    return Err(PgfnError::MissingDependency {
                        object: dependent.to_string(),
                        dependency: dependency.to_string(),
                    });
                }
                graph.add_edge(dependency.clone(), dependent.clone());
            }
        }

        Ok(graph)
    }

    pub fn add_node(&mut self, artifact: ArtifactRef) -> NodeIndex {
        if let Some(&node_id) = self.node_map.get(&artifact) {
            node_id
        } else {
            let node_id = self.graph.add_node(artifact.clone());
            self.node_map.insert(artifact, node_id);
            node_id
        }
    }

    pub fn add_edge(&mut self, dependency: ArtifactRef, dependent: ArtifactRef) {
        let from_node = self.add_node(dependency);
        let to_node = self.add_node(dependent);
        self.graph.add_edge(from_node, to_node, ());
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Labels of every app with at least one artifact, sorted
    pub fn app_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.node_map
            .keys()
            .map(|artifact| artifact.app_label.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        labels.sort();
        labels
    }

    /// Artifacts in apply order (dependencies first), optionally limited to
    /// one app. Artifacts at the same depth are ordered by app label and name.
    pub fn ordered(&self, app_label: Option<&str>) -> Result<Vec<ArtifactRef>> {
        let sorted = petgraph::algo::toposort(&self.graph, None)
            .map_err(|_| PgfnError::CircularDependency(self.cycle_members().join(", ")))?;

        // Depth is the longest dependency chain below a node
        let mut depth: HashMap<NodeIndex, usize> = HashMap::with_capacity(sorted.len());
        for &node in &sorted {
            let level = self.graph
                .neighbors_directed(node, Direction::Incoming)
                .filter_map(|dependency| depth.get(&dependency))
                .map(|level| level + 1)
                .max()
                .unwrap_or(0);
            depth.insert(node, level);
        }

        let mut order: Vec<(usize, &ArtifactRef)> = sorted
            .iter()
            .map(|node| (depth[node], &self.graph[*node]))
            .filter(|(_, artifact)| app_label.map_or(true, |app| artifact.app_label == app))
            .collect();
        order.sort();

        Ok(order.into_iter().map(|(_, artifact)| artifact.clone()).collect())
    }

    /// Artifacts that sit on a dependency cycle, sorted
    fn cycle_members(&self) -> Vec<String> {
        let mut members: Vec<String> = petgraph::algo::tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1 || self.graph.contains_edge(component[0], component[0])
            })
            .flatten()
            .map(|node| self.graph[node].to_string())
            .collect();
        members.sort();
        members
    }

    /// Direct dependencies of an artifact
    pub fn dependencies_of(&self, artifact: &ArtifactRef) -> Vec<ArtifactRef> {
        let mut dependencies: Vec<ArtifactRef> = match self.node_map.get(artifact) {
            Some(&node_id) => self.graph
                .neighbors_directed(node_id, Direction::Incoming)
                .map(|dep_node| self.graph[dep_node].clone())
                .collect(),
            None => vec![],
        };
        dependencies.sort();
        dependencies
    }
}

impl DependencyGraph for MigrationGraph {
    fn leaf_artifacts(&self, app_label: &str) -> Vec<ArtifactRef> {
        let mut leaves: Vec<ArtifactRef> = self.graph
            .node_indices()
            .filter(|&node| self.graph[node].app_label == app_label)
            .filter(|&node| {
                !self.graph
                    .neighbors_directed(node, Direction::Outgoing)
                    .any(|dependent| self.graph[dependent].app_label == app_label)
            })
            .map(|node| self.graph[node].clone())
            .collect();
        leaves.sort();
        leaves
    }
}

fn load_app_artifacts(app_label: &str, migrations_dir: &Path) -> Result<Vec<MigrationArtifact>> {
    let numbered = Regex::new(r"^\d+_").map_err(|e| PgfnError::Other(e.to_string()))?;
    let mut artifacts = Vec::new();

    let entries = fs::read_dir(migrations_dir).map_err(|e| PgfnError::file_read(migrations_dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| PgfnError::file_read(migrations_dir, e))?.path();

        if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some(ARTIFACT_EXTENSION) {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if !numbered.is_match(name) {
            warn!("Skipping {}: migration names must start with a number", path.display());
            continue;
        }

        let content = fs::read_to_string(&path).map_err(|e| PgfnError::file_read(&path, e))?;
        let artifact = parse_artifact(&content, &path)?;

        if artifact.app_label != app_label || artifact.name != name {
            return Err(PgfnError::InvalidArtifact {
                path: path.clone(),
                message: format!(
                    "declares {}.{} but is stored as {}.{}",
                    artifact.app_label, artifact.name, app_label, name
                ),
            });
        }

        artifacts.push(artifact);
    }

    Ok(artifacts)
}
